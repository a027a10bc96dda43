//! Admin product management and public catalog reads.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::{Product, ProductDraft, ProductPatch};
use crate::messaging::EventBus;
use crate::store::{Page, ProductFilter, Store};
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    events: EventBus,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>, events: EventBus) -> Self { Self { store, events } }

    pub async fn create(&self, draft: ProductDraft) -> Result<Product> {
        let mut product = Product::create(draft)?;
        self.store.insert_product(&product).await?;
        info!(product_id = %product.id(), title = %product.title(), "product created");
        self.events.publish(product.take_events()).await;
        Ok(product)
    }

    pub async fn update(&self, id: Uuid, patch: ProductPatch) -> Result<Product> {
        let mut product = self.find_active(id).await?;
        let stock = patch.stock;
        product.apply(patch)?;
        let stored = self.store.update_product(&product, stock).await?;
        self.events.publish(product.take_events()).await;
        Ok(stored)
    }

    /// Archived products stay referenced by past orders but can no longer be bought.
    pub async fn archive(&self, id: Uuid) -> Result<()> {
        let mut product = self.find_active(id).await?;
        product.archive();
        self.store.update_product(&product, None).await?;
        info!(product_id = %id, "product archived");
        self.events.publish(product.take_events()).await;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Product> { self.find_active(id).await }

    pub async fn list(&self, filter: &ProductFilter) -> Result<Page<Product>> { self.store.list_products(filter).await }

    async fn find_active(&self, id: Uuid) -> Result<Product> {
        self.store.find_product(id).await?.filter(Product::is_orderable).ok_or(EcommerceError::ProductNotFound)
    }
}
