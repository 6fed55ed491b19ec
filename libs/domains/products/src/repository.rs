use async_trait::async_trait;

use crate::error::ProductResult;
use crate::models::{NewProduct, Product, ProductId, ProductPatch};

/// Repository trait for Product persistence
///
/// Implementations own identity and time: `create` assigns `id`,
/// `createdAt` and `updatedAt`, and `update` advances `updatedAt`
/// (see [`Product::from_new`] and [`Product::apply_patch`]).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Persist a validated product and return the stored record
    async fn create(&self, input: NewProduct) -> ProductResult<Product>;

    /// Get a product by ID
    async fn get(&self, id: &ProductId) -> ProductResult<Option<Product>>;

    /// Apply a validated patch, returning the updated record
    async fn update(&self, id: &ProductId, patch: ProductPatch) -> ProductResult<Product>;

    /// Delete a product by ID; `false` when nothing was stored under it
    async fn delete(&self, id: &ProductId) -> ProductResult<bool>;
}
