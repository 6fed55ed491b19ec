//! Product Service - validation in front of the storage collaborators

use serde_json::Value;
use std::sync::Arc;
use tracing::{error, instrument, warn};

use crate::error::{ProductError, ProductResult};
use crate::image_store::ImageStore;
use crate::models::{ImageRef, Product};
use crate::repository::ProductRepository;
use crate::validator::ProductValidator;

/// Product service composing the validator with the persistence and
/// image-storage adapters.
///
/// Untrusted input only reaches the repository after it has passed the
/// validator, and ids are format-checked before any lookup.
pub struct ProductService<R: ProductRepository, S: ImageStore> {
    repository: Arc<R>,
    images: Arc<S>,
    validator: ProductValidator,
}

impl<R: ProductRepository, S: ImageStore> ProductService<R, S> {
    pub fn new(repository: R, images: S, validator: ProductValidator) -> Self {
        Self {
            repository: Arc::new(repository),
            images: Arc::new(images),
            validator,
        }
    }

    pub fn validator(&self) -> &ProductValidator {
        &self.validator
    }

    /// Validate creation input and persist it
    #[instrument(skip(self, input))]
    pub async fn create_product(&self, input: &Value) -> ProductResult<Product> {
        let new_product = self.validator.validate_for_create(input)?;
        let product = self.repository.create(new_product).await?;
        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Get a product by ID
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &str) -> ProductResult<Product> {
        let id = self.validator.validate_product_id(id)?;
        self.repository
            .get(&id)
            .await?
            .ok_or(ProductError::NotFound(id))
    }

    /// Validate and apply a partial update.
    ///
    /// An empty patch returns the stored record untouched. When the patch
    /// replaces or clears the image and the stored record no longer points at
    /// the old asset, that asset is deleted afterwards.
    #[instrument(skip(self, input))]
    pub async fn update_product(&self, id: &str, input: &Value) -> ProductResult<Product> {
        let id = self.validator.validate_product_id(id)?;
        let patch = self.validator.validate_for_update(input)?;

        let existing = self
            .repository
            .get(&id)
            .await?
            .ok_or_else(|| ProductError::NotFound(id.clone()))?;

        if patch.is_empty() {
            return Ok(existing);
        }

        let replaces_image = patch.replaces_imagery(existing.imagery.as_ref());
        let updated = self.repository.update(&id, patch).await?;

        // The write is committed by now, so a regressed clock is reported
        // but the update still stands.
        if updated.updated_at < existing.updated_at {
            error!(
                product_id = %id,
                previous = %existing.updated_at,
                returned = %updated.updated_at,
                "Repository moved updatedAt backwards"
            );
        }

        if replaces_image {
            let stale = stale_image(existing.imagery.as_ref(), updated.imagery.as_ref());
            if let Some(image) = stale {
                self.release_image(image).await;
            }
        }

        tracing::info!(product_id = %id, "Product updated");
        Ok(updated)
    }

    /// Delete a product and the image asset it referenced
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &str) -> ProductResult<()> {
        let id = self.validator.validate_product_id(id)?;

        let existing = self
            .repository
            .get(&id)
            .await?
            .ok_or_else(|| ProductError::NotFound(id.clone()))?;

        if !self.repository.delete(&id).await? {
            return Err(ProductError::NotFound(id));
        }

        if let Some(image) = &existing.imagery {
            self.release_image(image).await;
        }

        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Best-effort removal of an asset no product points at any more
    async fn release_image(&self, image: &ImageRef) {
        if let Err(e) = self.images.delete_asset(&image.public_id).await {
            warn!(public_id = %image.public_id, error = %e, "Failed to delete image asset");
        }
    }
}

/// The asset `before` referenced, unless the stored record `after` still
/// points at it
fn stale_image<'a>(before: Option<&'a ImageRef>, after: Option<&ImageRef>) -> Option<&'a ImageRef> {
    before.filter(|old| !after.is_some_and(|current| current.public_id == old.public_id))
}

impl<R: ProductRepository, S: ImageStore> Clone for ProductService<R, S> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            images: Arc::clone(&self.images),
            validator: self.validator.clone(),
        }
    }
}
