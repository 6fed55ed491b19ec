use async_trait::async_trait;

use crate::error::ProductResult;

/// External image hosting provider.
///
/// Uploads happen before validation and produce the [`crate::ImageRef`] the
/// validator checks. The domain only asks the store to drop assets that a
/// product no longer references.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Delete the asset known to the provider as `public_id`
    async fn delete_asset(&self, public_id: &str) -> ProductResult<()>;
}
