//! Try-on provider trait.

use crate::error::Result;
use crate::image::types::ImagePayload;
use async_trait::async_trait;

/// A backend able to composite a product image onto a model image.
#[async_trait]
pub trait TryOnProvider: Send + Sync {
    /// Sends both images to the generation API and returns the first image
    /// it produced.
    ///
    /// Exactly one attempt is made; failures are returned as-is.
    async fn compose(&self, product: &ImagePayload, model: &ImagePayload)
        -> Result<ImagePayload>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}
