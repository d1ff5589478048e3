#![warn(missing_docs)]
//! tryon - Virtual try-on via AI image generation.
//!
//! Takes a product photo and a model photo and asks a multimodal generation
//! API (Gemini) for a photorealistic composite of the model wearing the
//! product. The crate has three pieces:
//!
//! - [`ImagePayload`]: encodes an image file as base64 + MIME type.
//! - [`GenerateClient`]: posts two payloads to a proxy and normalizes the
//!   response into the generated image or one human-readable error.
//! - `server` (feature `server`): the proxy itself, holding the API key and
//!   forwarding to a [`TryOnProvider`].
//!
//! # Quick Start
//!
//! ```no_run
//! use tryon::{GeminiProvider, ImagePayload, TryOnProvider};
//!
//! #[tokio::main]
//! async fn main() -> tryon::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let product = ImagePayload::from_file("jacket.png")?;
//!     let model = ImagePayload::from_file("model.jpg")?;
//!     let image = provider.compose(&product, &model).await?;
//!     std::fs::write("result.png", image.decode()?)?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `server`: the axum proxy serving `POST /api/generate`
//! - `cli`: the `tryon` command-line interface

pub mod client;
mod error;
pub mod image;

#[cfg(feature = "server")]
pub mod server;

// Re-export error types at crate root
pub use error::{Result, TryOnError};

pub use client::GenerateClient;
pub use image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};
pub use image::{
    GenerateRequest, GenerationResult, ImageFormat, ImagePayload, Instruction, TryOnProvider,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::GenerateClient;
    pub use crate::error::{Result, TryOnError};
    pub use crate::image::providers::GeminiProvider;
    pub use crate::image::{ImagePayload, TryOnProvider};
}
