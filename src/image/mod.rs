//! Image payloads and the generation provider.

mod provider;
pub mod providers;
mod types;

pub use provider::TryOnProvider;
pub use types::{
    decode_base64_lenient, GenerateRequest, GenerationResult, ImageFormat, ImagePayload,
    Instruction,
};
