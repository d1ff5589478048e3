//! Core types for try-on generation.

use crate::error::{Result, TryOnError};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Parses a MIME type such as `image/jpeg`.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// An image encoded for transport: base64 bytes plus MIME type.
///
/// Serialized as `{"base64": "...", "mimeType": "image/png"}`. The base64
/// field is also accepted as `data`, the name the generation API uses.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    /// Standard base64 of the raw image bytes.
    #[serde(alias = "data")]
    pub base64: String,
    /// MIME type of the encoded image.
    pub mime_type: String,
}

impl ImagePayload {
    /// Creates a payload from already-encoded data.
    pub fn new(base64: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            base64: base64.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Encodes raw image bytes of a known format.
    pub fn from_bytes(data: &[u8], format: ImageFormat) -> Self {
        Self {
            base64: base64::engine::general_purpose::STANDARD.encode(data),
            mime_type: format.mime_type().to_string(),
        }
    }

    /// Reads and encodes an image file.
    ///
    /// The format is taken from the file's magic bytes, falling back to its
    /// extension. Files that are empty or not PNG, JPEG or WebP are rejected
    /// with [`TryOnError::FileRead`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(TryOnError::FileRead)?;
        if data.is_empty() {
            return Err(TryOnError::FileRead(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{} is empty", path.display()),
            )));
        }

        let format = ImageFormat::from_magic_bytes(&data)
            .or_else(|| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .and_then(ImageFormat::from_extension)
            })
            .ok_or_else(|| {
                TryOnError::FileRead(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("{} is not a PNG, JPEG or WebP image", path.display()),
                ))
            })?;

        tracing::debug!(
            path = %path.display(),
            format = %format,
            size_bytes = data.len(),
            "encoded image file"
        );
        Ok(Self::from_bytes(&data, format))
    }

    /// Returns the detected format for the declared MIME type, if supported.
    pub fn format(&self) -> Option<ImageFormat> {
        ImageFormat::from_mime_type(&self.mime_type)
    }

    /// Decodes the payload back into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_base64_lenient(&self.base64).map_err(|e| TryOnError::Decode(e.to_string()))
    }

    /// Returns the payload as a `data:` URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

impl std::fmt::Debug for ImagePayload {
    // Payloads are megabytes of base64; log the shape, not the bytes.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("base64_len", &self.base64.len())
            .finish()
    }
}

/// Body of `POST /api/generate`.
///
/// Both images are optional at the type level so that a missing image is
/// reported as a 400 with a JSON error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// The garment or product to place on the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_image: Option<ImagePayload>,
    /// The photo of the model wearing the product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_image: Option<ImagePayload>,
}

impl GenerateRequest {
    /// Creates a request carrying both images.
    pub fn new(product_image: ImagePayload, model_image: ImagePayload) -> Self {
        Self {
            product_image: Some(product_image),
            model_image: Some(model_image),
        }
    }
}

/// Response of `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationResult {
    /// The composed image as base64.
    #[serde(rename_all = "camelCase")]
    Image { generated_image: String },
    /// A human-readable failure message.
    Error { error: String },
}

impl GenerationResult {
    /// Wraps a generated image.
    pub fn image(data: impl Into<String>) -> Self {
        Self::Image {
            generated_image: data.into(),
        }
    }

    /// Wraps an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

/// The fixed natural-language instruction sent alongside the two images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instruction {
    /// Short compositing instruction used by the proxy.
    #[default]
    Compose,
    /// Longer editorial instruction with explicit constraints.
    Editorial,
}

impl Instruction {
    /// Returns the instruction text.
    pub fn text(&self) -> &'static str {
        match self {
            Self::Compose => {
                "Photorealistically place the garment from the first image onto the model \
                 in the second image. Match the model's pose, lighting, and shadows. \
                 Output only the final composed image."
            }
            Self::Editorial => {
                "You are an expert fashion photo editor. Your task is to take a product image \
                 (first image) and a model image (second image) and create a new, photorealistic \
                 image where the model is wearing the product. The final image should be \
                 seamless, maintaining the lighting, shadows, pose, and overall style of the \
                 original model image. The product should fit naturally on the model as if it \
                 were part of the original photoshoot. Do not add any text, logos, or extra \
                 elements. Output only the final edited image."
            }
        }
    }
}

/// Decodes a base64 string that may be imperfectly formatted.
///
/// Accepts a `data:` URL prefix, embedded whitespace and missing padding.
pub fn decode_base64_lenient(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let b64 = match input.find(";base64,") {
        Some(pos) => &input[pos + 8..],
        None => input,
    };

    let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD.decode(cleaned.trim_end_matches('='))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    fn temp_file(name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("tryon-{}-{}", std::process::id(), name));
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a"), None);
    }

    #[test]
    fn test_format_from_mime_type() {
        assert_eq!(
            ImageFormat::from_mime_type("image/jpeg"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::from_mime_type("IMAGE/PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_mime_type("image/gif"), None);
    }

    #[test]
    fn test_from_file_png() {
        let path = temp_file("product.png", &PNG_MAGIC);
        let payload = ImagePayload::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(!payload.base64.is_empty());
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.format(), Some(ImageFormat::Png));
    }

    #[test]
    fn test_from_file_magic_bytes_win_over_extension() {
        let path = temp_file("mislabelled.png", &JPEG_MAGIC);
        let payload = ImagePayload::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(payload.mime_type, "image/jpeg");
    }

    #[test]
    fn test_from_file_falls_back_to_extension() {
        let path = temp_file("tiny.webp", b"RIFF");
        let payload = ImagePayload::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(payload.mime_type, "image/webp");
    }

    #[test]
    fn test_from_file_rejects_unsupported() {
        let path = temp_file("notes.txt", b"just some text, not an image");
        let err = ImagePayload::from_file(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, TryOnError::FileRead(_)));
        assert_eq!(err.to_string(), "Failed to read image file.");
    }

    #[test]
    fn test_from_file_missing() {
        let err = ImagePayload::from_file("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, TryOnError::FileRead(_)));
    }

    #[test]
    fn test_payload_decode_reproduces_bytes() {
        let original: Vec<u8> = (0..=255u8).cycle().take(4099).collect();
        let payload = ImagePayload::from_bytes(&original, ImageFormat::Png);
        assert_eq!(payload.decode().unwrap(), original);
    }

    #[test]
    fn test_decode_lenient_variants() {
        assert_eq!(decode_base64_lenient("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_base64_lenient("aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode_base64_lenient("aGVs\nbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_base64_lenient("data:image/png;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
        assert!(decode_base64_lenient("!!!not base64!!!").is_err());
    }

    #[test]
    fn test_payload_wire_shape() {
        let payload = ImagePayload::new("aGVsbG8=", "image/png");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["base64"], "aGVsbG8=");
        assert_eq!(json["mimeType"], "image/png");

        let aliased: ImagePayload =
            serde_json::from_str(r#"{"data":"aGVsbG8=","mimeType":"image/png"}"#).unwrap();
        assert_eq!(aliased, payload);
    }

    #[test]
    fn test_payload_data_url() {
        let payload = ImagePayload::new("aGVsbG8=", "image/webp");
        assert_eq!(payload.data_url(), "data:image/webp;base64,aGVsbG8=");
    }

    #[test]
    fn test_payload_debug_omits_data() {
        let payload = ImagePayload::new("a".repeat(64), "image/png");
        let debug = format!("{:?}", payload);
        assert!(debug.contains("base64_len: 64"));
        assert!(!debug.contains("aaaa"));
    }

    #[test]
    fn test_generate_request_missing_image() {
        let req: GenerateRequest = serde_json::from_str(
            r#"{"productImage":{"base64":"aGVsbG8=","mimeType":"image/png"}}"#,
        )
        .unwrap();
        assert!(req.product_image.is_some());
        assert!(req.model_image.is_none());
    }

    #[test]
    fn test_generation_result_shapes() {
        let ok: GenerationResult = serde_json::from_str(r#"{"generatedImage":"abc"}"#).unwrap();
        assert_eq!(ok, GenerationResult::image("abc"));

        let err: GenerationResult = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert_eq!(err, GenerationResult::error("boom"));

        let json = serde_json::to_value(GenerationResult::image("abc")).unwrap();
        assert_eq!(json, serde_json::json!({"generatedImage": "abc"}));
    }

    #[test]
    fn test_instruction_default_is_compose() {
        assert_eq!(Instruction::default(), Instruction::Compose);
        assert!(Instruction::Compose.text().starts_with("Photorealistically place"));
        assert!(Instruction::Editorial
            .text()
            .starts_with("You are an expert fashion photo editor."));
    }
}
