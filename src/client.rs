//! Client for the `/api/generate` proxy endpoint.
//!
//! Every failure collapses into a single [`TryOnError`] whose display string
//! is meant to be shown to the user as-is.

use crate::error::{truncate_chars, Result, TryOnError};
use crate::image::{GenerateRequest, ImagePayload};
use serde::Deserialize;

/// Path of the generation endpoint on the proxy.
pub const GENERATE_PATH: &str = "/api/generate";

/// Maximum characters of a non-JSON error body quoted back to the user.
const MAX_FALLBACK_BODY_LEN: usize = 200;

/// Dispatches try-on requests to a running proxy.
#[derive(Debug, Clone)]
pub struct GenerateClient {
    client: reqwest::Client,
    endpoint: String,
}

impl GenerateClient {
    /// Creates a client for the proxy at `base_url` (e.g. `http://127.0.0.1:3000`).
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a client reusing an existing `reqwest::Client`.
    pub fn with_client(client: reqwest::Client, base_url: impl AsRef<str>) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.as_ref().trim_end_matches('/'), GENERATE_PATH),
        }
    }

    /// Returns the full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts both images and returns the generated image as base64.
    ///
    /// Returns [`TryOnError::MissingInput`] without touching the network when
    /// either image is absent. A single attempt is made.
    pub async fn generate(
        &self,
        product: Option<&ImagePayload>,
        model: Option<&ImagePayload>,
    ) -> Result<String> {
        let (Some(product), Some(model)) = (product, model) else {
            return Err(TryOnError::MissingInput);
        };

        let body = GenerateRequest::new(product.clone(), model.clone());

        tracing::debug!(endpoint = %self.endpoint, "dispatching try-on request");

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        interpret_response(status, &text)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuccessBody {
    #[serde(default)]
    generated_image: Option<String>,
}

/// Turns a proxy response into the generated image or a user-facing error.
pub fn interpret_response(status: u16, body: &str) -> Result<String> {
    if !(200..300).contains(&status) {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => parsed.error,
            Err(_) if body.trim().is_empty() => {
                format!("Server returned status {status} with an empty response.")
            }
            // Gateways answer timeouts with HTML pages
            Err(_) => format!(
                "Server returned status {status}: {}",
                truncate_chars(body, MAX_FALLBACK_BODY_LEN)
            ),
        };
        tracing::warn!(status, %message, "try-on request failed");
        return Err(TryOnError::Server { status, message });
    }

    let parsed: SuccessBody = serde_json::from_str(body)
        .map_err(|_| TryOnError::InvalidResponse(truncate_chars(body, MAX_FALLBACK_BODY_LEN)))?;

    match parsed.generated_image {
        Some(image) if !image.is_empty() => Ok(image),
        _ => Err(TryOnError::NoImage(
            "The server response did not contain an image.".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_path() {
        let client = GenerateClient::new("http://localhost:3000/");
        assert_eq!(client.endpoint(), "http://localhost:3000/api/generate");
    }

    #[tokio::test]
    async fn test_missing_input_never_dispatches() {
        // Nothing listens on the discard port; a dispatched request would
        // surface as a network error instead.
        let client = GenerateClient::new("http://127.0.0.1:9");
        let image = ImagePayload::new("aGVsbG8=", "image/png");

        let err = client.generate(Some(&image), None).await.unwrap_err();
        assert!(matches!(err, TryOnError::MissingInput));

        let err = client.generate(None, Some(&image)).await.unwrap_err();
        assert!(matches!(err, TryOnError::MissingInput));

        let err = client.generate(None, None).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please upload both a product and a model image."
        );
    }

    #[test]
    fn test_success() {
        let image = interpret_response(200, r#"{"generatedImage":"iVBORw0KGgo="}"#).unwrap();
        assert_eq!(image, "iVBORw0KGgo=");
    }

    #[test]
    fn test_json_error_is_relayed_exactly() {
        let err = interpret_response(400, r#"{"error":"Missing product or model image data."}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing product or model image data.");
        assert!(matches!(err, TryOnError::Server { status: 400, .. }));
    }

    #[test]
    fn test_non_json_error_is_truncated() {
        let page = format!("<html><body>{}</body></html>", "Gateway Timeout ".repeat(50));
        let err = interpret_response(504, &page).unwrap_err();
        let msg = err.to_string();

        assert!(msg.starts_with("Server returned status 504: <html><body>Gateway Timeout"));
        assert!(msg.ends_with("..."));
        assert!(msg.len() < page.len());
    }

    #[test]
    fn test_non_json_error_short_body_kept_whole() {
        let err = interpret_response(502, "Bad Gateway").unwrap_err();
        assert_eq!(err.to_string(), "Server returned status 502: Bad Gateway");
    }

    #[test]
    fn test_empty_error_body() {
        let err = interpret_response(500, "").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Server returned status 500 with an empty response."
        );
    }

    #[test]
    fn test_json_without_error_field_falls_back() {
        let err = interpret_response(500, r#"{"message":"oops"}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Server returned status 500: {"message":"oops"}"#
        );
    }

    #[test]
    fn test_ok_without_image_is_an_error() {
        let err = interpret_response(200, r#"{"status":"done"}"#).unwrap_err();
        assert!(matches!(err, TryOnError::NoImage(_)));

        let err = interpret_response(200, r#"{"generatedImage":""}"#).unwrap_err();
        assert!(matches!(err, TryOnError::NoImage(_)));
    }

    #[test]
    fn test_ok_with_non_json_body() {
        let err = interpret_response(200, "<html>hello</html>").unwrap_err();
        assert!(matches!(err, TryOnError::InvalidResponse(_)));
        assert_eq!(
            err.to_string(),
            "The server returned an invalid response: <html>hello</html>"
        );
    }
}
