//! Error types for try-on generation.

/// Maximum length of upstream error text relayed to callers.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while encoding, proxying or generating a try-on image.
#[derive(Debug, thiserror::Error)]
pub enum TryOnError {
    /// API key missing or rejected by the upstream API.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Upstream API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Upstream API rejected the request for quota reasons.
    #[error("rate limited by the generation API")]
    RateLimited,

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The generation API answered but returned no image.
    #[error("{0}")]
    NoImage(String),

    /// One or both of the input images were not supplied.
    #[error("Please upload both a product and a model image.")]
    MissingInput,

    /// An input image could not be read or is not a supported format.
    #[error("Failed to read image file.")]
    FileRead(#[source] std::io::Error),

    /// The proxy answered with a non-2xx status.
    ///
    /// Displays only the message so a server-provided `{error}` reaches the
    /// user verbatim.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// The proxy answered 2xx with a body that is not the expected JSON.
    #[error("The server returned an invalid response: {0}")]
    InvalidResponse(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TryOnError {
    /// Returns true if the error was produced before any network call was made.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::MissingInput | Self::FileRead(_) | Self::Decode(_) | Self::Io(_)
        )
    }
}

/// Result type alias for try-on operations.
pub type Result<T> = std::result::Result<T, TryOnError>;

/// Redacts API keys from upstream error text and bounds its length.
///
/// Google echoes request URLs (and sometimes keys) in error bodies; nothing
/// shaped like a key may be relayed to a browser.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            if let Some(pos) = word.find("key=") {
                format!("{}key=[REDACTED]", &word[..pos])
            } else if word.starts_with("AIza") && word.len() >= 30 {
                "[REDACTED]".to_string()
            } else {
                word.to_string()
            }
        })
        .collect();
    truncate_chars(&redacted.join(" "), MAX_ERROR_MESSAGE_LEN)
}

/// Truncates to at most `max` characters, appending an ellipsis when cut.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
