use async_trait::async_trait;
use thiserror::Error;

use crate::domain::mission::RenderingInput;

use super::assets::AssetError;

/// Everything one mission order page is drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub input: RenderingInput,
    pub sequence_number: i64,
    /// Encoded into the QR code.
    pub verification_url: String,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("font `{name}` is unusable: {reason}")]
    Font { name: String, reason: String },
    #[error("image `{name}` is not a baseline JPEG")]
    Image { name: String },
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("qr encoding failed: {0}")]
    Qr(String),
    #[error("pdf processing failed: {0}")]
    Pdf(String),
    #[error("render task aborted: {0}")]
    Join(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for RenderError {
    fn from(err: lopdf::Error) -> Self {
        Self::Pdf(err.to_string())
    }
}

/// Produces the bytes of one page. Implementations must be deterministic: the same
/// request always yields byte-identical output.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, request: RenderRequest) -> Result<Vec<u8>, RenderError>;
}
