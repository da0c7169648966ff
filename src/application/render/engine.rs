use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use tokio::sync::OnceCell;

use super::assets::{AssetCache, AssetNames, RenderAssets};
use super::fields::MissionFields;
use super::page::{ImageAspects, compose_page};
use super::pdf::write_pdf;
use super::qr::QrMatrix;
use super::types::{DocumentRenderer, RenderError, RenderRequest};

pub const METRIC_RENDER_MS: &str = "missive_render_ms";

/// Pure render: fields, direction and images in, one PDF page out.
pub fn render_page(request: &RenderRequest, assets: &RenderAssets) -> Result<Vec<u8>, RenderError> {
    let fields = MissionFields::from_input(&request.input, request.sequence_number);
    let qr = QrMatrix::encode(&request.verification_url)?;
    let aspects = ImageAspects {
        logo: assets.logo.aspect(),
        watermark: assets.watermark.aspect(),
        stamp: assets.stamp.aspect(),
    };
    let layout = compose_page(&fields, &assets.fonts, aspects, &qr);
    write_pdf(&layout, assets)
}

/// Production renderer. Assets are parsed on first use and shared afterwards.
pub struct PdfRenderer {
    cache: Arc<AssetCache>,
    names: AssetNames,
    assets: OnceCell<Arc<RenderAssets>>,
}

impl PdfRenderer {
    pub fn new(cache: Arc<AssetCache>, names: AssetNames) -> Self {
        Self {
            cache,
            names,
            assets: OnceCell::new(),
        }
    }

    async fn assets(&self) -> Result<Arc<RenderAssets>, RenderError> {
        self.assets
            .get_or_try_init(|| async {
                RenderAssets::load(&self.cache, &self.names)
                    .await
                    .map(Arc::new)
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl DocumentRenderer for PdfRenderer {
    async fn render(&self, request: RenderRequest) -> Result<Vec<u8>, RenderError> {
        let assets = self.assets().await?;
        let started_at = Instant::now();

        let bytes = tokio::task::spawn_blocking(move || render_page(&request, &assets))
            .await
            .map_err(|err| RenderError::Join(err.to_string()))??;

        histogram!(METRIC_RENDER_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        Ok(bytes)
    }
}
