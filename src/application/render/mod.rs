//! Mission order rendering.
//!
//! Page composition is pure and deterministic: the same request and assets always
//! produce the same bytes, which is what makes hash-based document caching sound.
//! Asset loading and the blocking PDF work sit behind [`DocumentRenderer`].

mod assets;
mod engine;
mod fields;
mod fonts;
mod merge;
mod page;
mod pdf;
mod qr;
mod runs;
mod shaping;
mod types;
mod wrap;

pub use assets::{AssetCache, AssetError, AssetNames, AssetSource, RenderAssets};
pub use engine::{METRIC_RENDER_MS, PdfRenderer, render_page};
pub use merge::merge_documents;
pub use types::{DocumentRenderer, RenderError, RenderRequest};
