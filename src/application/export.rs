//! JSON lines export of harvested products

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::info;

use crate::application::harvester::HarvestSummary;
use crate::domain::product::CanonicalProduct;
use crate::domain::value_objects::ShopId;

/// One output line: the canonical product plus its shop and numeric price.
#[derive(Debug, Serialize)]
pub struct ExportedProduct<'a> {
    pub shop_id: ShopId,
    #[serde(flatten)]
    pub product: &'a CanonicalProduct,
    pub price_value: Option<f64>,
}

impl<'a> ExportedProduct<'a> {
    pub fn new(shop_id: ShopId, product: &'a CanonicalProduct) -> Self {
        Self {
            shop_id,
            product,
            price_value: product.price_value(),
        }
    }
}

/// Write every product of `summary` to `writer`, one JSON object per line.
pub async fn write_json_lines<W>(summary: &HarvestSummary, writer: W) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);
    let mut written = 0usize;
    for (shop_id, product) in summary.products() {
        let mut line = serde_json::to_vec(&ExportedProduct::new(shop_id, product))?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        written += 1;
    }
    writer.flush().await?;
    Ok(written)
}

/// [`write_json_lines`] into a freshly created file at `path`.
pub async fn export_to_file(summary: &HarvestSummary, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }
    let file = File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let written = write_json_lines(summary, file).await?;
    info!("💾 Wrote {} products to {}", written, path.display());
    Ok(written)
}
