use crate::discover::DiscoverResult;
use crate::{MirrorError, Result};
use std::path::Path;

/// Writes the discovery manifest as pretty-printed JSON
pub async fn write_manifest(path: &Path, result: &DiscoverResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    tokio::fs::write(path, format!("{}\n", json)).await?;
    tracing::info!(
        "Wrote manifest with {} documents to {}",
        result.documents.len(),
        path.display()
    );
    Ok(())
}

/// Reads a discovery manifest back
///
/// An unreadable or malformed manifest is fatal; the export phase has
/// nothing to work from without one.
pub async fn read_manifest(path: &Path) -> Result<DiscoverResult> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        MirrorError::Manifest(format!("cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| MirrorError::Manifest(format!("cannot parse {}: {}", path.display(), e)))
}
