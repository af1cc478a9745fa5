use std::path::Path;

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the global Prometheus recorder. Only the first call has an effect.
pub fn init() -> anyhow::Result<()> {
    PROM_HANDLE.get_or_try_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .context("failed to install Prometheus metrics recorder")
    })?;
    Ok(())
}

/// Writes the current metrics snapshot in the Prometheus text format, for a
/// node_exporter textfile collector to pick up.
pub fn write_textfile(path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    let handle = PROM_HANDLE
        .get()
        .context("Prometheus recorder not initialized")?;

    // The collector must never see a partially written file.
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, handle.render()).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("failed to move metrics into {}", path.display()))?;
    tracing::debug!(path = %path.display(), "metrics textfile written");
    Ok(())
}
