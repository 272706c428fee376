//! JSON job reports.
//!
//! Files are grouped by the day the job started (UTC):
//! ```text
//! report_dir/
//! └── 2025-05-06/
//!     ├── ingest-091502.json
//!     └── rewrite-091544.json
//! ```

use crate::pipeline::JobReport;
use crate::utils::ensure_writable_dir;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Path a report is written to under `report_dir`.
pub fn report_path(report: &JobReport, report_dir: &str) -> PathBuf {
    let started = report.started_at;
    PathBuf::from(report_dir)
        .join(started.format("%Y-%m-%d").to_string())
        .join(format!("{}-{}.json", report.job, started.format("%H%M%S")))
}

/// Serialize `report` as pretty JSON into its dated directory under
/// `report_dir`, returning the written path.
#[instrument(level = "info", skip_all, fields(report_dir = %report_dir, job = %report.job))]
pub async fn write_report(report: &JobReport, report_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;
    let path = report_path(report, report_dir);

    if let Some(dir) = path.parent() {
        let dir = dir.to_string_lossy();
        if let Err(e) = ensure_writable_dir(&dir).await {
            error!(%dir, error = %e, "Report directory is not writable");
            return Err(e);
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote job report");
    Ok(path)
}
