//! Append-only CSV of the `all` series, one row per tick.

use super::{ExportError, Exporter, TickContext};
use crate::stats::{CollectedStats, StatField};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::info;

/// Writes `<dir>/<run start>.csv`, a new file per run.
///
/// The column set is fixed when the sink is created so every row lines up
/// with the header even when new metrics appear mid-run.
pub struct CsvExporter {
    dir: PathBuf,
    path: Option<PathBuf>,
    metrics: Vec<String>,
    header_written: bool,
}

impl CsvExporter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, metrics: Vec<String>) -> Self {
        Self { dir: dir.into(), path: None, metrics, header_written: false }
    }

    /// File name of the run started at `start`.
    #[must_use]
    pub fn file_name(start: DateTime<Utc>) -> String {
        format!("{}.csv", start.format("%Y-%m-%d_%H.%M.%S"))
    }

    /// The current run's file, once the first row has been written.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn header(&self) -> String {
        let mut header = String::from("datetime");
        for metric in &self.metrics {
            for field in StatField::ALL {
                header.push(',');
                header.push_str(metric);
                header.push('_');
                header.push_str(field.csv_suffix());
            }
        }
        header
    }

    /// One data row. Pure, so exporting the same tick twice yields the same bytes.
    #[must_use]
    pub fn format_row(&self, stats: &CollectedStats, now: DateTime<Utc>) -> String {
        let mut row = now.format("%Y/%m/%d %H:%M:%S").to_string();
        for metric in &self.metrics {
            let acc = stats.all(metric);
            for field in StatField::ALL {
                let value = acc.map_or(0.0, |a| a.field(field));
                row.push(',');
                if field == StatField::Count {
                    row.push_str(&format!("{value:.0}"));
                } else {
                    row.push_str(&format!("{value:.3}"));
                }
            }
        }
        row
    }
}

#[async_trait]
impl Exporter for CsvExporter {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn start(&mut self) -> Result<(), ExportError> {
        self.path = None;
        self.header_written = false;
        Ok(())
    }

    async fn export(&mut self, ctx: &TickContext<'_>) -> Result<(), ExportError> {
        let mut out = String::new();
        if !self.header_written {
            fs::create_dir_all(&self.dir).await?;
            out.push_str(&self.header());
            out.push('\n');
        }
        out.push_str(&self.format_row(ctx.stats, ctx.now));
        out.push('\n');

        let path = match &self.path {
            Some(path) => path.clone(),
            None => {
                let path = self.dir.join(Self::file_name(ctx.start));
                info!(path = %path.display(), "Writing stats CSV");
                self.path = Some(path.clone());
                path
            }
        };
        let mut file = fs::OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(out.as_bytes()).await?;
        file.flush().await?;
        self.header_written = true;
        Ok(())
    }
}
