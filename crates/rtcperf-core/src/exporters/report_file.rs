//! Alert report file, rewritten in full every tick.

use super::{ExportError, Exporter, TickContext};
use crate::alerts::TextStyle;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Json,
    /// Text framed with a timestamped title line and a closing rule.
    Log,
    Text,
}

/// Writes the alert report to a file whose extension picks the format.
pub struct ReportFileExporter {
    path: PathBuf,
    format: ReportFormat,
}

impl ReportFileExporter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ReportFormat::Json,
            Some("log") => ReportFormat::Log,
            _ => ReportFormat::Text,
        };
        Self { path, format }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File content for `ctx`. `None` when no rule is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Serialization`] if the JSON report cannot be built.
    pub fn render(&self, ctx: &TickContext<'_>) -> Result<Option<String>, ExportError> {
        if ctx.rules.is_empty() {
            return Ok(None);
        }
        let content = match self.format {
            ReportFormat::Json => {
                let mut json = ctx.reports.render_json(ctx.rules, ctx.fail_percentile)?;
                json.push('\n');
                json
            }
            ReportFormat::Text => ctx.reports.render_text(ctx.rules, ctx.fail_percentile, TextStyle::File),
            ReportFormat::Log => {
                let report = ctx.reports.render_text(ctx.rules, ctx.fail_percentile, TextStyle::File);
                let width = report.lines().map(str::len).max().unwrap_or(0);
                let title = format!("Alert rules report ({})", ctx.now.to_rfc3339());
                let fill = "-".repeat(width.saturating_sub(title.len() + 4).max(4));
                format!("-- {title} {fill}\n{report}{}\n", "-".repeat(width))
            }
        };
        Ok(Some(content))
    }
}

#[async_trait]
impl Exporter for ReportFileExporter {
    fn name(&self) -> &'static str {
        "report_file"
    }

    async fn export(&mut self, ctx: &TickContext<'_>) -> Result<(), ExportError> {
        let Some(content) = self.render(ctx)? else {
            return Ok(());
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        fs::write(&self.path, content).await?;
        Ok(())
    }
}
