//! Terminal tables of the current tick.

use super::{ExportError, Exporter, TickContext};
use crate::{
    alerts::TextStyle,
    stats::{MetricGroup, StatField},
};
use async_trait::async_trait;
use prettytable::{format, row, Cell, Row, Table};
use std::{collections::BTreeMap, io::Write};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Prints one table per metric group, then the alert report.
pub struct ConsoleExporter {
    clear: bool,
}

impl ConsoleExporter {
    /// `clear` wipes the terminal before each render.
    #[must_use]
    pub fn new(clear: bool) -> Self {
        Self { clear }
    }

    /// Renders the full console page for `ctx`.
    #[must_use]
    pub fn render(ctx: &TickContext<'_>) -> String {
        let mut out = format!(
            "-- Stats at {} (elapsed {:.0}s, pages {}) --\n",
            ctx.now.format("%Y/%m/%d %H:%M:%S"),
            ctx.elapsed_seconds(),
            ctx.run.pages,
        );

        let mut groups: BTreeMap<MetricGroup, Vec<&str>> = BTreeMap::new();
        for (name, series) in ctx.stats.iter() {
            if !series.all().is_empty() {
                groups.entry(MetricGroup::of(name)).or_default().push(name);
            }
        }

        for (group, names) in groups {
            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_CLEAN);
            let mut titles = vec![Cell::new(&group.to_string()).style_spec("b")];
            titles.extend(StatField::ALL.iter().map(|f| Cell::new(f.as_str()).style_spec("b")));
            table.set_titles(Row::new(titles));

            for name in names {
                let acc = ctx.stats.all(name).cloned().unwrap_or_default();
                let mut cells = vec![Cell::new(name)];
                cells.extend(StatField::ALL.iter().map(|f| Cell::new(&format_value(acc.field(*f)))));
                table.add_row(Row::new(cells));
            }
            out.push('\n');
            out.push_str(&table.to_string());
        }

        if !ctx.rules.is_empty() {
            let mut title = Table::new();
            title.set_format(*format::consts::FORMAT_CLEAN);
            title.add_row(row![b -> "Alert rules report"]);
            out.push('\n');
            out.push_str(&title.to_string());
            out.push_str(&ctx.reports.render_text(ctx.rules, ctx.fail_percentile, TextStyle::Console));
        }
        out
    }
}

/// Integral values print without decimals, others with three.
fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v:.3}")
    }
}

#[async_trait]
impl Exporter for ConsoleExporter {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn export(&mut self, ctx: &TickContext<'_>) -> Result<(), ExportError> {
        let page = Self::render(ctx);
        let mut stdout = std::io::stdout().lock();
        if self.clear {
            stdout.write_all(CLEAR_SCREEN.as_bytes())?;
        }
        stdout.write_all(page.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}
