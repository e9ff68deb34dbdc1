//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mcptest_common::{RunReport, ScenarioOutcome};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// One line of the run summary
#[derive(Debug, Serialize)]
pub struct ScenarioRow {
    pub index: usize,
    pub title: String,
    pub status: bool,
    pub duration: f64,
    pub failed_steps: Vec<u32>,
    pub screenshots: usize,
}

impl From<&ScenarioOutcome> for ScenarioRow {
    fn from(outcome: &ScenarioOutcome) -> Self {
        Self {
            index: outcome.index,
            title: outcome.result.title.clone(),
            status: outcome.result.status,
            duration: outcome.result.duration,
            failed_steps: outcome
                .result
                .fail
                .iter()
                .flatten()
                .map(|f| f.num)
                .collect(),
            screenshots: outcome.screenshots.len(),
        }
    }
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["#", "Scenario", "Status", "Duration", "Failed steps", "Screenshots"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.index.to_string(),
            self.title.clone(),
            if self.status {
                "✓ Success".green().to_string()
            } else {
                "✗ Failed".red().to_string()
            },
            format!("{:.2}s", self.duration),
            self.failed_steps
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            self.screenshots.to_string(),
        ]
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print the per-scenario table and the totals line
pub fn print_run_summary(report: &RunReport, format: OutputFormat) {
    let rows: Vec<ScenarioRow> = report.outcomes.iter().map(ScenarioRow::from).collect();
    print_list(&rows, format);

    let totals = format!(
        "{} scenario(s): {} passed, {} failed in {:.2}s",
        report.total(),
        report.passed(),
        report.failed(),
        report.duration.as_secs_f64()
    );
    if report.all_passed() {
        print_success(&totals);
    } else {
        print_error(&totals);
    }
    print_info(&format!(
        "Report: {}",
        report.output_dir.join("report.html").display()
    ));
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
