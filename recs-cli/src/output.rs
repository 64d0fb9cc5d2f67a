//! Output formatting shared by every subcommand.

use clap::ValueEnum;
use serde::Serialize;

/// Output format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Readable tables and lines.
    Human,
    /// One JSON document on stdout.
    Json,
}

/// Print a payload: JSON as-is, human via the provided renderer.
pub fn emit<T: Serialize>(
    format: OutputFormat,
    payload: &T,
    human: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(payload)?),
        OutputFormat::Human => println!("{}", human(payload)),
    }
    Ok(())
}

/// Render one content line for lists.
pub fn content_line(
    position: usize,
    title: &str,
    id: &str,
    detail: &str,
) -> String {
    format!("{position:>3}. {title}  [{id}]  {detail}")
}
