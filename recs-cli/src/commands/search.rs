//! `recs search <query> [limit]`

use recs_core::RecsEngine;

use crate::output::{content_line, emit, OutputFormat};

pub async fn run(
    engine: &RecsEngine,
    query: &str,
    limit: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if query.trim().is_empty() {
        return Err(recs_core::Error::InvalidInput("empty search query".into()).into());
    }
    let results = engine.storage().search_content_text(query, limit).await?;
    emit(format, &results, |rows| {
        if rows.is_empty() {
            return format!("no results for '{query}'");
        }
        rows.iter()
            .enumerate()
            .map(|(i, c)| {
                content_line(
                    i + 1,
                    &c.title,
                    &c.id,
                    &format!("{} | {}", c.kind, c.genres.join(", ")),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}
