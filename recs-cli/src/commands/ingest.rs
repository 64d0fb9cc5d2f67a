//! `recs ingest <source> [limit]`
//!
//! Consumes a JSON export of catalog items (an array of content rows,
//! from a file or stdin) and upserts it. Rows without an embedding get
//! one derived from title + overview. Fetching from the upstream
//! catalog API is the ingestion service's job, not this command's.

use std::io::Read;

use serde::Serialize;

use recs_core::types::Content;
use recs_core::RecsEngine;

use crate::output::{emit, OutputFormat};

#[derive(Serialize)]
struct IngestReport {
    read: usize,
    upserted: usize,
    embedded: usize,
    embedding_failures: usize,
}

pub async fn run(
    engine: &RecsEngine,
    source: &str,
    limit: Option<usize>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let text = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(source)?
    };

    let mut items: Vec<Content> = serde_json::from_str(&text)
        .map_err(|e| recs_core::Error::InvalidInput(format!("malformed content export: {e}")))?;
    let read = items.len();
    if let Some(limit) = limit {
        items.truncate(limit);
    }

    // Derive embeddings for rows that arrived without one.
    let pending: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, c)| c.embedding.is_none())
        .map(|(i, _)| i)
        .collect();
    let texts: Vec<String> = pending
        .iter()
        .map(|i| format!("{} {}", items[*i].title, items[*i].overview))
        .collect();
    let embeddings = engine.embeddings().embed_batch(&texts, 8).await;

    let mut embedded = 0;
    let mut embedding_failures = 0;
    for (index, result) in pending.into_iter().zip(embeddings) {
        match result {
            Ok(vector) => {
                items[index].embedding = Some(vector);
                embedded += 1;
            }
            Err(e) => {
                tracing::warn!(content_id = %items[index].id, error = %e, "embedding failed");
                embedding_failures += 1;
            }
        }
    }

    let upserted = engine.storage().upsert_content(&items).await?;
    let report = IngestReport {
        read,
        upserted,
        embedded,
        embedding_failures,
    };
    emit(format, &report, |r| {
        format!(
            "ingested {} of {} rows ({} embedded, {} embedding failures)",
            r.upserted, r.read, r.embedded, r.embedding_failures
        )
    })
}
