//! `recs similar <contentId> [limit]`

use recs_core::storage::{SearchFilter, VectorTable};
use recs_core::RecsEngine;

use crate::output::{content_line, emit, OutputFormat};

pub async fn run(
    engine: &RecsEngine,
    content_id: &str,
    limit: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let content = engine
        .storage()
        .get_content(content_id)
        .await?
        .ok_or_else(|| recs_core::Error::NotFound(format!("content {content_id}")))?;
    let Some(embedding) = &content.embedding else {
        return Err(recs_core::Error::NotFound(format!(
            "content {content_id} has no embedding yet"
        ))
        .into());
    };

    let filter = SearchFilter {
        exclude_ids: vec![content.id.clone()],
        ..SearchFilter::default()
    };
    let hits = engine
        .storage()
        .vector_search(VectorTable::Content, embedding, limit, &filter)
        .await?;

    let mut results = Vec::new();
    for (id, distance) in hits {
        if let Some(item) = engine.storage().get_content(&id).await? {
            results.push((item, 1.0 - distance));
        }
    }

    emit(format, &results, |rows| {
        if rows.is_empty() {
            return format!("nothing similar to '{}' yet", content.title);
        }
        rows.iter()
            .enumerate()
            .map(|(i, (item, similarity))| {
                content_line(
                    i + 1,
                    &item.title,
                    &item.id,
                    &format!("similarity {similarity:.3}"),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}
