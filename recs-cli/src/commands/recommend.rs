//! `recs recommend <userId> [limit]`

use uuid::Uuid;

use recs_core::recommend::safety;
use recs_core::types::RecommendationRequest;
use recs_core::RecsEngine;

use crate::output::{content_line, emit, OutputFormat};

pub async fn run(
    engine: &RecsEngine,
    user_id: &str,
    limit: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let preference = match Uuid::parse_str(user_id) {
        Ok(uuid) => engine.storage().get_user_preference(uuid).await?,
        // Unknown or non-UUID users take the cold-start path.
        Err(_) => None,
    };

    let request = RecommendationRequest::new(user_id, limit);
    let pool = engine.storage().list_content(5_000).await?;
    // No audience context on the CLI; apply the adult default, which
    // filters nothing but keeps the call sites uniform.
    let pool = safety::filter_pool(pool, recs_core::Audience::Adults, &safety::default_blocklist());

    let response = engine
        .recommendations()
        .get_recommendations(&request, preference, pool)
        .await?;

    emit(format, &response, |r| {
        if r.items.is_empty() {
            let why = r
                .note
                .as_ref()
                .map_or_else(|| "no recommendations".to_string(), |n| n.description.clone());
            return why;
        }
        let mut lines: Vec<String> = r
            .items
            .iter()
            .map(|item| {
                content_line(
                    item.position,
                    &item.title,
                    &item.content_id,
                    &item.reason.description,
                )
            })
            .collect();
        if let Some(handle) = &r.feedback {
            lines.push(format!(
                "feedback handle: request {} pattern {:?}",
                handle.request_id, handle.pattern_id
            ));
        }
        lines.join("\n")
    })
}
