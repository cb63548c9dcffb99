use crate::models::Video;
use crate::services::elasticsearch_service::{
    hit_id, hit_source, response_hits, ArchiveIndices, SearchBackend,
};
use crate::services::query_builder::{
    build_search, date_range_clause, local_lookup, reupload_lookup, SearchParams, SearchRequest,
};
use crate::services::stats_service::StatsConfig;
use crate::utils::watch_url;
use anyhow::Result;
use log::{error, info, warn};
use serde_json::{Map, Value};

/// Result of a user facing search.
///
/// Callers that only render results use [`SearchOutcome::into_videos`], where a
/// failure and an empty result both become an empty list.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(Vec<Video>),
    NoResults,
    Failed(String),
}

impl SearchOutcome {
    pub fn into_videos(self) -> Vec<Video> {
        match self {
            SearchOutcome::Found(videos) => videos,
            SearchOutcome::NoResults => Vec::new(),
            SearchOutcome::Failed(reason) => {
                error!("Search failed, returning no results: {reason}");
                Vec::new()
            }
        }
    }
}

/// Facts about one video found in the secondary indices.
#[derive(Debug, Clone, Default, PartialEq)]
struct Enrichment {
    reupload_id: Option<String>,
    local_quality: Option<(Value, Value)>,
}

pub struct ArchiveDatabase<B: SearchBackend> {
    backend: B,
    indices: ArchiveIndices,
    stats_config: StatsConfig,
}

impl<B: SearchBackend> ArchiveDatabase<B> {
    pub fn new(backend: B, indices: ArchiveIndices) -> Self {
        Self::with_stats_config(backend, indices, StatsConfig::default())
    }

    pub fn with_stats_config(backend: B, indices: ArchiveIndices, stats_config: StatsConfig) -> Self {
        Self {
            backend,
            indices,
            stats_config,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn indices(&self) -> &ArchiveIndices {
        &self.indices
    }

    pub fn stats_config(&self) -> &StatsConfig {
        &self.stats_config
    }

    /// Searches the main index and enriches every hit from the other two.
    ///
    /// Hit order is kept. A malformed main response or a hit without an id fails
    /// the whole search; a failed secondary lookup only skips that enrichment.
    pub async fn search(&self, request: &SearchRequest) -> SearchOutcome {
        match self.search_and_enrich(request).await {
            Ok(videos) if videos.is_empty() => {
                info!("Search returned no videos");
                SearchOutcome::NoResults
            }
            Ok(videos) => {
                info!("Search returned {} videos", videos.len());
                SearchOutcome::Found(videos)
            }
            Err(e) => {
                error!("Error while searching database: {e:#}");
                SearchOutcome::Failed(format!("{e:#}"))
            }
        }
    }

    /// Builds and runs a search restricted to a date window.
    pub async fn search_by_date(
        &self,
        center_epoch_seconds: i64,
        window_days: i64,
        params: SearchParams<'_>,
    ) -> SearchOutcome {
        let mut params = params;
        params
            .extra_clauses
            .push(date_range_clause(center_epoch_seconds, window_days));
        self.search(&build_search(params)).await
    }

    async fn search_and_enrich(&self, request: &SearchRequest) -> Result<Vec<Video>> {
        let response = self
            .backend
            .search(&self.indices.main, request.to_body())
            .await?;

        let hits = response_hits(&response)?;
        let mut sources: Vec<Map<String, Value>> = Vec::with_capacity(hits.len());
        let mut ids = Vec::with_capacity(hits.len());
        for hit in hits {
            let id = hit_id(hit)?;
            let mut source = hit_source(hit)?.clone();
            source
                .entry("id")
                .or_insert_with(|| Value::String(id.clone()));
            ids.push(id);
            sources.push(source);
        }

        let enrichments = self.lookup_enrichments(&ids).await;

        let mut videos = Vec::with_capacity(sources.len());
        for (mut source, enrichment) in sources.into_iter().zip(enrichments) {
            apply_enrichment(&mut source, enrichment);
            videos.push(Video::from_source(&source)?);
        }
        Ok(videos)
    }

    /// Looks every id up in the re-upload and local indices with one batched call.
    async fn lookup_enrichments(&self, ids: &[String]) -> Vec<Enrichment> {
        if ids.is_empty() {
            return Vec::new();
        }

        let mut requests = Vec::with_capacity(ids.len() * 2);
        for id in ids {
            requests.push((self.indices.reupload.clone(), reupload_lookup(id)));
            requests.push((self.indices.local.clone(), local_lookup(id)));
        }

        let expected = requests.len();
        let responses = match self.backend.multi_search(requests).await {
            Ok(responses) if responses.len() == expected => responses,
            Ok(responses) => {
                warn!(
                    "Lookups returned {} responses for {expected} requests, results are not enriched",
                    responses.len()
                );
                return vec![Enrichment::default(); ids.len()];
            }
            Err(e) => {
                warn!("Lookups in secondary indices failed, results are not enriched: {e:#}");
                return vec![Enrichment::default(); ids.len()];
            }
        };

        ids.iter()
            .zip(responses.chunks(2))
            .map(|(id, pair)| Enrichment {
                reupload_id: pair
                    .first()
                    .and_then(|r| first_source(r, id, &self.indices.reupload))
                    .and_then(|source| source.get("id").and_then(scalar_string)),
                local_quality: pair
                    .get(1)
                    .and_then(|r| first_source(r, id, &self.indices.local))
                    .map(|source| {
                        (
                            source.get("width").cloned().unwrap_or(Value::Null),
                            source.get("height").cloned().unwrap_or(Value::Null),
                        )
                    }),
            })
            .collect()
    }
}

/// The first document of a lookup response; errors count as a miss.
fn first_source<'a>(response: &'a Value, id: &str, index: &str) -> Option<&'a Map<String, Value>> {
    if let Some(e) = response.get("error") {
        warn!("Lookup of {id} in {index} failed: {e}");
        return None;
    }
    response_hits(response)
        .ok()?
        .first()
        .and_then(|hit| hit_source(hit).ok())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn apply_enrichment(source: &mut Map<String, Value>, enrichment: Enrichment) {
    if let Some(reupload_id) = enrichment.reupload_id {
        source.insert("on_youtube".to_string(), Value::Bool(true));
        source.insert(
            "reupload_url".to_string(),
            Value::String(watch_url(&reupload_id)),
        );
    }
    if let Some((width, height)) = enrichment.local_quality {
        source.insert("archived".to_string(), Value::Bool(true));
        source.insert("local_quality_width".to_string(), width);
        source.insert("local_quality_height".to_string(), height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enrichment_injects_fusion_fields() {
        let mut source = json!({"id": "abc123"}).as_object().cloned().unwrap();
        apply_enrichment(
            &mut source,
            Enrichment {
                reupload_id: Some("xyz".to_string()),
                local_quality: Some((json!(1920), json!(1080))),
            },
        );
        let video = Video::from_source(&source).unwrap();
        assert_eq!(video.on_youtube, Some(true));
        assert_eq!(
            video.reupload_url.as_deref(),
            Some("https://www.youtube.com/watch?v=xyz")
        );
        assert_eq!(video.archived, Some(true));
        assert_eq!(video.quality(), Some((1920, 1080)));
    }

    #[test]
    fn lookup_errors_count_as_misses() {
        let response = json!({"error": {"type": "index_not_found_exception"}, "status": 404});
        assert_eq!(first_source(&response, "a", "local"), None);

        let empty = json!({"hits": {"total": {"value": 0}, "hits": []}});
        assert_eq!(first_source(&empty, "a", "local"), None);
    }

    #[test]
    fn failed_outcome_renders_as_empty_list() {
        assert!(SearchOutcome::Failed("boom".to_string())
            .into_videos()
            .is_empty());
        assert!(SearchOutcome::NoResults.into_videos().is_empty());
    }
}
