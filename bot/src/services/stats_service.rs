use crate::models::{ChannelOverlap, PhraseStats, StatsReport};
use crate::services::elasticsearch_service::{hit_id, response_hits, response_total, SearchBackend};
use crate::services::search_service::ArchiveDatabase;
use anyhow::{Context, Result};
use log::{debug, info};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Title phrases the `stats series` command reports on.
pub const DEFAULT_TITLE_PHRASES: [&str; 12] = [
    "Weekly Weird News",
    "News Dump",
    "Tech Newsday",
    "Tech Tuesday",
    "TechNewsday",
    "ETC Podcast",
    "T.U.G.S",
    "TUGS",
    "Creepy Text Theatre",
    "Ask Us Anything!",
    "ETC Live",
    "Spacebar",
];

/// Largest id set fetched from the main index in one search.
const ID_COLLECTION_SIZE: usize = 10_000;

/// Requests per multi search call.
pub const MULTI_SEARCH_CHUNK: usize = 500;

const COLLECTION_FIELD: &str = "collection";
const CLASSIC_COLLECTION: &str = "Classic ETC";
const MODERN_COLLECTION: &str = "Modern ETC";

/// Phrases reported together under one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseGroup {
    pub name: String,
    pub members: Vec<String>,
}

impl PhraseGroup {
    pub fn new(name: &str, members: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Which main index videos count as uploads of the primary channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapScope {
    pub uploader_ids: Vec<String>,
    pub uploader_names: Vec<String>,
    /// Inclusive bounds in `strict_date_optional_time` format.
    pub published_from: String,
    pub published_to: String,
}

impl Default for OverlapScope {
    fn default() -> Self {
        Self {
            uploader_ids: vec![
                "MachinimaETC".to_string(),
                "UCdIaNUarhzLSXGoItz7BHVA".to_string(),
            ],
            uploader_names: vec!["etc show".to_string()],
            published_from: "2014-06-01T00:00:00.000Z".to_string(),
            published_to: "2019-01-24T23:21:13.800Z".to_string(),
        }
    }
}

impl OverlapScope {
    pub fn query(&self) -> Value {
        let channel_clauses: Vec<Value> = self
            .uploader_ids
            .iter()
            .map(|id| json!({ "match_phrase": { "uploader_ids": id } }))
            .chain(
                self.uploader_names
                    .iter()
                    .map(|name| json!({ "match_phrase": { "uploader": name } })),
            )
            .collect();

        json!({
            "bool": {
                "filter": [
                    {
                        "bool": {
                            "should": channel_clauses,
                            "minimum_should_match": 1
                        }
                    },
                    {
                        "range": {
                            "date_published": {
                                "format": "strict_date_optional_time",
                                "gte": self.published_from,
                                "lte": self.published_to
                            }
                        }
                    }
                ]
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsConfig {
    pub phrase_groups: Vec<PhraseGroup>,
    pub overlap: OverlapScope,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            phrase_groups: vec![
                PhraseGroup::new(
                    "Tech Tuesday/Newsday",
                    &["Tech Newsday", "Tech Tuesday", "TechNewsday"],
                ),
                PhraseGroup::new("T.U.G.S.", &["T.U.G.S", "TUGS"]),
            ],
            overlap: OverlapScope::default(),
        }
    }
}

/// Replaces the members of each group with one summed entry.
///
/// Groups whose members produced nothing are left out entirely.
pub fn merge_phrase_groups(phrases: &mut BTreeMap<String, PhraseStats>, groups: &[PhraseGroup]) {
    for group in groups {
        let mut merged: Option<PhraseStats> = None;
        for member in &group.members {
            if let Some(stats) = phrases.remove(member) {
                *merged.get_or_insert_with(PhraseStats::default) += stats;
            }
        }
        if let Some(merged) = merged {
            phrases.insert(group.name.clone(), merged);
        }
    }
}

/// Number of distinct ids among responses that matched exactly one document.
fn count_single_matches(responses: &[Value]) -> Result<u64> {
    let mut matched = HashSet::new();
    for response in responses {
        if response_total(response)? == 1 {
            let hit = response_hits(response)?
                .first()
                .context("lookup reported one match but returned no hits")?;
            matched.insert(hit_id(hit)?);
        }
    }
    Ok(matched.len() as u64)
}

impl<B: SearchBackend> ArchiveDatabase<B> {
    /// Aggregate counts across the three indices.
    ///
    /// Unlike [`ArchiveDatabase::search`], any malformed response is an error.
    pub async fn get_stats(&self, phrases: &BTreeSet<String>) -> Result<StatsReport> {
        let indices = self.indices();

        let total = self.backend().count(&indices.main, None).await?;
        let total_reuploaded = self.backend().count(&indices.reupload, None).await?;
        let total_classic = self
            .count_by_phrase(&indices.local, COLLECTION_FIELD, CLASSIC_COLLECTION)
            .await?;
        let total_modern = self
            .count_by_phrase(&indices.local, COLLECTION_FIELD, MODERN_COLLECTION)
            .await?;

        let mut phrase = BTreeMap::new();
        for title_phrase in phrases {
            phrase.insert(title_phrase.clone(), self.stats_for_phrase(title_phrase).await?);
        }
        merge_phrase_groups(&mut phrase, &self.stats_config().phrase_groups);

        let main_channel_archived = self.main_channel_overlap().await?;

        Ok(StatsReport {
            total,
            total_reuploaded,
            total_archived: total_classic + total_modern,
            total_classic,
            total_modern,
            main_channel_archived,
            phrase,
        })
    }

    /// Estimates how many videos with `phrase` in the title were re-uploaded and archived.
    pub async fn stats_for_phrase(&self, phrase: &str) -> Result<PhraseStats> {
        info!("Getting stats for phrase {phrase}");
        let indices = self.indices();

        let (total, ids) = self
            .collect_ids(json!({ "match_phrase": { "title": phrase } }))
            .await
            .with_context(|| format!("collecting ids for phrase {phrase}"))?;

        let reupload_responses = self
            .batched_lookup(&indices.reupload, "original_id", &ids)
            .await?;
        let mut total_reuploaded = 0;
        for response in &reupload_responses {
            total_reuploaded += response_total(response)?;
        }

        let unique_ids: Vec<String> = ids
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let local_responses = self
            .batched_lookup(&indices.local, "id", &unique_ids)
            .await?;
        let total_archived = count_single_matches(&local_responses)?;

        Ok(PhraseStats {
            total,
            total_reuploaded,
            total_archived,
        })
    }

    /// How many main channel uploads in the configured window are archived locally.
    pub async fn main_channel_overlap(&self) -> Result<ChannelOverlap> {
        let scope = &self.stats_config().overlap;
        let (_, ids) = self
            .collect_ids(scope.query())
            .await
            .context("collecting main channel ids")?;

        let responses = self
            .batched_lookup(&self.indices().local, "id", &ids)
            .await?;
        let archived = count_single_matches(&responses)?;

        Ok(ChannelOverlap {
            archived,
            candidates: ids.len() as u64,
        })
    }

    async fn count_by_phrase(&self, index: &str, field: &str, phrase: &str) -> Result<u64> {
        self.backend()
            .count(index, Some(json!({ "query": { "match_phrase": { field: phrase } } })))
            .await
            .with_context(|| format!("counting {field}={phrase} in {index}"))
    }

    /// Total hit count and the ids of the main index documents matching `query`.
    async fn collect_ids(&self, query: Value) -> Result<(u64, Vec<String>)> {
        let body = json!({
            "size": ID_COLLECTION_SIZE,
            "_source": ["id"],
            "query": query
        });
        let response = self.backend().search(&self.indices().main, body).await?;

        let total = response_total(&response)?;
        let ids = response_hits(&response)?
            .iter()
            .map(hit_id)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((total, ids))
    }

    /// One phrase lookup per id, chunked into multi searches.
    async fn batched_lookup(&self, index: &str, field: &str, ids: &[String]) -> Result<Vec<Value>> {
        let mut responses = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MULTI_SEARCH_CHUNK) {
            let requests = chunk
                .iter()
                .map(|id| {
                    (
                        index.to_string(),
                        json!({ "_source": true, "query": { "match_phrase": { field: id } } }),
                    )
                })
                .collect::<Vec<_>>();
            debug!("Looking up {} ids in {index}", requests.len());
            let batch = self
                .backend()
                .multi_search(requests)
                .await
                .with_context(|| format!("looking up ids in {index}"))?;
            responses.extend(batch);
        }
        Ok(responses)
    }
}
