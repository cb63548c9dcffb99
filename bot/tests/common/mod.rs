#![allow(dead_code)]

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate};
use etc_archive_bot::services::elasticsearch_service::{ArchiveIndices, SearchBackend};
use etc_archive_bot::services::search_service::ArchiveDatabase;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const MAIN: &str = "main";
pub const REUPLOAD: &str = "reupload";
pub const LOCAL: &str = "local";

/// Evaluates the handful of query shapes the bot sends against in-memory documents.
#[derive(Default)]
pub struct MemoryBackend {
    indices: HashMap<String, Vec<Value>>,
    /// Answer main index searches with a body that has no hits.
    malformed_main: bool,
    failing_multi_search: bool,
    pub multi_search_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_docs(mut self, index: &str, docs: Vec<Value>) -> Self {
        self.indices.entry(index.to_string()).or_default().extend(docs);
        self
    }

    pub fn malformed(mut self) -> Self {
        self.malformed_main = true;
        self
    }

    pub fn failing_lookups(mut self) -> Self {
        self.failing_multi_search = true;
        self
    }

    pub fn into_database(self) -> ArchiveDatabase<MemoryBackend> {
        ArchiveDatabase::new(
            self,
            ArchiveIndices {
                main: MAIN.to_string(),
                reupload: REUPLOAD.to_string(),
                local: LOCAL.to_string(),
            },
        )
    }

    fn docs(&self, index: &str) -> Result<&Vec<Value>> {
        self.indices
            .get(index)
            .ok_or_else(|| anyhow!("no such index {index}"))
    }

    fn run(&self, index: &str, body: &Value) -> Result<Value> {
        let mut matched: Vec<&Value> = self
            .docs(index)?
            .iter()
            .filter(|doc| matches(&body["query"], doc))
            .collect();

        if let Some(sort) = body["sort"].as_array().and_then(|s| s.first()).and_then(|s| s.as_object()) {
            if let Some((field, spec)) = sort.iter().next() {
                matched.sort_by(|a, b| text(&a[field]).cmp(&text(&b[field])));
                if spec["order"] == "desc" {
                    matched.reverse();
                }
            }
        }

        let total = matched.len();
        let size = body["size"].as_u64().map(|s| s as usize).unwrap_or(10);
        let hits: Vec<Value> = matched
            .into_iter()
            .take(size)
            .map(|doc| {
                json!({ "_index": index, "_id": doc["id"], "_source": project(doc, &body["_source"]) })
            })
            .collect();
        Ok(json!({ "hits": { "total": { "value": total, "relation": "eq" }, "hits": hits } }))
    }
}

/// Keeps only the listed fields when `_source` is an array, as the engine does.
fn project(doc: &Value, source: &Value) -> Value {
    match (source.as_array(), doc.as_object()) {
        (Some(fields), Some(doc)) => Value::Object(
            doc.iter()
                .filter(|(key, _)| fields.iter().any(|f| f.as_str() == Some(key.as_str())))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        _ => doc.clone(),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        Value::Null => String::new(),
        other => other.to_string().to_lowercase(),
    }
}

fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(text).collect(),
        Value::Null => Vec::new(),
        other => vec![text(other)],
    }
}

fn contains(value: &Value, needle: &Value) -> bool {
    let needle = text(needle);
    strings(value).iter().any(|s| s.contains(&needle))
}

fn epoch(value: &Value, format: &str) -> Option<i64> {
    let s = match value {
        Value::Number(n) => return n.as_i64(),
        Value::String(s) => s.as_str(),
        _ => return None,
    };
    if format == "epoch_second" {
        if let Ok(secs) = s.parse::<i64>() {
            return Some(secs);
        }
    }
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.timestamp())
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc().timestamp())
        })
}

fn matches(query: &Value, doc: &Value) -> bool {
    let Some((kind, spec)) = query.as_object().and_then(|q| q.iter().next()) else {
        return true;
    };
    match kind.as_str() {
        "match_all" => true,
        "match_none" => false,
        "match_phrase" => spec
            .as_object()
            .map(|fields| fields.iter().all(|(field, value)| contains(&doc[field], value)))
            .unwrap_or(false),
        "match" => spec
            .as_object()
            .map(|fields| {
                fields.iter().all(|(field, value)| {
                    text(value)
                        .split_whitespace()
                        .any(|word| contains(&doc[field], &json!(word)))
                })
            })
            .unwrap_or(false),
        "multi_match" => doc
            .as_object()
            .map(|fields| fields.values().any(|v| contains(v, &spec["query"])))
            .unwrap_or(false),
        "range" => spec
            .as_object()
            .map(|fields| {
                fields.iter().all(|(field, bounds)| {
                    let format = bounds["format"].as_str().unwrap_or("");
                    let Some(value) = epoch(&doc[field], "") else {
                        return false;
                    };
                    let gte = epoch(&bounds["gte"], format).map_or(true, |b| value >= b);
                    let lte = epoch(&bounds["lte"], format).map_or(true, |b| value <= b);
                    gte && lte
                })
            })
            .unwrap_or(false),
        "bool" => {
            let all = |key: &str| {
                spec[key]
                    .as_array()
                    .map_or(true, |clauses| clauses.iter().all(|c| matches(c, doc)))
            };
            let should = match spec["should"].as_array() {
                Some(clauses) if !clauses.is_empty() => {
                    let minimum = spec["minimum_should_match"].as_u64().unwrap_or(1) as usize;
                    clauses.iter().filter(|c| matches(c, doc)).count() >= minimum
                }
                _ => true,
            };
            all("must") && all("filter") && should
        }
        _ => false,
    }
}

#[rocket::async_trait]
impl SearchBackend for MemoryBackend {
    async fn search(&self, index: &str, body: Value) -> Result<Value> {
        if self.malformed_main && index == MAIN {
            return Ok(json!({ "took": 1, "timed_out": false }));
        }
        self.run(index, &body)
    }

    async fn count(&self, index: &str, body: Option<Value>) -> Result<u64> {
        let query = body.map(|b| b["query"].clone()).unwrap_or(Value::Null);
        Ok(self
            .docs(index)?
            .iter()
            .filter(|doc| query.is_null() || matches(&query, doc))
            .count() as u64)
    }

    async fn multi_search(&self, requests: Vec<(String, Value)>) -> Result<Vec<Value>> {
        self.multi_search_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_multi_search {
            return Err(anyhow!("connection refused"));
        }
        Ok(requests
            .iter()
            .map(|(index, body)| {
                self.run(index, body).unwrap_or_else(|e| {
                    json!({ "error": { "type": "index_not_found_exception", "reason": e.to_string() }, "status": 404 })
                })
            })
            .collect())
    }
}
