use anyhow::{Context, Result};
use elasticsearch::http::request::JsonBody;
use elasticsearch::{CountParts, Elasticsearch, MsearchParts, SearchParts};
use log::{debug, error, info};
use serde_json::{json, Map, Value};

/// Names of the three indices that make up the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveIndices {
    /// Primary metadata for every known video.
    pub main: String,
    /// Re-uploads to YouTube, keyed back to the original by `original_id`.
    pub reupload: String,
    /// Locally archived copies, keyed by the original `id`.
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    #[error("search response is missing `{0}`")]
    MissingField(String),
}

/// The subset of the search engine the bot talks to.
#[rocket::async_trait]
pub trait SearchBackend: Send + Sync {
    /// Runs `body` against `index` and returns the raw response.
    async fn search(&self, index: &str, body: Value) -> Result<Value>;

    /// Counts documents in `index`, optionally restricted by a `{"query": ...}` body.
    async fn count(&self, index: &str, body: Option<Value>) -> Result<u64>;

    /// One response per request, in request order.
    async fn multi_search(&self, requests: Vec<(String, Value)>) -> Result<Vec<Value>>;
}

pub struct ElasticBackend {
    client: Elasticsearch,
}

impl ElasticBackend {
    pub fn new(client: Elasticsearch) -> Self {
        Self { client }
    }

    /// Logs the cluster info, used as a startup connectivity check.
    pub async fn log_info(&self) {
        match self.client.info().send().await {
            Ok(response) => match response.json::<Value>().await {
                Ok(info) => info!(
                    "Connected to Elasticsearch cluster '{}' (version {})",
                    info["cluster_name"].as_str().unwrap_or("unknown"),
                    info["version"]["number"].as_str().unwrap_or("unknown")
                ),
                Err(e) => error!("Failed to parse Elasticsearch info response: {e:?}"),
            },
            Err(e) => error!("Failed to connect to Elasticsearch: {e:?}"),
        }
    }
}

async fn into_json(response: elasticsearch::http::response::Response, what: &str) -> Result<Value> {
    let status = response.status_code();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!(
            "Elasticsearch {what} failed with status {status}: {text}"
        ));
    }
    response
        .json::<Value>()
        .await
        .with_context(|| format!("Failed to parse Elasticsearch {what} response as JSON"))
}

#[rocket::async_trait]
impl SearchBackend for ElasticBackend {
    async fn search(&self, index: &str, body: Value) -> Result<Value> {
        debug!("search {index}: {body}");
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(body)
            .send()
            .await
            .context("Elasticsearch search request failed")?;
        into_json(response, "search").await
    }

    async fn count(&self, index: &str, body: Option<Value>) -> Result<u64> {
        let indices = [index];
        let request = self.client.count(CountParts::Index(&indices));
        let response = match body {
            Some(body) => request.body(body).send().await,
            None => request.send().await,
        }
        .context("Elasticsearch count request failed")?;

        let json_response = into_json(response, "count").await?;
        json_response["count"]
            .as_u64()
            .ok_or_else(|| ResponseError::MissingField("count".to_string()).into())
    }

    async fn multi_search(&self, requests: Vec<(String, Value)>) -> Result<Vec<Value>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let expected = requests.len();

        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(expected * 2);
        for (index, query) in requests {
            body.push(json!({ "index": index }).into());
            body.push(query.into());
        }

        let response = self
            .client
            .msearch(MsearchParts::None)
            .body(body)
            .send()
            .await
            .context("Elasticsearch multi search request failed")?;
        let json_response = into_json(response, "multi search").await?;

        let responses = json_response
            .get("responses")
            .and_then(|r| r.as_array())
            .cloned()
            .ok_or_else(|| ResponseError::MissingField("responses".to_string()))?;

        if responses.len() != expected {
            return Err(anyhow::anyhow!(
                "multi search returned {} responses for {expected} requests",
                responses.len()
            ));
        }
        Ok(responses)
    }
}

/// `hits.hits` of a search response.
pub fn response_hits(response: &Value) -> Result<&Vec<Value>, ResponseError> {
    response
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .ok_or_else(|| ResponseError::MissingField("hits.hits".to_string()))
}

/// `hits.total.value` of a search response.
pub fn response_total(response: &Value) -> Result<u64, ResponseError> {
    response
        .get("hits")
        .and_then(|h| h.get("total"))
        .and_then(|t| t.get("value"))
        .and_then(|v| v.as_u64())
        .ok_or_else(|| ResponseError::MissingField("hits.total.value".to_string()))
}

pub fn hit_source(hit: &Value) -> Result<&Map<String, Value>, ResponseError> {
    hit.get("_source")
        .and_then(|s| s.as_object())
        .ok_or_else(|| ResponseError::MissingField("_source".to_string()))
}

/// The `_source.id` of a hit, or its document `_id` when the source was projected away.
pub fn hit_id(hit: &Value) -> Result<String, ResponseError> {
    let source = hit_source(hit)?;
    match source.get("id").or_else(|| hit.get("_id")) {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(ResponseError::MissingField("_source.id".to_string())),
    }
}
