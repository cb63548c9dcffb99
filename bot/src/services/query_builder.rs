use crate::utils::SECONDS_PER_DAY;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Hard cap on the number of videos a single search returns.
pub const MAX_RESULTS: usize = 20;

/// Whether the query must match as a phrase.
///
/// `Unset` behaves like `Yes`; only an explicit `No` switches to term matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhrase {
    Yes,
    No,
    #[default]
    Unset,
}

impl From<Option<bool>> for MatchPhrase {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => MatchPhrase::Yes,
            Some(false) => MatchPhrase::No,
            None => MatchPhrase::Unset,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// A bounded search against the main index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub size: usize,
    pub source: Option<Vec<String>>,
    pub must: Vec<Value>,
    pub sort: Option<(String, SortDirection)>,
}

impl SearchRequest {
    /// The Elasticsearch request body.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("size".to_string(), json!(self.size));
        if let Some(fields) = &self.source {
            body.insert("_source".to_string(), json!(fields));
        }
        body.insert(
            "query".to_string(),
            json!({ "bool": { "must": self.must } }),
        );
        if let Some((field, direction)) = &self.sort {
            body.insert(
                "sort".to_string(),
                json!([{ field.as_str(): { "order": direction.as_str() } }, "_score"]),
            );
        }
        Value::Object(body)
    }
}

/// Everything a user can ask of a search command.
#[derive(Debug, Clone, Default)]
pub struct SearchParams<'a> {
    pub query: Option<&'a str>,
    pub field: Option<&'a str>,
    pub match_phrase: MatchPhrase,
    pub sort_by_field: Option<&'a str>,
    pub sort_direction: SortDirection,
    pub extra_clauses: Vec<Value>,
}

/// Picks the primary clause from the query/field/phrase combination.
///
/// Also returns the source projection, which is only set when a field is
/// given without a query.
pub fn primary_clause(
    query: Option<&str>,
    field: Option<&str>,
    match_phrase: MatchPhrase,
) -> (Value, Option<Vec<String>>) {
    let phrase = match_phrase != MatchPhrase::No;

    match (query, field) {
        (None, None) => {
            info!("Getting everything");
            (json!({ "match_all": {} }), None)
        }
        (None, Some(field)) => {
            info!("Getting everything for field {field}");
            (json!({ "match_all": {} }), Some(vec![field.to_string()]))
        }
        (Some(query), Some(field)) if phrase => {
            info!("Searching field {field} for phrase");
            (json!({ "match_phrase": { field: query } }), None)
        }
        (Some(query), None) if phrase => {
            info!("Searching all fields for phrase");
            (
                json!({ "multi_match": { "type": "phrase", "query": query } }),
                None,
            )
        }
        (Some(query), Some(field)) if match_phrase == MatchPhrase::No => {
            info!("Searching field {field} without phrase matching");
            (json!({ "match": { field: query } }), None)
        }
        (Some(query), None) if match_phrase == MatchPhrase::No => {
            info!("Searching all fields without phrase matching");
            (
                json!({ "multi_match": { "type": "best_fields", "query": query } }),
                None,
            )
        }
        _ => {
            error!("Invalid combination for searching");
            (json!({ "match_none": {} }), None)
        }
    }
}

/// Builds the search request for a user query.
///
/// Extra clauses are always ANDed with the primary clause.
pub fn build_search(params: SearchParams<'_>) -> SearchRequest {
    let (primary, source) = primary_clause(params.query, params.field, params.match_phrase);

    let mut must = Vec::with_capacity(params.extra_clauses.len() + 1);
    if !params.extra_clauses.is_empty() {
        info!("Added {} extra clauses", params.extra_clauses.len());
    }
    must.extend(params.extra_clauses);
    must.push(primary);

    SearchRequest {
        size: MAX_RESULTS,
        source,
        must,
        sort: params
            .sort_by_field
            .map(|field| (field.to_string(), params.sort_direction)),
    }
}

/// Inclusive `date_published` range of `window_days` around `center`.
///
/// Odd windows put the extra day after the center.
pub fn date_range_clause(center_epoch_seconds: i64, window_days: i64) -> Value {
    let days_before = window_days.div_euclid(2);
    let days_after = window_days - days_before;
    let gte = center_epoch_seconds - days_before * SECONDS_PER_DAY;
    let lte = center_epoch_seconds + days_after * SECONDS_PER_DAY;

    json!({
        "range": {
            "date_published": {
                "format": "epoch_second",
                "gte": gte.to_string(),
                "lte": lte.to_string(),
            }
        }
    })
}

/// Point lookup of a re-upload by the id of the video it mirrors.
pub fn reupload_lookup(video_id: &str) -> Value {
    json!({ "size": 1, "query": { "match_phrase": { "original_id": video_id } } })
}

/// Point lookup of a locally archived copy.
pub fn local_lookup(video_id: &str) -> Value {
    json!({ "size": 1, "query": { "match_phrase": { "id": video_id } } })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary(request: &SearchRequest) -> &Value {
        request.must.last().unwrap()
    }

    fn build(query: Option<&str>, field: Option<&str>, match_phrase: MatchPhrase) -> SearchRequest {
        build_search(SearchParams {
            query,
            field,
            match_phrase,
            ..Default::default()
        })
    }

    #[test]
    fn nothing_given_matches_everything() {
        for phrase in [MatchPhrase::Yes, MatchPhrase::No, MatchPhrase::Unset] {
            let request = build(None, None, phrase);
            assert_eq!(primary(&request), &json!({"match_all": {}}));
            assert_eq!(request.source, None);
        }
    }

    #[test]
    fn field_without_query_projects_that_field() {
        for phrase in [MatchPhrase::Yes, MatchPhrase::No, MatchPhrase::Unset] {
            let request = build(None, Some("title"), phrase);
            assert_eq!(primary(&request), &json!({"match_all": {}}));
            assert_eq!(request.source, Some(vec!["title".to_string()]));
        }
    }

    #[test]
    fn phrase_on_field_when_set_or_unset() {
        for phrase in [MatchPhrase::Yes, MatchPhrase::Unset] {
            let request = build(Some("news dump"), Some("title"), phrase);
            assert_eq!(
                primary(&request),
                &json!({"match_phrase": {"title": "news dump"}})
            );
        }
    }

    #[test]
    fn phrase_across_fields_when_set_or_unset() {
        for phrase in [MatchPhrase::Yes, MatchPhrase::Unset] {
            let request = build(Some("news dump"), None, phrase);
            assert_eq!(
                primary(&request),
                &json!({"multi_match": {"type": "phrase", "query": "news dump"}})
            );
        }
    }

    #[test]
    fn explicit_no_phrase_uses_term_matching() {
        let request = build(Some("news dump"), Some("title"), MatchPhrase::No);
        assert_eq!(primary(&request), &json!({"match": {"title": "news dump"}}));

        let request = build(Some("news dump"), None, MatchPhrase::No);
        assert_eq!(
            primary(&request),
            &json!({"multi_match": {"type": "best_fields", "query": "news dump"}})
        );
    }

    #[test]
    fn extra_clauses_are_conjunctive() {
        let range = date_range_clause(1_000_000, 8);
        let request = build_search(SearchParams {
            query: Some("etc"),
            extra_clauses: vec![range.clone()],
            ..Default::default()
        });
        assert_eq!(request.must.len(), 2);
        assert!(request.must.contains(&range));
        assert!(request
            .must
            .contains(&json!({"multi_match": {"type": "phrase", "query": "etc"}})));
    }

    #[test]
    fn body_shape_with_sort_and_projection() {
        let request = build_search(SearchParams {
            field: Some("title"),
            sort_by_field: Some("date_published"),
            sort_direction: SortDirection::Desc,
            ..Default::default()
        });
        assert_eq!(
            request.to_body(),
            json!({
                "size": MAX_RESULTS,
                "_source": ["title"],
                "query": {"bool": {"must": [{"match_all": {}}]}},
                "sort": [{"date_published": {"order": "desc"}}, "_score"],
            })
        );
    }

    #[test]
    fn no_sort_leaves_relevance_order() {
        let body = build(Some("x"), None, MatchPhrase::Unset).to_body();
        assert!(body.get("sort").is_none());
        assert!(body.get("_source").is_none());
    }

    #[test]
    fn date_range_splits_window_around_center() {
        let center = 1_425_168_000;
        let clause = date_range_clause(center, 8);
        let range = &clause["range"]["date_published"];
        assert_eq!(range["gte"], json!((center - 4 * 86_400).to_string()));
        assert_eq!(range["lte"], json!((center + 4 * 86_400).to_string()));
        assert_eq!(range["format"], json!("epoch_second"));

        let clause = date_range_clause(center, 3);
        let range = &clause["range"]["date_published"];
        assert_eq!(range["gte"], json!((center - 86_400).to_string()));
        assert_eq!(range["lte"], json!((center + 2 * 86_400).to_string()));
    }
}
