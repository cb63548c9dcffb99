use crate::models::{ErrorResponse, StatsReport, Video};
use crate::services::command_service::DATE_SEARCH_WINDOW_DAYS;
use crate::services::query_builder::{build_search, MatchPhrase, SearchParams, SortDirection};
use crate::services::stats_service::DEFAULT_TITLE_PHRASES;
use crate::utils::parse_user_date;
use crate::AppState;
use log::error;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::collections::BTreeSet;

fn sort_direction(order: Option<&str>) -> Result<SortDirection, ErrorResponse> {
    match order {
        None | Some("asc") => Ok(SortDirection::Asc),
        Some("desc") => Ok(SortDirection::Desc),
        Some(other) => Err(ErrorResponse::bad_request(&format!(
            "order must be asc or desc, not {other}"
        ))),
    }
}

#[get("/search?<query>&<field>&<phrase>&<sort>&<order>")]
pub async fn search_videos(
    query: Option<String>,
    field: Option<String>,
    phrase: Option<bool>,
    sort: Option<String>,
    order: Option<String>,
    state: &State<AppState>,
) -> Result<Json<Vec<Video>>, ErrorResponse> {
    let request = build_search(SearchParams {
        query: query.as_deref(),
        field: field.as_deref(),
        match_phrase: MatchPhrase::from(phrase),
        sort_by_field: sort.as_deref(),
        sort_direction: sort_direction(order.as_deref())?,
        ..Default::default()
    });

    Ok(Json(state.db.search(&request).await.into_videos()))
}

#[get("/search/date?<date>&<query>&<field>")]
pub async fn search_by_date(
    date: String,
    query: Option<String>,
    field: Option<String>,
    state: &State<AppState>,
) -> Result<Json<Vec<Video>>, ErrorResponse> {
    let center = parse_user_date(&date)
        .ok_or_else(|| ErrorResponse::bad_request(&format!("Could not understand the date: {date}")))?;

    let params = SearchParams {
        query: query.as_deref(),
        field: field.as_deref(),
        ..Default::default()
    };
    let videos = state
        .db
        .search_by_date(center, DATE_SEARCH_WINDOW_DAYS, params)
        .await
        .into_videos();
    Ok(Json(videos))
}

#[get("/stats?<series>")]
pub async fn stats(
    series: Option<bool>,
    state: &State<AppState>,
) -> Result<Json<StatsReport>, ErrorResponse> {
    let phrases: BTreeSet<String> = if series.unwrap_or(false) {
        DEFAULT_TITLE_PHRASES.iter().map(|p| p.to_string()).collect()
    } else {
        BTreeSet::new()
    };

    match state.db.get_stats(&phrases).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!("Failed to gather statistics: {e:#}");
            Err(ErrorResponse::unavailable("Failed to gather statistics"))
        }
    }
}
