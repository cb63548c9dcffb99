use crate::embeds::{
    about_embed, error_embed, listing_embed, stats_embed, thumbnail_embed, video_embed, Embed,
};
use crate::models::Video;
use crate::services::elasticsearch_service::SearchBackend;
use crate::services::query_builder::{build_search, SearchParams, SortDirection};
use crate::services::search_service::ArchiveDatabase;
use crate::services::session::{Choice, PendingChoices};
use crate::services::stats_service::DEFAULT_TITLE_PHRASES;
use crate::services::thumbnail_service::ThumbnailResolver;
use crate::utils::{extract_youtube_video_id, parse_user_date};
use log::{error, info};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Days searched around the date given to `searchr`.
pub const DATE_SEARCH_WINDOW_DAYS: i64 = 8;

const SORT_FIELD: &str = "date_published";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search {
        query: String,
        field: Option<String>,
    },
    SearchByDate {
        date: String,
        query: Option<String>,
        field: Option<String>,
    },
    SearchSorted {
        query: String,
        field: Option<String>,
        direction: SortDirection,
    },
    Choose {
        selection: String,
    },
    Thumb {
        video_id: Option<String>,
    },
    Stats {
        series: bool,
    },
    About,
}

impl Command {
    /// Parses a slash command from its name and named options.
    pub fn parse(name: &str, options: &HashMap<String, Value>) -> Result<Command, String> {
        let text = |key: &str| -> Option<String> {
            options.get(key).and_then(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        };
        let required = |key: &str| text(key).ok_or_else(|| format!("`{key}` is required for /{name}"));

        let command = match name {
            "search" => Command::Search {
                query: required("query")?,
                field: text("field"),
            },
            "searchr" => Command::SearchByDate {
                date: required("date")?,
                query: text("query"),
                field: text("field"),
            },
            "searchda" | "searchdd" => Command::SearchSorted {
                query: required("query")?,
                field: text("field"),
                direction: if name == "searchdd" {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                },
            },
            "choose" => Command::Choose {
                selection: required("number")?,
            },
            "thumb" => Command::Thumb {
                video_id: text("video_id"),
            },
            "stats" => Command::Stats {
                series: match options.get("series") {
                    Some(Value::Bool(b)) => *b,
                    Some(Value::Null) | None => false,
                    Some(_) => true,
                },
            },
            "about" => Command::About,
            other => return Err(format!("Unknown command /{other}")),
        };
        Ok(command)
    }
}

/// What a command needs from the running bot.
pub struct CommandContext<'a, B: SearchBackend> {
    pub db: &'a ArchiveDatabase<B>,
    pub thumbnails: Option<&'a ThumbnailResolver>,
    pub choices: &'a PendingChoices,
}

impl<'a, B: SearchBackend> CommandContext<'a, B> {
    pub async fn run(&self, user_id: &str, command: Command) -> Embed {
        info!("User {user_id} ran {command:?}");

        match command {
            Command::Search { query, field } => {
                let request = build_search(SearchParams {
                    query: Some(&query),
                    field: field.as_deref(),
                    ..Default::default()
                });
                let videos = self.db.search(&request).await.into_videos();
                self.present(user_id, videos, &format!("No entries in database for query:{query}"))
                    .await
            }
            Command::SearchByDate { date, query, field } => {
                let Some(center) = parse_user_date(&date) else {
                    return error_embed(&format!("Could not understand the date: {date}"));
                };
                info!("Converted date to epoch: {center}");
                let params = SearchParams {
                    query: query.as_deref(),
                    field: field.as_deref(),
                    ..Default::default()
                };
                let videos = self
                    .db
                    .search_by_date(center, DATE_SEARCH_WINDOW_DAYS, params)
                    .await
                    .into_videos();
                self.present(
                    user_id,
                    videos,
                    &format!("No entries in database for date range:{date}"),
                )
                .await
            }
            Command::SearchSorted {
                query,
                field,
                direction,
            } => {
                let request = build_search(SearchParams {
                    query: Some(&query),
                    field: field.as_deref(),
                    sort_by_field: Some(SORT_FIELD),
                    sort_direction: direction,
                    ..Default::default()
                });
                let videos = self.db.search(&request).await.into_videos();
                self.present(user_id, videos, &format!("No entries in database for query:{query}"))
                    .await
            }
            Command::Choose { selection } => match self.choices.choose(user_id, &selection) {
                Choice::Picked(video) => self.single(&video).await,
                Choice::Invalid => error_embed(&format!(
                    "{selection} is not one of the offered videos, search again"
                )),
                Choice::NothingPending => error_embed("There is nothing to choose from, search first"),
            },
            Command::Thumb { video_id } => self.thumb(video_id.as_deref()).await,
            Command::Stats { series } => self.stats(series).await,
            Command::About => about_embed(),
        }
    }

    /// Zero results is an error, one is shown directly, several are offered to choose from.
    async fn present(&self, user_id: &str, videos: Vec<Video>, empty_message: &str) -> Embed {
        match videos.len() {
            0 => error_embed(empty_message),
            1 => self.single(&videos[0]).await,
            _ => {
                let embed = listing_embed(&videos);
                self.choices.offer(user_id, videos);
                embed
            }
        }
    }

    async fn single(&self, video: &Video) -> Embed {
        let thumbnail = match self.thumbnails {
            Some(thumbnails) => thumbnails.thumb_url(&video.id).await,
            None => None,
        };
        video_embed(video, thumbnail)
    }

    async fn thumb(&self, video_id: Option<&str>) -> Embed {
        let Some(thumbnails) = self.thumbnails else {
            return error_embed("Thumbnails are not configured for this bot");
        };
        match video_id {
            None => thumbnail_embed(None, thumbnails.folder_url().await),
            Some(input) => match extract_youtube_video_id(input) {
                Some(video_id) => {
                    let url = thumbnails.thumb_url(&video_id).await;
                    thumbnail_embed(Some(&video_id), url)
                }
                None => error_embed(&format!("{input} is not a video id or YouTube URL")),
            },
        }
    }

    async fn stats(&self, series: bool) -> Embed {
        let phrases: BTreeSet<String> = if series {
            DEFAULT_TITLE_PHRASES.iter().map(|p| p.to_string()).collect()
        } else {
            BTreeSet::new()
        };

        match self.db.get_stats(&phrases).await {
            Ok(report) => stats_embed(&report, series),
            Err(e) => {
                error!("Failed to gather statistics: {e:#}");
                error_embed("Failed to gather statistics, try again later")
            }
        }
    }
}
