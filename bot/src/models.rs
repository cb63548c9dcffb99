use crate::utils::{epoch_to_utc_date, watch_url};
use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Cursor;

/// Placeholder the archive uses for unknown list entries.
pub const NOT_AVAILABLE: &str = "NA";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VideoError {
    #[error("id is a required value")]
    MissingId,

    #[error("id must be a string or a number, got {0}")]
    InvalidId(String),

    #[error("video source must be a JSON object, got {0}")]
    NotAnObject(String),
}

/// One archived video, merged from the main, re-upload and local indices.
///
/// Two videos are equal when their ids are equal, regardless of the other fields.
#[derive(Clone, Default)]
pub struct Video {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub date_published: Option<String>,
    pub uploader: Option<String>,
    pub alternate_titles: Vec<String>,
    pub alternate_descriptions: Vec<String>,
    pub alternate_uploaders: Vec<String>,
    pub uploader_ids: Vec<String>,
    pub tags: Vec<String>,
    pub duplicate_of: Vec<String>,
    pub archived: Option<bool>,
    pub on_youtube: Option<bool>,
    pub reupload_url: Option<String>,
    local_quality: Option<(u64, u64)>,
}

impl Video {
    /// Builds a video from a raw `_source` document plus any injected fusion fields.
    pub fn from_source(source: &Map<String, Value>) -> Result<Self, VideoError> {
        let id = match source.get("id") {
            None | Some(Value::Null) => return Err(VideoError::MissingId),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => return Err(VideoError::InvalidId(other.to_string())),
        };

        let date_published = scalar(source.get("date_published")).map(|raw| {
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|secs| secs.is_finite())
                .and_then(|secs| epoch_to_utc_date(secs as i64))
                .unwrap_or(raw)
        });

        let local_quality = match (
            dimension(source.get("local_quality_width")),
            dimension(source.get("local_quality_height")),
        ) {
            (Some(width), Some(height)) => Some((width, height)),
            _ => None,
        };

        Ok(Self {
            id,
            title: scalar(source.get("title")),
            description: scalar(source.get("description")),
            duration: scalar(source.get("duration")),
            date_published,
            uploader: scalar(source.get("uploader")),
            alternate_titles: string_list(source.get("alternate_titles")),
            alternate_descriptions: string_list(source.get("alternate_descriptions")),
            alternate_uploaders: string_list(source.get("alternate_uploaders")),
            uploader_ids: string_list(source.get("uploader_ids")),
            tags: string_list(source.get("tags")),
            duplicate_of: string_list(source.get("duplicate_of")),
            archived: flag(source.get("archived")),
            on_youtube: flag(source.get("on_youtube")),
            reupload_url: scalar(source.get("reupload_url")),
            local_quality,
        })
    }

    pub fn original_url(&self) -> String {
        watch_url(&self.id)
    }

    /// Width and height of the locally archived copy.
    pub fn quality(&self) -> Option<(u64, u64)> {
        self.local_quality
    }

    /// Present fields in display order.
    pub fn fields(&self) -> Vec<(&'static str, Value)> {
        let mut fields = vec![("id", Value::from(self.id.clone()))];

        let scalars = [
            ("title", &self.title),
            ("description", &self.description),
            ("duration", &self.duration),
            ("date_published", &self.date_published),
            ("uploader", &self.uploader),
        ];
        for (name, value) in scalars {
            if let Some(value) = value {
                fields.push((name, Value::from(value.clone())));
            }
        }

        if let Some((width, height)) = self.local_quality {
            fields.push(("local_quality_width", Value::from(width)));
            fields.push(("local_quality_height", Value::from(height)));
        }
        if let Some(archived) = self.archived {
            fields.push(("archived", Value::from(archived)));
        }
        if let Some(on_youtube) = self.on_youtube {
            fields.push(("on_youtube", Value::from(on_youtube)));
        }
        if let Some(url) = &self.reupload_url {
            fields.push(("reupload_url", Value::from(url.clone())));
        }

        let lists = [
            ("alternate_titles", &self.alternate_titles),
            ("alternate_descriptions", &self.alternate_descriptions),
            ("alternate_uploaders", &self.alternate_uploaders),
            ("uploader_ids", &self.uploader_ids),
            ("tags", &self.tags),
            ("duplicate_of", &self.duplicate_of),
        ];
        for (name, values) in lists {
            if !values.is_empty() {
                fields.push((name, Value::from(values.clone())));
            }
        }

        fields
    }

    /// Only the present fields, keyed by their raw source names.
    pub fn as_dict(&self) -> Map<String, Value> {
        self.fields()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}

impl TryFrom<&Value> for Video {
    type Error = VideoError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value.as_object() {
            Some(source) => Video::from_source(source),
            None => Err(VideoError::NotAnObject(value.to_string())),
        }
    }
}

impl PartialEq for Video {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Video {}

impl Hash for Video {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Video {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl fmt::Debug for Video {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Video({})", Value::Object(self.as_dict()))
    }
}

impl Serialize for Video {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_dict().serialize(serializer)
    }
}

/// Strips literal `\n` escapes, including ones formed by an earlier strip.
/// An empty result counts as absent.
fn scalar(value: Option<&Value>) -> Option<String> {
    let mut cleaned = match value? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    while cleaned.contains("\\n") {
        cleaned = cleaned.replace("\\n", "");
    }
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

pub fn is_invalid_entry(entry: &str) -> bool {
    entry.trim().is_empty() || entry == NOT_AVAILABLE
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<&Value> = match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .filter(|entry| !is_invalid_entry(entry))
        .collect()
}

fn flag(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Null => None,
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(true)),
        Value::String(s) => Some(!s.is_empty()),
        Value::Array(items) => Some(!items.is_empty()),
        Value::Object(map) => Some(!map.is_empty()),
    }
}

fn dimension(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as u64),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseStats {
    pub total: u64,
    pub total_reuploaded: u64,
    pub total_archived: u64,
}

impl std::ops::AddAssign for PhraseStats {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.total_reuploaded += other.total_reuploaded;
        self.total_archived += other.total_archived;
    }
}

/// Main-channel videos in the overlap window that also exist in the local archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOverlap {
    pub archived: u64,
    pub candidates: u64,
}

impl ChannelOverlap {
    pub fn percentage(&self) -> f64 {
        if self.candidates == 0 {
            return 0.0;
        }
        (self.archived as f64 / self.candidates as f64 * 1000.0).round() / 10.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub total: u64,
    pub total_reuploaded: u64,
    pub total_archived: u64,
    pub total_classic: u64,
    pub total_modern: u64,
    pub main_channel_archived: ChannelOverlap,
    pub phrase: BTreeMap<String, PhraseStats>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip)]
    pub status: Status,
}

impl ErrorResponse {
    pub fn bad_request(message: &str) -> Self {
        Self {
            error: "Bad request".to_string(),
            message: message.to_string(),
            status: Status::BadRequest,
        }
    }

    pub fn unavailable(message: &str) -> Self {
        Self {
            error: "Database unavailable".to_string(),
            message: message.to_string(),
            status: Status::ServiceUnavailable,
        }
    }
}

impl<'r> Responder<'r, 'static> for ErrorResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let json = serde_json::to_string(&self).map_err(|_| Status::InternalServerError)?;
        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

/// `X-Signature-Ed25519` and `X-Signature-Timestamp` of an interaction request.
#[derive(Debug)]
pub struct DiscordSignature {
    pub signature: String,
    pub timestamp: String,
}

pub const INTERACTION_PING: u8 = 1;
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;

#[derive(Debug, Deserialize)]
pub struct DiscordUser {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct GuildMember {
    pub user: DiscordUser,
}

#[derive(Debug, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

/// The subset of a Discord interaction the bot reads.
#[derive(Debug, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    pub data: Option<CommandData>,
    /// Set when invoked in a guild.
    pub member: Option<GuildMember>,
    /// Set when invoked in a DM.
    pub user: Option<DiscordUser>,
}

impl Interaction {
    pub fn user_id(&self) -> Option<&str> {
        self.member
            .as_ref()
            .map(|m| m.user.id.as_str())
            .or_else(|| self.user.as_ref().map(|u| u.id.as_str()))
    }

    pub fn options(&self) -> HashMap<String, Value> {
        self.data
            .iter()
            .flat_map(|data| data.options.iter())
            .map(|option| (option.name.clone(), option.value.clone()))
            .collect()
    }
}
