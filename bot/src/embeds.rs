use crate::models::{StatsReport, Video};
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

pub const EMBED_MAX_LENGTH: usize = 6000;
pub const EMBED_TITLE_MAX_LENGTH: usize = 256;
pub const EMBED_DESCRIPTION_MAX_LENGTH: usize = 2048;
pub const EMBED_FIELD_NAME_MAX_LENGTH: usize = 256;
pub const EMBED_FIELD_VALUE_MAX_LENGTH: usize = 1024;
pub const EMBED_MAX_FIELDS: usize = 25;
pub const STR_SHORTED_SUFFIX: &str = " [...]";

const MARKDOWN_CHARACTERS: [char; 2] = ['_', '*'];
const VIDEO_COLOUR: u32 = 0xff0000;
const ERROR_COLOUR: u32 = 0xff0000;
const SOURCE_URL: &str = "https://github.com/coletdjnz/etc-archive-bot";

lazy_static::lazy_static! {
    /// Channel avatar by uploader id, for the known official channels.
    static ref CHANNEL_AVATARS: HashMap<&'static str, &'static str> = {
        let avatars: [(&str, &[&str]); 3] = [
            (
                "https://web.archive.org/web/20200306204335im_/https://yt3.ggpht.com/a/AATXAJyLkfDzhn_3eXDOW-_sIOdMVf8HhU_16MGpVw=s100-c-k-c0xffffffff-no-rj-mo",
                &["MachinimaETC", "UCdIaNUarhzLSXGoItz7BHVA", "machinimaetc"],
            ),
            (
                "https://web.archive.org/web/20181201101415im_/https://yt3.ggpht.com/a-/AN66SAy5I5_a-Pa4CuY687qid-2KoLQd5x359wFqEg=s100-mo-c-c0xffffffff-rj-k-no",
                &["machinima", "UCcMTZY1rFXO3Rj44D5VMyiw", "Machinima"],
            ),
            (
                "https://web.archive.org/web/20200307151923im_/https://yt3.ggpht.com/a/AATXAJzirvLpa6p9LIM99v4qY9stAWOI0CfhWVRoNw=s100-c-k-c0xffffffff-no-rj-mo",
                &["UCXD7b5Qj5z7oV6kggtXD-eQ"],
            ),
        ];
        let mut by_uploader = HashMap::new();
        for (avatar, uploader_ids) in avatars {
            for uploader_id in uploader_ids {
                by_uploader.insert(*uploader_id, avatar);
            }
        }
        by_uploader
    };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// A Discord message embed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "color", skip_serializing_if = "Option::is_none")]
    pub colour: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

impl Embed {
    pub fn new(title: &str) -> Self {
        Self {
            title: Some(shorten_str(title, EMBED_TITLE_MAX_LENGTH)),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(shorten_str(description, EMBED_DESCRIPTION_MAX_LENGTH));
        self
    }

    pub fn colour(mut self, colour: u32) -> Self {
        self.colour = Some(colour);
        self
    }

    pub fn footer(mut self, text: &str) -> Self {
        self.footer = Some(EmbedFooter {
            text: text.to_string(),
        });
        self
    }

    /// Ignores `None` so callers can pass an unresolved thumbnail straight through.
    pub fn image(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            self.image = Some(EmbedImage { url });
        }
        self
    }

    /// Adds a field unless the embed already holds the maximum number of fields.
    pub fn field(mut self, name: &str, value: &str, inline: bool) -> Self {
        if self.fields.len() >= EMBED_MAX_FIELDS {
            debug!("Dropping field {name}: embed already has {EMBED_MAX_FIELDS} fields");
            return self;
        }
        self.fields.push(EmbedField {
            name: shorten_str(name, EMBED_FIELD_NAME_MAX_LENGTH),
            value: shorten_str(value, EMBED_FIELD_VALUE_MAX_LENGTH),
            inline,
        });
        self
    }

    /// Characters Discord counts against the overall embed limit.
    pub fn total_length(&self) -> usize {
        let len = |s: &Option<String>| s.as_deref().map(|s| s.chars().count()).unwrap_or(0);
        len(&self.title)
            + len(&self.description)
            + self
                .footer
                .as_ref()
                .map(|f| f.text.chars().count())
                .unwrap_or(0)
            + self
                .fields
                .iter()
                .map(|f| f.name.chars().count() + f.value.chars().count())
                .sum::<usize>()
    }
}

/// Cuts `s` to `max_length` characters, marking the cut with a suffix.
pub fn shorten_str(s: &str, max_length: usize) -> String {
    if s.chars().count() <= max_length {
        return s.to_string();
    }
    let s = s.strip_suffix(STR_SHORTED_SUFFIX).unwrap_or(s);
    let keep = max_length.saturating_sub(STR_SHORTED_SUFFIX.chars().count());
    let mut shortened: String = s.chars().take(keep).collect();
    shortened.push_str(STR_SHORTED_SUFFIX);
    shortened
}

fn joined_length(items: &[String]) -> usize {
    items.iter().map(|i| i.chars().count()).sum::<usize>() + items.len().saturating_sub(1) * 2
}

/// Drops trailing entries until the comma separated list fits in `max_length`.
pub fn shorten_list(items: &[String], max_length: usize) -> Vec<String> {
    let mut shortened = items.to_vec();
    shortened.push(STR_SHORTED_SUFFIX.to_string());
    if joined_length(&shortened) <= max_length {
        return items.to_vec();
    }
    while joined_length(&shortened) > max_length && shortened.len() > 1 {
        shortened.remove(shortened.len() - 2);
    }
    shortened
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_markdown(s: &str) -> String {
    s.chars().filter(|c| !MARKDOWN_CHARACTERS.contains(c)).collect()
}

fn field_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let items: Vec<String> = items
                .iter()
                .map(|i| i.as_str().map(str::to_string).unwrap_or_else(|| i.to_string()))
                .collect();
            shorten_list(&items, EMBED_FIELD_VALUE_MAX_LENGTH).join(", ")
        }
        other => other.to_string(),
    }
}

/// Every present field of a video, with the archived quality folded into one resolution.
pub fn video_embed(video: &Video, thumbnail: Option<String>) -> Embed {
    let mut embed = Embed::new(&format!("Video {}", video.id)).colour(VIDEO_COLOUR);
    embed.url = video.reupload_url.clone();

    for (name, value) in video.fields() {
        match name {
            "local_quality_height" => {}
            "local_quality_width" => {
                if let Some((width, height)) = video.quality() {
                    embed = embed.field("Archived Resolution", &format!("{width}x{height}"), false);
                }
            }
            _ => embed = embed.field(&title_case(name), &field_value(&value), false),
        }
    }
    balance_fields(&mut embed);

    embed.thumbnail = video
        .uploader_ids
        .iter()
        .find_map(|id| CHANNEL_AVATARS.get(id.as_str()))
        .map(|url| EmbedImage {
            url: url.to_string(),
        });

    embed.image(thumbnail)
}

/// Shortens the longest field values until the embed fits Discord's total limit.
fn balance_fields(embed: &mut Embed) {
    while embed.total_length() > EMBED_MAX_LENGTH {
        let excess = embed.total_length() - EMBED_MAX_LENGTH;
        let Some(longest) = embed
            .fields
            .iter_mut()
            .max_by_key(|f| f.value.chars().count())
        else {
            return;
        };
        let current = longest.value.chars().count();
        if current <= STR_SHORTED_SUFFIX.len() {
            return;
        }
        let target = current.saturating_sub(excess).max(STR_SHORTED_SUFFIX.len());
        debug!("Shortening field {} from {current} to {target} characters", longest.name);
        longest.value = shorten_str(&longest.value, target);
    }
}

/// Numbered listing shown when a search has several results.
pub fn listing_embed(videos: &[Video]) -> Embed {
    let mut description = String::new();
    for (index, video) in videos.iter().enumerate() {
        let mut flags = Vec::new();
        if video.archived == Some(true) {
            flags.push("H");
        }
        if video.on_youtube == Some(true) {
            flags.push("YT");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!("[{}]", flags.join(", "))
        };
        let title = video
            .title
            .as_deref()
            .map(strip_markdown)
            .unwrap_or_else(|| "Unknown Title".to_string());

        description.push_str(&format!("**{}** - {flags} {title} ({})\n", index + 1, video.id));
    }

    Embed::new(&format!("Select video with /choose 1-{}:", videos.len()))
        .colour(VIDEO_COLOUR)
        .description(&description)
}

pub fn error_embed(description: &str) -> Embed {
    Embed::new("Error")
        .description(description)
        .colour(ERROR_COLOUR)
}

pub fn stats_embed(report: &StatsReport, series: bool) -> Embed {
    let mut embed = Embed::new("ETC Database Statistics");
    if series {
        embed = embed.description(
            "Note: that the numbers for series are estimates based off keywords in the video title. \
             **They are far from accurate**, but give an idea of how many videos we *at least* have.",
        );
    }

    let overlap = report.main_channel_archived;
    embed = embed
        .field("Total Entries", &report.total.to_string(), false)
        .field("Total Re-uploaded", &report.total_reuploaded.to_string(), false)
        .field(
            "Total Archived (Modern + Classic)",
            &format!(
                "{} ({} + {})",
                report.total_archived, report.total_modern, report.total_classic
            ),
            false,
        )
        .field(
            "Total Archived (Modern, MachinimaETC Only)",
            &format!(
                "{}/{} ({}%)",
                overlap.archived,
                overlap.candidates,
                overlap.percentage()
            ),
            false,
        );

    for (phrase, stats) in &report.phrase {
        embed = embed.field(
            phrase,
            &format!(
                "Total: {}\nTotal Re-uploaded: {}\nTotal Archived: {}",
                stats.total, stats.total_reuploaded, stats.total_archived
            ),
            true,
        );
    }
    embed
}

/// Overview of the thumbnail store, or a single thumbnail when `video_id` is given.
pub fn thumbnail_embed(video_id: Option<&str>, url: Option<String>) -> Embed {
    match video_id {
        None => Embed::new("ETC Thumbnails")
            .description(&format!(
                "The thumbnails the ETC Bot uses are stored on the IPFS network. \
                 You can view the latest database here: {}",
                url.unwrap_or_else(|| "(not resolved yet)".to_string())
            ))
            .footer("If you were looking for a particular thumbnail, type /thumb <video id>"),
        Some(video_id) => {
            let footer = format!("To get info on this video: /search {video_id} id");
            match url {
                Some(url) => Embed::new(&format!("Thumbnail for {video_id}"))
                    .image(Some(url))
                    .footer(&footer),
                None => error_embed(&format!("No thumbnail found for video {video_id}!")).footer(&footer),
            }
        }
    }
}

pub fn about_embed() -> Embed {
    Embed::new("About ETC Archive Bot")
        .description(&format!("Source code available at {SOURCE_URL}"))
}
