use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub const SECONDS_PER_DAY: i64 = 86_400;

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Formats epoch seconds as a UTC calendar day, e.g. `2015-03-01 UTC`.
pub fn epoch_to_utc_date(seconds: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(seconds, 0).map(|dt| format!("{} UTC", dt.format("%Y-%m-%d")))
}

/// Parse a user supplied date into epoch seconds, interpreted as UTC.
pub fn parse_user_date(input: &str) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = input.parse::<DateTime<Utc>>() {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp());
    }

    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt.and_utc().timestamp());
        }
    }

    // Normalise "March 1st, 2015" style input before trying day formats
    let cleaned = input
        .replace(',', " ")
        .split_whitespace()
        .map(strip_ordinal)
        .collect::<Vec<_>>()
        .join(" ");

    const DATE_FORMATS: [&str; 9] = [
        "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y", "%d %B %Y", "%B %d %Y", "%d %b %Y",
        "%b %d %Y", "%Y %B %d",
    ];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp());
        }
    }

    None
}

fn strip_ordinal(word: &str) -> String {
    let lower = word.to_lowercase();
    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(number) = lower.strip_suffix(suffix) {
            if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
                return number.to_string();
            }
        }
    }
    word.to_string()
}

/// Accepts a bare video id or any of the usual YouTube URL shapes.
pub fn extract_youtube_video_id(input: &str) -> Option<String> {
    use url::Url;

    let parsed_url = match Url::parse(input) {
        Ok(url) => url,
        Err(_) => {
            let trimmed = input.trim();
            if !trimmed.is_empty() && !trimmed.contains(char::is_whitespace) {
                return Some(trimmed.to_string());
            }
            return None;
        }
    };
    let host = parsed_url.host_str()?;

    match host {
        "www.youtube.com" | "youtube.com" | "m.youtube.com" => {
            if parsed_url.path() == "/watch" {
                parsed_url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.to_string())
            } else {
                parsed_url
                    .path()
                    .strip_prefix("/embed/")
                    .filter(|id| !id.is_empty())
                    .map(|id| id.to_string())
            }
        }
        "youtu.be" => parsed_url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|id| !id.is_empty())
            .map(|id| id.to_string()),
        _ => None,
    }
}
