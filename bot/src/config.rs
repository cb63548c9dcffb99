use crate::services::discord_service::{parse_public_key, register_commands};
use crate::services::elasticsearch_service::{ArchiveIndices, ElasticBackend};
use crate::services::search_service::ArchiveDatabase;
use crate::services::session::{PendingChoices, DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::services::stats_service::{OverlapScope, StatsConfig};
use crate::services::thumbnail_service::{setup_thumbnail_refresh, ThumbnailResolver};
use crate::AppState;
use anyhow::{Context, Result};
use ed25519_dalek::VerifyingKey;
use elasticsearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    Elasticsearch,
};
use env_logger::Builder;
use lazy_static::lazy_static;
use log::{error, info, warn, LevelFilter};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

lazy_static! {
    pub static ref ELASTICSEARCH_URL: String =
        env::var("ELASTICSEARCH_URL").unwrap_or_else(|_| "http://localhost:9200".to_string());
    pub static ref MAIN_INDEX: String =
        env::var("MAIN_INDEX").unwrap_or_else(|_| "etc_main".to_string());
    pub static ref REUPLOAD_INDEX: String =
        env::var("REUPLOAD_INDEX").unwrap_or_else(|_| "etc_youtube".to_string());
    pub static ref LOCAL_INDEX: String =
        env::var("LOCAL_INDEX").unwrap_or_else(|_| "etc_local".to_string());
    pub static ref IPFS_API_URL: String =
        env::var("IPFS_API_URL").unwrap_or_else(|_| "http://localhost:5001".to_string());
    pub static ref THUMBNAIL_IPNS: Option<String> = optional_var("THUMBNAIL_IPNS");
    pub static ref THUMBNAIL_CACHE_FILE: Option<String> = optional_var("THUMBNAIL_CACHE_FILE");
    pub static ref THUMBNAIL_REFRESH_SCHEDULE: String =
        env::var("THUMBNAIL_REFRESH_SCHEDULE").unwrap_or_else(|_| "0 0 */5 * * *".to_string());
    pub static ref CHOICE_CAPACITY: usize = env::var("CHOICE_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_CAPACITY);
    pub static ref CHOICE_TTL: Duration = env::var("CHOICE_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TTL);
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn list_var(name: &str) -> Option<Vec<String>> {
    optional_var(name).map(|v| {
        v.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

pub fn init_logger() {
    let level = env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    Builder::new().filter_level(level).init();
    info!("Starting ETC archive bot...");
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

pub fn archive_indices() -> ArchiveIndices {
    ArchiveIndices {
        main: MAIN_INDEX.clone(),
        reupload: REUPLOAD_INDEX.clone(),
        local: LOCAL_INDEX.clone(),
    }
}

/// Overlap statistic scope, each part overridable from the environment.
pub fn stats_config() -> StatsConfig {
    let defaults = OverlapScope::default();
    StatsConfig {
        overlap: OverlapScope {
            uploader_ids: list_var("OVERLAP_UPLOADER_IDS").unwrap_or(defaults.uploader_ids),
            uploader_names: list_var("OVERLAP_UPLOADER_NAMES").unwrap_or(defaults.uploader_names),
            published_from: optional_var("OVERLAP_FROM").unwrap_or(defaults.published_from),
            published_to: optional_var("OVERLAP_TO").unwrap_or(defaults.published_to),
        },
        ..StatsConfig::default()
    }
}

/// Discord credentials. Only the public key is required to serve interactions.
pub struct Settings {
    pub public_key: VerifyingKey,
    pub application_id: Option<String>,
    pub bot_token: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let public_key = env::var("DISCORD_PUBLIC_KEY")
            .context("DISCORD_PUBLIC_KEY environment variable must be set")
            .and_then(|key| parse_public_key(&key))?;

        Ok(Self {
            public_key,
            application_id: optional_var("DISCORD_APPLICATION_ID"),
            bot_token: optional_var("DISCORD_TOKEN"),
        })
    }
}

pub fn create_elasticsearch_client() -> Result<Elasticsearch> {
    let es_url = &*ELASTICSEARCH_URL;
    info!("Connecting to Elasticsearch at: {es_url}");

    let transport =
        TransportBuilder::new(SingleNodeConnectionPool::new(es_url.parse()?)).build()?;

    Ok(Elasticsearch::new(transport))
}

pub async fn create_app_state() -> Result<AppState> {
    let settings = Settings::from_env()?;

    let backend = ElasticBackend::new(create_elasticsearch_client()?);
    backend.log_info().await;
    let db = ArchiveDatabase::with_stats_config(backend, archive_indices(), stats_config());

    let (thumbnails, scheduler) = match THUMBNAIL_IPNS.as_deref() {
        Some(ipns_hash) => {
            let resolver = Arc::new(ThumbnailResolver::new(
                IPFS_API_URL.as_str(),
                ipns_hash,
                THUMBNAIL_CACHE_FILE.clone().map(PathBuf::from),
            ));
            let scheduler =
                setup_thumbnail_refresh(resolver.clone(), THUMBNAIL_REFRESH_SCHEDULE.as_str())
                    .await?;
            (Some(resolver), Some(scheduler))
        }
        None => {
            warn!("THUMBNAIL_IPNS is not set, thumbnails are disabled");
            (None, None)
        }
    };

    if let (Some(application_id), Some(token)) = (&settings.application_id, &settings.bot_token) {
        if let Err(e) = register_commands(application_id, token).await {
            error!("Failed to register slash commands: {e:#}");
        }
    }

    Ok(AppState {
        db,
        thumbnails,
        choices: PendingChoices::new(*CHOICE_CAPACITY, *CHOICE_TTL),
        public_key: settings.public_key,
        scheduler: Mutex::new(scheduler),
    })
}
