use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};

pub const TRUSTED_PUBLIC_IPFS_GATEWAYS: [&str; 4] = [
    "https://ipfs.io",
    "https://dweb.link",
    "https://gateway.ipfs.io",
    "https://cloudflare-ipfs.com",
];

/// Folder under the IPNS root that holds `<first char>/<video id>.jpg` files.
pub const THUMBNAIL_FOLDER: &str = "ETC_DATABASE_THUMBNAILS";

pub const THUMBNAIL_RESOLVE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum IpfsError {
    #[error("IPFS API error: {0}")]
    Api(String),

    #[error("cannot reach IPFS API: {0}")]
    Connection(#[from] reqwest::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ThumbnailCache {
    thumb_folder_hash: Option<String>,
}

/// Resolves video thumbnails stored on IPFS to public gateway URLs.
pub struct ThumbnailResolver {
    http: Client,
    api_base: String,
    ipns_hash: String,
    cache_file: Option<PathBuf>,
    folder: RwLock<Option<String>>,
}

impl ThumbnailResolver {
    /// `api_base` is the IPFS HTTP API root, e.g. `http://localhost:5001`.
    pub fn new(api_base: &str, ipns_hash: &str, cache_file: Option<PathBuf>) -> Self {
        let folder = cache_file.as_ref().and_then(|path| load_cached_folder(path));
        if let Some(folder) = &folder {
            debug!("Loaded thumb_folder_hash from cache: {folder}");
        }

        Self {
            http: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            ipns_hash: ipns_hash.to_string(),
            cache_file,
            folder: RwLock::new(folder),
        }
    }

    pub async fn folder(&self) -> Option<String> {
        self.folder.read().await.clone()
    }

    /// Re-resolves the thumbnail folder from IPNS, caches it and pins it.
    pub async fn refresh(&self) -> Result<String> {
        let root = self
            .resolve(&format!("/ipns/{}", self.ipns_hash))
            .await
            .context("resolving IPNS root")?;
        debug!("Resolved to {root}");

        let folder = self
            .resolve(&format!("{root}/{THUMBNAIL_FOLDER}"))
            .await
            .context("resolving thumbnail folder")?;
        info!("Resolved thumbnail folder {folder}");

        *self.folder.write().await = Some(folder.clone());
        self.save_cache(&folder).await;

        if let Err(e) = self.pin(&folder).await {
            error!("Failed to pin thumbnail folder {folder}: {e}");
        }
        Ok(folder)
    }

    /// Gateway URL of a video's thumbnail.
    ///
    /// Falls back to the unresolved path when the IPFS API is slow or unreachable,
    /// and gives up when the API says the file does not exist.
    pub async fn thumb_url(&self, video_id: &str) -> Option<String> {
        let Some(folder) = self.folder().await else {
            error!("Thumbnail folder has yet to be resolved");
            return None;
        };
        let path = thumbnail_path(&folder, video_id)?;
        let gateway = random_gateway();

        match tokio::time::timeout(THUMBNAIL_RESOLVE_TIMEOUT, self.resolve(&path)).await {
            Ok(Ok(resolved)) => {
                debug!("Resolved thumbnail to {resolved}");
                Some(format!("{gateway}{resolved}"))
            }
            Ok(Err(IpfsError::Api(message))) => {
                warn!("No thumbnail for {video_id}: {message}");
                None
            }
            Ok(Err(IpfsError::Connection(e))) => {
                error!("Cannot reach IPFS API for thumbnail {video_id}, returning file path instead: {e}");
                Some(format!("{gateway}{path}"))
            }
            Err(_) => {
                error!("Resolving thumbnail {video_id} timed out, returning file path instead");
                Some(format!("{gateway}{path}"))
            }
        }
    }

    /// Gateway URL of the whole thumbnail folder.
    pub async fn folder_url(&self) -> Option<String> {
        self.folder()
            .await
            .map(|folder| format!("{}{folder}", random_gateway()))
    }

    async fn resolve(&self, path: &str) -> Result<String, IpfsError> {
        let response = self.call("resolve", &[("arg", path)]).await?;
        response
            .get("Path")
            .and_then(|p| p.as_str())
            .map(|p| p.to_string())
            .ok_or_else(|| IpfsError::Api(format!("resolve response without Path: {response}")))
    }

    async fn pin(&self, path: &str) -> Result<(), IpfsError> {
        info!("Updating IPFS thumb folder pin...");
        let response = self
            .call("pin/add", &[("arg", path), ("recursive", "true")])
            .await?;
        debug!("Pins: {}", response["Pins"]);
        info!("Completed adding thumb folder to IPFS client pins.");
        Ok(())
    }

    async fn call(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value, IpfsError> {
        let response = self
            .http
            .post(format!("{}/api/v0/{endpoint}", self.api_base))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let json: Value = serde_json::from_str(&body)
            .map_err(|e| IpfsError::Api(format!("{endpoint} returned invalid JSON: {e}")))?;

        if !status.is_success() {
            let message = json["Message"].as_str().unwrap_or(&body).to_string();
            return Err(IpfsError::Api(message));
        }
        Ok(json)
    }

    async fn save_cache(&self, folder: &str) {
        let Some(path) = &self.cache_file else {
            return;
        };
        let cache = ThumbnailCache {
            thumb_folder_hash: Some(folder.to_string()),
        };
        debug!("Writing thumb_folder_hash to cache file: {}", path.display());
        let json = match serde_json::to_string(&cache) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize thumb_folder_hash cache: {e}");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(path, json).await {
            error!("Failed to write thumb_folder_hash to cache file: {e}");
        }
    }
}

fn load_cached_folder(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str::<ThumbnailCache>(&contents)
        .ok()?
        .thumb_folder_hash
}

fn thumbnail_path(folder: &str, video_id: &str) -> Option<String> {
    let first = video_id.chars().next()?;
    Some(format!("{folder}/{first}/{video_id}.jpg"))
}

fn random_gateway() -> &'static str {
    TRUSTED_PUBLIC_IPFS_GATEWAYS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(TRUSTED_PUBLIC_IPFS_GATEWAYS[0])
}

/// Refreshes the thumbnail folder now and then on `schedule`.
pub async fn setup_thumbnail_refresh(
    resolver: Arc<ThumbnailResolver>,
    schedule: &str,
) -> Result<JobScheduler> {
    let startup = resolver.clone();
    tokio::spawn(async move {
        if let Err(e) = startup.refresh().await {
            error!("Failed to get latest thumbnail folder IPFS hash: {e:#}");
        }
    });

    let scheduler = JobScheduler::new().await?;
    let refresh_job = Job::new_async(schedule, move |_uuid, _l| {
        let resolver = resolver.clone();
        Box::pin(async move {
            if let Err(e) = resolver.refresh().await {
                error!("Failed to get latest thumbnail folder IPFS hash: {e:#}");
            }
        })
    })?;

    scheduler.add(refresh_job).await?;
    scheduler.start().await?;
    info!("Thumbnail refresh scheduler started.");

    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnails_are_sharded_by_first_character() {
        assert_eq!(
            thumbnail_path("/ipfs/QmFolder", "abc123").as_deref(),
            Some("/ipfs/QmFolder/a/abc123.jpg")
        );
        assert_eq!(thumbnail_path("/ipfs/QmFolder", ""), None);
    }

    #[test]
    fn gateways_come_from_the_trusted_list() {
        for _ in 0..16 {
            assert!(TRUSTED_PUBLIC_IPFS_GATEWAYS.contains(&random_gateway()));
        }
    }

    #[tokio::test]
    async fn loads_folder_from_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thumbs.json");
        std::fs::write(&path, r#"{"thumb_folder_hash": "/ipfs/QmCached"}"#).unwrap();

        let resolver = ThumbnailResolver::new("http://localhost:5001", "k51", Some(path));
        assert_eq!(resolver.folder().await.as_deref(), Some("/ipfs/QmCached"));
        let url = resolver.folder_url().await.unwrap();
        assert!(url.ends_with("/ipfs/QmCached"));
    }

    #[tokio::test]
    async fn unresolved_folder_has_no_thumbnails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        let resolver = ThumbnailResolver::new("http://localhost:5001", "k51", Some(path));
        assert_eq!(resolver.folder().await, None);
        assert_eq!(resolver.thumb_url("abc123").await, None);
        assert_eq!(resolver.folder_url().await, None);
    }

    #[tokio::test]
    async fn saves_folder_to_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thumbs.json");

        let resolver = ThumbnailResolver::new("http://localhost:5001", "k51", Some(path.clone()));
        resolver.save_cache("/ipfs/QmSaved").await;
        assert_eq!(load_cached_folder(&path).as_deref(), Some("/ipfs/QmSaved"));
    }
}
