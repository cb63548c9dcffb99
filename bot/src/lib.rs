pub mod api;
pub mod config;
pub mod embeds;
pub mod models;
pub mod services;
pub mod utils;

use ed25519_dalek::VerifyingKey;
use services::command_service::CommandContext;
use services::elasticsearch_service::ElasticBackend;
use services::search_service::ArchiveDatabase;
use services::session::PendingChoices;
use services::thumbnail_service::ThumbnailResolver;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::JobScheduler;

pub struct AppState {
    pub db: ArchiveDatabase<ElasticBackend>,
    pub thumbnails: Option<Arc<ThumbnailResolver>>,
    pub choices: PendingChoices,
    pub public_key: VerifyingKey,
    /// Held so the thumbnail refresh job lives as long as the server.
    pub scheduler: Mutex<Option<JobScheduler>>,
}

impl AppState {
    pub fn commands(&self) -> CommandContext<'_, ElasticBackend> {
        CommandContext {
            db: &self.db,
            thumbnails: self.thumbnails.as_deref(),
            choices: &self.choices,
        }
    }
}
