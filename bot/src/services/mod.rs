pub mod command_service;
pub mod discord_service;
pub mod elasticsearch_service;
pub mod query_builder;
pub mod search_service;
pub mod session;
pub mod stats_service;
pub mod thumbnail_service;
