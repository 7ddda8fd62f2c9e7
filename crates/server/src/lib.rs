pub mod blob;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

use blob::BlobStore;
use config::Config;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub blobs: BlobStore,
}
