use std::env;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlobBackend {
    /// Files under `upload_dir`, served back by this process.
    Local,
    /// S3-compatible object storage reached over HTTP.
    Http,
}

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub session_ttl_days: i64,
    pub public_url: String,
    pub upload_dir: String,
    pub max_upload_bytes: u64,
    pub blob_backend: BlobBackend,
    pub blob_endpoint: String,
    pub blob_bucket: String,
    pub blob_token: Option<String>,
    pub blob_public_url: String,
    pub avatar_base_url: String,
    pub global_conversation_id: String,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let public_url =
            env::var("PUBLIC_URL").unwrap_or_else(|_| format!("http://localhost:{}", port));

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./messenger.db".into()),
            session_ttl_days: env::var("SESSION_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into()),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5 * 1_048_576), // 5MB
            blob_backend: match env::var("BLOB_BACKEND").as_deref() {
                Ok("http") | Ok("s3") => BlobBackend::Http,
                _ => BlobBackend::Local,
            },
            blob_endpoint: env::var("BLOB_ENDPOINT").unwrap_or_default(),
            blob_bucket: env::var("BLOB_BUCKET").unwrap_or_default(),
            blob_token: env::var("BLOB_TOKEN").ok().filter(|t| !t.is_empty()),
            blob_public_url: env::var("BLOB_PUBLIC_URL").unwrap_or_default(),
            avatar_base_url: env::var("AVATAR_BASE_URL")
                .unwrap_or_else(|_| "https://api.dicebear.com/9.x".into()),
            global_conversation_id: env::var("GLOBAL_CONVERSATION_ID")
                .unwrap_or_else(|_| "global".into()),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            public_url,
        }
    }
}
