use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub enum ImageHostConfig {
    Cloudinary {
        cloud_name: String,
        upload_preset: String,
    },
    Local {
        dir: String,
        public_base_url: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub max_concurrent_requests: usize,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
    pub image_host: ImageHostConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("APP_PORT").unwrap_or(5000);
        let max_concurrent_requests = parse_limit(env::var("MAX_CONCURRENT_REQUESTS").ok(), 100);
        let max_upload_bytes =
            parse_limit(env::var("MAX_UPLOAD_BYTES").ok(), 10 * 1024 * 1024);
        let cors_origins = env::var("CORS_ORIGINS")
            .map(|origins| split_list(&origins))
            .unwrap_or_default();

        let image_host = match (
            env::var("CLOUDINARY_CLOUD_NAME"),
            env::var("CLOUDINARY_UPLOAD_PRESET"),
        ) {
            (Ok(cloud_name), Ok(upload_preset)) => ImageHostConfig::Cloudinary {
                cloud_name,
                upload_preset,
            },
            _ => ImageHostConfig::Local {
                dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
                public_base_url: env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| format!("http://{host}:{port}")),
            },
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            max_concurrent_requests,
            max_upload_bytes,
            cors_origins,
            image_host,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// A zero limit would stall every request, so it falls back to the default.
fn parse_limit(raw: Option<String>, default: usize) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
