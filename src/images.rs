//! Image hosting seam. Product handlers only ever see [`ImageHost`].

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, multipart};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::ImageHostConfig;

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store the image and return its public URL.
    async fn upload(&self, image: Vec<u8>) -> anyhow::Result<String>;
}

pub fn from_config(config: &ImageHostConfig) -> Box<dyn ImageHost> {
    match config {
        ImageHostConfig::Cloudinary {
            cloud_name,
            upload_preset,
        } => Box::new(CloudinaryHost::new(cloud_name, upload_preset)),
        ImageHostConfig::Local {
            dir,
            public_base_url,
        } => Box::new(LocalImageHost::new(dir, public_base_url)),
    }
}

/// Upload every image, dropping the ones the host rejects. Survivors keep
/// their relative order.
pub async fn upload_all(host: &dyn ImageHost, images: Vec<Vec<u8>>) -> Vec<String> {
    let results = join_all(images.into_iter().map(|image| host.upload(image))).await;
    results
        .into_iter()
        .enumerate()
        .filter_map(|(index, result)| match result {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!(index, error = %err, "additional image upload failed, skipping");
                None
            }
        })
        .collect()
}

pub struct CloudinaryHost {
    client: Client,
    endpoint: String,
    upload_preset: String,
}

#[derive(Deserialize, Debug)]
struct CloudinaryResponse {
    secure_url: Option<String>,
    error: Option<CloudinaryError>,
}

#[derive(Deserialize, Debug)]
struct CloudinaryError {
    message: String,
}

impl CloudinaryHost {
    pub fn new(cloud_name: &str, upload_preset: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("https://api.cloudinary.com/v1_1/{cloud_name}/image/upload"),
            upload_preset: upload_preset.to_string(),
        }
    }
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, image: Vec<u8>) -> anyhow::Result<String> {
        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(image).file_name(format!("{}.bin", Uuid::new_v4())),
            )
            .text("upload_preset", self.upload_preset.clone());

        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .context("image host unreachable")?;
        let status = resp.status();
        let body: CloudinaryResponse = resp.json().await?;
        match (body.secure_url, body.error) {
            (Some(url), _) => Ok(url),
            (None, Some(err)) => Err(anyhow!("HTTP {status}: {}", err.message)),
            (None, None) => Err(anyhow!("HTTP {status}: no url in upload response")),
        }
    }
}

/// Writes images under a directory served at `/uploads`.
pub struct LocalImageHost {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalImageHost {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl ImageHost for LocalImageHost {
    async fn upload(&self, image: Vec<u8>) -> anyhow::Result<String> {
        if image.is_empty() {
            return Err(anyhow!("empty image"));
        }
        let filename = format!("{}.{}", Uuid::now_v7(), sniff_extension(&image));
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&filename), image).await?;
        Ok(format!("{}/uploads/{filename}", self.public_base_url))
    }
}

fn sniff_extension(image: &[u8]) -> &'static str {
    match image {
        [0x89, b'P', b'N', b'G', ..] => "png",
        [0xFF, 0xD8, 0xFF, ..] => "jpg",
        [b'G', b'I', b'F', b'8', ..] => "gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "webp",
        _ => "bin",
    }
}
