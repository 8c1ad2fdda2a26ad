//! Avatar storage under `<static-dir>/profile_pics`.
//!
//! Uploads are decoded, shrunk to fit the configured square bound (never
//! enlarged) and written under a random 16-hex-digit name that keeps the
//! uploaded extension.

use anyhow::{Context, anyhow};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::{RngCore, rngs::OsRng};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::forms::avatar_extension;

pub const DEFAULT_AVATAR: &str = "default.jpg";
const AVATAR_DIR: &str = "profile_pics";
const PLACEHOLDER_GREY: [u8; 3] = [0xdd, 0xdd, 0xdd];

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("file does not have an approved extension")]
    Extension,
    #[error("could not read image: {0}")]
    Decode(#[source] image::ImageError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Clone, Debug)]
pub struct AvatarStore {
    static_root: PathBuf,
    dir: PathBuf,
    size: u32,
}

impl AvatarStore {
    #[must_use]
    pub fn new(static_root: PathBuf, size: u32) -> Self {
        let dir = static_root.join(AVATAR_DIR);
        Self {
            static_root,
            dir,
            size,
        }
    }

    #[must_use]
    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the avatar directory and, when missing, a flat grey
    /// `default.jpg` placeholder for users without an upload.
    ///
    /// # Errors
    /// Returns an error if the directory or the placeholder cannot be written.
    pub async fn ensure_dir(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let path = self.dir.join(DEFAULT_AVATAR);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        let size = self.size;
        tokio::task::spawn_blocking(move || {
            RgbImage::from_pixel(size, size, Rgb(PLACEHOLDER_GREY))
                .save_with_format(&path, ImageFormat::Jpeg)
                .with_context(|| format!("failed to write {}", path.display()))
        })
        .await
        .context("placeholder task failed")??;

        debug!("Generated placeholder avatar");
        Ok(())
    }

    /// Store an uploaded image and return its new file name.
    ///
    /// # Errors
    /// `Extension` or `Decode` for unusable uploads, `Storage` when writing fails.
    pub async fn save(&self, original_name: &str, bytes: Vec<u8>) -> Result<String, AvatarError> {
        let extension = avatar_extension(original_name).ok_or(AvatarError::Extension)?;
        let format = if extension == "png" {
            ImageFormat::Png
        } else {
            ImageFormat::Jpeg
        };

        let mut random = [0u8; 8];
        OsRng
            .try_fill_bytes(&mut random)
            .context("failed to generate avatar name")?;
        let file_name = format!("{}.{extension}", hex::encode(random));
        let path = self.dir.join(&file_name);
        let size = self.size;

        tokio::task::spawn_blocking(move || -> Result<(), AvatarError> {
            let image = image::load_from_memory(&bytes).map_err(AvatarError::Decode)?;
            let image = if image.width() > size || image.height() > size {
                image.thumbnail(size, size)
            } else {
                image
            };
            // JPEG has no alpha channel.
            let image = match format {
                ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
                _ => image,
            };
            image
                .save_with_format(&path, format)
                .with_context(|| format!("failed to write {}", path.display()))?;
            Ok(())
        })
        .await
        .map_err(|err| AvatarError::Storage(anyhow!("avatar task failed: {err}")))??;

        debug!("Stored avatar {file_name}");
        Ok(file_name)
    }

    /// Best-effort removal of a replaced avatar. The default image is kept.
    pub async fn remove(&self, file_name: &str) {
        if file_name == DEFAULT_AVATAR
            || file_name.is_empty()
            || file_name.contains(['/', '\\'])
            || file_name.starts_with('.')
        {
            return;
        }
        match tokio::fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => debug!("Removed avatar {file_name}"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to remove avatar {file_name}: {err}"),
        }
    }
}
