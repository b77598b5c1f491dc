use chrono::Utc;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info};

use crate::{error::AppError, types::FeedbackRequest};

/// One JSON file per feedback submission, named after the second it was
/// written. Files are created exclusively, so a second submission within
/// the same second gets a `_<n>` suffix instead of replacing the first.
#[derive(Clone, Debug)]
pub struct FeedbackStore {
    dir: PathBuf,
}

impl FeedbackStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn save(&self, feedback: &FeedbackRequest) -> Result<PathBuf, AppError> {
        fs::create_dir_all(&self.dir).await?;

        let contents = serde_json::to_vec(feedback)?;
        let stem = format!("feedback_{}", Utc::now().format("%Y%m%d_%H%M%S"));

        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{attempt}.json")
            };
            let path = self.dir.join(name);

            match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    file.write_all(&contents).await?;
                    file.flush().await?;
                    info!("Feedback saved to {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{} already exists, trying next suffix", path.display());
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
