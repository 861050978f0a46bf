//! Multipart form staging.
//!
//! Text fields are kept in memory; file parts are streamed to the upload
//! directory under a random name so concurrent uploads never collide.
//! Handlers call [`MultipartForm::cleanup`] once they are done, whether or
//! not the staged files were uploaded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::media::remove_staged_file;

#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, PathBuf>,
}

impl MultipartForm {
    /// Reads every part of `multipart`, staging files under `upload_dir`.
    ///
    /// On error, files staged so far are removed before returning.
    pub async fn parse(multipart: Multipart, upload_dir: &Path) -> ApiResult<Self> {
        let mut form = MultipartForm::default();

        match form.read_parts(multipart, upload_dir).await {
            Ok(()) => Ok(form),
            Err(e) => {
                form.cleanup().await;
                Err(e)
            }
        }
    }

    async fn read_parts(&mut self, mut multipart: Multipart, upload_dir: &Path) -> ApiResult<()> {
        while let Some(mut field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            let file_name = field.file_name().map(sanitize_file_name);
            match file_name {
                // browsers send an empty file part when nothing was picked
                Some(file_name) if !file_name.is_empty() => {
                    tokio::fs::create_dir_all(upload_dir).await?;
                    let path = upload_dir.join(format!("{}-{}", Uuid::new_v4(), file_name));

                    // register before writing so a failed write is still cleaned up
                    if let Some(previous) = self.files.insert(name.clone(), path.clone()) {
                        remove_staged_file(&previous).await;
                    }

                    let mut file = tokio::fs::File::create(&path).await?;
                    let mut size = 0usize;
                    while let Some(chunk) = field.chunk().await? {
                        size += chunk.len();
                        file.write_all(&chunk).await?;
                    }
                    file.flush().await?;

                    debug!(field = %name, path = %path.display(), size, "Staged upload");
                }
                Some(_) => {}
                None => {
                    let value = field.text().await?;
                    self.fields.insert(name, value);
                }
            }
        }

        Ok(())
    }

    /// A text field, or `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// The staged path of a file field.
    pub fn file(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    /// Removes every staged file that is still on disk.
    pub async fn cleanup(&self) {
        for path in self.files.values() {
            remove_staged_file(path).await;
        }
    }
}

/// Keeps the final path component and replaces anything unusual.
fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\my video.mov"), "my_video.mov");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "");
    }
}
