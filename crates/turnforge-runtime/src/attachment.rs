// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Attachment ingestion (§4.4): summarises what came in with a turn and,
//! when enabled, downloads each attachment under the configured size cap.
use std::path::PathBuf;
use std::time::Duration;

use turnforge_config::AttachmentsConfig;
use turnforge_model::AttachmentRef;

use crate::error::RuntimeError;

pub struct AttachmentIngestor {
    config: AttachmentsConfig,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Default)]
pub struct AttachmentIngestResult {
    pub summary: String,
    pub downloaded_count: usize,
    pub stored_paths: Vec<PathBuf>,
}

impl AttachmentIngestor {
    pub fn new(config: AttachmentsConfig, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Summarises `attachments` and, if downloads are enabled, fetches each
    /// one under `max_bytes` into `storage_dir/session_id/turn_id/<safe name>`.
    pub async fn ingest(
        &self,
        session_id: &str,
        turn_id: &str,
        attachments: &[AttachmentRef],
    ) -> Result<AttachmentIngestResult, RuntimeError> {
        let total = attachments.len();
        let images = attachments
            .iter()
            .filter(|a| a.content_type.as_deref().unwrap_or("").starts_with("image/"))
            .count();
        let others = total - images;

        let summary = if total == 0 {
            "첨부파일 없음".to_string()
        } else {
            format!("첨부파일 {total}개 확인 (이미지 {images}개, 기타 {others}개)")
        };

        let mut result = AttachmentIngestResult {
            summary,
            downloaded_count: 0,
            stored_paths: Vec::new(),
        };

        if !self.config.download_enabled {
            return Ok(result);
        }

        let turn_dir = self.config.storage_dir.join(session_id).join(turn_id);
        for attachment in attachments {
            if attachment.size > self.config.max_bytes {
                continue;
            }
            let safe_name = sanitize_filename(&attachment.filename);
            let dest = turn_dir.join(&safe_name);
            let bytes = self.download(&attachment.url).await?;
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RuntimeError::Configuration(format!(
                        "cannot create attachment directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
            std::fs::write(&dest, &bytes).map_err(|e| {
                RuntimeError::Configuration(format!("cannot write attachment {}: {e}", dest.display()))
            })?;
            result.stored_paths.push(dest);
            result.downloaded_count += 1;
        }

        Ok(result)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, RuntimeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RuntimeError::UpstreamTransient(format!("attachment fetch failed: {e}")))?;
        if response.status().is_server_error() {
            return Err(RuntimeError::UpstreamTransient(format!(
                "attachment fetch returned {}",
                response.status()
            )));
        }
        response
            .error_for_status()
            .map_err(|e| RuntimeError::UpstreamTransient(format!("attachment fetch failed: {e}")))?
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| RuntimeError::UpstreamTransient(format!("attachment fetch failed: {e}")))
    }
}

/// Replaces `..`, `/` and `\` with `_` so a malicious filename can't escape
/// `storage_dir/<session>/<turn>/`.
fn sanitize_filename(name: &str) -> String {
    name.replace("..", "_").replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(content_type: &str, size: u64) -> AttachmentRef {
        AttachmentRef {
            attachment_id: "a1".into(),
            filename: "file.png".into(),
            content_type: Some(content_type.into()),
            size,
            url: "http://example.invalid/file.png".into(),
        }
    }

    #[test]
    fn sanitize_filename_strips_traversal_and_separators() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.___etc_passwd");
        assert_eq!(sanitize_filename("a\\b/c"), "a_b_c");
        assert_eq!(sanitize_filename("plain.txt"), "plain.txt");
    }

    #[tokio::test]
    async fn summary_counts_images_and_others() {
        let config = AttachmentsConfig {
            download_enabled: false,
            max_bytes: 1024,
            storage_dir: PathBuf::from("/tmp/turnforge-test-attachments"),
        };
        let ingestor = AttachmentIngestor::new(config, Duration::from_secs(5));
        let attachments = vec![attachment("image/png", 10), attachment("text/plain", 10)];
        let result = ingestor.ingest("s1", "t1", &attachments).await.unwrap();
        assert!(result.summary.contains('2'));
        assert_eq!(result.downloaded_count, 0);
    }

    #[tokio::test]
    async fn no_attachments_yields_zero_summary() {
        let config = AttachmentsConfig {
            download_enabled: false,
            max_bytes: 1024,
            storage_dir: PathBuf::from("/tmp/turnforge-test-attachments"),
        };
        let ingestor = AttachmentIngestor::new(config, Duration::from_secs(5));
        let result = ingestor.ingest("s1", "t1", &[]).await.unwrap();
        assert_eq!(result.downloaded_count, 0);
    }
}
