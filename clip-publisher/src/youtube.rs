//! Publisher for the YouTube Data API using a resumable upload session.
//!
//! Two requests per clip: a JSON session request carrying the snippet and
//! status, then the file body sent to the session URL. The video resource
//! returned by the second request carries the platform id.

use std::path::Path;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use clip_publisher_core::contract::{PublishError, Publisher};
use reqwest::header::LOCATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::load_config::PublishSection;

/// Platform limit on title length, in characters.
const MAX_TITLE_CHARS: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoInsert {
    snippet: Snippet,
    status: Status,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    description: String,
    tags: Vec<String>,
    category_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    privacy_status: String,
    self_declared_made_for_kids: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    publish_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    #[serde(default)]
    id: Option<String>,
}

pub struct YouTubePublisher {
    http: Client,
    upload_endpoint: String,
    access_token: String,
    privacy_status: String,
    category_id: String,
    made_for_kids: bool,
    publish_delay_hours: Option<i64>,
}

impl YouTubePublisher {
    pub fn new(http: Client, section: &PublishSection, access_token: String) -> Self {
        let upload_endpoint = format!(
            "{}/upload/youtube/v3/videos",
            section.base_url.trim_end_matches('/')
        );
        info!(
            privacy_status = %section.privacy_status,
            publish_delay_hours = ?section.publish_delay_hours,
            "Initialized YouTubePublisher"
        );
        Self {
            http,
            upload_endpoint,
            access_token,
            privacy_status: section.privacy_status.clone(),
            category_id: section.category_id.clone(),
            made_for_kids: section.made_for_kids,
            publish_delay_hours: section.publish_delay_hours,
        }
    }

    fn video_insert(
        &self,
        title: &str,
        description: &str,
        tags: &[String],
    ) -> Result<VideoInsert, PublishError> {
        // Scheduled publishing requires the video to start out private.
        let (privacy_status, publish_at) = match self.publish_delay_hours {
            Some(hours) => {
                let at = TimeDelta::try_hours(hours)
                    .and_then(|delay| Utc::now().checked_add_signed(delay))
                    .ok_or_else(|| {
                        PublishError::InvalidRequest(format!(
                            "publish delay of {hours} hours is out of range"
                        ))
                    })?;
                ("private".to_string(), Some(at.format("%Y-%m-%dT%H:%M:%SZ").to_string()))
            }
            None => (self.privacy_status.clone(), None),
        };
        Ok(VideoInsert {
            snippet: Snippet {
                title: sanitize_title(title),
                description: strip_angle_brackets(description),
                tags: tags.iter().map(|t| strip_angle_brackets(t)).collect(),
                category_id: self.category_id.clone(),
            },
            status: Status {
                privacy_status,
                self_declared_made_for_kids: self.made_for_kids,
                publish_at,
            },
        })
    }
}

fn strip_angle_brackets(text: &str) -> String {
    text.chars().filter(|c| *c != '<' && *c != '>').collect()
}

fn sanitize_title(title: &str) -> String {
    strip_angle_brackets(title)
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}

#[async_trait]
impl Publisher for YouTubePublisher {
    async fn publish(
        &self,
        local_path: &Path,
        title: &str,
        description: &str,
        tags: &[String],
    ) -> Result<String, PublishError> {
        let content = tokio::fs::read(local_path)
            .await
            .map_err(|source| PublishError::Artifact {
                path: local_path.to_path_buf(),
                source,
            })?;
        let body = self.video_insert(title, description, tags)?;
        info!(
            file = %local_path.display(),
            bytes = content.len(),
            title = %body.snippet.title,
            "[PUBLISH] Opening upload session"
        );

        let session = self
            .http
            .post(&self.upload_endpoint)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(&self.access_token)
            .header("X-Upload-Content-Type", "video/*")
            .header("X-Upload-Content-Length", content.len().to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "[PUBLISH] Session request failed");
                PublishError::Request(e.to_string())
            })?;
        let status = session.status();
        if !status.is_success() {
            let text = session.text().await.unwrap_or_default();
            error!(status = %status, "[PUBLISH] Session request rejected. Response body: {text}");
            return Err(PublishError::Rejected(format!("{status}: {text}")));
        }
        let upload_url = session
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PublishError::Rejected("upload session has no Location header".to_string())
            })?;

        let resp = self
            .http
            .put(&upload_url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, "video/*")
            .body(content)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "[PUBLISH] Upload request failed");
                PublishError::Request(e.to_string())
            })?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!(status = %status, "[PUBLISH] Upload rejected. Response body: {text}");
            return Err(PublishError::Rejected(format!("{status}: {text}")));
        }

        let video: VideoResource = resp
            .json()
            .await
            .map_err(|e| PublishError::Request(format!("unreadable upload response: {e}")))?;
        match video.id.filter(|id| !id.trim().is_empty()) {
            Some(id) => {
                info!(video_id = %id, "[PUBLISH] Upload complete");
                Ok(id)
            }
            None => Err(PublishError::MissingPlatformId),
        }
    }
}
