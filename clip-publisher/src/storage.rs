//! Object storage adapter: lists and downloads clips from a Cloud Storage bucket
//! through its JSON API.
//!
//! Implements both [`CandidateSource`] and [`ContentFetcher`]. Authentication
//! is a bearer access token supplied by the caller; obtaining or refreshing it
//! is not this module's job.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use clip_publisher_core::contract::{
    Candidate, CandidateSource, ContentFetcher, FetchError, ListError,
};
use clip_publisher_core::selector::has_media_extension;
use futures::StreamExt;
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::load_config::StorageSection;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
    /// The API encodes 64-bit sizes as strings.
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    updated: Option<String>,
}

pub struct StorageClient {
    http: Client,
    base_url: Url,
    bucket: String,
    prefix: Option<String>,
    extensions: Vec<String>,
    work_dir: PathBuf,
    access_token: String,
}

impl StorageClient {
    /// Builds the client and makes sure the work directory exists.
    pub fn new(
        http: Client,
        section: &StorageSection,
        access_token: String,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(&section.base_url)
            .with_context(|| format!("Invalid storage.base_url {:?}", section.base_url))?;
        let work_dir = section.work_dir();
        std::fs::create_dir_all(&work_dir)
            .with_context(|| format!("Failed to create work dir {}", work_dir.display()))?;
        info!(
            bucket = %section.bucket,
            work_dir = %work_dir.display(),
            "Initialized StorageClient"
        );
        Ok(Self {
            http,
            base_url,
            bucket: section.bucket.clone(),
            prefix: section.prefix.clone(),
            extensions: section.extensions.clone(),
            work_dir,
            access_token,
        })
    }

    fn object_url(&self, segments: &[&str]) -> Result<Url, String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| format!("storage base url {} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", self.bucket.as_str(), "o"])
            .extend(segments);
        Ok(url)
    }

    /// Local destination for `item_id`: unique per fetch, keeping the file name.
    fn local_path_for(&self, item_id: &str) -> PathBuf {
        let file_name = Path::new(item_id)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("clip");
        self.work_dir
            .join(format!("{}-{}", uuid::Uuid::new_v4().simple(), file_name))
    }
}

#[async_trait]
impl CandidateSource for StorageClient {
    async fn list_candidates(&self) -> Result<Vec<Candidate>, ListError> {
        let url = self.object_url(&[]).map_err(ListError::Request)?;
        let mut candidates = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut request = self
                .http
                .get(url.clone())
                .bearer_auth(&self.access_token)
                .query(&[("fields", "items(name,size,updated),nextPageToken")]);
            if let Some(prefix) = &self.prefix {
                request = request.query(&[("prefix", prefix)]);
            }
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let resp = request.send().await.map_err(|e| {
                error!(error = ?e, bucket = %self.bucket, "[STORAGE] List request failed");
                ListError::Request(e.to_string())
            })?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                error!(
                    status = %status,
                    bucket = %self.bucket,
                    "[STORAGE] List returned error. Response body: {body}"
                );
                return Err(ListError::Request(format!("{status}: {body}")));
            }
            let page: ObjectList = resp
                .json()
                .await
                .map_err(|e| ListError::Decode(e.to_string()))?;
            pages += 1;

            candidates.extend(
                page.items
                    .into_iter()
                    .filter(|o| has_media_extension(&o.name, &self.extensions))
                    .map(|o| Candidate {
                        size: o.size.as_deref().and_then(|s| s.parse().ok()),
                        updated: o.updated,
                        item_id: o.name,
                    }),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        info!(
            bucket = %self.bucket,
            pages,
            candidates = candidates.len(),
            "[STORAGE] Listed media objects"
        );
        Ok(candidates)
    }
}

#[async_trait]
impl ContentFetcher for StorageClient {
    async fn fetch(&self, item_id: &str) -> Result<PathBuf, FetchError> {
        let download_err = |reason: String| FetchError::Download {
            item_id: item_id.to_string(),
            reason,
            partial: None,
        };
        let io_err = |source: std::io::Error| FetchError::Io {
            item_id: item_id.to_string(),
            partial: None,
            source,
        };

        let mut url = self.object_url(&[item_id]).map_err(download_err)?;
        url.query_pairs_mut().append_pair("alt", "media");

        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(download_err(format!("{status}: {body}")));
        }

        // Stream into a temp file in the work dir; it is deleted on drop unless persisted.
        let staging = tempfile::NamedTempFile::new_in(&self.work_dir).map_err(io_err)?;
        let mut file = tokio::fs::File::from_std(staging.reopen().map_err(io_err)?);
        let mut stream = resp.bytes_stream();
        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_err(e.to_string()))?;
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len();
        }
        file.flush().await.map_err(io_err)?;
        drop(file);

        let local_path = self.local_path_for(item_id);
        staging
            .persist(&local_path)
            .map_err(|e| io_err(e.error))?;
        debug!(
            item_id = %item_id,
            bytes = written,
            path = %local_path.display(),
            "[STORAGE] Downloaded object"
        );
        Ok(local_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str, work_dir: &Path) -> StorageClient {
        let section = StorageSection {
            bucket: "my-clips".to_string(),
            prefix: None,
            extensions: vec![".mp4".to_string()],
            work_dir: Some(work_dir.to_path_buf()),
            base_url: base_url.to_string(),
        };
        StorageClient::new(Client::new(), &section, "token".to_string()).unwrap()
    }

    #[test]
    fn object_url_encodes_nested_names() {
        let dir = tempfile::tempdir().unwrap();
        let client = client("https://storage.googleapis.com", dir.path());
        let url = client.object_url(&["shorts/otter jump.mp4"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/my-clips/o/shorts%2Fotter%20jump.mp4"
        );
    }

    #[test]
    fn list_url_has_no_trailing_segment() {
        let dir = tempfile::tempdir().unwrap();
        let client = client("http://localhost:4443/", dir.path());
        let url = client.object_url(&[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4443/storage/v1/b/my-clips/o");
    }

    #[test]
    fn local_path_keeps_file_name_and_is_unique() {
        let dir = tempfile::tempdir().unwrap();
        let client = client("https://storage.googleapis.com", dir.path());
        let a = client.local_path_for("shorts/otter.mp4");
        let b = client.local_path_for("shorts/otter.mp4");
        assert_ne!(a, b);
        assert!(a.starts_with(dir.path()));
        assert!(a.file_name().unwrap().to_str().unwrap().ends_with("-otter.mp4"));
    }

    #[test]
    fn object_list_parses_api_shape() {
        let json = r#"{
            "kind": "storage#objects",
            "nextPageToken": "abc",
            "items": [{"name": "a.mp4", "size": "1024", "updated": "2026-01-01T00:00:00Z", "bucket": "x"}]
        }"#;
        let list: ObjectList = serde_json::from_str(json).unwrap();
        assert_eq!(list.next_page_token.as_deref(), Some("abc"));
        assert_eq!(list.items[0].name, "a.mp4");
        assert_eq!(list.items[0].size.as_deref(), Some("1024"));
    }

    #[test]
    fn empty_bucket_listing_has_no_items_field() {
        let list: ObjectList = serde_json::from_str(r#"{"kind": "storage#objects"}"#).unwrap();
        assert!(list.items.is_empty());
        assert!(list.next_page_token.is_none());
    }
}
