//! GitLab REST client implementing the fetcher facade.
//!
//! Transient upstream failures (transport errors, 5xx) are retried here
//! with a short backoff; the engine only ever sees `fetch_failed` after
//! retries are exhausted. 404 on file reads maps to `file_not_found` so
//! the engine can distinguish a missing file from a broken platform.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use mergeguard_core::{ChangeFetcher, FetchError, FetchResult, FileChange, ReviewActions};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: Client,
    base: Url,
    token: String,
}

#[derive(Debug, Deserialize)]
struct GitLabChange {
    #[serde(default)]
    old_path: String,
    #[serde(default)]
    new_path: String,
    #[serde(default)]
    new_file: bool,
    #[serde(default)]
    renamed_file: bool,
    #[serde(default)]
    deleted_file: bool,
    #[serde(default)]
    diff: String,
}

#[derive(Debug, Deserialize)]
struct ChangesResponse {
    #[serde(default)]
    changes: Vec<GitLabChange>,
}

#[derive(Debug, Deserialize)]
struct DiffRefs {
    base_sha: String,
    head_sha: String,
}

#[derive(Debug, Deserialize)]
struct MergeRequestResponse {
    diff_refs: DiffRefs,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let base = Url::parse(base_url)?;
        Ok(Self {
            http,
            base,
            token: token.into(),
        })
    }

    fn api_url(&self, segments: &[&str]) -> FetchResult<Url> {
        let mut url = self.base.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|_| FetchError::Failed("gitlab base url cannot be a base".into()))?;
            parts.pop_if_empty();
            parts.extend(["api", "v4"]);
            // `push` percent-encodes, so repository paths with slashes are
            // safe to pass as single segments.
            parts.extend(segments);
        }
        Ok(url)
    }

    /// GET with retry on transport errors and 5xx responses.
    async fn get_with_retry(&self, url: Url) -> FetchResult<reqwest::Response> {
        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let result = self
                .http
                .get(url.clone())
                .header("PRIVATE-TOKEN", &self.token)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_server_error() => {
                    last_error = format!("upstream returned {}", response.status());
                }
                Ok(response) => return Ok(response),
                Err(err) => last_error = err.to_string(),
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
        }
        Err(FetchError::Failed(last_error))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> FetchResult<T> {
        let response = self.get_with_retry(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Failed(format!("upstream returned {status}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| FetchError::Failed(format!("invalid upstream response: {err}")))
    }

    async fn merge_request(&self, project: u64, mr: u64) -> FetchResult<MergeRequestResponse> {
        let url = self.api_url(&[
            "projects",
            &project.to_string(),
            "merge_requests",
            &mr.to_string(),
        ])?;
        self.get_json(url).await
    }

    async fn post(&self, url: Url, body: Option<serde_json::Value>) -> FetchResult<()> {
        let mut request = self.http.post(url).header("PRIVATE-TOKEN", &self.token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|err| FetchError::Failed(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(FetchError::Failed(format!("upstream returned {status}")))
        }
    }
}

impl ChangeFetcher for GitLabClient {
    async fn changes(&self, project: u64, mr: u64) -> FetchResult<Vec<FileChange>> {
        let url = self.api_url(&[
            "projects",
            &project.to_string(),
            "merge_requests",
            &mr.to_string(),
            "changes",
        ])?;
        let response: ChangesResponse = self.get_json(url).await?;
        Ok(response
            .changes
            .into_iter()
            .map(|c| FileChange {
                old_path: c.old_path,
                new_path: c.new_path,
                new_file: c.new_file,
                renamed: c.renamed_file,
                deleted: c.deleted_file,
                diff: c.diff,
            })
            .collect())
    }

    async fn file_content(&self, project: u64, revision: &str, path: &str) -> FetchResult<String> {
        let mut url = self.api_url(&[
            "projects",
            &project.to_string(),
            "repository",
            "files",
            path,
            "raw",
        ])?;
        url.query_pairs_mut().append_pair("ref", revision);

        let response = self.get_with_retry(url).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(FetchError::NotFound {
                path: path.to_string(),
                revision: revision.to_string(),
            }),
            status if !status.is_success() => {
                Err(FetchError::Failed(format!("upstream returned {status}")))
            }
            _ => response
                .text()
                .await
                .map_err(|err| FetchError::Failed(err.to_string())),
        }
    }

    async fn source_revision(&self, project: u64, mr: u64) -> FetchResult<String> {
        Ok(self.merge_request(project, mr).await?.diff_refs.head_sha)
    }

    async fn target_revision(&self, project: u64, mr: u64) -> FetchResult<String> {
        Ok(self.merge_request(project, mr).await?.diff_refs.base_sha)
    }
}

impl ReviewActions for GitLabClient {
    async fn post_comment(&self, project: u64, mr: u64, body: &str) -> FetchResult<()> {
        let url = self.api_url(&[
            "projects",
            &project.to_string(),
            "merge_requests",
            &mr.to_string(),
            "notes",
        ])?;
        self.post(url, Some(serde_json::json!({ "body": body }))).await
    }

    async fn approve(&self, project: u64, mr: u64) -> FetchResult<()> {
        let url = self.api_url(&[
            "projects",
            &project.to_string(),
            "merge_requests",
            &mr.to_string(),
            "approve",
        ])?;
        self.post(url, None).await
    }

    async fn reset_approval(&self, project: u64, mr: u64) -> FetchResult<()> {
        let url = self.api_url(&[
            "projects",
            &project.to_string(),
            "merge_requests",
            &mr.to_string(),
            "unapprove",
        ])?;
        self.post(url, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_percent_encodes_repository_paths() {
        let client = GitLabClient::new("https://gitlab.example.com", "token").unwrap();
        let url = client
            .api_url(&["projects", "42", "repository", "files", "a/b/product.yaml", "raw"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gitlab.example.com/api/v4/projects/42/repository/files/a%2Fb%2Fproduct.yaml/raw"
        );
    }

    #[test]
    fn changes_response_deserializes_platform_fields() {
        let json = r#"{
            "changes": [{
                "old_path": "product.yaml",
                "new_path": "product.yaml",
                "new_file": false,
                "renamed_file": false,
                "deleted_file": false,
                "diff": "@@ -1,1 +1,1 @@\n-a\n+b\n"
            }]
        }"#;
        let parsed: ChangesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.changes.len(), 1);
        assert_eq!(parsed.changes[0].new_path, "product.yaml");
    }

    #[test]
    fn merge_request_response_reads_diff_refs() {
        let json = r#"{"diff_refs": {"base_sha": "b", "head_sha": "h", "start_sha": "s"}}"#;
        let parsed: MergeRequestResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.diff_refs.base_sha, "b");
        assert_eq!(parsed.diff_refs.head_sha, "h");
    }
}
