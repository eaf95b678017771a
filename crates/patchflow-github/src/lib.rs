use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use patchflow_core::HostConfig;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Extensions excluded from tree listings; the pipeline only ever feeds
/// text files to the generator.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "bmp", "webp", "pdf", "zip", "gz", "tar", "jar", "class",
    "wasm", "exe", "dll", "so", "dylib", "woff", "woff2", "ttf", "eot", "mp3", "mp4", "mov",
    "avi", "webm", "sqlite", "db", "bin", "lockb",
];

#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub size: u64,
    pub sha: String,
}

#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub path: String,
    pub content: String,
    pub sha: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct CommitRef {
    pub sha: String,
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("missing host token: set {0}")]
    MissingToken(String),
    /// The expected content hash is stale: someone else committed first.
    #[error("conflict writing {path}: {message}")]
    Conflict { path: String, message: String },
    #[error("host rejected the write: {0}")]
    Validation(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("host request failed (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("host transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("undecodable content for {0}")]
    Decode(String),
}

impl HostError {
    /// Coarse class used when surfacing host failures through the pipeline
    /// error taxonomy.
    pub fn kind(&self) -> &'static str {
        match self {
            HostError::MissingToken(_) => "configuration",
            HostError::Conflict { .. } => "conflict",
            HostError::Validation(_) => "validation",
            HostError::Permission(_) => "permission",
            HostError::NotFound(_) => "not_found",
            HostError::Api { .. } => "api",
            HostError::Transport(_) => "transport",
            HostError::Decode(_) => "decode",
        }
    }
}

pub struct HostClient {
    cfg: HostConfig,
    client: Client,
}

impl HostClient {
    pub fn new(cfg: HostConfig) -> Result<Self, HostError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()?;
        Ok(Self { cfg, client })
    }

    /// Recursive tree listing filtered to size-bounded, non-binary blobs,
    /// optionally restricted to a path prefix.
    pub fn list_tree(
        &self,
        owner: &str,
        name: &str,
        git_ref: &str,
        path_prefix: Option<&str>,
    ) -> Result<Vec<TreeEntry>, HostError> {
        let url = format!(
            "{}/repos/{owner}/{name}/git/trees/{git_ref}?recursive=1",
            self.cfg.api_base
        );
        let body = self.get(&url)?;
        let value: Value =
            serde_json::from_str(&body).map_err(|_| HostError::Decode("tree listing".into()))?;
        let nodes = value
            .get("tree")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut entries = Vec::new();
        for node in nodes {
            if node.get("type").and_then(Value::as_str) != Some("blob") {
                continue;
            }
            let path = node
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let size = node.get("size").and_then(Value::as_u64).unwrap_or(0);
            let sha = node
                .get("sha")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if keep_tree_entry(&path, size, self.cfg.max_file_bytes, path_prefix) {
                entries.push(TreeEntry { path, size, sha });
            }
        }
        Ok(entries)
    }

    pub fn read_file(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<RemoteFile, HostError> {
        let url = format!(
            "{}/repos/{owner}/{name}/contents/{path}?ref={git_ref}",
            self.cfg.api_base
        );
        let body = self.get(&url)?;
        let value: Value =
            serde_json::from_str(&body).map_err(|_| HostError::Decode(path.to_string()))?;
        let encoded = value
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let content = decode_base64_content(encoded)
            .ok_or_else(|| HostError::Decode(path.to_string()))?;
        Ok(RemoteFile {
            path: path.to_string(),
            sha: value
                .get("sha")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            size: value.get("size").and_then(Value::as_u64).unwrap_or(0),
            content,
        })
    }

    /// Commits one file. `expected_sha` is the optimistic-concurrency key:
    /// a stale value fails distinctly with `Conflict`.
    pub fn write_file(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        content: &str,
        message: &str,
        expected_sha: Option<&str>,
        branch: &str,
    ) -> Result<CommitRef, HostError> {
        let token = self
            .cfg
            .resolve_token()
            .ok_or_else(|| HostError::MissingToken(self.cfg.token_env.clone()))?;
        let url = format!("{}/repos/{owner}/{name}/contents/{path}", self.cfg.api_base);
        let mut payload = json!({
            "message": message,
            "content": BASE64.encode(content),
            "branch": branch,
        });
        if let Some(sha) = expected_sha {
            payload["sha"] = json!(sha);
        }

        let resp = self
            .client
            .put(&url)
            .bearer_auth(token)
            .header("User-Agent", &self.cfg.user_agent)
            .json(&payload)
            .send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(classify_write_status(status, path, &body));
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|_| HostError::Decode(path.to_string()))?;
        let sha = value
            .pointer("/commit/sha")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(CommitRef { sha })
    }

    fn get(&self, url: &str) -> Result<String, HostError> {
        let token = self
            .cfg
            .resolve_token()
            .ok_or_else(|| HostError::MissingToken(self.cfg.token_env.clone()))?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("User-Agent", &self.cfg.user_agent)
            .send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(classify_read_status(status, url, &body));
        }
        Ok(body)
    }
}

fn classify_read_status(status: StatusCode, what: &str, body: &str) -> HostError {
    match status {
        StatusCode::NOT_FOUND => HostError::NotFound(what.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            HostError::Permission(extract_message(body))
        }
        _ => HostError::Api {
            status: status.as_u16(),
            message: extract_message(body),
        },
    }
}

fn classify_write_status(status: StatusCode, path: &str, body: &str) -> HostError {
    match status {
        StatusCode::CONFLICT => HostError::Conflict {
            path: path.to_string(),
            message: extract_message(body),
        },
        StatusCode::UNPROCESSABLE_ENTITY => HostError::Validation(extract_message(body)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            HostError::Permission(extract_message(body))
        }
        StatusCode::NOT_FOUND => HostError::NotFound(path.to_string()),
        _ => HostError::Api {
            status: status.as_u16(),
            message: extract_message(body),
        },
    }
}

fn extract_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn keep_tree_entry(path: &str, size: u64, max_bytes: u64, prefix: Option<&str>) -> bool {
    if path.is_empty() || size > max_bytes {
        return false;
    }
    if is_probably_binary(path) {
        return false;
    }
    match prefix {
        Some(prefix) => path.starts_with(prefix.trim_start_matches('/')),
        None => true,
    }
}

fn is_probably_binary(path: &str) -> bool {
    path.rsplit('.')
        .next()
        .map(|ext| BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// GitHub returns base64 with embedded newlines; strip whitespace first.
fn decode_base64_content(encoded: &str) -> Option<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64.decode(compact).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_statuses_map_to_distinct_errors() {
        let conflict = classify_write_status(StatusCode::CONFLICT, "src/lib.rs", "{}");
        assert!(matches!(conflict, HostError::Conflict { .. }));
        assert_eq!(conflict.kind(), "conflict");

        let validation = classify_write_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            "src/lib.rs",
            r#"{"message": "sha mismatch"}"#,
        );
        assert!(matches!(validation, HostError::Validation(m) if m == "sha mismatch"));

        let permission = classify_write_status(StatusCode::FORBIDDEN, "src/lib.rs", "{}");
        assert_eq!(permission.kind(), "permission");
    }

    #[test]
    fn tree_filter_drops_binary_oversized_and_out_of_prefix_entries() {
        assert!(keep_tree_entry("src/lib.rs", 100, 1000, None));
        assert!(!keep_tree_entry("logo.png", 100, 1000, None));
        assert!(!keep_tree_entry("src/huge.rs", 2000, 1000, None));
        assert!(keep_tree_entry("src/lib.rs", 100, 1000, Some("/src")));
        assert!(!keep_tree_entry("docs/guide.md", 100, 1000, Some("/src")));
    }

    #[test]
    fn decodes_wrapped_base64_content() {
        let encoded = "aGVsbG8g\nd29ybGQ=\n";
        assert_eq!(
            decode_base64_content(encoded).expect("decoded"),
            "hello world"
        );
        assert!(decode_base64_content("!!not base64!!").is_none());
    }

    #[test]
    fn binary_detection_is_case_insensitive_and_extension_based() {
        assert!(is_probably_binary("assets/logo.PNG"));
        assert!(is_probably_binary("bun.lockb"));
        assert!(!is_probably_binary("src/main.rs"));
        assert!(!is_probably_binary("Makefile"));
    }
}
