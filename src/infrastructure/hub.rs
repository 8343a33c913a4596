//! Hugging Face Hub 数据集仓库客户端
//!
//! ## 接口
//! - `GET  /api/datasets/{repo}/revision/{rev}` - 取当前提交 sha
//! - `GET  /datasets/{repo}/resolve/{sha}/{path}` - 读取文件
//! - `POST /api/datasets/{repo}/preupload/{rev}` - 判断普通文件还是 LFS 文件
//! - `POST /datasets/{repo}.git/info/lfs/objects/batch` - LFS 上传地址
//! - `POST /api/datasets/{repo}/commit/{rev}` - NDJSON 提交，`parentCommit` 作为乐观锁

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{ObjectStore, Snapshot};
use crate::config::Config;
use crate::error::UploadError;

/// preupload 接口只需要文件开头的样本
const PREUPLOAD_SAMPLE_BYTES: usize = 512;

const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";

/// 文件的上传方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CommitOperation {
    /// 内容以 base64 内联在提交中
    Inline { content: String },
    /// 内容已上传到 LFS，提交中只写指针
    Lfs { oid: String, size: usize },
}

#[derive(Debug, Deserialize)]
struct RevisionInfo {
    sha: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadFile {
    path: String,
    upload_mode: String,
}

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadFile>,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LfsError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    #[serde(default)]
    actions: HashMap<String, LfsAction>,
    error: Option<LfsError>,
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    objects: Vec<LfsObject>,
}

/// 数据集仓库客户端
pub struct HubDatasetStore {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    repo_id: String,
    revision: String,
}

impl HubDatasetStore {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.hf_endpoint.trim_end_matches('/').to_string(),
            token: config.hf_token.clone(),
            repo_id: config.hf_repo_id.clone(),
            revision: config.hf_revision.clone(),
        }
    }

    fn api_url(&self, action: &str) -> String {
        format!(
            "{}/api/datasets/{}/{}/{}",
            self.endpoint, self.repo_id, action, self.revision
        )
    }

    /// 当前分支的提交 sha
    async fn head_revision(&self, path: &str) -> Result<String, UploadError> {
        let url = self.api_url("revision");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| request_failed(path, source))?;
        let response = check_status(path, response).await?;
        let info: RevisionInfo = response
            .json()
            .await
            .map_err(|source| request_failed(path, source))?;
        Ok(info.sha)
    }

    /// 询问服务端该文件应走普通提交还是 LFS
    async fn upload_mode(&self, path: &str, content: &[u8]) -> Result<String, UploadError> {
        let sample = &content[..content.len().min(PREUPLOAD_SAMPLE_BYTES)];
        let body = json!({
            "files": [{
                "path": path,
                "size": content.len(),
                "sample": BASE64.encode(sample),
            }]
        });

        let response = self
            .client
            .post(self.api_url("preupload"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|source| request_failed(path, source))?;
        let response = check_status(path, response).await?;
        let parsed: PreuploadResponse = response
            .json()
            .await
            .map_err(|source| request_failed(path, source))?;

        Ok(parsed
            .files
            .into_iter()
            .find(|f| f.path == path)
            .map(|f| f.upload_mode)
            .unwrap_or_else(|| "regular".to_string()))
    }

    /// 通过 LFS batch 接口上传内容，返回 (oid, size)
    async fn upload_lfs(&self, path: &str, content: &[u8]) -> Result<(String, usize), UploadError> {
        let oid = sha256_hex(content);
        let size = content.len();
        let url = format!(
            "{}/datasets/{}.git/info/lfs/objects/batch",
            self.endpoint, self.repo_id
        );
        let body = json!({
            "operation": "upload",
            "transfers": ["basic"],
            "objects": [{ "oid": oid, "size": size }],
            "hash_algo": "sha256",
            "ref": { "name": self.revision },
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, LFS_CONTENT_TYPE)
            .header(reqwest::header::CONTENT_TYPE, LFS_CONTENT_TYPE)
            .body(body.to_string())
            .send()
            .await
            .map_err(|source| request_failed(path, source))?;
        let response = check_status(path, response).await?;
        let batch: LfsBatchResponse = response
            .json()
            .await
            .map_err(|source| request_failed(path, source))?;

        let object = batch.objects.into_iter().next().ok_or_else(|| UploadError::BadResponse {
            path: path.to_string(),
            status: 200,
            body: "LFS batch 响应为空".to_string(),
        })?;
        if let Some(err) = object.error {
            return Err(UploadError::BadResponse {
                path: path.to_string(),
                status: u16::try_from(err.code).unwrap_or(500),
                body: err.message,
            });
        }

        // 没有 upload 动作说明服务端已有该对象
        if let Some(upload) = object.actions.get("upload") {
            debug!("LFS 上传 {} ({} 字节)", path, size);
            let mut request = self.client.put(&upload.href).body(content.to_vec());
            for (name, value) in &upload.header {
                request = request.header(name.as_str(), value.as_str());
            }
            let response = request.send().await.map_err(|source| request_failed(path, source))?;
            check_status(path, response).await?;
        }

        if let Some(verify) = object.actions.get("verify") {
            let mut request = self
                .client
                .post(&verify.href)
                .bearer_auth(&self.token)
                .json(&json!({ "oid": oid, "size": size }));
            for (name, value) in &verify.header {
                request = request.header(name.as_str(), value.as_str());
            }
            let response = request.send().await.map_err(|source| request_failed(path, source))?;
            check_status(path, response).await?;
        }

        Ok((oid, size))
    }
}

#[async_trait]
impl ObjectStore for HubDatasetStore {
    async fn read(&self, path: &str) -> Result<Snapshot, UploadError> {
        let sha = self.head_revision(path).await?;
        let url = format!(
            "{}/datasets/{}/resolve/{}/{}",
            self.endpoint, self.repo_id, sha, path
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| request_failed(path, source))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            read_status(path, status, &body)?;
            debug!("{} 在版本 {} 中不存在", path, sha);
            return Ok(Snapshot {
                content: None,
                revision: Some(sha),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| request_failed(path, source))?;

        Ok(Snapshot {
            content: Some(bytes.to_vec()),
            revision: Some(sha),
        })
    }

    async fn write(
        &self,
        path: &str,
        content: &[u8],
        parent_revision: Option<&str>,
    ) -> Result<(), UploadError> {
        let operation = if self.upload_mode(path, content).await? == "lfs" {
            let (oid, size) = self.upload_lfs(path, content).await?;
            CommitOperation::Lfs { oid, size }
        } else {
            CommitOperation::Inline {
                content: BASE64.encode(content),
            }
        };

        let body = build_commit_body(path, &operation, parent_revision);
        debug!("提交 {} (父版本: {:?})", path, parent_revision);

        let response = self
            .client
            .post(self.api_url("commit"))
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|source| request_failed(path, source))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        commit_status(path, status, &body)
    }
}

// ========== 辅助函数 ==========

/// 构建 NDJSON 提交请求体：第一行为 header，第二行为文件操作
pub(crate) fn build_commit_body(
    path: &str,
    operation: &CommitOperation,
    parent_revision: Option<&str>,
) -> String {
    let mut header = json!({
        "summary": format!("Upload {}", path),
        "description": "",
    });
    if let Some(parent) = parent_revision {
        header["parentCommit"] = json!(parent);
    }

    let file_line = match operation {
        CommitOperation::Inline { content } => json!({
            "key": "file",
            "value": { "content": content, "path": path, "encoding": "base64" }
        }),
        CommitOperation::Lfs { oid, size } => json!({
            "key": "lfsFile",
            "value": { "path": path, "algo": "sha256", "oid": oid, "size": size }
        }),
    };

    let lines: [JsonValue; 2] = [json!({ "key": "header", "value": header }), file_line];
    lines
        .iter()
        .map(JsonValue::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn sha256_hex(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// commit 接口的状态码：409/412 表示父版本已变化
pub(crate) fn commit_status(path: &str, status: StatusCode, body: &str) -> Result<(), UploadError> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::CONFLICT || status == StatusCode::PRECONDITION_FAILED {
        warn!("提交 {} 时父版本已变化", path);
        return Err(UploadError::Conflict {
            path: path.to_string(),
        });
    }
    Err(bad_response(path, status, body))
}

/// resolve 接口的状态码：404 表示文件尚不存在，不是错误
pub(crate) fn read_status(path: &str, status: StatusCode, body: &str) -> Result<(), UploadError> {
    if status.is_success() || status == StatusCode::NOT_FOUND {
        return Ok(());
    }
    Err(bad_response(path, status, body))
}

fn bad_response(path: &str, status: StatusCode, body: &str) -> UploadError {
    warn!("数据集仓库返回错误 {} ({}): {}", status, path, body);
    UploadError::BadResponse {
        path: path.to_string(),
        status: status.as_u16(),
        body: body.to_string(),
    }
}

fn request_failed(path: &str, source: reqwest::Error) -> UploadError {
    UploadError::RequestFailed {
        path: path.to_string(),
        source,
    }
}

async fn check_status(path: &str, response: reqwest::Response) -> Result<reqwest::Response, UploadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(bad_response(path, status, &body))
}
