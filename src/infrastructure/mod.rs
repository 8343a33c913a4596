//! 基础设施层
//!
//! 持有外部资源（HTTP 客户端、凭证），只暴露读写能力，不认识业务流程。
//!
//! - `DocumentStore` - 题库文档集合（Firestore）
//! - `google_auth` - 服务账号 JWT 换取访问令牌
//! - `ObjectStore` - 数据集仓库文件读写（Hugging Face Hub）
//! - `TextGenerator` - 文本生成模型
//! - `memory` - 内存实现，供测试和本地演练使用

pub mod firestore;
pub mod google_auth;
pub mod hub;
pub mod memory;

use async_trait::async_trait;

use crate::error::{LlmError, StoreError, UploadError};
use crate::models::{Language, NewQuestion, Question};

pub use firestore::FirestoreStore;
pub use google_auth::{ServiceAccountKey, TokenProvider};
pub use hub::HubDatasetStore;
pub use memory::{MemoryDocumentStore, MemoryObjectStore};

/// 题库文档集合
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 取回最多 `limit` 道指定语言且未停用的题目
    async fn query_unused(&self, language: Language, limit: usize) -> Result<Vec<Question>, StoreError>;

    /// 写入新题目（`used = false`，时间戳由服务端生成）
    async fn insert(&self, question: &NewQuestion) -> Result<Question, StoreError>;

    /// 将题目标记为已停用
    async fn mark_used(&self, id: &str) -> Result<(), StoreError>;
}

/// 某个版本下的文件内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// 文件内容，文件不存在时为 None
    pub content: Option<Vec<u8>>,
    /// 读取时仓库所在的版本
    pub revision: Option<String>,
}

/// 数据集仓库
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 读取文件及其所在版本
    async fn read(&self, path: &str) -> Result<Snapshot, UploadError>;

    /// 写入文件
    ///
    /// `parent_revision` 不为空时，远端版本必须仍是该版本，否则返回 `UploadError::Conflict`。
    async fn write(
        &self,
        path: &str,
        content: &[u8],
        parent_revision: Option<&str>,
    ) -> Result<(), UploadError>;
}

/// 文本生成模型
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    /// 发送一次请求，返回模型的原始文本
    async fn complete(&self, user_message: &str, system_message: Option<&str>) -> Result<String, LlmError>;
}
