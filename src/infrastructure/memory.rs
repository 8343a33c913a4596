//! 内存实现
//!
//! 语义与线上后端一致（过滤条件、版本前置条件），用于测试和本地演练。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{DocumentStore, ObjectStore, Snapshot};
use crate::error::{StoreError, UploadError};
use crate::models::{Language, NewQuestion, Question};

/// 内存题库
#[derive(Default)]
pub struct MemoryDocumentStore {
    questions: Mutex<Vec<Question>>,
    next_id: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_questions(questions: Vec<Question>) -> Self {
        let store = Self::new();
        store.next_id.store(questions.len(), Ordering::SeqCst);
        *store.lock() = questions;
        store
    }

    /// 让之后的所有调用返回后端错误
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<Question> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Question>> {
        self.questions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_failing(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::BadResponse {
                endpoint: "memory".to_string(),
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query_unused(&self, language: Language, limit: usize) -> Result<Vec<Question>, StoreError> {
        self.check_failing()?;
        Ok(self
            .lock()
            .iter()
            .filter(|q| q.language == language && !q.used)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert(&self, question: &NewQuestion) -> Result<Question, StoreError> {
        self.check_failing()?;
        let id = format!("q{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let stored = Question {
            id,
            language: question.language,
            topic: question.topic.clone(),
            text: question.text.clone(),
            used: false,
            timestamp: Some(Utc::now()),
        };
        self.lock().push(stored.clone());
        Ok(stored)
    }

    async fn mark_used(&self, id: &str) -> Result<(), StoreError> {
        self.check_failing()?;
        let mut questions = self.lock();
        let question = questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        question.used = true;
        Ok(())
    }
}

#[derive(Default)]
struct RepoState {
    files: HashMap<String, Vec<u8>>,
    revision: u64,
    /// 按成功顺序记录的写入路径
    writes: Vec<String>,
    failing_paths: HashSet<String>,
    /// 在下一次写入前由"其他客户端"抢先完成的写入
    interleaved: Vec<(String, Vec<u8>)>,
}

impl RepoState {
    fn revision_id(&self) -> String {
        format!("rev-{}", self.revision)
    }
}

/// 内存数据集仓库
#[derive(Default)]
pub struct MemoryObjectStore {
    state: Mutex<RepoState>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置文件（不计入写入记录）
    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        {
            let mut state = self.lock();
            state.files.insert(path.to_string(), content.to_vec());
            state.revision += 1;
        }
        self
    }

    /// 让指定路径的写入失败
    pub fn fail_path(&self, path: &str) {
        self.lock().failing_paths.insert(path.to_string());
    }

    /// 模拟并发写入者：在下一次 `write` 之前覆盖 `path`
    pub fn interleave_write(&self, path: &str, content: &[u8]) {
        self.lock()
            .interleaved
            .push((path.to_string(), content.to_vec()));
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    /// 按顺序返回所有成功写入的路径
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RepoState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn read(&self, path: &str) -> Result<Snapshot, UploadError> {
        let state = self.lock();
        Ok(Snapshot {
            content: state.files.get(path).cloned(),
            revision: Some(state.revision_id()),
        })
    }

    async fn write(
        &self,
        path: &str,
        content: &[u8],
        parent_revision: Option<&str>,
    ) -> Result<(), UploadError> {
        let mut state = self.lock();

        if !state.interleaved.is_empty() {
            let (other_path, other_content) = state.interleaved.remove(0);
            state.files.insert(other_path, other_content);
            state.revision += 1;
        }

        if state.failing_paths.contains(path) {
            return Err(UploadError::BadResponse {
                path: path.to_string(),
                status: 500,
                body: "injected failure".to_string(),
            });
        }

        if let Some(parent) = parent_revision {
            if parent != state.revision_id() {
                return Err(UploadError::Conflict {
                    path: path.to_string(),
                });
            }
        }

        state.files.insert(path.to_string(), content.to_vec());
        state.revision += 1;
        state.writes.push(path.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, language: Language, used: bool) -> Question {
        Question {
            id: id.to_string(),
            language,
            topic: String::new(),
            text: format!("question {}", id),
            used,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_query_filters_language_used_and_limit() {
        let store = MemoryDocumentStore::with_questions(vec![
            question("a", Language::Hindi, false),
            question("b", Language::Hindi, true),
            question("c", Language::Bengali, false),
            question("d", Language::Hindi, false),
            question("e", Language::Hindi, false),
        ]);

        let found = store.query_unused(Language::Hindi, 2).await.unwrap();
        let ids: Vec<_> = found.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[tokio::test]
    async fn test_mark_used_unknown_id() {
        let store = MemoryDocumentStore::new();
        let result = store.mark_used("missing").await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_write_with_stale_parent_conflicts() {
        let repo = MemoryObjectStore::new().with_file("data.csv", b"id\n");
        let snapshot = repo.read("data.csv").await.unwrap();
        let parent = snapshot.revision.unwrap();

        repo.write("other.json", b"{}", None).await.unwrap();
        let result = repo.write("data.csv", b"id\n1\n", Some(&parent)).await;
        assert!(matches!(result, Err(UploadError::Conflict { .. })));
        assert_eq!(repo.file("data.csv").unwrap(), b"id\n");
    }
}
