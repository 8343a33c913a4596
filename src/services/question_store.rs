//! 抽题服务 - 业务能力层
//!
//! 从题库取回有限数量的候选，再在候选中均匀随机选一道。
//! 不扫描整个集合，所以只在取回的样本内均匀。

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::infrastructure::DocumentStore;
use crate::models::{Language, NewQuestion, Question};

/// 抽题服务
pub struct QuestionStore {
    backend: Arc<dyn DocumentStore>,
    fetch_limit: usize,
}

impl QuestionStore {
    pub fn new(backend: Arc<dyn DocumentStore>, fetch_limit: usize) -> Self {
        Self {
            backend,
            fetch_limit: fetch_limit.max(1),
        }
    }

    /// 抽一道题，区分"没有题目"和"后端错误"
    pub async fn try_draw(&self, language: Language) -> Result<Option<Question>, StoreError> {
        let candidates = self.backend.query_unused(language, self.fetch_limit).await?;
        debug!("{} 候选题目: {} 道", language, candidates.len());
        Ok(pick_uniform(&candidates))
    }

    /// 抽一道题，后端错误按"没有题目"处理并记录日志
    pub async fn draw(&self, language: Language) -> Option<Question> {
        match self.try_draw(language).await {
            Ok(question) => question,
            Err(e) => {
                warn!("抽取 {} 题目失败: {}", language, e);
                None
            }
        }
    }

    /// 写入一道新题目
    pub async fn seed(&self, question: NewQuestion) -> Result<Question, StoreError> {
        let stored = self.backend.insert(&question).await?;
        debug!("已写入题目 {}: {}", stored.id, stored);
        Ok(stored)
    }

    /// 停用一道题目，之后不会再被抽到
    pub async fn retire(&self, id: &str) -> Result<(), StoreError> {
        self.backend.mark_used(id).await
    }
}

fn pick_uniform<T: Clone>(items: &[T]) -> Option<T> {
    items.choose(&mut rand::thread_rng()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryDocumentStore;
    use std::collections::HashMap;

    fn question(id: &str, language: Language) -> Question {
        Question {
            id: id.to_string(),
            language,
            topic: "test".to_string(),
            text: format!("prompt {}", id),
            used: false,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_empty_pool_returns_none() {
        let store = QuestionStore::new(Arc::new(MemoryDocumentStore::new()), 20);
        assert_eq!(store.draw(Language::Santali).await, None);
        assert!(matches!(store.try_draw(Language::Santali).await, Ok(None)));
    }

    #[tokio::test]
    async fn test_backend_failure_is_soft() {
        let backend = Arc::new(MemoryDocumentStore::with_questions(vec![question("a", Language::Hindi)]));
        backend.set_failing(true);
        let store = QuestionStore::new(backend, 20);

        assert_eq!(store.draw(Language::Hindi).await, None);
        assert!(store.try_draw(Language::Hindi).await.is_err());
    }

    #[tokio::test]
    async fn test_draw_is_roughly_uniform_over_sample() {
        let backend = Arc::new(MemoryDocumentStore::with_questions(vec![
            question("r1", Language::Bengali),
            question("r2", Language::Bengali),
            question("r3", Language::Bengali),
            question("other", Language::Odia),
        ]));
        let store = QuestionStore::new(backend, 20);

        let trials = 3000;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..trials {
            let drawn = store.draw(Language::Bengali).await.unwrap();
            *counts.entry(drawn.id).or_default() += 1;
        }

        assert_eq!(counts.len(), 3);
        for id in ["r1", "r2", "r3"] {
            let n = counts[id];
            // 期望 1000，允许较宽的误差
            assert!((800..=1200).contains(&n), "{} drawn {} times", id, n);
        }
    }

    #[tokio::test]
    async fn test_draw_only_sees_fetch_limit() {
        let backend = Arc::new(MemoryDocumentStore::with_questions(vec![
            question("first", Language::Hindi),
            question("second", Language::Hindi),
            question("third", Language::Hindi),
        ]));
        let store = QuestionStore::new(backend, 2);

        for _ in 0..200 {
            let drawn = store.draw(Language::Hindi).await.unwrap();
            assert_ne!(drawn.id, "third");
        }
    }

    #[tokio::test]
    async fn test_retired_question_is_never_drawn() {
        let backend = Arc::new(MemoryDocumentStore::with_questions(vec![
            question("keep", Language::Odia),
            question("drop", Language::Odia),
        ]));
        let store = QuestionStore::new(backend, 20);
        store.retire("drop").await.unwrap();

        for _ in 0..100 {
            assert_eq!(store.draw(Language::Odia).await.unwrap().id, "keep");
        }
    }

    #[tokio::test]
    async fn test_seed_then_draw() {
        let store = QuestionStore::new(Arc::new(MemoryDocumentStore::new()), 20);
        let stored = store
            .seed(NewQuestion {
                language: Language::Santali,
                topic: "introduction".to_string(),
                text: "ᱟᱢᱟᱜ ᱧᱩᱛᱩᱢ ᱫᱚ ᱪᱮᱫ ᱠᱟᱱᱟ?".to_string(),
            })
            .await
            .unwrap();

        assert!(!stored.used);
        assert!(stored.timestamp.is_some());
        assert_eq!(store.draw(Language::Santali).await, Some(stored));
    }
}
