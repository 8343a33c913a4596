//! 提交上传服务 - 业务能力层
//!
//! 只负责"把一次提交写进数据集仓库"能力。
//!
//! 写入顺序固定：二进制文件 → 元数据 JSON → 账本行。元数据存在即说明它引用的
//! 文件已写入；中途失败不回滚已写入的文件。

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, SinkLayout};
use crate::error::UploadError;
use crate::infrastructure::ObjectStore;
use crate::models::Submission;
use crate::services::ledger;

/// 一次成功上传的回执
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub submission_id: Uuid,
    /// 按写入顺序排列的路径
    pub paths: Vec<String>,
}

/// 提交上传服务
pub struct SubmissionSink {
    store: Arc<dyn ObjectStore>,
    layout: SinkLayout,
    ledger_path: String,
    conflict_retries: usize,
}

impl SubmissionSink {
    pub fn new(store: Arc<dyn ObjectStore>, config: &Config) -> Self {
        Self {
            store,
            layout: config.sink_layout,
            ledger_path: config.ledger_path.clone(),
            conflict_retries: config.ledger_conflict_retries,
        }
    }

    pub fn layout(&self) -> SinkLayout {
        self.layout
    }

    /// 上传一次提交
    ///
    /// # 参数
    /// - `submission`: 提交元数据
    /// - `audio`: 录音（WAV）
    /// - `image`: 图片
    ///
    /// # 返回
    /// 所有写入都成功时返回回执，任一步失败返回对应路径的错误
    pub async fn upload(
        &self,
        submission: &Submission,
        audio: Option<&[u8]>,
        image: Option<&[u8]>,
    ) -> Result<UploadReceipt, UploadError> {
        let mut paths = Vec::new();

        if let Some(audio) = audio.filter(|a| !a.is_empty()) {
            let path = self.audio_path(submission);
            self.store.write(&path, audio, None).await?;
            debug!("已上传录音 {}", path);
            paths.push(path);
        }

        if let Some(image) = image.filter(|i| !i.is_empty()) {
            let path = self.image_path(submission);
            self.store.write(&path, image, None).await?;
            debug!("已上传图片 {}", path);
            paths.push(path);
        }

        let metadata_path = self.metadata_path(submission);
        let metadata = submission
            .to_metadata_json()
            .map_err(|e| UploadError::Serialize {
                path: metadata_path.clone(),
                reason: e.to_string(),
            })?;
        self.store.write(&metadata_path, &metadata, None).await?;
        paths.push(metadata_path);

        if self.layout == SinkLayout::Ledger {
            self.append_to_ledger(submission).await?;
            paths.push(self.ledger_path.clone());
        }

        info!("✓ 提交 {} 已上传 ({} 个文件)", submission.id, paths.len());
        Ok(UploadReceipt {
            submission_id: submission.id,
            paths,
        })
    }

    /// 录音路径
    pub fn audio_path(&self, submission: &Submission) -> String {
        match self.layout {
            SinkLayout::Raw => format!("raw/audio/{}.wav", submission.id),
            SinkLayout::Ledger => format!("audio/{}/{}.wav", submission.language.slug(), submission.id),
        }
    }

    /// 图片路径
    pub fn image_path(&self, submission: &Submission) -> String {
        match self.layout {
            SinkLayout::Raw => format!("raw/images/{}.png", submission.id),
            SinkLayout::Ledger => format!("images/{}/{}.png", submission.language.slug(), submission.id),
        }
    }

    /// 元数据路径
    pub fn metadata_path(&self, submission: &Submission) -> String {
        match self.layout {
            SinkLayout::Raw => format!("raw/{}/{}.json", submission.input_mode.slug(), submission.id),
            SinkLayout::Ledger => format!("data/{}/{}.json", submission.language.slug(), submission.id),
        }
    }

    /// 追加账本行
    ///
    /// 读取当前账本和版本，追加后以该版本为前提写回；版本已变化说明有其他
    /// 写入者，重新读取后重试。
    async fn append_to_ledger(&self, submission: &Submission) -> Result<(), UploadError> {
        let path = self.ledger_path.as_str();
        let row = submission.ledger_row();
        let attempts = self.conflict_retries + 1;

        for attempt in 1..=attempts {
            let snapshot = self.store.read(path).await?;
            let content = ledger::append_row(snapshot.content.as_deref(), &row).map_err(|e| {
                UploadError::Serialize {
                    path: path.to_string(),
                    reason: e.to_string(),
                }
            })?;

            match self
                .store
                .write(path, &content, snapshot.revision.as_deref())
                .await
            {
                Ok(()) => {
                    debug!("账本 {} 已追加 (第 {} 次尝试)", path, attempt);
                    return Ok(());
                }
                Err(e) if e.is_conflict() => {
                    warn!("账本 {} 写入冲突 (尝试 {}/{})，重新读取", path, attempt, attempts);
                }
                Err(e) => return Err(e),
            }
        }

        Err(UploadError::ConflictRetriesExhausted {
            path: path.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryObjectStore;
    use crate::models::{InputMode, Language, Script};
    use chrono::Utc;

    fn submission(mode: InputMode) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            user: "tester".to_string(),
            language: Language::Bengali,
            script: Script::Native,
            input_mode: mode,
            question: "আপনি কী খান?".to_string(),
            answer_text: Some("ভাত".to_string()),
            has_audio: false,
            has_image: true,
            timestamp: Utc::now(),
        }
    }

    fn sink(store: Arc<MemoryObjectStore>, layout: SinkLayout, retries: usize) -> SubmissionSink {
        let config = Config {
            sink_layout: layout,
            ledger_conflict_retries: retries,
            ..Config::default()
        };
        SubmissionSink::new(store, &config)
    }

    #[tokio::test]
    async fn test_raw_layout_paths() {
        let store = Arc::new(MemoryObjectStore::new());
        let sink = sink(store.clone(), SinkLayout::Raw, 0);
        let s = submission(InputMode::ImageToType);

        let receipt = sink.upload(&s, None, Some(b"\x89PNG")).await.unwrap();

        let expected = vec![
            format!("raw/images/{}.png", s.id),
            format!("raw/image_to_type/{}.json", s.id),
        ];
        assert_eq!(receipt.paths, expected);
        assert_eq!(store.writes(), expected);
    }

    #[tokio::test]
    async fn test_ledger_layout_writes_blob_metadata_then_ledger() {
        let store = Arc::new(MemoryObjectStore::new());
        let sink = sink(store.clone(), SinkLayout::Ledger, 3);
        let s = submission(InputMode::Text);

        sink.upload(&s, None, Some(b"img")).await.unwrap();

        assert_eq!(
            store.writes(),
            vec![
                format!("images/bengali/{}.png", s.id),
                format!("data/bengali/{}.json", s.id),
                "data.csv".to_string(),
            ]
        );
        let ledger_bytes = store.file("data.csv").unwrap();
        assert_eq!(ledger::count_rows(&ledger_bytes).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blob_failure_skips_metadata() {
        let store = Arc::new(MemoryObjectStore::new());
        let sink = sink(store.clone(), SinkLayout::Raw, 0);
        let s = submission(InputMode::ImageToType);
        store.fail_path(&sink.image_path(&s));

        let result = sink.upload(&s, None, Some(b"img")).await;

        assert!(matches!(result, Err(UploadError::BadResponse { .. })));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_ledger_writer_is_not_lost() {
        let header_and_row = b"id,timestamp,user,language,script,input_mode,question,answer,has_audio,has_image\n\
            a,2026-01-01T00:00:00.000Z,u,Bengali,native,text,q,x,false,false\n";
        let store = Arc::new(MemoryObjectStore::new().with_file("data.csv", header_and_row));
        let sink = sink(store.clone(), SinkLayout::Ledger, 3);
        let s = submission(InputMode::Text);

        // 另一个写入者在我们读取之后、写回之前追加了一行
        let mut theirs = header_and_row.to_vec();
        theirs.extend_from_slice(b"b,2026-01-01T00:00:01.000Z,v,Bengali,native,text,q,y,false,false\n");
        // 第一次 write 是元数据 JSON，第二次才是账本
        store.interleave_write("unrelated.txt", b"x");
        store.interleave_write("data.csv", &theirs);

        sink.upload(&s, None, None).await.unwrap();

        let rows = ledger::read_rows(&store.file("data.csv").unwrap()).unwrap();
        let ids: Vec<String> = rows.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string(), s.id.to_string()]);
    }

    #[tokio::test]
    async fn test_persistent_conflict_exhausts_retries() {
        let store = Arc::new(MemoryObjectStore::new());
        let sink = sink(store.clone(), SinkLayout::Ledger, 2);
        let s = submission(InputMode::Text);

        // 元数据写入消耗一次，之后每次账本写入前都被抢先
        for _ in 0..4 {
            store.interleave_write("data.csv", b"id\nother\n");
        }

        let result = sink.upload(&s, None, None).await;
        assert!(matches!(
            result,
            Err(UploadError::ConflictRetriesExhausted { attempts: 3, .. })
        ));
    }
}
