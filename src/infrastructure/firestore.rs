//! Firestore 题库客户端
//!
//! 通过 Firestore REST v1 接口读写 `questions_pool` 集合：
//! - `documents:runQuery` 按 `language` 等值过滤抽取候选，`used` 在客户端过滤
//!   （等值过滤会漏掉没有 `used` 字段的手工录入文档）
//! - `documents:commit` 写入新题目（服务端时间戳）或更新 `used`
//!
//! 请求使用服务账号换取的访问令牌，见 [`super::google_auth`]。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use super::google_auth::{TokenProvider, DATASTORE_SCOPE};
use super::DocumentStore;
use crate::config::Config;
use crate::error::{ConfigError, StoreError};
use crate::models::{Language, NewQuestion, Question};

/// 已停用的题目会占用查询名额，多取几倍再在客户端过滤
const QUERY_OVERFETCH: usize = 3;

/// Firestore 客户端
pub struct FirestoreStore {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    auth: TokenProvider,
    collection: String,
}

impl FirestoreStore {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let key = config.service_account()?;
        let project_id = config
            .firestore_project(&key)
            .ok_or_else(|| ConfigError::MissingSecret {
                key: "FIRESTORE_PROJECT_ID".to_string(),
            })?;

        let client = reqwest::Client::new();
        let auth = TokenProvider::new(client.clone(), key, DATASTORE_SCOPE).map_err(|e| ConfigError::InvalidValue {
            key: "FIREBASE_KEY".to_string(),
            reason: e.to_string(),
        })?;
        debug!("Firestore 项目 {}，服务账号 {}", project_id, auth.client_email());

        Ok(Self {
            client,
            base_url: config.firestore_base_url.trim_end_matches('/').to_string(),
            project_id,
            auth,
            collection: config.questions_collection.clone(),
        })
    }

    /// `projects/{p}/databases/(default)/documents`
    fn documents_root(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    fn document_name(&self, id: &str) -> String {
        format!("{}/{}/{}", self.documents_root(), self.collection, id)
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, self.documents_root(), method)
    }

    /// 发送 POST 请求并返回 JSON
    async fn post(&self, endpoint: &str, body: &JsonValue) -> Result<JsonValue, StoreError> {
        debug!("Firestore 请求: {}", endpoint);
        let token = self.auth.access_token().await?;

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
            .map_err(|source| StoreError::RequestFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Firestore 返回错误 {}: {}", status, body);
            return Err(StoreError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<JsonValue>()
            .await
            .map_err(|source| StoreError::RequestFailed {
                endpoint: endpoint.to_string(),
                source,
            })
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn query_unused(&self, language: Language, limit: usize) -> Result<Vec<Question>, StoreError> {
        let body = build_query(&self.collection, language, limit * QUERY_OVERFETCH);
        let response = self.post(&self.endpoint("runQuery"), &body).await?;
        let questions = unused_sample(decode_query_response(&response)?, limit);
        debug!("Firestore 返回 {} 道 {} 题目", questions.len(), language);
        Ok(questions)
    }

    async fn insert(&self, question: &NewQuestion) -> Result<Question, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        let body = build_insert(&self.document_name(&id), question);
        let response = self.post(&self.endpoint("commit"), &body).await?;

        let timestamp = response
            .pointer("/writeResults/0/transformResults/0/timestampValue")
            .or_else(|| response.get("commitTime"))
            .and_then(JsonValue::as_str)
            .and_then(parse_timestamp);

        Ok(Question {
            id,
            language: question.language,
            topic: question.topic.clone(),
            text: question.text.clone(),
            used: false,
            timestamp,
        })
    }

    async fn mark_used(&self, id: &str) -> Result<(), StoreError> {
        let body = build_mark_used(&self.document_name(id));
        match self.post(&self.endpoint("commit"), &body).await {
            Err(StoreError::BadResponse { status: 404, .. }) => Err(StoreError::NotFound {
                id: id.to_string(),
            }),
            other => other.map(|_| ()),
        }
    }
}

// ========== 请求构建 ==========

/// 构建 runQuery 请求体
pub(crate) fn build_query(collection: &str, language: Language, limit: usize) -> JsonValue {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "language" },
                    "op": "EQUAL",
                    "value": { "stringValue": language.name() }
                }
            },
            "limit": limit
        }
    })
}

/// 构建新建文档的 commit 请求体，`timestamp` 由服务端写入
pub(crate) fn build_insert(document_name: &str, question: &NewQuestion) -> JsonValue {
    json!({
        "writes": [{
            "update": {
                "name": document_name,
                "fields": {
                    "language": { "stringValue": question.language.name() },
                    "topic": { "stringValue": question.topic },
                    "text": { "stringValue": question.text },
                    "used": { "booleanValue": false }
                }
            },
            "updateTransforms": [{
                "fieldPath": "timestamp",
                "setToServerValue": "REQUEST_TIME"
            }],
            "currentDocument": { "exists": false }
        }]
    })
}

/// 构建只更新 `used` 字段的 commit 请求体
pub(crate) fn build_mark_used(document_name: &str) -> JsonValue {
    json!({
        "writes": [{
            "update": {
                "name": document_name,
                "fields": { "used": { "booleanValue": true } }
            },
            "updateMask": { "fieldPaths": ["used"] },
            "currentDocument": { "exists": true }
        }]
    })
}

// ========== 响应解析 ==========

/// 去掉已停用的题目，最多保留 `limit` 道；没有 `used` 字段的文档视为未停用
pub(crate) fn unused_sample(questions: Vec<Question>, limit: usize) -> Vec<Question> {
    questions.into_iter().filter(|q| !q.used).take(limit).collect()
}

/// 解析 runQuery 响应
///
/// 响应是数组，只有带 `document` 的元素才是结果；单个文档格式错误时跳过并记录。
pub(crate) fn decode_query_response(response: &JsonValue) -> Result<Vec<Question>, StoreError> {
    let items = response
        .as_array()
        .ok_or_else(|| StoreError::MalformedDocument {
            reason: "runQuery 响应不是数组".to_string(),
        })?;

    let mut questions = Vec::with_capacity(items.len());
    for item in items {
        let Some(document) = item.get("document") else {
            continue;
        };
        match decode_document(document) {
            Ok(question) => questions.push(question),
            Err(e) => warn!("跳过格式错误的题目文档: {}", e),
        }
    }
    Ok(questions)
}

/// 解析单个 Firestore 文档
pub(crate) fn decode_document(document: &JsonValue) -> Result<Question, StoreError> {
    let malformed = |reason: String| StoreError::MalformedDocument { reason };

    let name = document
        .get("name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| malformed("缺少 name".to_string()))?;
    let id = name.rsplit('/').next().unwrap_or(name).to_string();

    let fields = document
        .get("fields")
        .ok_or_else(|| malformed(format!("{} 缺少 fields", id)))?;

    let string_field = |key: &str| {
        fields
            .pointer(&format!("/{}/stringValue", key))
            .and_then(JsonValue::as_str)
    };

    let language_name = string_field("language").ok_or_else(|| malformed(format!("{} 缺少 language", id)))?;
    let language = Language::from_name(language_name)
        .ok_or_else(|| malformed(format!("{} 的语言未知: {}", id, language_name)))?;

    let text = string_field("text")
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| malformed(format!("{} 缺少 text", id)))?
        .to_string();

    Ok(Question {
        id,
        language,
        topic: string_field("topic").unwrap_or_default().to_string(),
        text,
        used: fields
            .pointer("/used/booleanValue")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false),
        timestamp: fields
            .pointer("/timestamp/timestampValue")
            .and_then(JsonValue::as_str)
            .and_then(parse_timestamp),
    })
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_filters_language_only() {
        let query = build_query("questions_pool", Language::Bengali, 60);
        assert_eq!(
            query.pointer("/structuredQuery/where/fieldFilter/field/fieldPath"),
            Some(&json!("language"))
        );
        assert_eq!(
            query.pointer("/structuredQuery/where/fieldFilter/value/stringValue"),
            Some(&json!("Bengali"))
        );
        assert!(query.pointer("/structuredQuery/where/compositeFilter").is_none());
        assert_eq!(query.pointer("/structuredQuery/limit"), Some(&json!(60)));
        assert_eq!(
            query.pointer("/structuredQuery/from/0/collectionId"),
            Some(&json!("questions_pool"))
        );
    }

    #[test]
    fn test_insert_requests_server_timestamp() {
        let question = NewQuestion {
            language: Language::Santali,
            topic: "village".to_string(),
            text: "ᱟᱢᱟᱜ ᱧᱩᱛᱩᱢ".to_string(),
        };
        let body = build_insert("projects/p/databases/(default)/documents/questions_pool/x", &question);
        assert_eq!(
            body.pointer("/writes/0/updateTransforms/0/setToServerValue"),
            Some(&json!("REQUEST_TIME"))
        );
        assert_eq!(
            body.pointer("/writes/0/update/fields/used/booleanValue"),
            Some(&json!(false))
        );
        assert_eq!(
            body.pointer("/writes/0/currentDocument/exists"),
            Some(&json!(false))
        );
    }

    #[test]
    fn test_mark_used_only_touches_used() {
        let body = build_mark_used("projects/p/databases/(default)/documents/questions_pool/x");
        assert_eq!(
            body.pointer("/writes/0/updateMask/fieldPaths"),
            Some(&json!(["used"]))
        );
    }

    #[test]
    fn test_decode_query_response() {
        let response = json!([
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/questions_pool/abc",
                    "fields": {
                        "language": { "stringValue": "Hindi" },
                        "text": { "stringValue": "आपका नाम क्या है?" },
                        "topic": { "stringValue": "intro" },
                        "used": { "booleanValue": false },
                        "timestamp": { "timestampValue": "2026-03-01T10:00:00.123456Z" }
                    }
                },
                "readTime": "2026-03-01T10:00:01Z"
            },
            { "readTime": "2026-03-01T10:00:01Z" },
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/questions_pool/bad",
                    "fields": { "language": { "stringValue": "Hindi" } }
                }
            }
        ]);

        let questions = decode_query_response(&response).unwrap();
        assert_eq!(questions.len(), 1);
        let q = &questions[0];
        assert_eq!(q.id, "abc");
        assert_eq!(q.language, Language::Hindi);
        assert_eq!(q.topic, "intro");
        assert!(!q.used);
        assert!(q.timestamp.is_some());
    }

    #[test]
    fn test_decode_rejects_non_array() {
        let result = decode_query_response(&json!({ "error": "denied" }));
        assert!(matches!(result, Err(StoreError::MalformedDocument { .. })));
    }

    #[test]
    fn test_decode_unknown_language() {
        let document = json!({
            "name": "x/questions_pool/q1",
            "fields": {
                "language": { "stringValue": "Esperanto" },
                "text": { "stringValue": "Saluton?" }
            }
        });
        assert!(decode_document(&document).is_err());
    }

    #[test]
    fn test_documents_without_used_field_stay_in_pool() {
        let doc = |id: &str, used: Option<bool>| {
            let mut fields = json!({
                "language": { "stringValue": "Odia" },
                "text": { "stringValue": "ଆପଣଙ୍କ ନାମ କଣ?" }
            });
            if let Some(used) = used {
                fields["used"] = json!({ "booleanValue": used });
            }
            json!({ "document": { "name": format!("x/questions_pool/{}", id), "fields": fields } })
        };
        let response = json!([
            doc("retired", Some(true)),
            doc("seeded_by_hand", None),
            doc("fresh", Some(false)),
            doc("extra", Some(false)),
        ]);

        let sample = unused_sample(decode_query_response(&response).unwrap(), 2);
        let ids: Vec<&str> = sample.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["seeded_by_hand", "fresh"]);
    }
}
