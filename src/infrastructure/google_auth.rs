//! Google 服务账号认证
//!
//! 用服务账号私钥签发 RS256 JWT，到 `token_uri` 换取访问令牌（OAuth2 JWT Bearer 授权）。
//! 令牌在过期前缓存复用，过期前一分钟刷新。

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// 断言有效期（Google 上限为一小时）
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// 服务账号密钥文件（Firebase 控制台导出的 JSON）
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn encoding_key(&self) -> Result<EncodingKey, StoreError> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|source| StoreError::SigningFailed { source })
    }
}

/// JWT 断言的声明
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// 签发换取令牌用的 JWT 断言
pub(crate) fn build_assertion(
    key: &ServiceAccountKey,
    encoding_key: &EncodingKey,
    scope: &str,
    now: DateTime<Utc>,
) -> Result<String, StoreError> {
    let iat = now.timestamp();
    let claims = Claims {
        iss: key.client_email.clone(),
        scope: scope.to_string(),
        aud: key.token_uri.clone(),
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };
    encode(&Header::new(Algorithm::RS256), &claims, encoding_key).map_err(|source| StoreError::SigningFailed { source })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// 访问令牌提供者
pub struct TokenProvider {
    client: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(client: reqwest::Client, key: ServiceAccountKey, scope: &str) -> Result<Self, StoreError> {
        let encoding_key = key.encoding_key()?;
        Ok(Self {
            client,
            key,
            encoding_key,
            scope: scope.to_string(),
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// 返回有效的访问令牌，必要时重新换取
    ///
    /// 持锁换取，同一时刻只有一个请求在刷新。
    pub async fn access_token(&self) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        let token = self.exchange(now).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken, StoreError> {
        let assertion = build_assertion(&self.key, &self.encoding_key, &self.scope, now)?;
        let endpoint = self.key.token_uri.as_str();
        debug!("换取访问令牌: {} ({})", endpoint, self.key.client_email);

        let request_failed = |source| StoreError::RequestFailed {
            endpoint: endpoint.to_string(),
            source,
        };
        let response = self
            .client
            .post(endpoint)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("令牌换取失败 {}: {}", status, body);
            return Err(StoreError::TokenExchangeFailed {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await.map_err(request_failed)?;
        info!("🔑 已获取访问令牌，{} 秒后过期", token.expires_in);
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }

    #[cfg(test)]
    async fn seed(&self, token: CachedToken) {
        *self.cached.lock().await = Some(token);
    }
}
