//! 企业微信 access_token 缓存

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// 接口未返回 expires_in 时的默认有效期（秒）
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 7200;

/// gettoken 接口响应
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN_SECS
}

/// access_token 缓存，过期后惰性刷新
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 未过期的 token
    pub fn get(&self, now: DateTime<Utc>) -> Option<&str> {
        match (&self.token, self.expires_at) {
            (Some(token), Some(expires_at)) if now < expires_at => Some(token),
            _ => None,
        }
    }

    pub fn store(&mut self, response: TokenResponse, now: DateTime<Utc>) {
        self.expires_at = Some(now + chrono::Duration::seconds(response.expires_in));
        self.token = Some(response.access_token);
    }

    pub fn invalidate(&mut self) {
        self.token = None;
        self.expires_at = None;
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}
