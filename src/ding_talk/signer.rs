//! 加签模块
//!
//! 钉钉机器人“加签”安全设置：用密钥对 `"{毫秒时间戳}\n{密钥}"` 做 HMAC-SHA256，
//! base64 后 URL 编码，作为 `timestamp` 和 `sign` 参数拼到 webhook 上。
//! 钉钉要求请求时间戳与发送时间间隔不超过 1 小时。

use crate::error::{BotError, Result};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// 钉钉加签密钥前缀
pub const SECRET_PREFIX: &str = "SEC";

/// 签名有效期内的刷新阈值（秒），提前 2 分钟更换，避免过于极限
pub const REFRESH_THRESHOLD_SECS: i64 = 58 * 60;

/// 检查密钥格式
pub fn check_secret(secret: &str) -> Result<()> {
    if !secret.starts_with(SECRET_PREFIX) {
        return Err(BotError::Config(format!(
            "signing secret must start with \"{}\"",
            SECRET_PREFIX
        )));
    }
    Ok(())
}

/// 计算签名（已 URL 编码）
pub fn signature(secret: &str, timestamp_ms: i64) -> Result<String> {
    let string_to_sign = format!("{}\n{}", timestamp_ms, secret);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BotError::Config(format!("unusable signing secret: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    let digest = mac.finalize().into_bytes();

    let encoded = base64::engine::general_purpose::STANDARD.encode(digest);
    Ok(url::form_urlencoded::byte_serialize(encoded.as_bytes()).collect())
}

/// 生成带 `timestamp` 和 `sign` 参数的 webhook
pub fn sign(base_url: &str, secret: &str, now: DateTime<Utc>) -> Result<String> {
    check_secret(secret)?;

    let timestamp = now.timestamp_millis();
    let sign = signature(secret, timestamp)?;
    let separator = if base_url.contains('?') { '&' } else { '?' };

    Ok(format!(
        "{}{}timestamp={}&sign={}",
        base_url, separator, timestamp, sign
    ))
}

/// 已加签的 webhook 缓存
#[derive(Debug, Clone, PartialEq)]
pub struct SignedUrl {
    pub url: String,
    /// 生成 `url` 时使用的时间
    pub signed_at: DateTime<Utc>,
}

impl SignedUrl {
    pub fn new(base_url: &str, secret: &str, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            url: sign(base_url, secret, now)?,
            signed_at: now,
        })
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        (now - self.signed_at).num_seconds() >= REFRESH_THRESHOLD_SECS
    }
}
