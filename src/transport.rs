//! HTTP 传输层
//!
//! 只负责把请求发出去并拿回原始响应体，errcode 的判定在 `parse_response` 中完成，
//! 这样钉钉和企业微信可以共用同一套传输实现。

use crate::error::{BotError, Result};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// 钉钉要求 POST 时字符集必须为 UTF-8
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// 响应中缺少 errcode 时使用的错误码
pub const MISSING_ERRCODE: i64 = 1;

/// 传输层 trait
pub trait Transport: Send + Sync {
    /// 发送 JSON POST，返回原始响应体
    fn post_json(&self, url: &str, body: &str, timeout: Duration) -> Result<String>;

    /// 发送 GET，返回原始响应体
    fn get(&self, url: &str, timeout: Duration) -> Result<String>;
}

/// 基于 reqwest 阻塞客户端的传输实现
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| BotError::Transport(format!("cannot create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, body: &str, timeout: Duration) -> Result<String> {
        let start = Instant::now();
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_JSON)
            .timeout(timeout)
            .body(body.to_string())
            .send()
            .map_err(|e| {
                BotError::Transport(format!(
                    "POST failed after {}ms: {}",
                    start.elapsed().as_millis(),
                    e
                ))
            })?;

        debug!(
            status = %response.status(),
            elapsed_ms = start.elapsed().as_millis(),
            "POST completed"
        );

        response
            .text()
            .map_err(|e| BotError::Transport(format!("failed to read response: {}", e)))
    }

    fn get(&self, url: &str, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| BotError::Transport(format!("GET failed: {}", e)))?;

        response
            .text()
            .map_err(|e| BotError::Transport(format!("failed to read response: {}", e)))
    }
}

/// 远端响应
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    /// 0 表示成功
    pub errcode: i64,
    /// 完整响应体
    pub raw: serde_json::Map<String, serde_json::Value>,
}

impl RemoteResponse {
    pub fn errmsg(&self) -> Option<&str> {
        self.raw.get("errmsg").and_then(|v| v.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.raw.get(key)
    }
}

/// 解析响应体并按 errcode 分类
///
/// 缺少 errcode 视为失败（`MISSING_ERRCODE`）。
pub fn parse_response(body: &str, doc_url: &'static str) -> Result<RemoteResponse> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| BotError::Transport(format!("invalid response body: {} - body: {}", e, body)))?;

    let raw = match value {
        serde_json::Value::Object(map) => map,
        _ => {
            return Err(BotError::Transport(format!(
                "response body is not a JSON object: {}",
                body
            )))
        }
    };

    let errcode = raw
        .get("errcode")
        .and_then(|c| c.as_i64())
        .unwrap_or(MISSING_ERRCODE);

    if errcode != 0 {
        return Err(BotError::RemoteRejection {
            errcode,
            raw: body.to_string(),
            doc_url,
        });
    }

    Ok(RemoteResponse { errcode, raw })
}

/// 序列化消息体
pub(crate) fn encode<T: Serialize>(payload: &T) -> Result<String> {
    serde_json::to_string(payload)
        .map_err(|e| BotError::Validation(vec![format!("payload not serializable: {}", e)]))
}

/// 去掉 query string，避免签名和 token 出现在日志中
pub(crate) fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
