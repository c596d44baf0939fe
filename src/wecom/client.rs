//! 企业微信应用消息客户端

use super::message::{AppMessage, Recipients};
use super::token::{TokenCache, TokenResponse};
use crate::clock::{Clock, SystemClock};
use crate::config::WeComConfig;
use crate::error::{BotError, Result, WECOM_ERROR_DOC};
use crate::transport::{self, parse_response, HttpTransport, RemoteResponse, Transport};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// 企业微信 API 地址
pub const WECOM_API_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin";

/// 默认请求超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// access_token 无效或过期的错误码
const TOKEN_ERRCODES: [i64; 2] = [40014, 42001];

/// 企业微信消息通知机器人（基于自建应用）
pub struct WeComBot {
    corp_id: String,
    corp_secret: String,
    base_url: String,
    token: Mutex<TokenCache>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl std::fmt::Debug for WeComBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeComBot")
            .field("corp_id", &self.corp_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl WeComBot {
    pub fn new(corp_id: impl Into<String>, corp_secret: impl Into<String>) -> Result<Self> {
        Ok(Self::with_parts(
            corp_id,
            corp_secret,
            Arc::new(HttpTransport::new()?),
            Arc::new(SystemClock),
        ))
    }

    pub fn with_parts(
        corp_id: impl Into<String>,
        corp_secret: impl Into<String>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            corp_id: corp_id.into(),
            corp_secret: corp_secret.into(),
            base_url: WECOM_API_URL.to_string(),
            token: Mutex::new(TokenCache::new()),
            transport,
            clock,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &WeComConfig) -> Result<Self> {
        Self::new(config.corp_id.clone(), config.corp_secret.clone())
    }

    /// 替换 API 地址（私有化部署或代理）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn token_url(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("corpid", &self.corp_id)
            .append_pair("corpsecret", &self.corp_secret)
            .finish();
        format!("{}/gettoken?{}", self.base_url, query)
    }

    /// 获取 access_token，过期时重新请求
    pub fn access_token(&self) -> Result<String> {
        let mut cache = self.token.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();
        if let Some(token) = cache.get(now) {
            return Ok(token.to_string());
        }

        info!(corp_id = %self.corp_id, "Fetching WeCom access token");
        let raw = self.transport.get(&self.token_url(), self.timeout)?;
        let response = parse_response(&raw, WECOM_ERROR_DOC)?;
        let token: TokenResponse = serde_json::from_value(serde_json::Value::Object(response.raw))
            .map_err(|e| BotError::Transport(format!("invalid token response: {}", e)))?;

        let access_token = token.access_token.clone();
        cache.store(token, now);
        info!(expires_at = ?cache.expires_at(), "WeCom access token refreshed");
        Ok(access_token)
    }

    /// 发送应用消息
    pub fn send(&self, message: &AppMessage) -> Result<RemoteResponse> {
        let body = transport::encode(message)?;
        let token = self.access_token()?;
        let url = format!("{}/message/send?access_token={}", self.base_url, token);

        let raw = self.transport.post_json(&url, &body, self.timeout)?;
        match parse_response(&raw, WECOM_ERROR_DOC) {
            Ok(response) => {
                info!(msgtype = message.msgtype(), agent_id = message.agentid, "WeCom message sent");
                Ok(response)
            }
            Err(e) => {
                if e.errcode().is_some_and(|code| TOKEN_ERRCODES.contains(&code)) {
                    warn!("WeCom access token rejected, will refresh on next send");
                    self.token.lock().unwrap_or_else(|p| p.into_inner()).invalidate();
                }
                Err(e)
            }
        }
    }

    /// 发送文本消息
    ///
    /// 内容最长 2048 字节，超出部分截断。
    pub fn send_text(&self, agent_id: i64, content: &str, recipients: Recipients) -> Result<RemoteResponse> {
        let message = AppMessage::text(agent_id, content, recipients)?;
        self.send(&message)
    }

    /// 发送 markdown 消息
    pub fn send_markdown(&self, agent_id: i64, content: &str, recipients: Recipients) -> Result<RemoteResponse> {
        let message = AppMessage::markdown(agent_id, content, recipients)?;
        self.send(&message)
    }
}
