//! 钉钉群聊天机器人客户端
//!
//! 机器人只能在钉钉 PC 端生成和设置，可选三种安全设置：
//! 1. 关键词（消息中必须包含关键词）
//! 2. 加签（webhook 与签名参数组成新的 URL）
//! 3. IP 地址（段）白名单
//!
//! 只有配置了密钥时才会加签，否则每次都直接使用原始 webhook。

use super::message::{ActionButton, BtnOrientation, FeedLink, Message};
use super::rate_gate::RateGate;
use super::signer::{check_secret, SignedUrl};
use crate::clock::{Clock, SystemClock};
use crate::config::DingTalkConfig;
use crate::error::{Result, DING_TALK_ERROR_DOC};
use crate::transport::{self, parse_response, HttpTransport, RemoteResponse, Transport};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// 默认队列等待超时（秒）
pub const DEFAULT_QUEUE_TIMEOUT_SECS: u64 = 60;

/// 默认请求超时（秒）
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// 单次发送的超时设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// 限流等待超时
    pub queue_timeout: Duration,
    /// HTTP 请求超时
    pub request_timeout: Duration,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            queue_timeout: Duration::from_secs(DEFAULT_QUEUE_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// 钉钉群聊天机器人
///
/// 可以在多个线程间共享；限流窗口和签名缓存都只属于当前实例。
pub struct DingTalkBot {
    webhook: String,
    secret: Option<String>,
    signed: Mutex<Option<SignedUrl>>,
    gate: RateGate,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    options: SendOptions,
}

impl std::fmt::Debug for DingTalkBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DingTalkBot")
            .field("webhook", &transport::redact(&self.webhook))
            .field("signing", &self.secret.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl DingTalkBot {
    /// 创建机器人
    ///
    /// # Arguments
    /// * `webhook` - 机器人 Webhook 地址
    /// * `secret` - 加签密钥（以 `SEC` 开头），为空则不加签
    pub fn new(webhook: impl Into<String>, secret: Option<String>) -> Result<Self> {
        Self::with_parts(
            webhook,
            secret,
            Arc::new(HttpTransport::new()?),
            Arc::new(SystemClock),
        )
    }

    /// 使用指定传输层和时钟创建机器人
    pub fn with_parts(
        webhook: impl Into<String>,
        secret: Option<String>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let secret = secret.filter(|s| !s.is_empty());
        if let Some(secret) = &secret {
            check_secret(secret)?;
        }

        Ok(Self {
            webhook: webhook.into(),
            secret,
            signed: Mutex::new(None),
            gate: RateGate::new(clock.clone()),
            transport,
            clock,
            options: SendOptions::default(),
        })
    }

    /// 从配置创建
    pub fn from_config(config: &DingTalkConfig) -> Result<Self> {
        Self::new(config.webhook.clone(), config.secret.clone())
    }

    /// 设置便捷发送方法使用的默认超时
    pub fn with_options(mut self, options: SendOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> SendOptions {
        self.options
    }

    /// 获取可用于发送的 webhook，签名过期时重新加签
    fn current_url(&self) -> Result<String> {
        let Some(secret) = &self.secret else {
            return Ok(self.webhook.clone());
        };

        let mut signed = self.signed.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();

        if let Some(cached) = signed.as_ref().filter(|c| !c.is_stale(now)) {
            return Ok(cached.url.clone());
        }

        let fresh = SignedUrl::new(&self.webhook, secret, now)?;
        debug!(signed_at = %fresh.signed_at, "Refreshed webhook signature");
        let url = fresh.url.clone();
        *signed = Some(fresh);
        Ok(url)
    }

    /// 发送已构建好的消息
    ///
    /// 顺序：序列化 → 加签 → 限流（可能阻塞，等待后重新检查签名）→ POST → 检查 errcode。
    pub fn send(&self, message: &Message, options: &SendOptions) -> Result<RemoteResponse> {
        let body = transport::encode(message)?;
        let mut url = self.current_url()?;

        let waited = self.gate.acquire(options.queue_timeout)?;
        if !waited.is_zero() {
            // 限流等待期间签名可能已过期
            url = self.current_url()?;
        }

        debug!(
            msgtype = message.msgtype(),
            url = %transport::redact(&url),
            "Sending DingTalk message"
        );
        let raw = self.transport.post_json(&url, &body, options.request_timeout)?;
        let response = parse_response(&raw, DING_TALK_ERROR_DOC)?;

        info!(msgtype = message.msgtype(), "DingTalk message sent");
        Ok(response)
    }

    /// 发送 text 类型消息
    ///
    /// 可以把被 @ 者的手机号放入 `at_mobiles`，也可以直接在内容中写 `@手机号`。
    pub fn send_text(&self, content: &str, at_mobiles: &[String], at_all: bool) -> Result<RemoteResponse> {
        let message = Message::text(content, at_mobiles, at_all)?;
        self.send(&message, &self.options)
    }

    /// 发送 link 类型消息
    pub fn send_link(
        &self,
        title: &str,
        text: &str,
        message_url: &str,
        pic_url: Option<&str>,
    ) -> Result<RemoteResponse> {
        let message = Message::link(title, text, message_url, pic_url)?;
        self.send(&message, &self.options)
    }

    /// 发送 markdown 类型消息
    pub fn send_markdown(
        &self,
        title: &str,
        text: &str,
        at_mobiles: &[String],
        at_all: bool,
    ) -> Result<RemoteResponse> {
        let message = Message::markdown(title, text, at_mobiles, at_all)?;
        self.send(&message, &self.options)
    }

    /// 发送整体跳转 ActionCard
    pub fn send_single_action_card(
        &self,
        title: &str,
        text: &str,
        single_title: &str,
        single_url: &str,
    ) -> Result<RemoteResponse> {
        let message = Message::single_action_card(title, text, single_title, single_url)?;
        self.send(&message, &self.options)
    }

    /// 发送独立跳转 ActionCard
    pub fn send_multi_action_card(
        &self,
        title: &str,
        text: &str,
        btns: Vec<ActionButton>,
        orientation: BtnOrientation,
    ) -> Result<RemoteResponse> {
        let message = Message::multi_action_card(title, text, btns, orientation)?;
        self.send(&message, &self.options)
    }

    /// 发送 FeedCard
    pub fn send_feed_card(&self, links: Vec<FeedLink>) -> Result<RemoteResponse> {
        let message = Message::feed_card(links)?;
        self.send(&message, &self.options)
    }
}
