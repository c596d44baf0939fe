//! 企业微信应用消息体

use crate::error::{BotError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// 消息内容最大字节数，超出部分截断
pub const MAX_CONTENT_BYTES: usize = 2048;

/// 重复消息检查默认间隔（秒）
pub const DEFAULT_DUPLICATE_CHECK_INTERVAL: u32 = 1800;

/// 重复消息检查最大间隔（秒），4 小时
pub const MAX_DUPLICATE_CHECK_INTERVAL: u32 = 4 * 3600;

/// 接收者，多个 ID 用 `|` 分隔；`to_user` 为 `@all` 时发送给应用全部成员
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients {
    pub to_user: Option<String>,
    pub to_party: Option<String>,
    pub to_tag: Option<String>,
}

impl Recipients {
    pub fn users(to_user: impl Into<String>) -> Self {
        Self {
            to_user: Some(to_user.into()),
            ..Default::default()
        }
    }

    pub fn all() -> Self {
        Self::users("@all")
    }

    fn is_empty(&self) -> bool {
        [&self.to_user, &self.to_party, &self.to_tag]
            .iter()
            .all(|r| r.as_deref().map_or(true, str::is_empty))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msgtype", rename_all = "lowercase")]
pub enum AppBody {
    Text { text: Content },
    Markdown { markdown: Content },
}

/// 应用消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub touser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toparty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totag: Option<String>,
    pub agentid: i64,
    #[serde(flatten)]
    pub body: AppBody,
    /// 0 可对外分享，1 不能分享且内容显示水印
    pub safe: u8,
    pub enable_id_trans: u8,
    pub enable_duplicate_check: u8,
    pub duplicate_check_interval: u32,
}

/// 截断到不超过 `max` 字节的字符边界
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

impl AppMessage {
    fn build(agent_id: i64, content: &str, recipients: Recipients, markdown: bool) -> Result<Self> {
        let mut missing = Vec::new();
        if content.is_empty() {
            missing.push("content".to_string());
        }
        if recipients.is_empty() {
            missing.push("touser|toparty|totag".to_string());
        }
        if !missing.is_empty() {
            return Err(BotError::Validation(missing));
        }

        let truncated = truncate_utf8(content, MAX_CONTENT_BYTES);
        if truncated.len() < content.len() {
            warn!(
                original_bytes = content.len(),
                "Message content exceeds {} bytes, truncated",
                MAX_CONTENT_BYTES
            );
        }
        let content = Content {
            content: truncated.to_string(),
        };

        Ok(Self {
            touser: recipients.to_user,
            toparty: recipients.to_party,
            totag: recipients.to_tag,
            agentid: agent_id,
            body: if markdown {
                AppBody::Markdown { markdown: content }
            } else {
                AppBody::Text { text: content }
            },
            safe: 0,
            enable_id_trans: 0,
            enable_duplicate_check: 0,
            duplicate_check_interval: DEFAULT_DUPLICATE_CHECK_INTERVAL,
        })
    }

    /// 文本消息，支持换行和 a 标签
    pub fn text(agent_id: i64, content: &str, recipients: Recipients) -> Result<Self> {
        Self::build(agent_id, content, recipients, false)
    }

    /// markdown 消息
    pub fn markdown(agent_id: i64, content: &str, recipients: Recipients) -> Result<Self> {
        Self::build(agent_id, content, recipients, true)
    }

    /// 保密消息
    pub fn with_safe(mut self, safe: bool) -> Self {
        self.safe = safe as u8;
        self
    }

    /// id 转译（仅第三方应用需要）
    pub fn with_id_trans(mut self, enable: bool) -> Self {
        self.enable_id_trans = enable as u8;
        self
    }

    /// 开启重复消息检查
    pub fn with_duplicate_check(mut self, interval_secs: u32) -> Result<Self> {
        if interval_secs == 0 || interval_secs > MAX_DUPLICATE_CHECK_INTERVAL {
            return Err(BotError::invalid("duplicate_check_interval"));
        }
        self.enable_duplicate_check = 1;
        self.duplicate_check_interval = interval_secs;
        Ok(self)
    }

    pub fn msgtype(&self) -> &'static str {
        match self.body {
            AppBody::Text { .. } => "text",
            AppBody::Markdown { .. } => "markdown",
        }
    }
}
