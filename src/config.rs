//! 配置加载
//!
//! 读取优先级（后者覆盖前者）：
//! 1. 配置文件 `~/.config/msg-bot/config.json`
//! 2. 环境变量 `MSGBOT_DINGTALK_WEBHOOK`、`MSGBOT_DINGTALK_SECRET`、
//!    `MSGBOT_WECOM_CORP_ID`、`MSGBOT_WECOM_CORP_SECRET`、`MSGBOT_WECOM_AGENT_ID`
//!
//! 配置文件格式：
//! ```json
//! {
//!   "ding_talk": { "webhook": "https://oapi.dingtalk.com/robot/send?access_token=xxx", "secret": "SECxxx" },
//!   "wecom": { "corp_id": "wwxxx", "corp_secret": "xxx", "agent_id": 1000002 }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 钉钉机器人配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DingTalkConfig {
    pub webhook: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// 企业微信应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeComConfig {
    pub corp_id: String,
    pub corp_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub ding_talk: Option<DingTalkConfig>,
    #[serde(default)]
    pub wecom: Option<WeComConfig>,
}

impl BotConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/msg-bot/config.json"))
    }

    /// 从配置文件和环境变量自动加载
    pub fn auto_load() -> Result<Self> {
        let config = match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        Ok(config.apply_env(|key| std::env::var(key).ok()))
    }

    /// 从指定文件加载
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// 用环境变量覆盖配置
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(webhook) = var("MSGBOT_DINGTALK_WEBHOOK") {
            let secret = self.ding_talk.take().and_then(|c| c.secret);
            self.ding_talk = Some(DingTalkConfig { webhook, secret });
        }
        if let Some(secret) = var("MSGBOT_DINGTALK_SECRET") {
            if let Some(ding_talk) = self.ding_talk.as_mut() {
                ding_talk.secret = Some(secret);
            }
        }

        if let (Some(corp_id), Some(corp_secret)) =
            (var("MSGBOT_WECOM_CORP_ID"), var("MSGBOT_WECOM_CORP_SECRET"))
        {
            let agent_id = self.wecom.take().and_then(|c| c.agent_id);
            self.wecom = Some(WeComConfig {
                corp_id,
                corp_secret,
                agent_id,
            });
        }
        if let Some(agent_id) = var("MSGBOT_WECOM_AGENT_ID").and_then(|v| v.parse().ok()) {
            if let Some(wecom) = self.wecom.as_mut() {
                wecom.agent_id = Some(agent_id);
            }
        }

        self
    }
}
