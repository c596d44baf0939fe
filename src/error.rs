//! 错误类型

use std::time::Duration;
use thiserror::Error;

/// 钉钉错误码文档
pub const DING_TALK_ERROR_DOC: &str = "https://ding-doc.dingtalk.com/doc#/serverapi2/qf2nxq";

/// 企业微信全局错误码文档
pub const WECOM_ERROR_DOC: &str = "https://developer.work.weixin.qq.com/document/path/90313";

/// 发送消息过程中的所有失败
#[derive(Debug, Error)]
pub enum BotError {
    /// 配置错误（如加签密钥格式不对）
    #[error("invalid configuration: {0}")]
    Config(String),

    /// 消息字段缺失或格式不对，发生在任何网络请求之前
    #[error("invalid message, missing or malformed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// 限流等待超过了队列等待超时
    #[error("rate gate wait of {}s exceeds queue timeout of {}s", .waited.as_secs(), .limit.as_secs())]
    Timeout { waited: Duration, limit: Duration },

    /// 网络层失败
    #[error("request failed: {0}")]
    Transport(String),

    /// 远端返回非 0 errcode
    #[error("remote rejected message (errcode {errcode}): {raw}\nsee [ {doc_url} ]")]
    RemoteRejection {
        errcode: i64,
        raw: String,
        doc_url: &'static str,
    },
}

impl BotError {
    /// 单字段校验错误
    pub fn invalid(field: impl Into<String>) -> Self {
        Self::Validation(vec![field.into()])
    }

    /// 远端错误码（仅 RemoteRejection）
    pub fn errcode(&self) -> Option<i64> {
        match self {
            Self::RemoteRejection { errcode, .. } => Some(*errcode),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
