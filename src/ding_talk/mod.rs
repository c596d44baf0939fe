//! 钉钉群聊天机器人
//!
//! 每个机器人每分钟最多发送 20 条消息。
//! 钉钉官方文档：https://ding-doc.dingtalk.com/doc#/serverapi2/qf2nxq/404d04c3
//!
//! # 使用示例
//! ```ignore
//! use msg_bot::ding_talk::DingTalkBot;
//!
//! let bot = DingTalkBot::new(webhook, Some("SECxxx".to_string()))?;
//! bot.send_text("今天天气真好 @150xxxxxxxx", &[], false)?;
//! ```

pub mod client;
pub mod message;
pub mod rate_gate;
pub mod signer;

pub use client::{DingTalkBot, SendOptions};
pub use message::{
    parse_buttons, parse_feed_links, scan_mentions, ActionButton, ActionCard, BtnOrientation,
    FeedLink, Message,
};
pub use rate_gate::{RateGate, SendWindow};
pub use signer::{sign, SignedUrl};
