//! MsgBot - 钉钉群机器人和企业微信应用消息通知助手

pub mod clock;
pub mod config;
pub mod ding_talk;
pub mod error;
pub mod transport;
pub mod wecom;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BotConfig, DingTalkConfig, WeComConfig};
pub use ding_talk::{ActionButton, BtnOrientation, DingTalkBot, FeedLink, Message, SendOptions};
pub use error::{BotError, Result};
pub use transport::{HttpTransport, RemoteResponse, Transport};
pub use wecom::{AppMessage, Recipients, WeComBot};
