//! 企业微信应用消息
//!
//! 通过自建应用的 `corpid` + `corpsecret` 获取 access_token，
//! token 默认 2 小时过期，过期后在下一次发送时重新获取。

pub mod client;
pub mod message;
pub mod token;

pub use client::WeComBot;
pub use message::{AppMessage, Recipients};
pub use token::TokenCache;
