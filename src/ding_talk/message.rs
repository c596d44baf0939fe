//! 钉钉机器人消息体
//!
//! 支持六种消息类型：text、link、markdown、整体跳转 ActionCard、
//! 独立跳转 ActionCard、FeedCard。所有构造函数只做字段校验，
//! 不涉及网络和加签。
//!
//! 序列化后的格式与钉钉文档一致，例如：
//! ```json
//! {
//!   "msgtype": "text",
//!   "text": { "content": "hello @150xxxx" },
//!   "at": { "atMobiles": ["150xxxx"], "isAtAll": false }
//! }
//! ```

use crate::error::{BotError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(\d+)").expect("valid mention regex"))
}

/// 从内容中匹配出所有 `@手机号`
pub fn scan_mentions(content: &str) -> Vec<String> {
    mention_regex()
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .collect()
}

/// 钉钉消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msgtype")]
pub enum Message {
    #[serde(rename = "text")]
    Text { text: TextContent, at: At },
    #[serde(rename = "link")]
    Link { link: Link },
    #[serde(rename = "markdown")]
    Markdown { markdown: Markdown, at: At },
    #[serde(rename = "actionCard")]
    ActionCard {
        #[serde(rename = "actionCard")]
        action_card: ActionCard,
    },
    #[serde(rename = "feedCard")]
    FeedCard {
        #[serde(rename = "feedCard")]
        feed_card: FeedCard,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
}

/// @ 设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct At {
    #[serde(rename = "atMobiles")]
    pub at_mobiles: Vec<String>,
    #[serde(rename = "isAtAll")]
    pub is_at_all: bool,
}

impl At {
    /// 显式指定的手机号在前，内容中匹配到的在后；不去重
    fn collect(explicit: &[String], content: &str, at_all: bool) -> Self {
        let mut at_mobiles = explicit.to_vec();
        at_mobiles.extend(scan_mentions(content));
        Self {
            at_mobiles,
            is_at_all: at_all,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub title: String,
    #[serde(rename = "picUrl", default, skip_serializing_if = "Option::is_none")]
    pub pic_url: Option<String>,
    #[serde(rename = "messageUrl")]
    pub message_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Markdown {
    pub title: String,
    pub text: String,
}

/// ActionCard，按字段区分整体跳转和独立跳转
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionCard {
    Single(SingleActionCard),
    Multi(MultiActionCard),
}

/// 整体跳转 ActionCard
///
/// `btnOrientation` 对这种类型无效，不提供配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleActionCard {
    pub title: String,
    pub text: String,
    #[serde(rename = "singleTitle")]
    pub single_title: String,
    #[serde(rename = "singleURL")]
    pub single_url: String,
}

/// 独立跳转 ActionCard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiActionCard {
    pub title: String,
    pub text: String,
    #[serde(rename = "btnOrientation")]
    pub btn_orientation: BtnOrientation,
    pub btns: Vec<ActionButton>,
}

/// 按钮排列方向（按钮超过两个时钉钉自动竖排）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BtnOrientation {
    #[default]
    #[serde(rename = "0")]
    Vertical,
    #[serde(rename = "1")]
    Horizontal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionButton {
    pub title: String,
    #[serde(rename = "actionURL")]
    pub action_url: String,
}

impl ActionButton {
    pub fn new(title: impl Into<String>, action_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            action_url: action_url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedCard {
    pub links: Vec<FeedLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedLink {
    pub title: String,
    #[serde(rename = "messageURL")]
    pub message_url: String,
    #[serde(rename = "picURL")]
    pub pic_url: String,
}

impl FeedLink {
    pub fn new(
        title: impl Into<String>,
        message_url: impl Into<String>,
        pic_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message_url: message_url.into(),
            pic_url: pic_url.into(),
        }
    }
}

/// 收集缺失字段
#[derive(Default)]
struct Missing(Vec<String>);

impl Missing {
    fn check(&mut self, name: impl Into<String>, value: &str) -> &mut Self {
        if value.is_empty() {
            self.0.push(name.into());
        }
        self
    }

    fn push(&mut self, name: impl Into<String>) {
        self.0.push(name.into());
    }

    fn finish(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(BotError::Validation(self.0))
        }
    }
}

impl Message {
    /// text 类型
    ///
    /// 内容中的 `@手机号` 会自动加入 `atMobiles`。
    pub fn text(content: &str, at_mobiles: &[String], at_all: bool) -> Result<Self> {
        let mut missing = Missing::default();
        missing.check("content", content);
        missing.finish()?;

        Ok(Self::Text {
            text: TextContent {
                content: content.to_string(),
            },
            at: At::collect(at_mobiles, content, at_all),
        })
    }

    /// link 类型，`pic_url` 可选
    pub fn link(title: &str, text: &str, message_url: &str, pic_url: Option<&str>) -> Result<Self> {
        let mut missing = Missing::default();
        missing
            .check("title", title)
            .check("text", text)
            .check("messageUrl", message_url);
        missing.finish()?;

        Ok(Self::Link {
            link: Link {
                text: text.to_string(),
                title: title.to_string(),
                pic_url: pic_url.filter(|u| !u.is_empty()).map(str::to_string),
                message_url: message_url.to_string(),
            },
        })
    }

    /// markdown 类型（钉钉仅支持部分 Markdown 语法）
    pub fn markdown(title: &str, text: &str, at_mobiles: &[String], at_all: bool) -> Result<Self> {
        let mut missing = Missing::default();
        missing.check("title", title).check("text", text);
        missing.finish()?;

        Ok(Self::Markdown {
            markdown: Markdown {
                title: title.to_string(),
                text: text.to_string(),
            },
            at: At::collect(at_mobiles, text, at_all),
        })
    }

    /// 整体跳转 ActionCard
    pub fn single_action_card(
        title: &str,
        text: &str,
        single_title: &str,
        single_url: &str,
    ) -> Result<Self> {
        let mut missing = Missing::default();
        missing
            .check("title", title)
            .check("text", text)
            .check("singleTitle", single_title)
            .check("singleURL", single_url);
        missing.finish()?;

        Ok(Self::ActionCard {
            action_card: ActionCard::Single(SingleActionCard {
                title: title.to_string(),
                text: text.to_string(),
                single_title: single_title.to_string(),
                single_url: single_url.to_string(),
            }),
        })
    }

    /// 独立跳转 ActionCard
    pub fn multi_action_card(
        title: &str,
        text: &str,
        btns: Vec<ActionButton>,
        orientation: BtnOrientation,
    ) -> Result<Self> {
        let mut missing = Missing::default();
        missing.check("title", title).check("text", text);
        if btns.is_empty() {
            missing.push("btns");
        }
        for (i, btn) in btns.iter().enumerate() {
            missing
                .check(format!("btns[{}].title", i), &btn.title)
                .check(format!("btns[{}].actionURL", i), &btn.action_url);
        }
        missing.finish()?;

        Ok(Self::ActionCard {
            action_card: ActionCard::Multi(MultiActionCard {
                title: title.to_string(),
                text: text.to_string(),
                btn_orientation: orientation,
                btns,
            }),
        })
    }

    /// FeedCard
    pub fn feed_card(links: Vec<FeedLink>) -> Result<Self> {
        let mut missing = Missing::default();
        if links.is_empty() {
            missing.push("links");
        }
        for (i, link) in links.iter().enumerate() {
            missing
                .check(format!("links[{}].title", i), &link.title)
                .check(format!("links[{}].messageURL", i), &link.message_url)
                .check(format!("links[{}].picURL", i), &link.pic_url);
        }
        missing.finish()?;

        Ok(Self::FeedCard {
            feed_card: FeedCard { links },
        })
    }

    /// 消息类型名
    pub fn msgtype(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Link { .. } => "link",
            Self::Markdown { .. } => "markdown",
            Self::ActionCard { .. } => "actionCard",
            Self::FeedCard { .. } => "feedCard",
        }
    }
}

/// 读取 JSON 对象中的字符串字段，缺失或类型不对时记录字段名
fn string_field(
    entry: &serde_json::Value,
    key: &str,
    path: String,
    missing: &mut Missing,
) -> String {
    match entry.get(key).and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => {
            missing.push(path);
            String::new()
        }
    }
}

fn entries<'a>(value: &'a serde_json::Value, name: &str) -> Result<&'a Vec<serde_json::Value>> {
    match value.as_array() {
        Some(list) if !list.is_empty() => Ok(list),
        _ => Err(BotError::invalid(name)),
    }
}

/// 解析按钮列表，如 `[{"title": "xx", "actionURL": "xx"}, ...]`
///
/// 必须包含 `title` 和 `actionURL`，多余字段忽略。
pub fn parse_buttons(value: &serde_json::Value) -> Result<Vec<ActionButton>> {
    let list = entries(value, "btns")?;
    let mut missing = Missing::default();

    let btns: Vec<ActionButton> = list
        .iter()
        .enumerate()
        .map(|(i, entry)| ActionButton {
            title: string_field(entry, "title", format!("btns[{}].title", i), &mut missing),
            action_url: string_field(entry, "actionURL", format!("btns[{}].actionURL", i), &mut missing),
        })
        .collect();

    missing.finish()?;
    Ok(btns)
}

/// 解析 FeedCard 链接列表，如 `[{"title": "xx", "messageURL": "xx", "picURL": "xx"}, ...]`
///
/// 必须包含 `title`、`messageURL`、`picURL`，多余字段忽略。
pub fn parse_feed_links(value: &serde_json::Value) -> Result<Vec<FeedLink>> {
    let list = entries(value, "links")?;
    let mut missing = Missing::default();

    let links: Vec<FeedLink> = list
        .iter()
        .enumerate()
        .map(|(i, entry)| FeedLink {
            title: string_field(entry, "title", format!("links[{}].title", i), &mut missing),
            message_url: string_field(entry, "messageURL", format!("links[{}].messageURL", i), &mut missing),
            pic_url: string_field(entry, "picURL", format!("links[{}].picURL", i), &mut missing),
        })
        .collect();

    missing.finish()?;
    Ok(links)
}
