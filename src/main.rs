//! MsgBot CLI
//!
//! 从配置文件或环境变量读取机器人设置并发送一条消息。

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use msg_bot::{BotConfig, DingTalkBot, Recipients, SendOptions, WeComBot};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "msgbot")]
#[command(about = "MsgBot - 钉钉群机器人 / 企业微信应用消息通知")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.config/msg-bot/config.json）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 通过钉钉群机器人发送
    Ding {
        /// 限流等待超时（秒）
        #[arg(long, default_value = "60")]
        queue_timeout: u64,
        /// 请求超时（秒）
        #[arg(long, default_value = "60")]
        request_timeout: u64,
        #[command(subcommand)]
        message: DingMessage,
    },
    /// 通过企业微信应用发送
    Wecom {
        /// 应用 agent id（默认读取配置）
        #[arg(long, global = true)]
        agent_id: Option<i64>,
        /// 接收成员，多个用 | 分隔，@all 表示全部
        #[arg(long, global = true)]
        to_user: Option<String>,
        /// 接收部门
        #[arg(long, global = true)]
        to_party: Option<String>,
        /// 接收标签
        #[arg(long, global = true)]
        to_tag: Option<String>,
        #[command(subcommand)]
        message: WecomMessage,
    },
}

#[derive(Subcommand)]
enum WecomMessage {
    /// 文本消息（最长 2048 字节）
    Text { content: String },
    /// markdown 消息
    Markdown { content: String },
}

#[derive(Subcommand)]
enum DingMessage {
    /// text 消息
    Text {
        content: String,
        /// 被 @ 的手机号，可重复
        #[arg(long = "at")]
        at_mobiles: Vec<String>,
        /// @所有人
        #[arg(long)]
        at_all: bool,
    },
    /// markdown 消息
    Markdown {
        title: String,
        text: String,
        #[arg(long = "at")]
        at_mobiles: Vec<String>,
        #[arg(long)]
        at_all: bool,
    },
    /// link 消息
    Link {
        title: String,
        text: String,
        /// 点击消息跳转的 URL
        message_url: String,
        /// 图片 URL
        #[arg(long)]
        pic_url: Option<String>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<BotConfig> {
    match path {
        Some(path) => Ok(BotConfig::load_from(&path)?.apply_env(|key| std::env::var(key).ok())),
        None => BotConfig::auto_load(),
    }
}

fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("msg_bot=info,msgbot=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    let response = match cli.command {
        Commands::Ding {
            queue_timeout,
            request_timeout,
            message,
        } => {
            let ding_talk = config
                .ding_talk
                .as_ref()
                .ok_or_else(|| anyhow!("DingTalk webhook not configured, set MSGBOT_DINGTALK_WEBHOOK"))?;
            let bot = DingTalkBot::from_config(ding_talk)?.with_options(SendOptions {
                queue_timeout: Duration::from_secs(queue_timeout),
                request_timeout: Duration::from_secs(request_timeout),
            });
            debug!(?bot, "DingTalk bot ready");

            match message {
                DingMessage::Text {
                    content,
                    at_mobiles,
                    at_all,
                } => bot.send_text(&content, &at_mobiles, at_all)?,
                DingMessage::Markdown {
                    title,
                    text,
                    at_mobiles,
                    at_all,
                } => bot.send_markdown(&title, &text, &at_mobiles, at_all)?,
                DingMessage::Link {
                    title,
                    text,
                    message_url,
                    pic_url,
                } => bot.send_link(&title, &text, &message_url, pic_url.as_deref())?,
            }
        }
        Commands::Wecom {
            agent_id,
            to_user,
            to_party,
            to_tag,
            message,
        } => {
            let wecom = config
                .wecom
                .as_ref()
                .ok_or_else(|| anyhow!("WeCom app not configured, set MSGBOT_WECOM_CORP_ID and MSGBOT_WECOM_CORP_SECRET"))?;
            let agent_id = agent_id
                .or(wecom.agent_id)
                .context("agent id missing, pass --agent-id or set MSGBOT_WECOM_AGENT_ID")?;
            let recipients = Recipients {
                to_user,
                to_party,
                to_tag,
            };

            let bot = WeComBot::from_config(wecom)?;
            match message {
                WecomMessage::Text { content } => bot.send_text(agent_id, &content, recipients)?,
                WecomMessage::Markdown { content } => {
                    bot.send_markdown(agent_id, &content, recipients)?
                }
            }
        }
    };

    println!("{}", serde_json::to_string(&response.raw)?);
    Ok(())
}
