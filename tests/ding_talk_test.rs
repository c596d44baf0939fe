mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::RecordingTransport;
use msg_bot::ding_talk::{parse_buttons, parse_feed_links};
use msg_bot::{
    ActionButton, BotError, BtnOrientation, Clock, DingTalkBot, ManualClock, Message, SendOptions,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const WEBHOOK: &str = "https://oapi.dingtalk.com/robot/send?access_token=test";
const SECRET: &str = "SEC0123456789abcdef";

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn setup(secret: Option<&str>) -> (Arc<ManualClock>, Arc<RecordingTransport>, DingTalkBot) {
    let clock = Arc::new(ManualClock::new(start()));
    let transport = Arc::new(RecordingTransport::new());
    let bot = DingTalkBot::with_parts(
        WEBHOOK,
        secret.map(str::to_string),
        transport.clone(),
        clock.clone(),
    )
    .unwrap();
    (clock, transport, bot)
}

/// 按钉钉文档独立计算签名（解码后）
fn expected_sign(secret: &str, timestamp: &str) -> String {
    use base64::Engine as _;
    use hmac::{Hmac, Mac};

    let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}\n{}", timestamp, secret).as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

fn query(url: &str) -> HashMap<String, String> {
    url::Url::parse(url).unwrap().query_pairs().into_owned().collect()
}

#[test]
fn test_send_text_without_secret_uses_raw_webhook() {
    let (_clock, transport, bot) = setup(None);

    let response = bot.send_text("hello @12345 world", &[], false).unwrap();
    assert_eq!(response.errcode, 0);
    assert_eq!(response.errmsg(), Some("ok"));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].url, WEBHOOK);
    assert_eq!(requests[0].timeout, Duration::from_secs(60));

    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body["msgtype"], "text");
    assert_eq!(body["at"]["atMobiles"], serde_json::json!(["12345"]));
}

#[test]
fn test_every_message_kind_is_sent() {
    let (_clock, transport, bot) = setup(None);

    bot.send_link("title", "text", "https://www.dingtalk.com/", None).unwrap();
    bot.send_markdown("title", "#### 标题 @138000", &["139000".to_string()], false)
        .unwrap();
    bot.send_single_action_card("title", "text", "阅读全文", "https://www.dingtalk.com/")
        .unwrap();
    let btns = parse_buttons(&serde_json::json!([
        {"title": "option-1", "actionURL": "https://www.dingtalk.com/"},
        {"title": "option-2", "actionURL": "https://www.dingtalk.com/", "test": "test"}
    ]))
    .unwrap();
    bot.send_multi_action_card("title", "text", btns, BtnOrientation::Vertical)
        .unwrap();
    let links = parse_feed_links(&serde_json::json!([
        {"title": "FeedCard_1", "messageURL": "https://www.dingtalk.com", "picURL": "https://img/1.png"}
    ]))
    .unwrap();
    bot.send_feed_card(links).unwrap();

    let kinds: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_str(&r.body).unwrap();
            body["msgtype"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(kinds, vec!["link", "markdown", "actionCard", "actionCard", "feedCard"]);

    let markdown: serde_json::Value = serde_json::from_str(&transport.requests()[1].body).unwrap();
    assert_eq!(markdown["at"]["atMobiles"], serde_json::json!(["139000", "138000"]));
}

#[test]
fn test_validation_error_before_any_network_activity() {
    let (clock, transport, bot) = setup(Some(SECRET));

    let err = bot.send_feed_card(vec![]).unwrap_err();
    assert!(matches!(err, BotError::Validation(_)));
    let err = bot
        .send_multi_action_card("t", "b", vec![ActionButton::new("A", "")], BtnOrientation::Vertical)
        .unwrap_err();
    assert!(err.to_string().contains("btns[0].actionURL"));

    assert!(transport.requests().is_empty());
    assert!(clock.sleeps().is_empty());

    // 校验失败不占用限流窗口
    for _ in 0..20 {
        bot.send_text("ok", &[], false).unwrap();
    }
    assert!(clock.sleeps().is_empty());
}

#[test]
fn test_signed_url_verifies_and_refreshes_at_58_minutes() {
    let (clock, transport, bot) = setup(Some(SECRET));

    bot.send_text("first", &[], false).unwrap();
    clock.advance(Duration::from_secs(57 * 60 + 59));
    bot.send_text("second", &[], false).unwrap();
    clock.advance(Duration::from_secs(1));
    bot.send_text("third", &[], false).unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].url, requests[1].url);
    assert_ne!(requests[1].url, requests[2].url);

    let first = query(&requests[0].url);
    assert_eq!(first["access_token"], "test");
    assert_eq!(first["timestamp"], start().timestamp_millis().to_string());
    assert_eq!(first["sign"], expected_sign(SECRET, &first["timestamp"]));

    let third = query(&requests[2].url);
    assert_eq!(third["timestamp"], clock.now().timestamp_millis().to_string());
}

#[test]
fn test_twenty_sends_do_not_wait() {
    let (clock, transport, bot) = setup(None);

    for i in 0..20 {
        bot.send_text(&format!("message {}", i), &[], false).unwrap();
    }

    assert_eq!(transport.requests().len(), 20);
    assert!(clock.sleeps().is_empty());
}

#[test]
fn test_twenty_first_send_blocks_until_window_passes() {
    let (clock, transport, bot) = setup(None);

    for _ in 0..20 {
        bot.send_text("burst", &[], false).unwrap();
    }
    clock.advance(Duration::from_secs(30));
    bot.send_text("21st", &[], false).unwrap();

    assert_eq!(clock.sleeps(), vec![Duration::from_secs(30)]);
    assert_eq!(clock.now(), start() + chrono::Duration::seconds(60));
    assert_eq!(transport.requests().len(), 21);
}

#[test]
fn test_twenty_first_send_boundaries() {
    let (clock, _transport, bot) = setup(None);
    for _ in 0..20 {
        bot.send_text("burst", &[], false).unwrap();
    }
    clock.advance(Duration::from_secs(58));
    bot.send_text("at 58s", &[], false).unwrap();
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);

    let (clock, _transport, bot) = setup(None);
    for _ in 0..20 {
        bot.send_text("burst", &[], false).unwrap();
    }
    clock.advance(Duration::from_secs(59));
    bot.send_text("at 59s", &[], false).unwrap();
    assert!(clock.sleeps().is_empty());
}

#[test]
fn test_queue_timeout_is_distinct_from_network_timeout() {
    let (_clock, transport, bot) = setup(None);
    for _ in 0..20 {
        bot.send_text("burst", &[], false).unwrap();
    }

    let message = Message::text("late", &[], false).unwrap();
    let options = SendOptions {
        queue_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(3),
    };
    let err = bot.send(&message, &options).unwrap_err();
    assert!(matches!(err, BotError::Timeout { .. }));
    assert_eq!(transport.requests().len(), 20);

    let options = SendOptions {
        queue_timeout: Duration::from_secs(60),
        request_timeout: Duration::from_secs(3),
    };
    bot.send(&message, &options).unwrap();
    assert_eq!(transport.requests()[20].timeout, Duration::from_secs(3));
}

#[test]
fn test_delayed_send_resigns_expired_url() {
    let (clock, transport, bot) = setup(Some(SECRET));

    bot.send_text("first", &[], false).unwrap();
    clock.advance(Duration::from_secs(57 * 60 + 30));
    for _ in 0..20 {
        bot.send_text("burst", &[], false).unwrap();
    }
    clock.advance(Duration::from_secs(1));
    bot.send_text("delayed", &[], false).unwrap();

    // 第 21 条需要等待 59 秒，发送时原签名已超过 58 分钟
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(59)]);

    let requests = transport.requests();
    assert_eq!(requests.len(), 22);
    assert_eq!(requests[0].url, requests[20].url);

    let sent_at = clock.now().timestamp_millis();
    let last = query(&requests[21].url);
    let signed_at: i64 = last["timestamp"].parse().unwrap();
    assert!(sent_at - signed_at < 58 * 60 * 1000);
    assert_eq!(signed_at, sent_at);
    assert_eq!(last["sign"], expected_sign(SECRET, &last["timestamp"]));
}

#[test]
fn test_remote_rejection_carries_errcode() {
    let (_clock, transport, bot) = setup(None);
    transport.reply(r#"{"errcode": 300001, "errmsg": "token is not exist"}"#);

    let err = bot.send_text("hello", &[], false).unwrap_err();
    match err {
        BotError::RemoteRejection { errcode, raw, doc_url } => {
            assert_eq!(errcode, 300001);
            assert!(raw.contains("token is not exist"));
            assert!(doc_url.contains("dingtalk"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_missing_errcode_is_failure() {
    let (_clock, transport, bot) = setup(None);
    transport.reply(r#"{"errmsg": "ok"}"#);

    let err = bot.send_text("hello", &[], false).unwrap_err();
    assert_eq!(err.errcode(), Some(1));
}

#[test]
fn test_transport_error_surfaces() {
    let (_clock, transport, bot) = setup(None);
    transport.fail("connection refused");

    let err = bot.send_text("hello", &[], false).unwrap_err();
    match err {
        BotError::Transport(reason) => assert!(reason.contains("connection refused")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_shared_between_threads() {
    let (clock, transport, bot) = setup(Some(SECRET));
    let bot = Arc::new(bot);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let bot = bot.clone();
            std::thread::spawn(move || {
                for i in 0..5 {
                    bot.send_text(&format!("thread {} message {}", t, i), &[], false)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let requests = transport.requests();
    assert_eq!(requests.len(), 20);
    assert!(clock.sleeps().is_empty());
    // 签名只计算一次
    assert!(requests.iter().all(|r| r.url == requests[0].url));
}
