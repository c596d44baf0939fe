//! 集成测试共用的传输层替身和 HTTP 桩服务

#![allow(dead_code)]

use msg_bot::{BotError, Result, Transport};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

pub const OK_BODY: &str = r#"{"errcode":0,"errmsg":"ok"}"#;

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub method: &'static str,
    pub url: String,
    pub body: String,
    pub timeout: Duration,
}

pub enum Reply {
    Body(String),
    Fail(String),
}

/// 记录所有请求，按顺序返回预设响应（用完后返回 `OK_BODY`）
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<Recorded>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, body: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Reply::Body(body.to_string()));
        self
    }

    pub fn fail(&self, reason: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Reply::Fail(reason.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str, url: &str, body: &str, timeout: Duration) -> Result<String> {
        self.requests.lock().unwrap().push(Recorded {
            method,
            url: url.to_string(),
            body: body.to_string(),
            timeout,
        });
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Fail(reason)) => Err(BotError::Transport(reason)),
            None => Ok(OK_BODY.to_string()),
        }
    }
}

impl Transport for RecordingTransport {
    fn post_json(&self, url: &str, body: &str, timeout: Duration) -> Result<String> {
        self.record("POST", url, body, timeout)
    }

    fn get(&self, url: &str, timeout: Duration) -> Result<String> {
        self.record("GET", url, "", timeout)
    }
}

/// 桩服务收到的请求
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub head: String,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }
}

fn read_request(stream: &mut std::net::TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let request = CapturedRequest {
        head,
        body: String::new(),
    };
    let length: usize = request
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    while buf.len() < head_end + length {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    CapturedRequest {
        body: String::from_utf8_lossy(&buf[head_end..]).to_string(),
        ..request
    }
}

/// 启动只处理一个请求的 HTTP 桩服务，返回地址和收到的请求
pub fn serve_once(status: &'static str, body: &'static str) -> (SocketAddr, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request(&mut stream);
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        request
    });

    (addr, handle)
}

/// 接受连接但从不响应
pub fn serve_silent(hold: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            std::thread::sleep(hold);
            drop(stream);
        }
    });

    addr
}
