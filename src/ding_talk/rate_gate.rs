//! 发送限流
//!
//! 钉钉限制每个机器人每分钟最多发送 20 条消息。这里用一个容量为 20 的
//! 时间戳窗口记录最近的发送时间：窗口满时取最早的一条，若距今不超过 58 秒
//! （提前 2 秒，避免过于极限），当前发送挂起 `60 - 间隔` 秒后再继续。
//! 限流只会延迟，不会丢弃消息。

use crate::clock::Clock;
use crate::error::{BotError, Result};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// 每分钟最多发送条数
pub const MAX_SENDS_PER_WINDOW: usize = 20;

/// 限流窗口（秒）
pub const WINDOW_SECS: i64 = 60;

/// 间隔不超过该值时需要等待
pub const WAIT_THRESHOLD_SECS: i64 = 58;

/// 最近发送时间窗口，按时间先后排列，最早的在前
#[derive(Debug, Clone)]
pub struct SendWindow {
    entries: VecDeque<DateTime<Utc>>,
    capacity: usize,
}

impl SendWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        self.entries.front().copied()
    }

    /// 记录一次发送，窗口已满时先淘汰最早的一条并返回
    pub fn push(&mut self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let evicted = if self.is_full() {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(at);
        evicted
    }

    /// 在 `now` 发送前需要等待的时长
    pub fn required_wait(&self, now: DateTime<Utc>) -> Duration {
        if !self.is_full() {
            return Duration::ZERO;
        }
        let Some(earliest) = self.earliest() else {
            return Duration::ZERO;
        };

        let elapsed = (now - earliest).num_seconds();
        if elapsed <= WAIT_THRESHOLD_SECS {
            Duration::from_secs((WINDOW_SECS - elapsed) as u64)
        } else {
            Duration::ZERO
        }
    }
}

impl Default for SendWindow {
    fn default() -> Self {
        Self::new(MAX_SENDS_PER_WINDOW)
    }
}

/// 限流闸门
///
/// 窗口的读取和写入在同一把锁内完成；等待在锁外进行，
/// 因此后到的线程不会被前一个线程的等待卡住锁，但会按取锁顺序排队。
pub struct RateGate {
    window: Mutex<SendWindow>,
    clock: Arc<dyn Clock>,
}

impl RateGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_window(SendWindow::default(), clock)
    }

    pub fn with_window(window: SendWindow, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: Mutex::new(window),
            clock,
        }
    }

    /// 每次网络发送前调用，必要时阻塞当前线程
    ///
    /// 窗口中记录的是放行时间（`now + wait`）。若需要等待的时长超过
    /// `queue_timeout`，直接返回 `Timeout`，窗口保持不变。
    pub fn acquire(&self, queue_timeout: Duration) -> Result<Duration> {
        let wait = {
            let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
            let now = self.clock.now();
            let wait = window.required_wait(now);

            if wait > queue_timeout {
                return Err(BotError::Timeout {
                    waited: wait,
                    limit: queue_timeout,
                });
            }

            let admitted_at = now + chrono::Duration::from_std(wait).unwrap_or(chrono::Duration::zero());
            window.push(admitted_at);
            debug!(queued = window.len(), wait_secs = wait.as_secs(), "Rate gate admitted send");
            wait
        };

        if !wait.is_zero() {
            warn!(
                wait_secs = wait.as_secs(),
                "Rate limit reached ({} messages per minute), delaying send",
                MAX_SENDS_PER_WINDOW
            );
            self.clock.sleep(wait);
        }

        Ok(wait)
    }

    /// 当前窗口快照
    pub fn snapshot(&self) -> SendWindow {
        self.window.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
