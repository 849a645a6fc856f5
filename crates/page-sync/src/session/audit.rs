use std::collections::VecDeque;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::error::AuditLogError;

pub const MAX_MESSAGE_LEN: usize = 1024;
pub const MAX_DATA_BYTES: usize = 4096;

/// Sliding-window limiter: at most `limit` accepted invocations within any
/// span of `window`.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    accepted: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            accepted: VecDeque::new(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns false while `limit` invocations already fall inside the
    /// trailing window.
    pub fn invoke(&mut self) -> bool {
        let now = Instant::now();
        while let Some(&oldest) = self.accepted.front() {
            if now.duration_since(oldest) < self.window {
                break;
            }
            self.accepted.pop_front();
        }
        if self.accepted.len() >= self.limit as usize {
            return false;
        }
        self.accepted.push_back(now);
        true
    }
}

pub fn validate_log(
    message: &str,
    data: Option<&Map<String, Value>>,
) -> Result<(), AuditLogError> {
    if message.is_empty() {
        return Err(AuditLogError::EmptyMessage);
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(AuditLogError::MessageTooLong {
            max: MAX_MESSAGE_LEN,
        });
    }
    if let Some(data) = data {
        let encoded = serde_json::to_vec(data).map_err(|_| AuditLogError::DataNotSerializable)?;
        if encoded.len() > MAX_DATA_BYTES {
            return Err(AuditLogError::DataTooLarge {
                max: MAX_DATA_BYTES,
            });
        }
    }
    Ok(())
}
