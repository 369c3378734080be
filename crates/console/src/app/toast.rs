use std::time::{Duration, Instant};

use crate::client::ClientError;

const TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct ToastState {
    pub message: String,
    pub level: ToastLevel,
    pub expires_at: Instant,
}

impl ToastState {
    pub fn new(level: ToastLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            expires_at: Instant::now() + TOAST_TTL,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Info, message)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Short reason shown next to a failed action.
pub fn error_detail(err: &ClientError) -> String {
    match err {
        ClientError::Network(_) => "서버에 연결할 수 없습니다".to_string(),
        ClientError::Unauthorized => "인증이 만료되었습니다".to_string(),
        ClientError::Server { status, body } => format!("{}: {body}", status.as_u16()),
    }
}

/// Error toast for a failed action, or `None` on 401 where the login
/// redirect already tells the user what happened.
pub fn failure_toast(action: &str, err: &ClientError) -> Option<ToastState> {
    if matches!(err, ClientError::Unauthorized) {
        return None;
    }
    Some(ToastState::error(format!("{action} ({})", error_detail(err))))
}
