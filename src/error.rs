//! 统一的锁客户端错误类型与转换。

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    Network(String),
    Forbidden(Option<String>),
    NotFound,
    Server(u16),
    Parse(String),
    Config(String),
}

impl LockError {
    /// 将 HTTP 状态码映射为错误分类（2xx 返回 None）。
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            403 | 423 => Some(LockError::Forbidden(None)),
            404 => Some(LockError::NotFound),
            _ => Some(LockError::Server(status)),
        }
    }

    /// 是否需要以通用提示告知用户（“请刷新页面”）。
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            LockError::Network(_) | LockError::Server(_) | LockError::Parse(_)
        )
    }
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::Network(msg) => write!(f, "network error: {msg}"),
            LockError::Forbidden(Some(owner)) => write!(f, "locked by {owner}"),
            LockError::Forbidden(None) => write!(f, "locked by another user"),
            LockError::NotFound => write!(f, "locking is not supported for this object"),
            LockError::Server(status) => write!(f, "unexpected server status {status}"),
            LockError::Parse(msg) => write!(f, "malformed lock response: {msg}"),
            LockError::Config(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for LockError {}

impl From<reqwest::Error> for LockError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => LockError::Server(status.as_u16()),
            None => LockError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for LockError {
    fn from(err: serde_json::Error) -> Self {
        LockError::Parse(err.to_string())
    }
}
