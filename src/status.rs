//! 锁状态响应的解析与分类。

use serde::Deserialize;

use crate::error::LockError;

/// 服务端返回的锁信息。
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    pub applies: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub locked_by: Option<String>,
    #[serde(default)]
    pub locked_by_name: Option<String>,
    #[serde(default)]
    pub for_user: Option<String>,
    #[serde(default)]
    pub current_user: Option<String>,
    #[serde(default)]
    pub lock_pk: Option<u64>,
}

impl LockInfo {
    /// 锁持有者的展示名称。
    pub fn owner_name(&self) -> Option<&str> {
        [&self.locked_by_name, &self.locked_by, &self.for_user]
            .into_iter()
            .filter_map(|value| value.as_deref())
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    pub fn parse(body: &[u8]) -> Result<Self, LockError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// 一次轮询的最终结果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// 锁不作用于当前用户：已获取或已续期。
    Granted(LockInfo),
    /// 锁由其他用户持有（`applies == true` 或 403/423）。
    Held(LockInfo),
    /// 404：该对象不支持加锁。
    Unsupported,
    Failed(LockError),
}

impl PollOutcome {
    /// 根据状态码与响应体判定轮询结果。
    pub fn classify(status: u16, body: &[u8]) -> Self {
        match LockError::from_status(status) {
            None => match LockInfo::parse(body) {
                Ok(info) if info.applies => PollOutcome::Held(info),
                Ok(info) => PollOutcome::Granted(info),
                Err(err) => PollOutcome::Failed(err),
            },
            Some(LockError::Forbidden(_)) => {
                // 403/423 的响应体可能为空，仅用于读取持有者。
                let mut info = LockInfo::parse(body).unwrap_or_default();
                info.applies = true;
                PollOutcome::Held(info)
            }
            Some(LockError::NotFound) => PollOutcome::Unsupported,
            Some(err) => PollOutcome::Failed(err),
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, PollOutcome::Granted(_))
    }
}
