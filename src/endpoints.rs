//! 锁接口地址集合与按对象 ID 的地址模板替换。

use serde::Deserialize;

/// 对象 ID 占位符，出现在尚未保存（新增页）的对象地址中。
pub const PLACEHOLDER_ID: &str = "0";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockAction {
    Lock,
    LockStatus,
    LockClear,
    LockRemove,
}

impl LockAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LockAction::Lock => "lock",
            LockAction::LockStatus => "lock_status",
            LockAction::LockClear => "lock_clear",
            LockAction::LockRemove => "lock_remove",
        }
    }
}

/// 服务端提供的锁接口地址。
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Endpoints {
    #[serde(default)]
    pub lock: Option<String>,
    #[serde(default)]
    pub lock_status: Option<String>,
    #[serde(default, alias = "unlock")]
    pub lock_clear: Option<String>,
    #[serde(default)]
    pub lock_remove: Option<String>,
}

impl Endpoints {
    pub fn get(&self, action: LockAction) -> Option<&str> {
        let url = match action {
            LockAction::Lock => &self.lock,
            LockAction::LockStatus => &self.lock_status,
            LockAction::LockClear => &self.lock_clear,
            LockAction::LockRemove => &self.lock_remove,
        };
        url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }

    /// 用 `other` 中已设置的地址覆盖当前地址。
    pub fn merge(mut self, other: Endpoints) -> Self {
        if other.lock.is_some() {
            self.lock = other.lock;
        }
        if other.lock_status.is_some() {
            self.lock_status = other.lock_status;
        }
        if other.lock_clear.is_some() {
            self.lock_clear = other.lock_clear;
        }
        if other.lock_remove.is_some() {
            self.lock_remove = other.lock_remove;
        }
        self
    }

    /// 判断当前页面是否支持加锁：缺少 lock 地址或仍为占位 ID 时不支持。
    pub fn supports_locking(&self) -> bool {
        match self.get(LockAction::Lock) {
            Some(url) => !is_placeholder(url, LockAction::Lock),
            None => false,
        }
    }

    /// 为指定对象生成动作地址，模板不含 `/0/{action}/` 结尾时返回 None。
    pub fn url_for(&self, action: LockAction, id: &str) -> Option<String> {
        let base = self.get(action)?;
        template_url(base, action, id)
    }
}

/// 将模板地址结尾的 `/0/{action}/` 替换为 `/{id}/{action}/`。
pub fn template_url(base: &str, action: LockAction, id: &str) -> Option<String> {
    let id = id.trim().trim_matches('/');
    if id.is_empty() || id.contains('/') {
        return None;
    }
    let segment = placeholder_segment(action);
    let prefix = base.strip_suffix(segment.as_str())?;
    Some(format!("{prefix}/{id}/{}/", action.as_str()))
}

fn is_placeholder(url: &str, action: LockAction) -> bool {
    url.ends_with(placeholder_segment(action).as_str())
}

fn placeholder_segment(action: LockAction) -> String {
    format!("/{PLACEHOLDER_ID}/{}/", action.as_str())
}
