//! 锁状态徽标与强制解锁流程。

use tracing::{info, warn};

use crate::endpoints::{Endpoints, LockAction};
use crate::error::LockError;
use crate::surface::EditSurface;
use crate::transport::{LockTransport, Method};

pub const LOCKED_CLASS: &str = "locking-locked";

/// 列表页上代表某个对象锁状态的徽标。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockBadge {
    pub lock_id: String,
    pub locked_by: String,
    pub classes: Vec<String>,
    pub hidden: bool,
}

impl LockBadge {
    /// 从元素属性（`class`、`data-lock-id`、`data-locked-by`）构建徽标。
    pub fn from_attributes<'a, I>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut badge = LockBadge::default();
        for (name, value) in attributes {
            match name {
                "class" => {
                    badge.classes = value.split_whitespace().map(str::to_string).collect();
                }
                "data-lock-id" => badge.lock_id = value.trim().to_string(),
                "data-locked-by" => badge.locked_by = value.trim().to_string(),
                _ => {}
            }
        }
        badge
    }

    pub fn is_locked(&self) -> bool {
        self.classes.iter().any(|class| class == LOCKED_CLASS)
    }

    pub fn confirmation_message(&self) -> String {
        format!(
            "User '{}' is currently editing this content. Proceed with removing the lock?",
            self.locked_by
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForceUnlock {
    /// 徽标未处于锁定状态，不发请求。
    NotLocked,
    /// 没有可用的 lock_remove 地址模板。
    NoEndpoint,
    Declined,
    Removed,
}

/// 强制移除他人的锁：先确认，成功后隐藏徽标。
pub async fn remove_foreign_lock(
    transport: &dyn LockTransport,
    surface: &dyn EditSurface,
    endpoints: &Endpoints,
    badge: &mut LockBadge,
) -> Result<ForceUnlock, LockError> {
    if !badge.is_locked() {
        return Ok(ForceUnlock::NotLocked);
    }
    let Some(url) = endpoints.url_for(LockAction::LockRemove, &badge.lock_id) else {
        warn!(lock_id = %badge.lock_id, "no lock_remove url for badge");
        return Ok(ForceUnlock::NoEndpoint);
    };
    if !surface.confirm(&badge.confirmation_message()) {
        return Ok(ForceUnlock::Declined);
    }

    let response = transport.fetch(Method::Post, &url).await?;
    if let Some(err) = LockError::from_status(response.status) {
        warn!(lock_id = %badge.lock_id, status = response.status, "force unlock rejected");
        return Err(err);
    }
    badge.hidden = true;
    info!(lock_id = %badge.lock_id, locked_by = %badge.locked_by, "foreign lock removed");
    Ok(ForceUnlock::Removed)
}
