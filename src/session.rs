//! 页面级锁会话：纯状态机，根据轮询结果计算需要执行的副作用。
//!
//! 会话本身不做任何 I/O。`LockClient` 负责发起请求并把 [`Effect`]
//! 应用到编辑界面上。

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::LockError;
use crate::status::{LockInfo, PollOutcome};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_TIME_UNTIL_EXPIRATION: Duration = Duration::from_secs(600);
pub const DEFAULT_TIME_UNTIL_WARNING: Duration = Duration::from_secs(540);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    Unknown,
    Unlocked,
    LockedByMe,
    LockedByOther,
    Expired,
    Unsupported,
}

impl LockState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LockState::Expired | LockState::Unsupported)
    }

    /// 该状态下表单是否应被禁用。
    pub fn disables_form(self) -> bool {
        matches!(
            self,
            LockState::LockedByOther | LockState::Expired | LockState::Unknown
        )
    }
}

/// 锁的时间参数。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockTiming {
    pub poll_interval: Duration,
    pub time_until_expiration: Duration,
    pub time_until_warning: Duration,
}

impl Default for LockTiming {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            time_until_expiration: DEFAULT_TIME_UNTIL_EXPIRATION,
            time_until_warning: DEFAULT_TIME_UNTIL_WARNING,
        }
    }
}

impl LockTiming {
    /// 到期提醒中展示的剩余分钟数（至少 1 分钟）。
    pub fn warning_minutes(&self) -> u64 {
        let remaining = self
            .time_until_expiration
            .saturating_sub(self.time_until_warning)
            .as_secs();
        (remaining.saturating_add(30) / 60).max(1)
    }

    fn warns(&self) -> bool {
        self.time_until_warning < self.time_until_expiration
    }
}

/// 显示在页面通知区域的提示。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    LockedBy { owner: String },
    ExpiryWarning { minutes: u64 },
    Expired,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LockedBy { owner } => write!(
                f,
                "This page is locked by {owner} and editing is disabled."
            ),
            Notice::ExpiryWarning { minutes } => write!(
                f,
                "Your lock on this page expires in less than {minutes} minutes. \
                 Press save or reload the page."
            ),
            Notice::Expired => write!(
                f,
                "Your lock on this page is expired! If you save now, your attempts \
                 may be thwarted due to another lock, or even worse, you may have stale data."
            ),
        }
    }
}

/// 状态迁移产生的副作用，按顺序执行。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    DisableForm,
    EnableForm,
    Notify(Notice),
    Alert(String),
    Error(LockError),
    StopPolling,
}

#[derive(Clone, Copy, Debug)]
struct Deadlines {
    warn_at: Option<Instant>,
    expire_at: Instant,
    warned: bool,
}

/// 单个页面的锁会话。
#[derive(Debug)]
pub struct ClientSession {
    state: LockState,
    lock_owner: Option<String>,
    current_user: Option<String>,
    form_disabled: bool,
    locking_supported: bool,
    held: bool,
    released: bool,
    issued_seq: u64,
    applied_seq: u64,
    timing: LockTiming,
    deadlines: Option<Deadlines>,
}

impl ClientSession {
    pub fn new(timing: LockTiming) -> Self {
        Self {
            state: LockState::Unknown,
            lock_owner: None,
            current_user: None,
            form_disabled: true,
            locking_supported: true,
            held: false,
            released: false,
            issued_seq: 0,
            applied_seq: 0,
            timing,
            deadlines: None,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn lock_owner(&self) -> Option<&str> {
        self.lock_owner.as_deref()
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    pub fn is_form_disabled(&self) -> bool {
        self.form_disabled
    }

    pub fn locking_supported(&self) -> bool {
        self.locking_supported
    }

    pub fn timing(&self) -> &LockTiming {
        &self.timing
    }

    /// 过期、不支持或已在离开页面时释放：不再轮询。
    pub fn is_terminal(&self) -> bool {
        self.released || self.state.is_terminal()
    }

    /// 是否仍持有锁（离开页面时需要释放）。
    pub fn holds_lock(&self) -> bool {
        self.locking_supported && self.held && self.state != LockState::Expired
    }

    /// 登记一次新的轮询并返回其序号。
    pub fn begin_poll(&mut self) -> u64 {
        self.issued_seq += 1;
        self.issued_seq
    }

    /// 应用序号为 `seq` 的轮询结果；过期或已终止时返回 None。
    pub fn apply(&mut self, seq: u64, outcome: PollOutcome, now: Instant) -> Option<Vec<Effect>> {
        if self.is_terminal() || seq <= self.applied_seq || seq > self.issued_seq {
            return None;
        }
        self.applied_seq = seq;

        let effects = match outcome {
            PollOutcome::Granted(info) => self.on_granted(info, now),
            PollOutcome::Held(info) => self.on_held(info),
            PollOutcome::Unsupported => self.mark_unsupported(),
            PollOutcome::Failed(err) => self.on_failed(err),
        };
        Some(effects)
    }

    /// 该页面不支持加锁：启用表单并停止轮询。
    pub fn mark_unsupported(&mut self) -> Vec<Effect> {
        self.locking_supported = false;
        self.held = false;
        self.deadlines = None;
        let mut effects = self.transition(LockState::Unsupported);
        effects.push(Effect::StopPolling);
        effects
    }

    /// 离开页面时锁已成功释放。
    pub fn mark_released(&mut self) -> Vec<Effect> {
        self.held = false;
        self.deadlines = None;
        // 释放后到达的在途轮询结果一律丢弃。
        self.applied_seq = self.issued_seq;
        if self.is_terminal() {
            self.released = true;
            return Vec::new();
        }
        let effects = self.transition(LockState::Unlocked);
        self.released = true;
        effects
    }

    /// 下一个需要检查的时间点（到期提醒或本地过期）。
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.held || self.is_terminal() {
            return None;
        }
        let deadlines = self.deadlines?;
        match deadlines.warn_at {
            Some(warn_at) if !deadlines.warned => Some(warn_at),
            _ => Some(deadlines.expire_at),
        }
    }

    /// 检查续期是否超时：先提醒，再本地过期。轮询失败期间同样生效。
    pub fn check_deadlines(&mut self, now: Instant) -> Vec<Effect> {
        if !self.held || self.is_terminal() {
            return Vec::new();
        }
        let Some(mut deadlines) = self.deadlines else {
            return Vec::new();
        };

        if now >= deadlines.expire_at {
            self.held = false;
            self.deadlines = None;
            let mut effects = self.transition(LockState::Expired);
            effects.push(Effect::Notify(Notice::Expired));
            effects.push(Effect::StopPolling);
            return effects;
        }

        match deadlines.warn_at {
            Some(warn_at) if !deadlines.warned && now >= warn_at => {
                deadlines.warned = true;
                self.deadlines = Some(deadlines);
                vec![Effect::Notify(Notice::ExpiryWarning {
                    minutes: self.timing.warning_minutes(),
                })]
            }
            _ => Vec::new(),
        }
    }

    fn on_granted(&mut self, info: LockInfo, now: Instant) -> Vec<Effect> {
        if self.current_user.is_none() {
            self.current_user = info.current_user.clone();
        }
        self.lock_owner = info
            .locked_by
            .clone()
            .or_else(|| self.current_user.clone());
        self.held = true;
        // 超出时钟范围的期限视为永不过期。
        self.deadlines = now
            .checked_add(self.timing.time_until_expiration)
            .map(|expire_at| Deadlines {
                warn_at: self
                    .timing
                    .warns()
                    .then(|| now.checked_add(self.timing.time_until_warning))
                    .flatten(),
                expire_at,
                warned: false,
            });
        self.transition(LockState::LockedByMe)
    }

    fn on_held(&mut self, info: LockInfo) -> Vec<Effect> {
        let owner = info.owner_name().map(str::to_string);

        if self.held {
            // 曾持有锁，现在被他人接管：视为锁丢失，仅发生一次。
            self.held = false;
            self.deadlines = None;
            let message = match owner.as_deref() {
                Some(owner) => format!("{owner} removed your lock on this page."),
                None => "You lost your lock on this page. Save your work.".to_string(),
            };
            self.lock_owner = owner;
            let mut effects = self.transition(LockState::Expired);
            effects.push(Effect::Alert(message));
            effects.push(Effect::Notify(Notice::Expired));
            effects.push(Effect::StopPolling);
            return effects;
        }

        let changed = self.state != LockState::LockedByOther || self.lock_owner != owner;
        self.lock_owner = owner;
        let mut effects = self.transition(LockState::LockedByOther);
        if changed {
            effects.push(Effect::Notify(Notice::LockedBy {
                owner: self
                    .lock_owner
                    .clone()
                    .unwrap_or_else(|| "another user".to_string()),
            }));
        }
        effects
    }

    fn on_failed(&mut self, err: LockError) -> Vec<Effect> {
        let mut effects = self.transition(LockState::Unknown);
        effects.push(Effect::Error(err));
        effects
    }

    fn transition(&mut self, next: LockState) -> Vec<Effect> {
        self.state = next;
        let disable = next.disables_form();
        if disable == self.form_disabled {
            return Vec::new();
        }
        self.form_disabled = disable;
        if disable {
            vec![Effect::DisableForm]
        } else {
            vec![Effect::EnableForm]
        }
    }
}
