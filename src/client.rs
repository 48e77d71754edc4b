//! 锁客户端：轮询锁接口、应用状态迁移、离开页面时释放锁。

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::background::spawn_poll_task;
use crate::badge::{ForceUnlock, LockBadge, remove_foreign_lock};
use crate::endpoints::{Endpoints, LockAction};
use crate::error::LockError;
use crate::session::{ClientSession, Effect, LockState, LockTiming};
use crate::status::PollOutcome;
use crate::surface::EditSurface;
use crate::transport::{LockTransport, Method};

/// 会话状态快照。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: LockState,
    pub lock_owner: Option<String>,
    pub current_user: Option<String>,
    pub form_disabled: bool,
    pub locking_supported: bool,
}

struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct ClientInner {
    id: Uuid,
    transport: Arc<dyn LockTransport>,
    surface: Arc<dyn EditSurface>,
    endpoints: Endpoints,
    session: Mutex<ClientSession>,
    poller: StdMutex<Option<PollHandle>>,
    rearm: Notify,
}

/// 单个编辑页面的锁客户端，可廉价克隆。
#[derive(Clone)]
pub struct LockClient {
    inner: Arc<ClientInner>,
}

impl LockClient {
    pub fn new(
        transport: Arc<dyn LockTransport>,
        surface: Arc<dyn EditSurface>,
        endpoints: Endpoints,
        timing: LockTiming,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                id: Uuid::new_v4(),
                transport,
                surface,
                endpoints,
                session: Mutex::new(ClientSession::new(timing)),
                poller: StdMutex::new(None),
                rearm: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    /// 禁用表单并开始轮询：立即一次，之后按固定间隔。
    pub async fn start(&self) {
        self.stop();
        let period = {
            let mut session = self.inner.session.lock().await;
            if session.is_terminal() {
                debug!(client_id = %self.inner.id, state = ?session.state(), "not restarting finished session");
                return;
            }
            if !self.inner.endpoints.supports_locking() {
                info!(client_id = %self.inner.id, "locking not applicable to this page");
                let effects = session.mark_unsupported();
                self.perform(effects);
                return;
            }
            if session.is_form_disabled() {
                self.inner.surface.disable_form();
            }
            session.timing().poll_interval
        };

        let cancel = CancellationToken::new();
        let task = spawn_poll_task(self.clone(), period, cancel.clone());
        *self.poller() = Some(PollHandle { cancel, task });
        info!(client_id = %self.inner.id, interval_secs = period.as_secs(), "lock polling started");
    }

    /// 取消轮询定时器。
    pub fn stop(&self) {
        if let Some(handle) = self.poller().take() {
            handle.cancel.cancel();
            debug!(client_id = %self.inner.id, "lock polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller()
            .as_ref()
            .is_some_and(|handle| !handle.cancel.is_cancelled() && !handle.task.is_finished())
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.inner.session.lock().await;
        SessionSnapshot {
            state: session.state(),
            lock_owner: session.lock_owner().map(str::to_string),
            current_user: session.current_user().map(str::to_string),
            form_disabled: session.is_form_disabled(),
            locking_supported: session.locking_supported(),
        }
    }

    pub async fn state(&self) -> LockState {
        self.inner.session.lock().await.state()
    }

    /// 执行一次轮询；结果被更新的轮询取代或会话已结束时返回 None。
    pub async fn poll_once(&self) -> Option<LockState> {
        let seq = {
            let mut session = self.inner.session.lock().await;
            if session.is_terminal() {
                return None;
            }
            session.begin_poll()
        };

        let outcome = self.fetch_outcome().await;
        let mut session = self.inner.session.lock().await;
        let previous = session.state();
        let Some(effects) = session.apply(seq, outcome, Instant::now()) else {
            debug!(client_id = %self.inner.id, seq, "discarding superseded poll result");
            return None;
        };
        let state = session.state();
        if state != previous {
            info!(
                client_id = %self.inner.id,
                seq,
                from = ?previous,
                to = ?state,
                owner = session.lock_owner().unwrap_or("-"),
                "lock state changed"
            );
        }
        self.perform(effects);
        self.inner.rearm.notify_one();
        Some(state)
    }

    /// 离开页面：若支持加锁且持有锁，发出一次释放请求并等待其完成。
    pub async fn release_on_unload(&self) -> Result<bool, LockError> {
        self.stop();
        let mut session = self.inner.session.lock().await;
        if !session.holds_lock() {
            debug!(client_id = %self.inner.id, state = ?session.state(), "no lock to release");
            return Ok(false);
        }
        let Some(url) = self.inner.endpoints.get(LockAction::LockClear) else {
            warn!(client_id = %self.inner.id, "no lock_clear url; lock left to expire");
            return Ok(false);
        };

        let response = self.inner.transport.fetch(Method::Post, url).await?;
        if let Some(err) = LockError::from_status(response.status) {
            warn!(client_id = %self.inner.id, status = response.status, "lock release rejected");
            return Err(err);
        }
        let effects = session.mark_released();
        self.perform(effects);
        info!(client_id = %self.inner.id, "lock released");
        Ok(true)
    }

    /// 强制移除徽标所代表的他人锁。
    pub async fn remove_foreign_lock(&self, badge: &mut LockBadge) -> Result<ForceUnlock, LockError> {
        remove_foreign_lock(
            self.inner.transport.as_ref(),
            self.inner.surface.as_ref(),
            &self.inner.endpoints,
            badge,
        )
        .await
    }

    pub(crate) async fn next_deadline(&self) -> Option<Instant> {
        self.inner.session.lock().await.next_deadline()
    }

    pub(crate) async fn check_deadlines(&self) {
        let mut session = self.inner.session.lock().await;
        let effects = session.check_deadlines(Instant::now());
        if !effects.is_empty() {
            debug!(client_id = %self.inner.id, state = ?session.state(), "lock deadline reached");
        }
        self.perform(effects);
    }

    pub(crate) fn rearm_signal(&self) -> &Notify {
        &self.inner.rearm
    }

    /// 有 lock_status 地址时先查询状态，锁不作用于当前用户时再获取/续期。
    async fn fetch_outcome(&self) -> PollOutcome {
        let endpoints = &self.inner.endpoints;
        let Some(lock_url) = endpoints.get(LockAction::Lock) else {
            return PollOutcome::Unsupported;
        };
        if let Some(status_url) = endpoints
            .get(LockAction::LockStatus)
            .filter(|url| *url != lock_url)
        {
            let status = self.request(Method::Get, status_url).await;
            if !status.is_granted() {
                return status;
            }
        }
        self.request(Method::Get, lock_url).await
    }

    async fn request(&self, method: Method, url: &str) -> PollOutcome {
        match self.inner.transport.fetch(method, url).await {
            Ok(response) => PollOutcome::classify(response.status, &response.body),
            Err(err) => PollOutcome::Failed(err),
        }
    }

    fn perform(&self, effects: Vec<Effect>) {
        let surface = &self.inner.surface;
        for effect in effects {
            match effect {
                Effect::DisableForm => surface.disable_form(),
                Effect::EnableForm => surface.enable_form(),
                Effect::Notify(notice) => surface.notify(&notice),
                Effect::Alert(message) => surface.alert(&message),
                Effect::Error(err) => {
                    if err.is_blocking() {
                        error!(client_id = %self.inner.id, error = %err, "lock poll failed");
                    } else {
                        warn!(client_id = %self.inner.id, error = %err, "lock poll failed");
                    }
                    surface.locking_error(&err);
                }
                Effect::StopPolling => self.stop(),
            }
        }
    }

    fn poller(&self) -> MutexGuard<'_, Option<PollHandle>> {
        self.inner
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
