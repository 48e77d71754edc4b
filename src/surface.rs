//! 编辑界面抽象：表单开关、通知区域与提示/确认对话框。

use std::io::{self, BufRead, Write};
use std::sync::{Mutex, MutexGuard};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task;
use tracing::{error, info, warn};

use crate::error::LockError;
use crate::form::FormControls;
use crate::session::Notice;

/// 锁客户端作用的宿主界面。
pub trait EditSurface: Send + Sync {
    fn disable_form(&self);
    fn enable_form(&self);
    fn notify(&self, notice: &Notice);
    fn alert(&self, message: &str);
    /// 交互式确认，返回用户是否同意。
    fn confirm(&self, message: &str) -> bool;
    /// 无法恢复的锁错误，用户只能刷新页面。
    fn locking_error(&self, error: &LockError);
}

pub const LOCKING_ERROR_TEXT: &str =
    "An unexpected locking error occurred. Please reload the page.";

/// 终端界面：通过日志输出通知，通过标准输入确认。
pub struct TerminalSurface {
    form: Mutex<FormControls>,
    assume_yes: bool,
}

impl TerminalSurface {
    pub fn new(form: FormControls, assume_yes: bool) -> Self {
        Self {
            form: Mutex::new(form),
            assume_yes,
        }
    }

    fn form(&self) -> MutexGuard<'_, FormControls> {
        self.form.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn log_fields(form: &FormControls) {
        let editable = form
            .fields()
            .iter()
            .filter(|field| !field.disabled)
            .map(|field| field.name.as_str())
            .collect::<Vec<_>>();
        info!(editable = ?editable, disabled = form.is_disabled(), "form updated");
    }
}

impl EditSurface for TerminalSurface {
    fn disable_form(&self) {
        let mut form = self.form();
        form.disable();
        Self::log_fields(&form);
    }

    fn enable_form(&self) {
        let mut form = self.form();
        form.enable();
        Self::log_fields(&form);
    }

    fn notify(&self, notice: &Notice) {
        match notice {
            Notice::LockedBy { .. } => info!("{notice}"),
            Notice::ExpiryWarning { .. } | Notice::Expired => warn!("{notice}"),
        }
    }

    fn alert(&self, message: &str) {
        warn!("{message}");
        eprintln!("\u{7}{message}");
    }

    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            info!("{message} [assumed yes]");
            return true;
        }
        run_blocking(|| {
            eprint!("{message} [y/N] ");
            if io::stderr().flush().is_err() {
                return false;
            }
            read_answer(io::stdin().lock())
        })
    }

    fn locking_error(&self, err: &LockError) {
        error!(error = %err, "{LOCKING_ERROR_TEXT}");
    }
}

/// 在多线程运行时中把阻塞的终端读取移出异步工作线程。
fn run_blocking<T>(prompt: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            task::block_in_place(prompt)
        }
        _ => prompt(),
    }
}

fn read_answer(mut input: impl BufRead) -> bool {
    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
