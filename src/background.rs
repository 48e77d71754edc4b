//! 锁轮询后台任务：按固定间隔轮询，并在续期期限到达时检查提醒与过期。

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::LockClient;

/// 启动轮询任务；首个 tick 立即触发。每次轮询独立运行，慢请求不阻塞下一次 tick。
pub fn spawn_poll_task(
    client: LockClient,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            let deadline = client.next_deadline().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let client = client.clone();
                    tokio::spawn(async move {
                        client.poll_once().await;
                    });
                }
                _ = client.rearm_signal().notified() => {}
                _ = sleep_until(deadline) => client.check_deadlines().await,
            }
        }
        debug!(client_id = %client.id(), "poll task finished");
    })
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
