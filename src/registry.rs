//! 同一页面上多个锁客户端的登记表，按元素 ID 索引。

use futures_util::future::join_all;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::client::LockClient;
use crate::error::LockError;

#[derive(Default)]
pub struct LockRegistry {
    clients: Mutex<HashMap<String, LockClient>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// 登记客户端；同一元素已有客户端时停止并返回旧的。
    pub async fn insert(&self, element_id: &str, client: LockClient) -> Option<LockClient> {
        let key = normalize_element_id(element_id);
        let previous = self.clients.lock().await.insert(key, client);
        if let Some(previous) = &previous {
            previous.stop();
        }
        previous
    }

    pub async fn get(&self, element_id: &str) -> Option<LockClient> {
        let key = normalize_element_id(element_id);
        self.clients.lock().await.get(&key).cloned()
    }

    pub async fn remove(&self, element_id: &str) -> Option<LockClient> {
        let key = normalize_element_id(element_id);
        self.clients.lock().await.remove(&key)
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    pub async fn start_all(&self) {
        let clients = self.snapshot().await;
        for client in clients {
            client.start().await;
        }
    }

    pub async fn stop_all(&self) {
        for client in self.snapshot().await {
            client.stop();
        }
    }

    /// 离开页面时并发释放所有客户端持有的锁，返回实际释放的数量。
    pub async fn release_all(&self) -> usize {
        let clients = self.snapshot().await;
        let results: Vec<Result<bool, LockError>> =
            join_all(clients.iter().map(|client| client.release_on_unload())).await;
        results
            .into_iter()
            .zip(clients.iter())
            .filter_map(|(result, client)| match result {
                Ok(released) => Some(released),
                Err(err) => {
                    warn!(client_id = %client.id(), error = %err, "lock release failed");
                    None
                }
            })
            .filter(|released| *released)
            .count()
    }

    async fn snapshot(&self) -> Vec<LockClient> {
        self.clients.lock().await.values().cloned().collect()
    }
}

fn normalize_element_id(element_id: &str) -> String {
    element_id.trim().trim_start_matches('#').to_string()
}
