//! Test doubles shared by unit tests: a scripted transport and a recording surface.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::LockError;
use crate::session::Notice;
use crate::surface::EditSurface;
use crate::transport::{LockTransport, Method, RawResponse, TransportFuture};

#[derive(Clone, Debug)]
struct Scripted {
    delay: Duration,
    result: Result<RawResponse, LockError>,
}

/// In-memory transport answering from per-URL queues. The last queued answer
/// for a URL is repeated once the queue is drained.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(Method, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.push(url, Duration::ZERO, Ok(raw(status, body)));
    }

    pub fn respond_after(&self, url: &str, delay: Duration, status: u16, body: &str) {
        self.push(url, delay, Ok(raw(status, body)));
    }

    pub fn fail(&self, url: &str, err: LockError) {
        self.push(url, Duration::ZERO, Err(err));
    }

    pub fn calls(&self) -> Vec<(Method, String)> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, url: &str) -> usize {
        self.calls().iter().filter(|(_, called)| called == url).count()
    }

    fn push(&self, url: &str, delay: Duration, result: Result<RawResponse, LockError>) {
        self.script
            .lock()
            .expect("script lock")
            .entry(url.to_string())
            .or_default()
            .push_back(Scripted { delay, result });
    }

    fn next(&self, url: &str) -> Scripted {
        let mut script = self.script.lock().expect("script lock");
        match script.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().expect("non-empty queue"),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Scripted {
                delay: Duration::ZERO,
                result: Err(LockError::Network(format!("no scripted response for {url}"))),
            },
        }
    }
}

impl LockTransport for ScriptedTransport {
    fn fetch<'a>(
        &'a self,
        method: Method,
        url: &'a str,
    ) -> TransportFuture<'a, Result<RawResponse, LockError>> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((method, url.to_string()));
        let scripted = self.next(url);
        Box::pin(async move {
            if !scripted.delay.is_zero() {
                tokio::time::sleep(scripted.delay).await;
            }
            scripted.result
        })
    }
}

fn raw(status: u16, body: &str) -> RawResponse {
    RawResponse {
        status,
        body: body.as_bytes().to_vec(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    Disable,
    Enable,
    Notify(Notice),
    Alert(String),
    Confirm(String),
    Error(LockError),
}

/// Surface that records every call and answers confirmations with a fixed reply.
pub struct RecordingSurface {
    answer: bool,
    events: Mutex<Vec<SurfaceEvent>>,
}

impl RecordingSurface {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().expect("events lock").clone()
    }

    pub fn form_disabled(&self) -> Option<bool> {
        self.events().iter().rev().find_map(|event| match event {
            SurfaceEvent::Disable => Some(true),
            SurfaceEvent::Enable => Some(false),
            _ => None,
        })
    }

    pub fn alerts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SurfaceEvent::Alert(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: SurfaceEvent) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl EditSurface for RecordingSurface {
    fn disable_form(&self) {
        self.record(SurfaceEvent::Disable);
    }

    fn enable_form(&self) {
        self.record(SurfaceEvent::Enable);
    }

    fn notify(&self, notice: &Notice) {
        self.record(SurfaceEvent::Notify(notice.clone()));
    }

    fn alert(&self, message: &str) {
        self.record(SurfaceEvent::Alert(message.to_string()));
    }

    fn confirm(&self, message: &str) -> bool {
        self.record(SurfaceEvent::Confirm(message.to_string()));
        self.answer
    }

    fn locking_error(&self, error: &LockError) {
        self.record(SurfaceEvent::Error(error.clone()));
    }
}
