#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracked_core::{AppConfig, PlaceId, ScoredServerInstance};
use tracked_scanner::{
    ListingTransport, Notification, PageFetcher, RateLimiter, ScanDelegate, ScanKind,
    TransportError, TransportResponse,
};

pub const PLACE: &str = "920587237";

/// One scripted transport reply.
pub enum Reply {
    Respond(u16, String),
    Fail(TransportError),
    Hang,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Respond(200, body.into())
    }

    pub fn status(status: u16) -> Self {
        Reply::Respond(status, String::new())
    }
}

/// Transport that replays a script, then a fixed fallback, and records URLs.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: (u16, String),
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Reply>) -> Arc<Self> {
        Self::with_fallback(script, 200, empty_page())
    }

    pub fn with_fallback(script: Vec<Reply>, status: u16, body: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback: (status, body.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ListingTransport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        let next = self.script.lock().unwrap().pop_front();

        match next {
            Some(Reply::Respond(status, body)) => Ok(TransportResponse::new(status, body)),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Hang) => std::future::pending().await,
            None => Ok(TransportResponse::new(self.fallback.0, self.fallback.1.clone())),
        }
    }
}

/// What a delegate was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivered {
    Joined(String),
    Presented(ScanKind, Vec<String>),
    Notified(Notification),
}

#[derive(Default)]
pub struct RecordingDelegate {
    events: Mutex<Vec<Delivered>>,
}

impl RecordingDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Delivered> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanDelegate for RecordingDelegate {
    async fn join_instance(&self, _place_id: &PlaceId, instance: &ScoredServerInstance) {
        self.events
            .lock()
            .unwrap()
            .push(Delivered::Joined(instance.id().to_string()));
    }

    async fn present_candidates(
        &self,
        _place_id: &PlaceId,
        kind: ScanKind,
        candidates: &[ScoredServerInstance],
    ) {
        let ids = candidates.iter().map(|c| c.id().to_string()).collect();
        self.events.lock().unwrap().push(Delivered::Presented(kind, ids));
    }

    async fn notify(&self, notification: Notification) {
        self.events.lock().unwrap().push(Delivered::Notified(notification));
    }
}

pub fn place() -> PlaceId {
    PlaceId::new(PLACE).expect("valid place ID")
}

pub fn instance(id: &str, playing: u32, max_players: u32) -> Value {
    json!({ "id": id, "playing": playing, "maxPlayers": max_players })
}

pub fn instance_with(id: &str, playing: u32, max_players: u32, ping: u32, fps: f64) -> Value {
    json!({
        "id": id,
        "playing": playing,
        "maxPlayers": max_players,
        "ping": ping,
        "fps": fps,
        "playerTokens": []
    })
}

pub fn page(data: Vec<Value>, cursor: Value) -> String {
    json!({ "previousPageCursor": null, "nextPageCursor": cursor, "data": data }).to_string()
}

pub fn empty_page() -> String {
    page(Vec::new(), Value::Null)
}

pub fn fetcher(transport: Arc<ScriptedTransport>) -> (Arc<PageFetcher>, Arc<RateLimiter>) {
    let limiter = Arc::new(RateLimiter::new());
    let fetcher = PageFetcher::new(transport, limiter.clone(), &AppConfig::default().fetch);
    (Arc::new(fetcher), limiter)
}
