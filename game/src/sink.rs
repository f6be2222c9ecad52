use std::{
    cell::RefCell,
    io,
    rc::Rc,
    sync::Arc,
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use http_body_util::Full;
use hyper::Request;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use log::{debug, info, warn};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::{
    net::UdpSocket,
    sync::mpsc::{self, error::TrySendError},
    task::JoinSet,
};

use crate::color::Color;

/// Port the UDP bridge listens on for relayed events.
pub const UDP_RELAY_PORT: u16 = 8888;
const POST_TIMEOUT: Duration = Duration::from_secs(2);
/// Payloads waiting for a delivery slot; newer ones are dropped past this.
const QUEUE_DEPTH: usize = 256;
const MAX_IN_FLIGHT: usize = 16;

/// Outbound gameplay notifications for an external controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    SequenceStart {
        sequence: Vec<Color>,
        level: u32,
        score: u32,
    },
    ButtonActivation {
        color: Color,
        position: usize,
        total: usize,
    },
    ButtonPress {
        color: Color,
        correct: bool,
    },
    GameOver {
        final_score: u32,
        new_record: bool,
    },
}

impl SinkEvent {
    pub fn action(&self) -> &'static str {
        match self {
            SinkEvent::SequenceStart { .. } => "sequence_start",
            SinkEvent::ButtonActivation { .. } => "button_activation",
            SinkEvent::ButtonPress { .. } => "button_press",
            SinkEvent::GameOver { .. } => "game_over",
        }
    }

    pub fn kind(&self) -> String {
        match self {
            SinkEvent::SequenceStart { .. } => "genius_sequence".to_string(),
            SinkEvent::ButtonActivation { color, .. } => format!("btn_sync:{}", color.index()),
            SinkEvent::ButtonPress { .. } => "genius_button_press".to_string(),
            SinkEvent::GameOver { .. } => "genius_game_over".to_string(),
        }
    }

    /// The JSON body sent over the wire. Button indices are 0-based color
    /// indices; `sequence` carries color ids.
    pub fn payload(&self, timestamp: u64) -> Value {
        let mut body = match self {
            SinkEvent::SequenceStart {
                sequence,
                level,
                score,
            } => json!({
                "sequence": sequence,
                "level": level,
                "score": score,
            }),
            SinkEvent::ButtonActivation {
                color,
                position,
                total,
            } => json!({
                "buttonIndex": color.index(),
                "position": position,
                "totalLength": total,
            }),
            SinkEvent::ButtonPress { color, correct } => json!({
                "buttonIndex": color.index(),
                "isCorrect": correct,
            }),
            SinkEvent::GameOver {
                final_score,
                new_record,
            } => json!({
                "finalScore": final_score,
                "isNewRecord": new_record,
            }),
        };
        if let Value::Object(map) = &mut body {
            map.insert("type".to_string(), Value::from(self.kind()));
            map.insert("action".to_string(), Value::from(self.action()));
            map.insert("timestamp".to_string(), Value::from(timestamp));
        }
        body
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Fire-and-forget delivery. Implementations never block the caller and
/// never report failure back into the game.
pub trait EventSink {
    fn emit(&mut self, event: SinkEvent);

    /// Points later events at a new controller address.
    fn retarget(&mut self, _host: &str, _port: u16) {}
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn emit(&mut self, event: SinkEvent) {
        (**self).emit(event);
    }

    fn retarget(&mut self, host: &str, port: u16) {
        (**self).retarget(host, port);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: SinkEvent) {}
}

/// Writes every payload to the log; used when no network sink is running.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: SinkEvent) {
        info!("event: {}", event.payload(now_millis()));
    }
}

/// Keeps emitted events and retargets in memory. Clones share the same lists.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<SinkEvent>>>,
    targets: Rc<RefCell<Vec<(String, u16)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.borrow().clone()
    }

    pub fn take(&self) -> Vec<SinkEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn targets(&self) -> Vec<(String, u16)> {
        self.targets.borrow().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: SinkEvent) {
        self.events.borrow_mut().push(event);
    }

    fn retarget(&mut self, host: &str, port: u16) {
        self.targets.borrow_mut().push((host.to_string(), port));
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("http: {0}")]
    Http(String),
    #[error("post timed out")]
    Timeout,
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("udp: {0}")]
    Udp(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    relay_port: u16,
}

impl Target {
    fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

/// Posts payloads as JSON to `http://host:port/` from a background thread.
/// A failed post is retried once as a UDP datagram to the relay port, then
/// logged. Up to `MAX_IN_FLIGHT` deliveries run at once.
pub struct HttpSink {
    tx: mpsc::Sender<Value>,
    target: Target,
}

impl HttpSink {
    pub fn start(host: impl Into<String>, port: u16) -> io::Result<Self> {
        Self::start_with_relay(host, port, UDP_RELAY_PORT)
    }

    pub fn start_with_relay(
        host: impl Into<String>,
        port: u16,
        relay_port: u16,
    ) -> io::Result<Self> {
        let target = Target {
            host: host.into(),
            port,
            relay_port,
        };
        let (tx, rx) = mpsc::channel::<Value>(QUEUE_DEPTH);

        // Build the runtime here so a failure surfaces to the caller.
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let worker_target = Arc::new(target.clone());
        thread::Builder::new()
            .name("genius-sink".to_string())
            .spawn(move || rt.block_on(deliver_loop(rx, worker_target)))?;

        info!(
            "event sink posting to {}, udp relay on port {relay_port}",
            target.url()
        );
        Ok(Self { tx, target })
    }

    pub fn host(&self) -> &str {
        &self.target.host
    }

    pub fn port(&self) -> u16 {
        self.target.port
    }

    pub fn relay_port(&self) -> u16 {
        self.target.relay_port
    }
}

impl EventSink for HttpSink {
    fn emit(&mut self, event: SinkEvent) {
        let payload = event.payload(now_millis());
        match self.tx.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(payload)) => warn!("event queue full, dropping {payload}"),
            Err(TrySendError::Closed(payload)) => warn!("event sink stopped, dropping {payload}"),
        }
    }

    /// Starts a fresh worker for the new address. Events already queued
    /// still go to the old one before its worker exits.
    fn retarget(&mut self, host: &str, port: u16) {
        if self.target.host == host && self.target.port == port {
            return;
        }
        match HttpSink::start_with_relay(host, port, self.target.relay_port) {
            Ok(next) => *self = next,
            Err(err) => warn!(
                "event sink kept on {} (cannot start for {host}:{port}: {err})",
                self.target.url()
            ),
        }
    }
}

async fn deliver_loop(mut rx: mpsc::Receiver<Value>, target: Arc<Target>) {
    let client: Client<HttpConnector, Full<Bytes>> =
        Client::builder(TokioExecutor::new()).build_http();
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            payload = rx.recv(), if in_flight.len() < MAX_IN_FLIGHT => match payload {
                Some(payload) => {
                    in_flight.spawn(deliver(client.clone(), Arc::clone(&target), payload));
                }
                None => break,
            },
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }
    while in_flight.join_next().await.is_some() {}
    debug!("event sink for {} stopped", target.url());
}

async fn deliver(
    client: Client<HttpConnector, Full<Bytes>>,
    target: Arc<Target>,
    payload: Value,
) {
    let body = payload.to_string();
    let url = target.url();
    match post(&client, &url, &body).await {
        Ok(()) => {
            debug!("event posted to {url}");
            return;
        }
        Err(err) => debug!("post to {url} failed ({err}), trying udp"),
    }
    match send_udp(&target.host, target.relay_port, &body).await {
        Ok(()) => debug!(
            "event relayed over udp to {}:{}",
            target.host, target.relay_port
        ),
        Err(err) => warn!("event not delivered ({err}): {body}"),
    }
}

async fn post(
    client: &Client<HttpConnector, Full<Bytes>>,
    url: &str,
    body: &str,
) -> Result<(), SinkError> {
    let request = Request::post(url)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .map_err(|e| SinkError::Http(e.to_string()))?;

    let response = tokio::time::timeout(POST_TIMEOUT, client.request(request))
        .await
        .map_err(|_| SinkError::Timeout)?
        .map_err(|e| SinkError::Http(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(SinkError::Status(status.as_u16()))
    }
}

async fn send_udp(host: &str, port: u16, body: &str) -> Result<(), SinkError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.send_to(body.as_bytes(), (host, port)).await?;
    Ok(())
}
