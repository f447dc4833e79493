//! Shared test support: an in-memory transport with scripted connect
//! outcomes, a frame recorder, and injectable inbound events.

use amora_link::{AmoraLinkError, Result, Transport, TransportConn, TransportEvent};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

/// What the next `open()` call should do.
pub enum OpenOutcome {
    /// Open succeeds; sends are recorded.
    Succeed,
    /// Open succeeds, but every send on the connection fails.
    SucceedWithFailingSends,
    /// Open fails immediately.
    Fail(&'static str),
    /// Open never completes (exercises the connection timeout).
    Hang,
}

#[derive(Default)]
struct State {
    outcomes: VecDeque<OpenOutcome>,
    opens: Vec<OpenRecord>,
    conns: Vec<ConnHandle>,
}

/// One recorded `open()` call.
pub struct OpenRecord {
    pub url: String,
    pub at: Instant,
}


/// In-memory transport. Opens succeed by default; script failures with
/// [`FakeTransport::script`]. Clone freely; all clones share state.
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<State>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self::default()
    }

    /// Queue an outcome for the next unscripted `open()` call.
    pub fn script(&self, outcome: OpenOutcome) {
        self.inner.lock().unwrap().outcomes.push_back(outcome);
    }

    /// Total `open()` calls observed (including failed and hung ones).
    pub fn open_count(&self) -> usize {
        self.inner.lock().unwrap().opens.len()
    }

    pub fn open_urls(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .opens
            .iter()
            .map(|o| o.url.clone())
            .collect()
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.inner.lock().unwrap().opens.iter().map(|o| o.at).collect()
    }

    /// Handle for the n-th successfully opened connection.
    pub fn conn(&self, index: usize) -> ConnHandle {
        self.inner.lock().unwrap().conns[index].clone()
    }

    /// Handle for the most recently opened connection.
    pub fn last_conn(&self) -> ConnHandle {
        self.inner
            .lock()
            .unwrap()
            .conns
            .last()
            .expect("no connection opened yet")
            .clone()
    }

    pub fn conn_count(&self) -> usize {
        self.inner.lock().unwrap().conns.len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self, url: &str) -> Result<Box<dyn TransportConn>> {
        let outcome = {
            let mut state = self.inner.lock().unwrap();
            state.opens.push(OpenRecord {
                url: url.to_string(),
                at: Instant::now(),
            });
            state.outcomes.pop_front().unwrap_or(OpenOutcome::Succeed)
        };

        let fail_sends = match outcome {
            OpenOutcome::Fail(message) => {
                return Err(AmoraLinkError::WebSocketError(message.to_string()));
            },
            OpenOutcome::Hang => {
                futures_util::future::pending::<()>().await;
                unreachable!()
            },
            OpenOutcome::Succeed => false,
            OpenOutcome::SucceedWithFailingSends => true,
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = ConnHandle {
            events: events_tx,
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_sends: Arc::new(AtomicBool::new(fail_sends)),
            closed: Arc::new(Mutex::new(None)),
        };
        self.inner.lock().unwrap().conns.push(handle.clone());
        Ok(Box::new(FakeConn {
            events: events_rx,
            handle,
        }))
    }
}

/// Test-side handle to one fake connection: inject inbound events and
/// inspect what the client sent.
#[derive(Clone)]
pub struct ConnHandle {
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    fail_sends: Arc<AtomicBool>,
    closed: Arc<Mutex<Option<(u16, String)>>>,
}

impl ConnHandle {
    pub fn inject_frame(&self, value: serde_json::Value) {
        let _ = self.events.send(TransportEvent::Frame(value.to_string()));
    }

    pub fn inject_raw(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Frame(text.to_string()));
    }

    pub fn inject_close(&self, code: u16) {
        let _ = self.events.send(TransportEvent::Closed { code: Some(code) });
    }

    pub fn inject_error(&self, message: &str) {
        let _ = self.events.send(TransportEvent::Error(message.to_string()));
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).expect("client sent invalid JSON"))
            .collect()
    }

    /// Sent frames of one message type, in order.
    pub fn sent_of_type(&self, message_type: &str) -> Vec<serde_json::Value> {
        self.sent_json()
            .into_iter()
            .filter(|v| v["type"] == message_type)
            .collect()
    }

    /// Close code passed by the client, when it closed intentionally.
    pub fn close_code(&self) -> Option<u16> {
        self.closed.lock().unwrap().as_ref().map(|(code, _)| *code)
    }
}

struct FakeConn {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    handle: ConnHandle,
}

#[async_trait]
impl TransportConn for FakeConn {
    async fn send(&mut self, frame: &str) -> Result<()> {
        if self.handle.fail_sends.load(Ordering::SeqCst) {
            return Err(AmoraLinkError::WebSocketError(
                "simulated send failure".to_string(),
            ));
        }
        self.handle.sent.lock().unwrap().push(frame.to_string());
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        self.events
            .recv()
            .await
            .unwrap_or(TransportEvent::Closed { code: None })
    }

    async fn close(&mut self, code: u16, reason: &str) {
        *self.handle.closed.lock().unwrap() = Some((code, reason.to_string()));
    }
}

/// Let the background connection task drain pending events. Under the
/// paused test clock this advances virtual time by 1ms only after every
/// task has gone idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
