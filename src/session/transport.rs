//! Transport channel
//!
//! A reliable ordered channel that may be open or closed. The session
//! state machine binds the negotiated data channel into it; the input
//! engine holds it only as a narrow send capability. Sends are
//! best-effort: while no channel is bound (or the bound one is not yet
//! open) actions are dropped, not queued.

use log::{debug, info, warn};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;

use crate::control::RemoteAction;
use crate::input::ActionSink;

#[derive(Clone)]
pub struct TransportChannel {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    open: AtomicBool,
    outbound: RwLock<Option<mpsc::UnboundedSender<String>>>,
    sent: AtomicU64,
    dropped: AtomicU64,
    /// Verbose per-message logging, the persisted debug preference.
    log_actions: bool,
}

impl TransportChannel {
    pub fn new(log_actions: bool) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                open: AtomicBool::new(false),
                outbound: RwLock::new(None),
                sent: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                log_actions,
            }),
        }
    }

    /// Bind a negotiated data channel. Open/close transitions are
    /// reported on `state_tx` as they happen.
    pub fn bind(&self, channel: Arc<RTCDataChannel>, state_tx: mpsc::UnboundedSender<bool>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        *self.inner.outbound.write() = Some(tx);

        let inner = self.inner.clone();
        let open_tx = state_tx.clone();
        channel.on_open(Box::new(move || {
            inner.open.store(true, Ordering::Relaxed);
            info!("data channel open");
            let _ = open_tx.send(true);
            Box::pin(async {})
        }));

        let inner = self.inner.clone();
        let close_tx = state_tx.clone();
        channel.on_close(Box::new(move || {
            inner.open.store(false, Ordering::Relaxed);
            info!("data channel closed");
            let _ = close_tx.send(false);
            Box::pin(async {})
        }));

        let inner = self.inner.clone();
        channel.on_message(Box::new(move |message: DataChannelMessage| {
            if inner.log_actions {
                if let Ok(text) = std::str::from_utf8(&message.data) {
                    debug!("< {}", text);
                }
            }
            Box::pin(async {})
        }));

        if channel.ready_state() == RTCDataChannelState::Open {
            self.inner.open.store(true, Ordering::Relaxed);
            let _ = state_tx.send(true);
        }

        let writer = channel;
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = writer.send_text(text).await {
                    warn!("data channel send failed: {}", e);
                    break;
                }
            }
        });
    }

    /// Drop the bound channel; subsequent sends become no-ops.
    pub fn unbind(&self) {
        self.inner.open.store(false, Ordering::Relaxed);
        *self.inner.outbound.write() = None;
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Relaxed)
    }

    /// Send one encoded action; returns `false` when dropped.
    pub fn send(&self, action: &RemoteAction) -> bool {
        let text = match action.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("dropping unencodable action: {}", e);
                return false;
            }
        };
        self.send_text(text)
    }

    /// Send a raw text document over the channel.
    pub fn send_text(&self, text: String) -> bool {
        if !self.is_open() {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let outbound = self.inner.outbound.read();
        let Some(tx) = outbound.as_ref() else {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        if self.inner.log_actions {
            debug!("> {}", text);
        }
        if tx.send(text).is_ok() {
            self.inner.sent.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    pub fn sent(&self) -> u64 {
        self.inner.sent.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl ActionSink for TransportChannel {
    fn is_open(&self) -> bool {
        TransportChannel::is_open(self)
    }

    fn send_action(&self, action: &RemoteAction) -> bool {
        self.send(action)
    }
}
