use crate::error::TransportError;
use crate::transport::{
    Dialer, FrameSink, FrameStream, OutboundFrame, TransportConfig, TransportEvent, WebSocketDialer,
};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use tether_core::{ContactId, SignalingMessage, encode};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

pub const CLOSE_NORMAL: u16 = 1000;

struct Link {
    id: u64,
    sink: Arc<Mutex<FrameSink>>,
    reader: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

struct TransportInner {
    config: TransportConfig,
    dialer: Arc<dyn Dialer>,
    local_id: RwLock<ContactId>,
    link: Mutex<Option<Link>>,
    /// Serialises connect attempts. The dial itself runs outside `link`.
    dialing: Mutex<()>,
    /// Bumped by every disconnect, so a dial that finishes afterwards is
    /// thrown away.
    epoch: AtomicU64,
    connected: AtomicBool,
    next_link_id: AtomicU64,
    listeners: StdMutex<Vec<mpsc::UnboundedSender<TransportEvent>>>,
}

impl TransportInner {
    fn emit(&self, event: TransportEvent) {
        let Ok(mut listeners) = self.listeners.lock() else {
            return;
        };
        listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn heartbeat_frame(&self) -> Result<String, TransportError> {
        let from = self
            .local_id
            .read()
            .map(|id| id.clone())
            .unwrap_or_default();
        Ok(encode(&SignalingMessage::heartbeat(from))?)
    }
}

/// Persistent text channel to the signaling server. Cheap to clone; all
/// clones share one connection.
#[derive(Clone)]
pub struct TransportClient {
    inner: Arc<TransportInner>,
}

impl TransportClient {
    pub fn new(config: TransportConfig) -> Self {
        Self::with_dialer(config, Arc::new(WebSocketDialer))
    }

    pub fn with_dialer(config: TransportConfig, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                config,
                dialer,
                local_id: RwLock::new(ContactId::default()),
                link: Mutex::new(None),
                dialing: Mutex::new(()),
                epoch: AtomicU64::new(0),
                connected: AtomicBool::new(false),
                next_link_id: AtomicU64::new(0),
                listeners: StdMutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    /// Id stamped on outgoing heartbeats.
    pub fn set_local_id(&self, id: ContactId) {
        if let Ok(mut local_id) = self.inner.local_id.write() {
            *local_id = id;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.push(tx);
        }
        rx
    }

    pub async fn connect(&self) -> Result<(), TransportError> {
        let _dialing = self.inner.dialing.lock().await;
        if self.inner.link.lock().await.is_some() {
            return Ok(());
        }
        let epoch = self.inner.epoch.load(Ordering::Acquire);

        let url = self.inner.config.url.clone();
        let timeout = self.inner.config.connect_timeout;
        info!("Connecting to signaling server {}", url);

        let dialed = match time::timeout(timeout, self.inner.dialer.dial(&url)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectTimeout {
                url: url.clone(),
                timeout,
            }),
        };
        let (sink, stream) = match dialed {
            Ok(pair) => pair,
            Err(e) => {
                error!("Signaling connect failed: {}", e);
                self.inner.emit(TransportEvent::Error(e.clone()));
                return Err(e);
            }
        };

        let mut link = self.inner.link.lock().await;
        if self.inner.epoch.load(Ordering::Acquire) != epoch {
            info!("Disconnected while dialing {}, dropping the socket", url);
            return Err(TransportError::NotConnected);
        }

        let id = self.inner.next_link_id.fetch_add(1, Ordering::Relaxed);
        let sink = Arc::new(Mutex::new(sink));
        let heartbeat = tokio::spawn(run_heartbeat(self.inner.clone(), sink.clone()));
        let reader = tokio::spawn(run_reader(self.inner.clone(), id, stream));

        *link = Some(Link {
            id,
            sink,
            reader,
            heartbeat,
        });
        self.inner.connected.store(true, Ordering::Release);
        info!("Connected to signaling server {}", url);

        Ok(())
    }

    pub async fn send(&self, frame: String) -> Result<(), TransportError> {
        let sink = match self.inner.link.lock().await.as_ref() {
            Some(link) => link.sink.clone(),
            None => return Err(TransportError::NotConnected),
        };
        sink.lock().await.send(OutboundFrame::Text(frame)).await
    }

    pub async fn send_message(&self, msg: &SignalingMessage) -> Result<(), TransportError> {
        self.send(encode(msg)?).await
    }

    /// Closes the socket. Safe to call in any state.
    pub async fn disconnect(&self, code: u16, reason: &str) {
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        let Some(link) = self.inner.link.lock().await.take() else {
            debug!("Disconnect requested while not connected");
            return;
        };
        self.inner.connected.store(false, Ordering::Release);
        link.heartbeat.abort();

        let close = OutboundFrame::Close {
            code,
            reason: reason.to_owned(),
        };
        {
            let mut sink = link.sink.lock().await;
            if let Err(e) = sink.send(close).await {
                warn!("Failed to send close frame: {}", e);
            }
        }
        link.reader.abort();

        info!("Signaling connection closed ({}: {})", code, reason);
        self.inner.emit(TransportEvent::Closed);
    }
}

async fn run_heartbeat(inner: Arc<TransportInner>, sink: Arc<Mutex<FrameSink>>) {
    let period = inner.config.heartbeat_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);

    loop {
        ticker.tick().await;

        let result = match inner.heartbeat_frame() {
            Ok(frame) => sink.lock().await.send(OutboundFrame::Text(frame)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => debug!("Heartbeat sent"),
            Err(e) => {
                warn!("Heartbeat failed: {}", e);
                inner.emit(TransportEvent::Error(e));
            }
        }
    }
}

async fn run_reader(inner: Arc<TransportInner>, id: u64, mut stream: FrameStream) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(text) => inner.emit(TransportEvent::Message(text)),
            Err(e) => {
                error!("Signaling socket error: {}", e);
                inner.emit(TransportEvent::Error(e));
                break;
            }
        }
    }

    let mut slot = inner.link.lock().await;
    if slot.as_ref().is_some_and(|link| link.id == id) {
        if let Some(link) = slot.take() {
            link.heartbeat.abort();
        }
        inner.connected.store(false, Ordering::Release);
        drop(slot);

        info!("Signaling connection closed by remote");
        inner.emit(TransportEvent::Closed);
    }
}
