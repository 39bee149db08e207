
use std::sync::Arc;
use tether_client::peer::{PeerContext, PeerNotice, PeerSession};
use tether_client::registry::RegistryConfig;
use tether_client::{PeerSessionHandle, SessionRegistryHandle};
use tether_core::{Contact, IceServerConfig};
use tokio::sync::mpsc;
use tracing::Level;

use crate::utils::{MockEngine, MockSignalingOutput, RecordingObserver, Signal};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub struct TestSession {
    pub handle: PeerSessionHandle,
    pub engine: MockEngine,
    pub signaling: MockSignalingOutput,
    pub signal_rx: mpsc::UnboundedReceiver<Signal>,
    pub notices: mpsc::UnboundedReceiver<PeerNotice>,
}

/// A lone peer session between `local` and `remote`, on mocks.
pub fn create_test_session(local: &str, remote: &str, engine: MockEngine) -> TestSession {
    let (signaling, signal_rx) = MockSignalingOutput::new();
    let (notices_tx, notices) = mpsc::unbounded_channel();

    let ctx = PeerContext {
        local_id: local.into(),
        engine: Arc::new(engine.clone()),
        signaling: Arc::new(signaling.clone()),
        notices: notices_tx,
    };
    let handle = PeerSession::spawn(1, Contact::new(remote, remote), vec![], ctx);

    TestSession {
        handle,
        engine,
        signaling,
        signal_rx,
        notices,
    }
}

pub struct TestRegistry {
    pub registry: SessionRegistryHandle,
    pub engine: MockEngine,
    pub signaling: MockSignalingOutput,
    pub observer: RecordingObserver,
}

pub fn create_test_registry(local: &str) -> TestRegistry {
    let engine = MockEngine::new();
    let (signaling, _signal_rx) = MockSignalingOutput::new();
    let observer = RecordingObserver::new();

    let registry = SessionRegistryHandle::spawn(
        RegistryConfig {
            local_id: local.into(),
            default_ice_servers: vec![IceServerConfig::default()],
            auto_call_video: false,
        },
        Arc::new(engine.clone()),
        Arc::new(signaling.clone()),
        Arc::new(observer.clone()),
    );

    TestRegistry {
        registry,
        engine,
        signaling,
        observer,
    }
}
