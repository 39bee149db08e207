use crate::error::{Error, LookupError, NegotiationError};
use crate::engine::MediaSource;
use crate::peer::PeerCommand;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{ChatMessage, Contact, IceCandidate, NegotiationState, SessionDescription};
use tokio::sync::{mpsc, oneshot, watch};

/// Cheap, cloneable reference to a running `PeerSession`.
#[derive(Clone)]
pub struct PeerSessionHandle {
    pub(crate) id: u64,
    pub(crate) contact: Contact,
    pub(crate) command_tx: mpsc::UnboundedSender<PeerCommand>,
    pub(crate) close_tx: Arc<watch::Sender<bool>>,
    pub(crate) state_rx: watch::Receiver<NegotiationState>,
}

impl PeerSessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn state(&self) -> NegotiationState {
        *self.state_rx.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<NegotiationState> {
        self.state_rx.clone()
    }

    pub fn remote_description(&self, desc: SessionDescription) {
        let _ = self.command_tx.send(PeerCommand::RemoteDescription(desc));
    }

    pub fn remote_candidate(&self, candidate: IceCandidate) {
        let _ = self.command_tx.send(PeerCommand::RemoteCandidate(candidate));
    }

    pub fn remote_candidates_removed(&self, candidates: Vec<IceCandidate>) {
        let _ = self
            .command_tx
            .send(PeerCommand::RemoteCandidatesRemoved(candidates));
    }

    pub fn set_source_enabled(&self, source: MediaSource, enabled: bool) {
        let _ = self
            .command_tx
            .send(PeerCommand::SetSourceEnabled { source, enabled });
    }

    /// Reports stats every `period`, or stops reporting on `None`.
    pub fn report_stats(&self, period: Option<Duration>) {
        let _ = self.command_tx.send(PeerCommand::ReportStats(period));
    }

    pub(crate) fn request_call(
        &self,
        with_video: bool,
        reply: oneshot::Sender<Result<(), NegotiationError>>,
    ) {
        if let Err(mpsc::error::SendError(PeerCommand::Call { reply, .. })) = self
            .command_tx
            .send(PeerCommand::Call { with_video, reply })
        {
            let _ = reply.send(Err(NegotiationError::Interrupted));
        }
    }

    pub(crate) fn request_send(&self, message: ChatMessage, reply: oneshot::Sender<Result<(), Error>>) {
        if let Err(mpsc::error::SendError(PeerCommand::SendMessage { reply, .. })) = self
            .command_tx
            .send(PeerCommand::SendMessage { message, reply })
        {
            let _ = reply.send(Err(LookupError::NoSession(self.contact.id.clone()).into()));
        }
    }

    pub async fn call(&self, with_video: bool) -> Result<(), NegotiationError> {
        let (tx, rx) = oneshot::channel();
        self.request_call(with_video, tx);
        rx.await.unwrap_or(Err(NegotiationError::Interrupted))
    }

    pub async fn send_message(&self, message: ChatMessage) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.request_send(message, tx);
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(LookupError::NoSession(self.contact.id.clone()).into()),
        }
    }

    /// Asks the session to close without waiting for it.
    pub fn begin_close(&self) {
        self.close_tx.send_replace(true);
    }

    /// Resolves once the session has released its connection.
    pub async fn closed(&self) {
        let mut state_rx = self.state_rx.clone();
        let _ = state_rx.wait_for(|state| state.is_closed()).await;
    }

    pub async fn close(&self) {
        self.begin_close();
        self.closed().await;
    }
}

impl fmt::Debug for PeerSessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerSessionHandle")
            .field("id", &self.id)
            .field("contact", &self.contact.id)
            .field("state", &self.state())
            .finish()
    }
}
