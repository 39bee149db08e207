use crate::error::TransportError;
use crate::signaling::{SignalingHandler, SignalingOutput};
use crate::transport::{CLOSE_NORMAL, TransportClient, TransportEvent};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, RwLock};
use tether_core::{
    Contact, ContactId, IceCandidate, JoinPayload, MessageBody, SessionDescription,
    SignalingMessage, UserInfo, decode,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_id: ContactId,
    pub remote_peer_id: Option<ContactId>,
    pub room: Option<String>,
}

struct SessionInner {
    transport: TransportClient,
    identity: RwLock<Identity>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

/// Room-level signaling on top of a [`TransportClient`]: stamps outgoing
/// messages with our identity and routes inbound ones to a handler.
#[derive(Clone)]
pub struct SignalingSession {
    inner: Arc<SessionInner>,
}

impl SignalingSession {
    pub fn new(transport: TransportClient) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                transport,
                identity: RwLock::new(Identity::default()),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    pub fn transport(&self) -> &TransportClient {
        &self.inner.transport
    }

    pub fn identity(&self) -> Identity {
        self.inner
            .identity
            .read()
            .map(|id| id.clone())
            .unwrap_or_default()
    }

    pub fn set_user_id(&self, user_id: ContactId) {
        self.inner.transport.set_local_id(user_id.clone());
        if let Ok(mut identity) = self.inner.identity.write() {
            identity.user_id = user_id;
        }
    }

    pub fn set_remote_peer_id(&self, remote: Option<ContactId>) {
        if let Ok(mut identity) = self.inner.identity.write() {
            identity.remote_peer_id = remote;
        }
    }

    pub async fn connect(&self) -> Result<(), TransportError> {
        self.inner.transport.connect().await
    }

    pub async fn disconnect(&self) {
        self.inner
            .transport
            .disconnect(CLOSE_NORMAL, "client disconnect")
            .await;
    }

    /// Starts the dispatch loop. Calling it again replaces the handler.
    pub fn start(&self, handler: Arc<dyn SignalingHandler>) {
        let events = self.inner.transport.subscribe();
        let task = tokio::spawn(dispatch_loop(self.inner.clone(), events, handler));

        if let Ok(mut slot) = self.inner.dispatcher.lock() {
            if let Some(previous) = slot.replace(task) {
                previous.abort();
            }
        }
    }

    pub fn stop(&self) {
        if let Ok(mut slot) = self.inner.dispatcher.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }

    pub async fn join_room(&self, contact: &Contact, room: &str) -> Result<(), TransportError> {
        self.set_user_id(contact.id.clone());

        let msg = SignalingMessage::new(
            contact.id.clone(),
            MessageBody::Join(JoinPayload {
                room: room.to_owned(),
                user_info: UserInfo::from(contact),
            }),
        );
        self.inner.transport.send_message(&msg).await?;

        if let Ok(mut identity) = self.inner.identity.write() {
            identity.room = Some(room.to_owned());
        }
        info!("Joined room '{}' as {}", room, contact);
        Ok(())
    }

    pub async fn leave_room(&self) -> Result<(), TransportError> {
        let identity = self.identity();
        let Some(room) = identity.room else {
            debug!("leave_room called outside of a room");
            return Ok(());
        };

        let msg = SignalingMessage::new(identity.user_id, MessageBody::Leave);
        let result = self.inner.transport.send_message(&msg).await;

        if let Ok(mut identity) = self.inner.identity.write() {
            identity.room = None;
            identity.remote_peer_id = None;
        }
        info!("Left room '{}'", room);
        result
    }

    /// Sends an offer or answer. Without an explicit recipient the message
    /// goes to the current remote peer, if any.
    pub async fn send_session_description(
        &self,
        desc: SessionDescription,
        to: Option<&ContactId>,
    ) -> Result<(), TransportError> {
        let kind = desc.sdp_type;
        let msg = self.outgoing(MessageBody::from(desc), to);
        self.inner.transport.send_message(&msg).await?;
        debug!("Sent {} to {:?}", kind, msg.to);
        Ok(())
    }

    pub async fn send_ice_candidate(
        &self,
        candidate: IceCandidate,
        to: Option<&ContactId>,
    ) -> Result<(), TransportError> {
        let msg = self.outgoing(MessageBody::IceCandidate(candidate), to);
        self.inner.transport.send_message(&msg).await
    }

    pub async fn send_ice_candidates_removed(
        &self,
        candidates: Vec<IceCandidate>,
        to: Option<&ContactId>,
    ) -> Result<(), TransportError> {
        let msg = self.outgoing(MessageBody::IceCandidatesRemoved(candidates), to);
        self.inner.transport.send_message(&msg).await
    }

    pub async fn send_hangup_to(&self, to: &ContactId) -> Result<(), TransportError> {
        let msg = self.outgoing(MessageBody::Hangup, Some(to));
        self.inner.transport.send_message(&msg).await?;
        debug!("Sent hangup to {}", to);
        Ok(())
    }

    fn outgoing(&self, body: MessageBody, to: Option<&ContactId>) -> SignalingMessage {
        let identity = self.identity();
        SignalingMessage {
            from: identity.user_id,
            to: to.cloned().or(identity.remote_peer_id),
            body,
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingSession {
    async fn send_description(
        &self,
        to: &ContactId,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        self.send_session_description(desc, Some(to)).await
    }

    async fn send_ice(&self, to: &ContactId, candidate: IceCandidate) -> Result<(), TransportError> {
        self.send_ice_candidate(candidate, Some(to)).await
    }

    async fn send_candidates_removed(
        &self,
        to: &ContactId,
        candidates: Vec<IceCandidate>,
    ) -> Result<(), TransportError> {
        self.send_ice_candidates_removed(candidates, Some(to)).await
    }

    async fn send_hangup(&self, to: &ContactId) -> Result<(), TransportError> {
        self.send_hangup_to(to).await
    }
}

async fn dispatch_loop(
    inner: Arc<SessionInner>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    handler: Arc<dyn SignalingHandler>,
) {
    info!("Signaling dispatch loop started");

    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Message(text) => match decode(&text) {
                Ok(msg) => dispatch(&inner, msg, handler.as_ref()).await,
                Err(e) => warn!("Dropping undecodable signaling frame: {}", e),
            },
            TransportEvent::Closed => {
                info!("Signaling connection closed");
                handler.on_closed().await;
            }
            TransportEvent::Error(e) => {
                error!("Signaling error: {}", e);
                handler.on_error(e).await;
            }
        }
    }

    info!("Signaling dispatch loop finished");
}

async fn dispatch(inner: &SessionInner, msg: SignalingMessage, handler: &dyn SignalingHandler) {
    let user_id = inner
        .identity
        .read()
        .map(|id| id.user_id.clone())
        .unwrap_or_default();

    if !user_id.is_empty() {
        if msg.from == user_id {
            debug!("Ignoring own {} message", msg.body.type_name());
            return;
        }
        if msg.to.as_ref().is_some_and(|to| *to != user_id) {
            debug!("Ignoring {} addressed to {:?}", msg.body.type_name(), msg.to);
            return;
        }
    }

    let from = msg.from;
    match msg.body {
        MessageBody::Offer { sdp } => {
            if let Ok(mut identity) = inner.identity.write() {
                identity.remote_peer_id = Some(from.clone());
            }
            handler.on_offer(from, SessionDescription::offer(sdp)).await;
        }
        MessageBody::Answer { sdp } => {
            handler.on_answer(from, SessionDescription::answer(sdp)).await;
        }
        MessageBody::IceCandidate(candidate) => handler.on_candidate(from, candidate).await,
        MessageBody::IceCandidatesRemoved(candidates) => {
            handler.on_candidates_removed(from, candidates).await
        }
        MessageBody::Join(payload) => {
            handler
                .on_join(Contact::from(payload.user_info), payload.room)
                .await
        }
        MessageBody::Leave => handler.on_leave(from).await,
        MessageBody::Hangup => handler.on_hangup(from).await,
        MessageBody::RoomJoined(payload) => handler.on_room_joined(payload).await,
        MessageBody::HeartbeatAck => debug!("Received heartbeat-ack"),
        MessageBody::Heartbeat => debug!("Received heartbeat from {}", from),
        MessageBody::Unknown(kind) => info!("Received message with unknown type: {}", kind),
    }
}
