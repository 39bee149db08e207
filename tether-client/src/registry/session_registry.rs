use crate::engine::MediaEngine;
use crate::error::{Error, LookupError};
use crate::peer::{PeerContext, PeerEvent, PeerNotice, PeerSession, PeerSessionHandle};
use crate::registry::{RegistryCommand, SessionObserver};
use crate::signaling::SignalingOutput;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tether_core::{
    ChatMessage, Contact, ContactId, IceServerConfig, NegotiationState, Room, RoomJoinedPayload,
    SdpType,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Owns every peer session of a client, keyed by contact. Runs as a single
/// task; nothing else touches the session map.
pub struct SessionRegistry {
    sessions: HashMap<ContactId, PeerSessionHandle>,
    contacts: HashMap<ContactId, Contact>,
    /// Contacts whose session ended; their late candidates are dropped until
    /// a new session is created.
    hung_up: HashSet<ContactId>,
    room: Option<Room>,
    default_ice_servers: Vec<IceServerConfig>,
    active: Option<ContactId>,
    auto_call_video: bool,
    next_session_id: u64,
    ctx: PeerContext,
    observer: Arc<dyn SessionObserver>,
    command_rx: mpsc::UnboundedReceiver<RegistryCommand>,
    notice_rx: mpsc::UnboundedReceiver<PeerNotice>,
}

#[derive(Clone)]
pub struct RegistryConfig {
    pub local_id: ContactId,
    pub default_ice_servers: Vec<IceServerConfig>,
    /// Whether calls started on room join carry video.
    pub auto_call_video: bool,
}

impl SessionRegistry {
    pub fn new(
        config: RegistryConfig,
        engine: Arc<dyn MediaEngine>,
        signaling: Arc<dyn SignalingOutput>,
        observer: Arc<dyn SessionObserver>,
        command_rx: mpsc::UnboundedReceiver<RegistryCommand>,
    ) -> Self {
        let (notices, notice_rx) = mpsc::unbounded_channel();

        Self {
            sessions: HashMap::new(),
            contacts: HashMap::new(),
            hung_up: HashSet::new(),
            room: None,
            default_ice_servers: config.default_ice_servers,
            active: None,
            auto_call_video: config.auto_call_video,
            next_session_id: 0,
            ctx: PeerContext {
                local_id: config.local_id,
                engine,
                signaling,
                notices,
            },
            observer,
            command_rx,
            notice_rx,
        }
    }

    pub async fn run(mut self) {
        info!("Session registry started for {}", self.ctx.local_id);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down registry.");
                            break;
                        }
                    }
                }

                Some(notice) = self.notice_rx.recv() => {
                    self.handle_notice(notice).await;
                }
            }
        }

        for (_, handle) in self.sessions.drain() {
            handle.begin_close();
        }
        info!("Session registry finished");
    }

    async fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::RoomJoined(joined) => self.on_room_joined(joined).await,

            RegistryCommand::ContactJoined(contact) => {
                info!("Contact {} joined", contact);
                self.contacts.insert(contact.id.clone(), contact.clone());
                self.observer.on_contact_joined(&contact).await;
            }

            RegistryCommand::ContactLeft(id) => {
                if let Some(handle) = self.sessions.remove(&id) {
                    handle.begin_close();
                }
                self.hung_up.insert(id.clone());
                if self.active.as_ref() == Some(&id) {
                    self.active = None;
                }
                let contact = self
                    .contacts
                    .remove(&id)
                    .unwrap_or_else(|| Contact::unnamed(id));
                info!("Contact {} left", contact);
                self.observer.on_contact_left(&contact).await;
            }

            RegistryCommand::RemoteDescription { from, desc } => {
                let handle = match desc.sdp_type {
                    SdpType::Offer => {
                        self.active = Some(from.clone());
                        let contact = self.contact_for(&from);
                        Some(self.live_session(contact))
                    }
                    SdpType::Answer => self.sessions.get(&from).cloned(),
                };

                match handle {
                    Some(handle) => handle.remote_description(desc),
                    None => warn!("Dropping {} from {} without a session", desc.sdp_type, from),
                }
            }

            RegistryCommand::RemoteCandidate { from, candidate } => {
                if self.hung_up.contains(&from) {
                    debug!("Dropping late candidate from {}", from);
                    return;
                }
                let contact = self.contact_for(&from);
                self.get_or_create(contact).remote_candidate(candidate);
            }

            RegistryCommand::RemoteHangup(from) => {
                if self.active.as_ref() == Some(&from) {
                    self.active = None;
                }
                match self.sessions.remove(&from) {
                    Some(handle) => {
                        info!("{} hung up", from);
                        self.hung_up.insert(from);
                        handle.begin_close();
                    }
                    None => debug!("Hangup from {} without a session", from),
                }
            }

            RegistryCommand::RemoteCandidatesRemoved { from, candidates } => {
                match self.sessions.get(&from) {
                    Some(handle) => handle.remote_candidates_removed(candidates),
                    None => debug!("Dropping candidate removal from {} without a session", from),
                }
            }

            RegistryCommand::SignalingError(e) => {
                self.observer.on_error(None, &Error::Transport(e)).await;
            }

            RegistryCommand::Call {
                contact,
                with_video,
                reply,
            } => {
                self.contacts
                    .entry(contact.id.clone())
                    .or_insert_with(|| contact.clone());
                self.active = Some(contact.id.clone());
                info!("Calling {}", contact);
                self.live_session(contact).request_call(with_video, reply);
            }

            RegistryCommand::SendMessage {
                text,
                contact,
                reply,
            } => {
                let Some(target) = contact.or_else(|| self.active.clone()) else {
                    let _ = reply.send(Err(LookupError::NoActiveContact.into()));
                    return;
                };
                match self.sessions.get(&target) {
                    Some(handle) => handle.request_send(ChatMessage::new(text), reply),
                    None => {
                        let _ = reply.send(Err(LookupError::NoSession(target).into()));
                    }
                }
            }

            RegistryCommand::Hangup { contact, reply } => {
                let Some(target) = contact.or_else(|| self.active.clone()) else {
                    let _ = reply.send(Err(LookupError::NoActiveContact));
                    return;
                };
                if self.active.as_ref() == Some(&target) {
                    self.active = None;
                }
                let Some(handle) = self.sessions.remove(&target) else {
                    let _ = reply.send(Err(LookupError::NoSession(target)));
                    return;
                };

                info!("Hanging up on {}", target);
                self.hung_up.insert(target.clone());
                let signaling = self.ctx.signaling.clone();
                tokio::spawn(async move {
                    handle.close().await;
                    if let Err(e) = signaling.send_hangup(&target).await {
                        warn!("Failed to tell {} about the hangup: {}", target, e);
                    }
                    let _ = reply.send(Ok(()));
                });
            }

            RegistryCommand::GetOrCreate { contact, reply } => {
                let _ = reply.send(self.get_or_create(contact));
            }

            RegistryCommand::Remove { contact, reply } => {
                let Some(handle) = self.sessions.remove(&contact) else {
                    let _ = reply.send(false);
                    return;
                };
                if self.active.as_ref() == Some(&contact) {
                    self.active = None;
                }
                self.hung_up.insert(contact);
                tokio::spawn(async move {
                    handle.close().await;
                    let _ = reply.send(true);
                });
            }

            RegistryCommand::CloseAll { reply } => {
                let handles: Vec<_> = self
                    .sessions
                    .drain()
                    .map(|(id, h)| {
                        self.hung_up.insert(id);
                        h
                    })
                    .collect();
                self.active = None;
                info!("Closing {} sessions", handles.len());

                tokio::spawn(async move {
                    join_all(handles.iter().map(|h| h.close())).await;
                    let _ = reply.send(());
                });
            }

            RegistryCommand::SetSourceEnabled {
                source,
                enabled,
                contact,
                reply,
            } => {
                let result = self.target_session(contact).map(|handle| {
                    info!("Setting {:?} to {} for {}", source, enabled, handle.contact());
                    handle.set_source_enabled(source, enabled);
                });
                let _ = reply.send(result);
            }

            RegistryCommand::ReportStats {
                period,
                contact,
                reply,
            } => {
                let result = self
                    .target_session(contact)
                    .map(|handle| handle.report_stats(period));
                let _ = reply.send(result);
            }

            RegistryCommand::Contacts { reply } => {
                let mut contacts: Vec<_> = self.contacts.values().cloned().collect();
                contacts.sort_by(|a, b| a.id.cmp(&b.id));
                let _ = reply.send(contacts);
            }
        }
    }

    async fn handle_notice(&mut self, notice: PeerNotice) {
        let PeerNotice {
            contact,
            session_id,
            event,
        } = notice;

        match event {
            PeerEvent::Negotiation(state) => {
                if state == NegotiationState::Closed {
                    self.forget(&contact.id, session_id);
                }
                self.observer.on_negotiation_state(&contact, state).await;
            }
            PeerEvent::Connection(state) => {
                self.observer.on_connection_state(&contact, state).await;
            }
            PeerEvent::Track(track) => self.observer.on_remote_track(&contact, track).await,
            PeerEvent::TrackRemoved(track) => {
                self.observer.on_remote_track_removed(&contact, track).await
            }
            PeerEvent::Stats(stats) => self.observer.on_stats(&contact, stats).await,
            PeerEvent::Message(message) => self.observer.on_message(&contact, message).await,
            PeerEvent::Error(e) => {
                self.observer
                    .on_error(Some(&contact), &Error::Negotiation(e))
                    .await;
            }
        }
    }

    async fn on_room_joined(&mut self, joined: RoomJoinedPayload) {
        let RoomJoinedPayload {
            room,
            initiator,
            peers,
        } = joined;
        info!(
            "Room '{}' joined with {} peers (initiator: {})",
            room.id,
            peers.len(),
            initiator
        );
        self.room = Some(room);

        for peer in peers {
            if peer.id == self.ctx.local_id {
                continue;
            }
            self.contacts.insert(peer.id.clone(), peer.clone());
            self.observer.on_contact_joined(&peer).await;

            if initiator {
                let (reply, _) = oneshot::channel();
                self.active = Some(peer.id.clone());
                self.live_session(peer)
                    .request_call(self.auto_call_video, reply);
            }
        }
    }

    fn contact_for(&self, id: &ContactId) -> Contact {
        self.contacts
            .get(id)
            .cloned()
            .unwrap_or_else(|| Contact::unnamed(id.clone()))
    }

    /// Session with `contact`, or with the active contact.
    fn target_session(
        &self,
        contact: Option<ContactId>,
    ) -> Result<&PeerSessionHandle, LookupError> {
        let target = contact
            .or_else(|| self.active.clone())
            .ok_or(LookupError::NoActiveContact)?;
        self.sessions
            .get(&target)
            .ok_or(LookupError::NoSession(target))
    }

    fn ice_servers(&self) -> Vec<IceServerConfig> {
        match &self.room {
            Some(room) if !room.ice_servers.is_empty() => room.ice_servers.clone(),
            _ => self.default_ice_servers.clone(),
        }
    }

    fn get_or_create(&mut self, contact: Contact) -> PeerSessionHandle {
        if let Some(handle) = self.sessions.get(&contact.id) {
            return handle.clone();
        }

        self.next_session_id += 1;
        let id = self.next_session_id;
        debug!("Creating session {} for {}", id, contact);
        self.hung_up.remove(&contact.id);

        let handle = PeerSession::spawn(id, contact.clone(), self.ice_servers(), self.ctx.clone());
        self.sessions.insert(contact.id, handle.clone());
        handle
    }

    /// Like `get_or_create`, but replaces a session that has failed.
    fn live_session(&mut self, contact: Contact) -> PeerSessionHandle {
        let stale = self
            .sessions
            .get(&contact.id)
            .is_some_and(|handle| !handle.state().is_live());
        if stale {
            if let Some(old) = self.sessions.remove(&contact.id) {
                debug!("Replacing {:?} session for {}", old.state(), contact);
                old.begin_close();
            }
        }
        self.get_or_create(contact)
    }

    fn forget(&mut self, id: &ContactId, session_id: u64) {
        if self.sessions.get(id).is_some_and(|h| h.id() == session_id) {
            self.sessions.remove(id);
            debug!("Session {} for {} removed", session_id, id);
        }
    }
}
