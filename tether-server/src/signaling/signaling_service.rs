use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tether_core::{
    Contact, ContactId, IceServerConfig, JoinPayload, MessageBody, Room, RoomJoinedPayload,
    SignalingMessage, decode, encode,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One open socket and, once it has joined, who is behind it.
struct Connection {
    tx: mpsc::UnboundedSender<Message>,
    user: Option<Contact>,
    room: Option<String>,
}

struct SignalingInner {
    connections: DashMap<Uuid, Connection>,
    ice_servers: Vec<IceServerConfig>,
}

/// Room bookkeeping and frame relaying for every connected socket.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                connections: DashMap::new(),
                ice_servers,
            }),
        }
    }

    pub fn get_ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.ice_servers.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn add_connection(&self, conn_id: Uuid, tx: mpsc::UnboundedSender<Message>) {
        self.inner.connections.insert(
            conn_id,
            Connection {
                tx,
                user: None,
                room: None,
            },
        );
    }

    /// Forgets the socket and tells its room the user left.
    pub fn remove_connection(&self, conn_id: Uuid) {
        let Some((_, conn)) = self.inner.connections.remove(&conn_id) else {
            return;
        };
        if let (Some(user), Some(room)) = (conn.user, conn.room) {
            info!("{} dropped out of room '{}'", user, room);
            self.broadcast_leave(&user.id, &room);
        }
    }

    pub fn handle_frame(&self, conn_id: Uuid, text: &str) {
        let msg = match decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Invalid frame from {}: {}", conn_id, e);
                return;
            }
        };

        match msg.body {
            MessageBody::Heartbeat => {
                self.send_to(conn_id, &SignalingMessage::new("", MessageBody::HeartbeatAck));
            }
            MessageBody::Join(payload) => self.join(conn_id, payload, text),
            MessageBody::Leave => self.leave(conn_id),
            MessageBody::HeartbeatAck | MessageBody::RoomJoined(_) => {
                debug!("Ignoring server-only frame from {}", conn_id);
            }
            _ => self.relay(conn_id, msg.to.as_ref(), text),
        }
    }

    fn join(&self, conn_id: Uuid, payload: JoinPayload, frame: &str) {
        // Switching rooms counts as leaving the old one.
        self.leave(conn_id);

        let user = Contact::from(payload.user_info);
        let room = payload.room;
        let peers: Vec<Contact> = self
            .members(&room, conn_id)
            .into_iter()
            .filter_map(|(_, member)| member)
            .collect();

        match self.inner.connections.get_mut(&conn_id) {
            Some(mut conn) => {
                conn.user = Some(user.clone());
                conn.room = Some(room.clone());
            }
            None => {
                warn!("Join from unknown connection {}", conn_id);
                return;
            }
        }
        info!(
            "{} joined room '{}' with {} peers",
            user,
            room,
            peers.len()
        );

        let joined = RoomJoinedPayload {
            room: Room::new(room.clone()).with_ice_servers(self.get_ice_servers()),
            initiator: !peers.is_empty(),
            peers,
        };
        self.send_to(
            conn_id,
            &SignalingMessage::new("", MessageBody::RoomJoined(joined)).to(user.id.clone()),
        );
        self.broadcast(&room, conn_id, frame);
    }

    fn leave(&self, conn_id: Uuid) {
        let left = self.inner.connections.get_mut(&conn_id).and_then(|mut conn| {
            let room = conn.room.take()?;
            Some((conn.user.clone()?, room))
        });

        if let Some((user, room)) = left {
            info!("{} left room '{}'", user, room);
            self.broadcast_leave(&user.id, &room);
        }
    }

    fn relay(&self, conn_id: Uuid, to: Option<&ContactId>, frame: &str) {
        let Some(room) = self
            .inner
            .connections
            .get(&conn_id)
            .and_then(|conn| conn.room.clone())
        else {
            warn!("Dropping frame from {} outside of any room", conn_id);
            return;
        };

        let Some(to) = to else {
            self.broadcast(&room, conn_id, frame);
            return;
        };

        let target = self
            .members(&room, conn_id)
            .into_iter()
            .find(|(_, member)| member.as_ref().is_some_and(|c| c.id == *to));
        match target {
            Some((target_id, _)) => self.send_text(target_id, frame),
            None => warn!("No member {} in room '{}'", to, room),
        }
    }

    fn broadcast_leave(&self, user: &ContactId, room: &str) {
        match encode(&SignalingMessage::new(user.clone(), MessageBody::Leave)) {
            Ok(frame) => self.broadcast(room, Uuid::nil(), &frame),
            Err(e) => error!("Failed to encode leave: {}", e),
        }
    }

    fn broadcast(&self, room: &str, except: Uuid, frame: &str) {
        for (member_id, _) in self.members(room, except) {
            self.send_text(member_id, frame);
        }
    }

    /// Connections in `room` other than `except`.
    fn members(&self, room: &str, except: Uuid) -> Vec<(Uuid, Option<Contact>)> {
        self.inner
            .connections
            .iter()
            .filter(|entry| *entry.key() != except && entry.room.as_deref() == Some(room))
            .map(|entry| (*entry.key(), entry.user.clone()))
            .collect()
    }

    fn send_to(&self, conn_id: Uuid, msg: &SignalingMessage) {
        match encode(msg) {
            Ok(frame) => self.send_text(conn_id, &frame),
            Err(e) => error!("Failed to encode {}: {}", msg.body.type_name(), e),
        }
    }

    fn send_text(&self, conn_id: Uuid, frame: &str) {
        if let Some(conn) = self.inner.connections.get(&conn_id) {
            if let Err(e) = conn.tx.send(Message::Text(frame.to_owned().into())) {
                error!("Failed to send WS message to {}: {:?}", conn_id, e);
            }
        } else {
            warn!("Attempted to send to disconnected socket {}", conn_id);
        }
    }
}
