use crate::engine::{EngineEvent, MediaEngine, MediaSource, PeerConnection, TrackKind};
use crate::error::{EngineError, Error, NegotiationError};
use crate::peer::{PeerCommand, PeerEvent, PeerNotice, PeerSessionHandle};
use crate::signaling::SignalingOutput;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{
    ChatMessage, ConnectionState, Contact, ContactId, IceCandidate, IceServerConfig,
    NegotiationState, SdpType, SessionDescription,
};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub const DATA_CHANNEL_LABEL: &str = "data";
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Dependencies shared by every peer session of one client.
#[derive(Clone)]
pub struct PeerContext {
    pub local_id: ContactId,
    pub engine: Arc<dyn MediaEngine>,
    pub signaling: Arc<dyn SignalingOutput>,
    pub notices: mpsc::UnboundedSender<PeerNotice>,
}

/// Offer/answer state machine for one remote contact. Runs as its own task;
/// talk to it through a [`PeerSessionHandle`].
pub struct PeerSession {
    id: u64,
    contact: Contact,
    ctx: PeerContext,
    ice_servers: Vec<IceServerConfig>,
    state: NegotiationState,
    connection_state: ConnectionState,
    is_initiator: bool,
    connection: Option<Arc<dyn PeerConnection>>,
    tracks_added: bool,
    remote_description_set: bool,
    /// SDP of the last offer we answered, to spot redelivered offers.
    last_remote_offer: Option<String>,
    pending_candidates: VecDeque<IceCandidate>,
    deferred_offer: Option<SessionDescription>,
    disabled_sources: HashSet<MediaSource>,
    stats_timer: Option<Interval>,
    command_rx: mpsc::UnboundedReceiver<PeerCommand>,
    engine_rx: mpsc::Receiver<EngineEvent>,
    engine_tx: mpsc::Sender<EngineEvent>,
    close_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<NegotiationState>,
}

impl PeerSession {
    pub fn spawn(
        id: u64,
        contact: Contact,
        ice_servers: Vec<IceServerConfig>,
        ctx: PeerContext,
    ) -> PeerSessionHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::channel(256);
        let (close_tx, close_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(NegotiationState::Idle);

        let session = Self {
            id,
            contact: contact.clone(),
            ctx,
            ice_servers,
            state: NegotiationState::Idle,
            connection_state: ConnectionState::New,
            is_initiator: false,
            connection: None,
            tracks_added: false,
            remote_description_set: false,
            last_remote_offer: None,
            pending_candidates: VecDeque::new(),
            deferred_offer: None,
            disabled_sources: HashSet::new(),
            stats_timer: None,
            command_rx,
            engine_rx,
            engine_tx,
            close_rx,
            state_tx,
        };
        tokio::spawn(session.run());

        PeerSessionHandle {
            id,
            contact,
            command_tx,
            close_tx: Arc::new(close_tx),
            state_rx,
        }
    }

    async fn run(mut self) {
        debug!("Peer session {} for {} started", self.id, self.contact);

        loop {
            tokio::select! {
                biased;

                changed = self.close_rx.changed() => {
                    if changed.is_err() || *self.close_rx.borrow() {
                        break;
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => break,
                    }
                }

                Some(evt) = self.engine_rx.recv() => {
                    self.handle_engine_event(evt).await;
                }

                _ = next_stats_tick(&mut self.stats_timer) => {
                    self.report_stats().await;
                }
            }

            if self.should_stop() {
                break;
            }
            self.replay_deferred_offer().await;
        }

        self.shutdown().await;
        debug!("Peer session {} for {} finished", self.id, self.contact);
    }

    fn should_stop(&self) -> bool {
        self.state == NegotiationState::Closed
            || *self.close_rx.borrow()
            || self.close_rx.has_changed().is_err()
    }

    async fn handle_command(&mut self, cmd: PeerCommand) {
        match cmd {
            PeerCommand::Call { with_video, reply } => {
                let result = self.start_call(with_video).await;
                match &result {
                    Err(NegotiationError::InvalidState { .. }) | Ok(()) => {}
                    Err(e) => self.fail(e.clone()),
                }
                let _ = reply.send(result);
            }

            PeerCommand::RemoteDescription(desc) => {
                let result = match desc.sdp_type {
                    SdpType::Offer => self.on_remote_offer(desc).await,
                    SdpType::Answer => self.on_remote_answer(desc).await,
                };
                if let Err(e) = result {
                    self.fail(e);
                }
            }

            PeerCommand::RemoteCandidate(candidate) => self.on_remote_candidate(candidate).await,

            PeerCommand::RemoteCandidatesRemoved(candidates) => {
                self.on_remote_candidates_removed(candidates).await
            }

            PeerCommand::SendMessage { message, reply } => {
                let _ = reply.send(self.send_chat(&message).await);
            }

            PeerCommand::SetSourceEnabled { source, enabled } => {
                self.set_source_enabled(source, enabled).await
            }

            PeerCommand::ReportStats(period) => {
                info!(
                    "Stats reports for {}: {:?}",
                    self.contact.id, period
                );
                self.stats_timer = period.filter(|p| !p.is_zero()).map(|period| {
                    let mut timer = time::interval(period);
                    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    timer
                });
            }
        }
    }

    async fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::IceCandidate(candidate) => {
                if let Err(e) = self.ctx.signaling.send_ice(&self.contact.id, candidate).await {
                    warn!("Failed to send ICE candidate to {}: {}", self.contact.id, e);
                }
            }

            EngineEvent::IceCandidatesRemoved(candidates) => {
                if let Err(e) = self
                    .ctx
                    .signaling
                    .send_candidates_removed(&self.contact.id, candidates)
                    .await
                {
                    warn!("Failed to send candidate removal to {}: {}", self.contact.id, e);
                }
            }

            EngineEvent::ConnectionState(state) => {
                info!("Connection to {} is {:?}", self.contact.id, state);
                self.connection_state = state;
                self.notify(PeerEvent::Connection(state));

                match state {
                    ConnectionState::Connected => {
                        if matches!(
                            self.state,
                            NegotiationState::Negotiating | NegotiationState::AnswerPending
                        ) {
                            self.transition(NegotiationState::Connected);
                        }
                    }
                    ConnectionState::Failed | ConnectionState::Closed => {
                        self.shutdown().await;
                    }
                    _ => {}
                }
            }

            EngineEvent::Track(track) => self.notify(PeerEvent::Track(track)),

            EngineEvent::TrackRemoved(track) => self.notify(PeerEvent::TrackRemoved(track)),

            EngineEvent::DataChannelOpen(label) => {
                debug!("Data channel '{}' to {} is open", label, self.contact.id);
            }

            EngineEvent::DataMessage(data) => match ChatMessage::from_bytes(&data) {
                Ok(message) => self.notify(PeerEvent::Message(message)),
                Err(e) => warn!("Dropping undecodable chat message from {}: {}", self.contact.id, e),
            },
        }
    }

    async fn start_call(&mut self, with_video: bool) -> Result<(), NegotiationError> {
        if self.state != NegotiationState::Idle {
            return Err(NegotiationError::InvalidState {
                action: "call",
                state: self.state,
            });
        }

        self.is_initiator = true;
        self.transition(NegotiationState::OfferPending);

        let conn = self.ensure_connection().await?;
        self.add_local_tracks(&conn, with_video).await?;
        guard(
            &mut self.close_rx,
            "create data channel",
            conn.create_data_channel(DATA_CHANNEL_LABEL),
        )
        .await?;

        let offer = guard(&mut self.close_rx, "create offer", conn.create_offer()).await?;
        guard(
            &mut self.close_rx,
            "set local offer",
            conn.set_local_description(offer.clone()),
        )
        .await?;

        self.send_description(offer, "offer").await
    }

    async fn on_remote_offer(&mut self, offer: SessionDescription) -> Result<(), NegotiationError> {
        if self.is_duplicate_offer(&offer) {
            debug!("Dropping duplicate offer from {}", self.contact.id);
            return Ok(());
        }

        match self.state {
            NegotiationState::Idle | NegotiationState::Connected => self.accept_offer(offer).await,

            NegotiationState::OfferPending if self.yields_on_glare() => {
                info!("Offer collision with {}, rolling back local offer", self.contact.id);
                let conn = self.ensure_connection().await?;
                guard(&mut self.close_rx, "rollback", conn.rollback()).await?;
                self.accept_offer(offer).await
            }

            NegotiationState::OfferPending => {
                info!(
                    "Offer collision with {}, keeping local offer",
                    self.contact.id
                );
                Ok(())
            }

            NegotiationState::AnswerPending | NegotiationState::Negotiating => {
                debug!("Deferring offer from {} until connected", self.contact.id);
                self.deferred_offer = Some(offer);
                Ok(())
            }

            NegotiationState::Failed | NegotiationState::Closed => {
                warn!("Ignoring offer from {} in state {:?}", self.contact.id, self.state);
                Ok(())
            }
        }
    }

    async fn accept_offer(&mut self, offer: SessionDescription) -> Result<(), NegotiationError> {
        self.transition(NegotiationState::AnswerPending);
        self.last_remote_offer = Some(offer.sdp.clone());

        let conn = self.ensure_connection().await?;
        let with_video = offer.sdp.contains("m=video");
        self.add_local_tracks(&conn, with_video).await?;

        guard(
            &mut self.close_rx,
            "set remote offer",
            conn.set_remote_description(offer),
        )
        .await?;
        self.remote_description_set = true;
        self.drain_candidates(&conn).await;

        let answer = guard(&mut self.close_rx, "create answer", conn.create_answer()).await?;
        guard(
            &mut self.close_rx,
            "set local answer",
            conn.set_local_description(answer.clone()),
        )
        .await?;

        self.send_description(answer, "answer").await?;
        self.settle();
        Ok(())
    }

    async fn on_remote_answer(&mut self, answer: SessionDescription) -> Result<(), NegotiationError> {
        if self.state != NegotiationState::OfferPending {
            warn!(
                "Ignoring stale answer from {} in state {:?}",
                self.contact.id, self.state
            );
            return Ok(());
        }

        let conn = self.ensure_connection().await?;
        guard(
            &mut self.close_rx,
            "set remote answer",
            conn.set_remote_description(answer),
        )
        .await?;
        self.remote_description_set = true;
        self.drain_candidates(&conn).await;
        self.settle();
        Ok(())
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidate) {
        if !self.state.is_live() {
            debug!("Dropping candidate from {} in state {:?}", self.contact.id, self.state);
            return;
        }

        let conn = match &self.connection {
            Some(conn) if self.remote_description_set => conn.clone(),
            _ => {
                debug!("Queueing candidate from {}", self.contact.id);
                self.pending_candidates.push_back(candidate);
                return;
            }
        };

        if let Err(e) = guard(&mut self.close_rx, "add candidate", conn.add_ice_candidate(candidate)).await {
            warn!("Failed to add ICE candidate from {}: {}", self.contact.id, e);
        }
    }

    async fn on_remote_candidates_removed(&mut self, candidates: Vec<IceCandidate>) {
        let conn = match &self.connection {
            Some(conn) if self.remote_description_set => conn.clone(),
            _ => {
                self.pending_candidates.retain(|c| !candidates.contains(c));
                return;
            }
        };

        if let Err(e) = guard(
            &mut self.close_rx,
            "remove candidates",
            conn.remove_ice_candidates(&candidates),
        )
        .await
        {
            warn!("Failed to remove ICE candidates from {}: {}", self.contact.id, e);
        }
    }

    async fn set_source_enabled(&mut self, source: MediaSource, enabled: bool) {
        if enabled {
            self.disabled_sources.remove(&source);
        } else {
            self.disabled_sources.insert(source);
        }

        let Some(conn) = self.connection.clone() else {
            debug!("No connection to {} yet, {:?} applies later", self.contact.id, source);
            return;
        };
        if let Err(e) = guard(
            &mut self.close_rx,
            "toggle source",
            conn.set_source_enabled(source, enabled),
        )
        .await
        {
            warn!("Failed to set {:?} to {} for {}: {}", source, enabled, self.contact.id, e);
        }
    }

    async fn report_stats(&mut self) {
        let Some(conn) = self.connection.clone() else {
            return;
        };
        match guard(&mut self.close_rx, "collect stats", conn.stats()).await {
            Ok(stats) => self.notify(PeerEvent::Stats(stats)),
            Err(e) => debug!("No stats for {}: {}", self.contact.id, e),
        }
    }

    async fn send_chat(&mut self, message: &ChatMessage) -> Result<(), Error> {
        let Some(conn) = self.connection.clone() else {
            return Err(EngineError::Closed.into());
        };
        let data = message
            .to_bytes()
            .map_err(|e| EngineError::Native(e.to_string()))?;
        conn.send_data(data.into()).await?;
        Ok(())
    }

    async fn ensure_connection(&mut self) -> Result<Arc<dyn PeerConnection>, NegotiationError> {
        if let Some(conn) = &self.connection {
            return Ok(conn.clone());
        }

        let engine = self.ctx.engine.clone();
        let conn = guard(
            &mut self.close_rx,
            "create peer connection",
            engine.create_peer_connection(&self.ice_servers, self.engine_tx.clone()),
        )
        .await?;
        self.connection = Some(conn.clone());
        Ok(conn)
    }

    async fn add_local_tracks(
        &mut self,
        conn: &Arc<dyn PeerConnection>,
        with_video: bool,
    ) -> Result<(), NegotiationError> {
        if self.tracks_added {
            return Ok(());
        }

        let stream_id = self.ctx.local_id.to_string();
        guard(
            &mut self.close_rx,
            "add audio track",
            conn.add_track(TrackKind::Audio, &stream_id),
        )
        .await?;
        if with_video {
            guard(
                &mut self.close_rx,
                "add video track",
                conn.add_track(TrackKind::Video, &stream_id),
            )
            .await?;
        }
        self.tracks_added = true;

        for source in self.disabled_sources.clone() {
            guard(
                &mut self.close_rx,
                "toggle source",
                conn.set_source_enabled(source, false),
            )
            .await?;
        }
        Ok(())
    }

    async fn drain_candidates(&mut self, conn: &Arc<dyn PeerConnection>) {
        if !self.pending_candidates.is_empty() {
            debug!(
                "Applying {} queued candidates from {}",
                self.pending_candidates.len(),
                self.contact.id
            );
        }

        while let Some(candidate) = self.pending_candidates.pop_front() {
            if let Err(e) = guard(&mut self.close_rx, "add candidate", conn.add_ice_candidate(candidate)).await {
                warn!("Failed to add queued ICE candidate from {}: {}", self.contact.id, e);
            }
        }
    }

    async fn send_description(
        &self,
        desc: SessionDescription,
        step: &'static str,
    ) -> Result<(), NegotiationError> {
        self.ctx
            .signaling
            .send_description(&self.contact.id, desc)
            .await
            .map_err(|source| NegotiationError::Signaling { step, source })
    }

    async fn replay_deferred_offer(&mut self) {
        if self.state != NegotiationState::Connected {
            return;
        }
        let Some(offer) = self.deferred_offer.take() else {
            return;
        };
        if self.is_duplicate_offer(&offer) {
            debug!("Dropping deferred duplicate offer from {}", self.contact.id);
            return;
        }

        info!("Replaying deferred offer from {}", self.contact.id);
        if let Err(e) = self.accept_offer(offer).await {
            self.fail(e);
        }
    }

    fn is_duplicate_offer(&self, offer: &SessionDescription) -> bool {
        self.last_remote_offer.as_deref() == Some(offer.sdp.as_str())
            || self
                .deferred_offer
                .as_ref()
                .is_some_and(|deferred| deferred.sdp == offer.sdp)
    }

    /// The side with the greater id yields when both sent offers.
    fn yields_on_glare(&self) -> bool {
        self.ctx.local_id > self.contact.id
    }

    fn settle(&mut self) {
        if self.connection_state == ConnectionState::Connected {
            self.transition(NegotiationState::Connected);
        } else {
            self.transition(NegotiationState::Negotiating);
        }
    }

    fn fail(&mut self, err: NegotiationError) {
        if matches!(err, NegotiationError::Interrupted) || self.state.is_closed() {
            return;
        }

        error!("Negotiation with {} failed: {}", self.contact.id, err);
        self.transition(NegotiationState::Failed);
        self.notify(PeerEvent::Error(err));
    }

    fn transition(&mut self, next: NegotiationState) {
        if self.state == next {
            return;
        }

        debug!(
            "Session {} ({}): {:?} -> {:?}",
            self.id, self.contact.id, self.state, next
        );
        self.state = next;
        self.state_tx.send_replace(next);
        self.notify(PeerEvent::Negotiation(next));
    }

    fn notify(&self, event: PeerEvent) {
        let _ = self.ctx.notices.send(PeerNotice {
            contact: self.contact.clone(),
            session_id: self.id,
            event,
        });
    }

    async fn shutdown(&mut self) {
        if self.state.is_closed() {
            return;
        }

        if let Some(conn) = self.connection.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Failed to close connection to {}: {}", self.contact.id, e),
                Err(_) => warn!("Timed out closing connection to {}", self.contact.id),
            }
        }

        self.pending_candidates.clear();
        self.deferred_offer = None;
        self.stats_timer = None;
        self.command_rx.close();
        info!(
            "Session with {} closed (initiator: {})",
            self.contact.id, self.is_initiator
        );
        self.transition(NegotiationState::Closed);
    }
}

/// Runs one engine step unless the session is asked to close first.
async fn guard<T>(
    close_rx: &mut watch::Receiver<bool>,
    step: &'static str,
    fut: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, NegotiationError> {
    if *close_rx.borrow() {
        return Err(NegotiationError::Interrupted);
    }

    tokio::select! {
        biased;

        _ = wait_for_close(close_rx) => Err(NegotiationError::Interrupted),
        res = fut => res.map_err(|source| NegotiationError::Engine { step, source }),
    }
}

async fn wait_for_close(close_rx: &mut watch::Receiver<bool>) {
    let _ = close_rx.wait_for(|closing| *closing).await;
}

async fn next_stats_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
