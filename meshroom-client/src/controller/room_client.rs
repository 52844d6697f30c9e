use crate::channel::ChannelEvent;
use crate::config::ClientConfig;
use crate::controller::{ClientCommand, ClientStatus, RoomClientHandle, StreamState};
use crate::error::{CaptureError, NegotiationError};
use crate::platform::{
    CaptureDevices, LocalTrack, MediaPlatform, MediaSinks, SessionEvent, SessionEventKind,
    SignalSink, TrackKind,
};
use crate::session::{PeerSession, SessionContext, SessionState};
use meshroom_core::{
    ClientMessage, ConnectionId, IceCandidate, IceServerConfig, RosterSnapshot, ServerMessage,
    SessionDescription,
};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// External collaborators of the room client.
#[derive(Clone)]
pub struct ClientDeps {
    pub platform: Arc<dyn MediaPlatform>,
    pub capture: Arc<dyn CaptureDevices>,
    pub sinks: Arc<dyn MediaSinks>,
    pub signals: Arc<dyn SignalSink>,
}

/// Timer and task completions fed back into the actor. `generation` ties each one to the
/// join attempt that scheduled it.
enum InternalEvent {
    CaptureFinished {
        generation: u64,
        result: Result<Vec<Arc<dyn LocalTrack>>, CaptureError>,
    },
    SettleElapsed {
        generation: u64,
    },
    OfferDue {
        remote: ConnectionId,
        token: u64,
    },
}

struct ScheduledOffer {
    token: u64,
    handle: JoinHandle<()>,
}

/// Client side room controller.
///
/// Runs as an actor: user commands, channel events, session callbacks and timer completions
/// are all handled on the task running [`RoomClient::run`].
pub struct RoomClient {
    config: ClientConfig,
    deps: ClientDeps,

    command_rx: mpsc::Receiver<ClientCommand>,
    inbound_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    channel_open: bool,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
    session_rx: mpsc::UnboundedReceiver<SessionEvent>,
    internal_tx: mpsc::UnboundedSender<InternalEvent>,
    internal_rx: mpsc::UnboundedReceiver<InternalEvent>,
    status_tx: watch::Sender<ClientStatus>,

    state: StreamState,
    self_id: Option<ConnectionId>,
    ice_servers: Vec<IceServerConfig>,
    roster: Option<RosterSnapshot>,
    position: Option<usize>,
    last_error: Option<String>,

    local_tracks: Vec<Arc<dyn LocalTrack>>,
    slot_requested: bool,
    /// Slot requests answered after we already left; their replies are ignored.
    superseded_requests: u32,
    /// `leave-slot` frames the server will acknowledge with `slot-released`.
    pending_releases: u32,
    settled: bool,
    sessions: HashMap<ConnectionId, PeerSession>,
    scheduled_offers: HashMap<ConnectionId, ScheduledOffer>,

    capture_task: Option<JoinHandle<()>>,
    settle_task: Option<JoinHandle<()>>,
    preview_task: Option<JoinHandle<()>>,

    generation: u64,
    next_epoch: u64,
    next_token: u64,
}

impl RoomClient {
    /// Builds the actor around the inbound half of a signaling channel.
    pub fn new(
        config: ClientConfig,
        deps: ClientDeps,
        inbound_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> (Self, RoomClientHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ClientStatus::default());

        let client = Self {
            ice_servers: config.ice_servers.clone(),
            config,
            deps,
            command_rx,
            inbound_rx,
            channel_open: true,
            session_tx,
            session_rx,
            internal_tx,
            internal_rx,
            status_tx,
            state: StreamState::NotStreaming,
            self_id: None,
            roster: None,
            position: None,
            last_error: None,
            local_tracks: Vec::new(),
            slot_requested: false,
            superseded_requests: 0,
            pending_releases: 0,
            settled: false,
            sessions: HashMap::new(),
            scheduled_offers: HashMap::new(),
            capture_task: None,
            settle_task: None,
            preview_task: None,
            generation: 0,
            next_epoch: 0,
            next_token: 0,
        };

        (client, RoomClientHandle::new(command_tx, status_rx))
    }

    pub async fn run(mut self) {
        info!("Room client started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("All handles dropped. Shutting down room client.");
                            break;
                        }
                    }
                }

                evt = self.inbound_rx.recv(), if self.channel_open => {
                    match evt {
                        Some(e) => self.handle_channel_event(e).await,
                        None => {
                            self.channel_open = false;
                            self.handle_channel_event(ChannelEvent::Closed).await;
                        }
                    }
                }

                Some(evt) = self.session_rx.recv() => self.handle_session_event(evt).await,

                Some(evt) = self.internal_rx.recv() => self.handle_internal_event(evt).await,
            }

            self.publish_status();
        }

        self.leave().await;
        info!("Room client finished");
    }

    async fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::RequestJoin => self.request_join(),
            ClientCommand::Leave => self.leave().await,
            ClientCommand::ToggleAudio => self.toggle_track(TrackKind::Audio),
            ClientCommand::ToggleVideo => self.toggle_track(TrackKind::Video),
        }
    }

    fn request_join(&mut self) {
        if self.state != StreamState::NotStreaming {
            debug!("Join requested while {:?}; ignored", self.state);
            return;
        }

        self.generation += 1;
        self.state = StreamState::RequestingJoin;
        self.last_error = None;
        self.slot_requested = false;

        let generation = self.generation;
        let capture = self.deps.capture.clone();
        let constraints = self.config.capture.clone();
        let tx = self.internal_tx.clone();

        info!("Acquiring capture devices");
        self.capture_task = Some(tokio::spawn(async move {
            let result = capture.acquire(&constraints).await;
            let _ = tx.send(InternalEvent::CaptureFinished { generation, result });
        }));
    }

    /// Tears down locally and tells the server the slot is free.
    async fn leave(&mut self) {
        let was_active = self.state != StreamState::NotStreaming;
        let awaiting_reply = self.state == StreamState::RequestingJoin && self.slot_requested;
        let holds_slot = self.state == StreamState::Streaming;
        self.teardown_local().await;

        if !was_active {
            return;
        }

        match self.deps.signals.send(ClientMessage::LeaveSlot) {
            Ok(()) if awaiting_reply => self.superseded_requests += 1,
            Ok(()) if holds_slot => self.pending_releases += 1,
            Ok(()) => {}
            Err(e) => warn!("Could not notify server about leaving: {}", e),
        }
        info!("Left the live room");
    }

    /// Releases a slot the server granted without us wanting it.
    fn release_unwanted_slot(&mut self) {
        match self.deps.signals.send(ClientMessage::LeaveSlot) {
            Ok(()) => self.pending_releases += 1,
            Err(e) => warn!("Could not release stale slot: {}", e),
        }
    }

    fn reset_reply_tracking(&mut self) {
        self.superseded_requests = 0;
        self.pending_releases = 0;
    }

    async fn teardown_local(&mut self) {
        self.generation += 1;

        for handle in [
            self.capture_task.take(),
            self.settle_task.take(),
            self.preview_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
        for (_, scheduled) in self.scheduled_offers.drain() {
            scheduled.handle.abort();
        }

        let sinks = self.deps.sinks.clone();
        for (_, mut session) in self.sessions.drain() {
            session.close(sinks.as_ref()).await;
        }

        for track in self.local_tracks.drain(..) {
            track.stop();
        }
        sinks.detach_local();

        self.state = StreamState::NotStreaming;
        self.position = None;
        self.slot_requested = false;
        self.settled = false;
    }

    fn toggle_track(&mut self, kind: TrackKind) {
        let Some(track) = self.local_tracks.iter().find(|t| t.kind() == kind) else {
            debug!("No local {:?} track to toggle", kind);
            return;
        };

        let enabled = !track.is_enabled();
        track.set_enabled(enabled);
        info!("{:?} {}", kind, if enabled { "enabled" } else { "disabled" });
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => info!("Signaling channel connected"),
            ChannelEvent::Message(msg) => self.handle_server_message(msg).await,
            ChannelEvent::Disconnected => {
                warn!("Signaling channel lost; leaving locally");
                self.teardown_local().await;
                self.reset_reply_tracking();
                self.self_id = None;
                self.roster = None;
            }
            ChannelEvent::Closed => {
                error!("Signaling channel closed");
                self.teardown_local().await;
                self.reset_reply_tracking();
                self.self_id = None;
                self.roster = None;
                self.last_error = Some("connection to the server lost".to_owned());
            }
        }
    }

    async fn handle_server_message(&mut self, msg: ServerMessage) {
        debug!("Received {}", msg.kind());

        match msg {
            ServerMessage::Welcome { connection_id } => {
                info!("Connected as {}", connection_id);
                self.self_id = Some(connection_id);
            }

            ServerMessage::IceConfig { ice_servers } => {
                debug!("Received ICE config: {} server(s)", ice_servers.len());
                if !ice_servers.is_empty() {
                    self.ice_servers = ice_servers;
                }
            }

            ServerMessage::RosterUpdate { snapshot } => {
                self.roster = Some(snapshot);
                if self.state == StreamState::Streaming && self.settled {
                    self.reconcile().await;
                }
            }

            ServerMessage::JoinConfirmed { position, snapshot } => {
                self.on_join_confirmed(position, snapshot);
            }

            ServerMessage::JoinRejected { reason, message } => {
                if self.superseded_requests > 0 {
                    self.superseded_requests -= 1;
                    debug!("Rejection of an abandoned slot request ignored");
                    return;
                }
                if self.state != StreamState::RequestingJoin {
                    debug!("Stale join rejection ignored");
                    return;
                }
                warn!("Join rejected ({:?}): {}", reason, message);
                self.teardown_local().await;
                self.last_error = Some(message);
            }

            ServerMessage::StreamerArrived { id, username } => {
                if self.state != StreamState::Streaming || Some(id) == self.self_id {
                    return;
                }
                info!("{} started streaming", username);
                if self.needs_offer(&id) {
                    self.schedule_offer(id, self.config.arrival_offer_delay);
                }
            }

            ServerMessage::StreamerDeparted { id, username } => {
                info!("{} stopped streaming", username);
                self.drop_remote(id).await;
            }

            ServerMessage::SlotReleased => {
                if self.pending_releases > 0 {
                    self.pending_releases -= 1;
                    debug!("Slot release acknowledged");
                } else if self.state == StreamState::Streaming {
                    info!("Slot released by the server");
                    self.teardown_local().await;
                }
            }

            ServerMessage::UserJoined { username } => debug!("{} joined the room", username),
            ServerMessage::UserLeft { username } => debug!("{} left the room", username),

            ServerMessage::Offer {
                from, descriptor, ..
            } => self.handle_remote_offer(from, descriptor).await,

            ServerMessage::Answer {
                from, descriptor, ..
            } => self.handle_remote_answer(from, descriptor).await,

            ServerMessage::IceCandidate {
                from, candidate, ..
            } => self.handle_remote_candidate(from, candidate).await,
        }
    }

    fn on_join_confirmed(&mut self, position: usize, snapshot: RosterSnapshot) {
        if self.superseded_requests > 0 {
            // The leave-slot sent after this request frees the slot and gets acknowledged.
            self.superseded_requests -= 1;
            self.pending_releases += 1;
            debug!("Confirmation of an abandoned slot request ignored");
            return;
        }
        if self.state == StreamState::Streaming {
            debug!("Duplicate join confirmation ignored");
            return;
        }
        if self.state != StreamState::RequestingJoin || !self.slot_requested {
            warn!("Unexpected join confirmation; releasing the slot");
            self.release_unwanted_slot();
            return;
        }

        info!("Streaming in slot {}", position);
        self.state = StreamState::Streaming;
        self.position = Some(position);
        self.roster = Some(snapshot);
        self.settled = false;

        self.start_preview();

        let generation = self.generation;
        let delay = self.config.settle_delay;
        let tx = self.internal_tx.clone();
        self.settle_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(InternalEvent::SettleElapsed { generation });
        }));
    }

    fn start_preview(&mut self) {
        let sinks = self.deps.sinks.clone();
        sinks.attach_local(&self.local_tracks);

        let retries = self.config.preview_retries;
        let delay = self.config.preview_retry_delay;
        self.preview_task = Some(tokio::spawn(async move {
            for attempt in 0..=retries {
                match sinks.play_local() {
                    Ok(()) => {
                        debug!("Local preview playing");
                        return;
                    }
                    Err(e) if attempt < retries => {
                        debug!("Preview attempt {} failed: {}", attempt + 1, e);
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => warn!("Local preview left paused: {}", e),
                }
            }
        }));
    }

    /// Brings the set of sessions in line with the latest roster.
    async fn reconcile(&mut self) {
        let Some(roster) = self.roster.clone() else {
            return;
        };

        let departed: Vec<ConnectionId> = self
            .sessions
            .keys()
            .chain(self.scheduled_offers.keys())
            .filter(|id| !roster.contains(id))
            .copied()
            .collect();
        for id in departed {
            self.drop_remote(id).await;
        }

        let (min, max) = self.config.offer_jitter;
        let newcomers: Vec<ConnectionId> = roster
            .streamer_ids()
            .filter(|id| Some(**id) != self.self_id)
            .filter(|id| self.needs_offer(id))
            .copied()
            .collect();

        for id in newcomers {
            let delay = if max > min {
                rand::thread_rng().gen_range(min..=max)
            } else {
                min
            };
            self.schedule_offer(id, delay);
        }
    }

    /// True when no offer is scheduled and no session is negotiating with `remote`. A session
    /// whose offer went unanswered past the deadline counts as needing a fresh one.
    fn needs_offer(&self, remote: &ConnectionId) -> bool {
        !self.scheduled_offers.contains_key(remote)
            && self
                .sessions
                .get(remote)
                .is_none_or(|s| !s.offer_in_flight() && !s.state().is_active())
    }

    fn schedule_offer(&mut self, remote: ConnectionId, delay: Duration) {
        self.next_token += 1;
        let token = self.next_token;
        let tx = self.internal_tx.clone();

        debug!("Offer to {} scheduled in {:?}", remote, delay);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(InternalEvent::OfferDue { remote, token });
        });

        if let Some(previous) = self
            .scheduled_offers
            .insert(remote, ScheduledOffer { token, handle })
        {
            previous.handle.abort();
        }
    }

    fn cancel_scheduled_offer(&mut self, remote: &ConnectionId) {
        if let Some(scheduled) = self.scheduled_offers.remove(remote) {
            scheduled.handle.abort();
        }
    }

    async fn drop_remote(&mut self, remote: ConnectionId) {
        self.cancel_scheduled_offer(&remote);
        if let Some(mut session) = self.sessions.remove(&remote) {
            session.close(self.deps.sinks.as_ref()).await;
        }
    }

    /// Closes any existing session for `remote` and installs a fresh one.
    async fn replace_session(&mut self, remote: ConnectionId) -> PeerSession {
        if let Some(mut previous) = self.sessions.remove(&remote) {
            previous.close(self.deps.sinks.as_ref()).await;
        }
        self.next_epoch += 1;
        PeerSession::new(remote, self.next_epoch)
    }

    async fn on_offer_due(&mut self, remote: ConnectionId, token: u64) {
        match self.scheduled_offers.get(&remote) {
            Some(scheduled) if scheduled.token == token => {
                self.scheduled_offers.remove(&remote);
            }
            _ => return,
        }

        if self.state != StreamState::Streaming {
            return;
        }
        if !self.roster.as_ref().is_some_and(|r| r.contains(&remote)) {
            debug!("{} left before our offer was due", remote);
            return;
        }
        if let Some(existing) = self.sessions.get(&remote) {
            if existing.offer_in_flight() || existing.state().is_active() {
                debug!("Session with {} already negotiating", remote);
                return;
            }
        }

        let mut session = self.replace_session(remote).await;
        let result = {
            let ctx = self.session_context();
            session.initiate_offer(&ctx).await
        };

        match result {
            Ok(_) => {
                self.sessions.insert(remote, session);
            }
            Err(e) => {
                warn!("Offer to {} failed: {}", remote, e);
                session.close(self.deps.sinks.as_ref()).await;
            }
        }
    }

    async fn handle_remote_offer(&mut self, from: ConnectionId, offer: SessionDescription) {
        if self.state != StreamState::Streaming {
            debug!("{}", NegotiationError::StaleSignal("offer"));
            return;
        }

        self.cancel_scheduled_offer(&from);
        let mut session = self.replace_session(from).await;
        let result = {
            let ctx = self.session_context();
            session.accept_offer(&ctx, offer).await
        };

        match result {
            Ok(()) => {
                self.sessions.insert(from, session);
            }
            Err(e) => {
                warn!("Could not answer {}: {}", from, e);
                session.close(self.deps.sinks.as_ref()).await;
            }
        }
    }

    async fn handle_remote_answer(&mut self, from: ConnectionId, answer: SessionDescription) {
        let Some(session) = self.sessions.get_mut(&from) else {
            debug!("{} from {}", NegotiationError::StaleSignal("answer"), from);
            return;
        };

        let result = session.handle_remote_answer(answer).await;
        match result {
            Ok(()) => debug!("Answer from {} applied", from),
            Err(e @ NegotiationError::StaleSignal(_)) => debug!("{} from {}", e, from),
            Err(e) => {
                warn!("Applying answer from {} failed: {}", from, e);
                self.drop_remote(from).await;
            }
        }
    }

    async fn handle_remote_candidate(&mut self, from: ConnectionId, candidate: IceCandidate) {
        let Some(session) = self.sessions.get_mut(&from) else {
            debug!("Candidate from {} without a session dropped", from);
            return;
        };
        session.handle_remote_candidate(candidate).await;
    }

    async fn handle_session_event(&mut self, event: SessionEvent) {
        let SessionEvent {
            remote,
            epoch,
            kind,
        } = event;
        let Some(session) = self.sessions.get_mut(&remote) else {
            return;
        };
        if session.epoch() != epoch {
            debug!("Event for a replaced session with {} ignored", remote);
            return;
        }

        match kind {
            SessionEventKind::LocalCandidate(Some(candidate)) => {
                let frame = ClientMessage::IceCandidate {
                    target_id: remote,
                    candidate,
                };
                if let Err(e) = self.deps.signals.send(frame) {
                    warn!("Could not send candidate to {}: {}", remote, e);
                }
            }
            SessionEventKind::LocalCandidate(None) => {
                debug!("Candidate gathering for {} complete", remote);
            }
            SessionEventKind::LinkStateChanged(link) => {
                if session.on_link_state(link) == SessionState::Failed {
                    self.drop_remote(remote).await;
                }
            }
            SessionEventKind::RemoteTrack(track) => {
                debug!("Remote {:?} track from {}", track.kind, remote);
                self.deps.sinks.attach_remote(remote, track);
            }
            SessionEventKind::NegotiationDeadline { round } => {
                session.on_negotiation_deadline(round);
            }
        }
    }

    async fn handle_internal_event(&mut self, event: InternalEvent) {
        match event {
            InternalEvent::CaptureFinished { generation, result } => {
                self.on_capture_finished(generation, result);
            }
            InternalEvent::SettleElapsed { generation } => {
                if generation == self.generation && self.state == StreamState::Streaming {
                    self.settle_task = None;
                    self.settled = true;
                    self.reconcile().await;
                }
            }
            InternalEvent::OfferDue { remote, token } => self.on_offer_due(remote, token).await,
        }
    }

    fn on_capture_finished(
        &mut self,
        generation: u64,
        result: Result<Vec<Arc<dyn LocalTrack>>, CaptureError>,
    ) {
        if generation != self.generation || self.state != StreamState::RequestingJoin {
            if let Ok(tracks) = result {
                tracks.iter().for_each(|t| t.stop());
            }
            return;
        }
        self.capture_task = None;

        let tracks = match result {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("Capture failed: {}", e);
                self.state = StreamState::NotStreaming;
                self.last_error = Some(e.to_string());
                return;
            }
        };

        info!("Captured {} local track(s)", tracks.len());
        self.local_tracks = tracks;

        match self.deps.signals.send(ClientMessage::RequestStreamerSlot) {
            Ok(()) => self.slot_requested = true,
            Err(e) => {
                warn!("Could not request a slot: {}", e);
                for track in self.local_tracks.drain(..) {
                    track.stop();
                }
                self.state = StreamState::NotStreaming;
                self.last_error = Some(e.to_string());
            }
        }
    }

    fn session_context(&self) -> SessionContext<'_> {
        SessionContext {
            platform: self.deps.platform.as_ref(),
            signals: self.deps.signals.as_ref(),
            sinks: self.deps.sinks.as_ref(),
            local_tracks: &self.local_tracks,
            ice_servers: &self.ice_servers,
            events: &self.session_tx,
            negotiation_timeout: self.config.negotiation_timeout,
        }
    }

    fn track_enabled(&self, kind: TrackKind) -> bool {
        self.local_tracks
            .iter()
            .find(|t| t.kind() == kind)
            .is_some_and(|t| t.is_enabled())
    }

    fn publish_status(&self) {
        let status = ClientStatus {
            state: self.state,
            connection_id: self.self_id,
            position: self.position,
            roster: self.roster.clone(),
            audio_enabled: self.track_enabled(TrackKind::Audio),
            video_enabled: self.track_enabled(TrackKind::Video),
            last_error: self.last_error.clone(),
            peers: self
                .sessions
                .iter()
                .map(|(id, session)| (*id, session.state()))
                .collect(),
            can_join: self.state == StreamState::NotStreaming
                && self.roster.as_ref().is_some_and(|r| r.available_slots > 0),
        };

        self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }
}
