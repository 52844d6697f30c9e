use crate::error::NegotiationError;
use crate::platform::{
    ConnectionEvents, LinkState, MediaConnection, MediaSinks, SessionEvent, SessionEventKind,
};
use crate::session::{CandidateDisposition, SessionContext, SessionState};
use meshroom_core::{ClientMessage, ConnectionId, IceCandidate, SdpKind, SessionDescription};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Negotiation state machine for one remote streamer.
///
/// A session is never reused after `close`; the controller replaces it with a fresh one under a
/// new epoch, and events carrying an older epoch are discarded.
pub struct PeerSession {
    remote: ConnectionId,
    epoch: u64,
    state: SessionState,
    connection: Option<Arc<dyn MediaConnection>>,
    remote_description_set: bool,
    pending_candidates: VecDeque<IceCandidate>,
    offer_in_flight: bool,
    round: u64,
    deadline: Option<JoinHandle<()>>,
}

impl PeerSession {
    pub fn new(remote: ConnectionId, epoch: u64) -> Self {
        Self {
            remote,
            epoch,
            state: SessionState::Idle,
            connection: None,
            remote_description_set: false,
            pending_candidates: VecDeque::new(),
            offer_in_flight: false,
            round: 0,
            deadline: None,
        }
    }

    pub fn remote(&self) -> ConnectionId {
        self.remote
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn offer_in_flight(&self) -> bool {
        self.offer_in_flight
    }

    pub fn queued_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Sends a local offer. Returns `Ok(false)` if one is already in flight or the session is
    /// past the offer stage.
    pub async fn initiate_offer(
        &mut self,
        ctx: &SessionContext<'_>,
    ) -> Result<bool, NegotiationError> {
        if self.offer_in_flight || self.state.is_active() || self.state.is_closed() {
            debug!("Offer to {} skipped in state {:?}", self.remote, self.state);
            return Ok(false);
        }

        self.offer_in_flight = true;
        self.state = SessionState::OfferPending;

        match self.send_offer(ctx).await {
            Ok(()) => {
                self.start_deadline(ctx.events.clone(), ctx.negotiation_timeout);
                info!("Offer sent to {}", self.remote);
                Ok(true)
            }
            Err(e) => {
                self.offer_in_flight = false;
                self.cancel_deadline();
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn send_offer(&mut self, ctx: &SessionContext<'_>) -> Result<(), NegotiationError> {
        let connection = self.ensure_connection(ctx).await?;
        let descriptor = connection.create_offer().await?;

        ctx.signals.send(ClientMessage::Offer {
            target_id: self.remote,
            descriptor,
        })?;
        Ok(())
    }

    /// Answers a remote offer on a fresh session.
    pub async fn accept_offer(
        &mut self,
        ctx: &SessionContext<'_>,
        offer: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if self.state != SessionState::Idle {
            return Err(NegotiationError::StaleSignal("offer"));
        }
        if offer.kind != SdpKind::Offer {
            return Err(NegotiationError::Platform(format!(
                "expected an offer descriptor, got {:?}",
                offer.kind
            )));
        }

        match self.answer_offer(ctx, offer).await {
            Ok(()) => {
                self.state = SessionState::Negotiating;
                info!("Answer sent to {}", self.remote);
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn answer_offer(
        &mut self,
        ctx: &SessionContext<'_>,
        offer: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let connection = self.ensure_connection(ctx).await?;

        connection.set_remote_description(offer).await?;
        self.remote_description_set = true;
        self.flush_candidates(&connection).await;

        let descriptor = connection.create_answer().await?;
        ctx.signals.send(ClientMessage::Answer {
            target_id: self.remote,
            descriptor,
        })?;
        Ok(())
    }

    /// Applies the answer to our offer. Also honored after the negotiation deadline passed.
    pub async fn handle_remote_answer(
        &mut self,
        answer: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if self.state != SessionState::OfferPending || answer.kind != SdpKind::Answer {
            return Err(NegotiationError::StaleSignal("answer"));
        }
        let Some(connection) = self.connection.clone() else {
            return Err(NegotiationError::StaleSignal("answer"));
        };

        if !self.offer_in_flight {
            info!("Late answer from {} accepted", self.remote);
        }

        if let Err(e) = connection.set_remote_description(answer).await {
            self.offer_in_flight = false;
            self.cancel_deadline();
            self.state = SessionState::Failed;
            return Err(e);
        }

        self.remote_description_set = true;
        self.offer_in_flight = false;
        self.cancel_deadline();
        self.state = SessionState::Negotiating;
        self.flush_candidates(&connection).await;
        Ok(())
    }

    /// Queues the candidate until a remote description exists, applies it otherwise.
    pub async fn handle_remote_candidate(
        &mut self,
        candidate: IceCandidate,
    ) -> CandidateDisposition {
        if self.state.is_closed() {
            return CandidateDisposition::Dropped;
        }

        match (&self.connection, self.remote_description_set) {
            (Some(connection), true) => {
                let connection = connection.clone();
                self.apply_candidate(&connection, candidate).await
            }
            _ => {
                self.pending_candidates.push_back(candidate);
                debug!(
                    "Queued candidate from {} ({} pending)",
                    self.remote,
                    self.pending_candidates.len()
                );
                CandidateDisposition::Queued
            }
        }
    }

    /// Deadline expiry clears the in-flight flag so a fresh offer may be attempted.
    pub fn on_negotiation_deadline(&mut self, round: u64) -> bool {
        if round != self.round || !self.offer_in_flight {
            return false;
        }

        self.offer_in_flight = false;
        self.deadline = None;
        warn!(
            "No answer from {} within the negotiation timeout",
            self.remote
        );
        true
    }

    pub fn on_link_state(&mut self, link: LinkState) -> SessionState {
        match link {
            LinkState::Connected if !self.state.is_closed() => {
                info!("Media connected with {}", self.remote);
                self.state = SessionState::Connected;
            }
            LinkState::Failed if !self.state.is_closed() => {
                warn!("Media connection with {} failed", self.remote);
                self.state = SessionState::Failed;
            }
            LinkState::Disconnected => {
                debug!("Media connection with {} disconnected", self.remote);
            }
            _ => {}
        }
        self.state
    }

    /// Releases everything the session holds. Safe to call repeatedly.
    pub async fn close(&mut self, sinks: &dyn MediaSinks) {
        if self.state.is_closed() {
            return;
        }

        self.cancel_deadline();
        self.offer_in_flight = false;
        self.pending_candidates.clear();
        self.remote_description_set = false;

        if let Some(connection) = self.connection.take() {
            connection.close().await;
        }
        sinks.detach_remote(self.remote);

        self.state = SessionState::Closed;
        debug!("Session with {} closed", self.remote);
    }

    async fn ensure_connection(
        &mut self,
        ctx: &SessionContext<'_>,
    ) -> Result<Arc<dyn MediaConnection>, NegotiationError> {
        if let Some(connection) = &self.connection {
            return Ok(connection.clone());
        }

        let events = ConnectionEvents::new(self.remote, self.epoch, ctx.events.clone());
        let connection = ctx
            .platform
            .create_connection(ctx.ice_servers, events)
            .await?;
        self.connection = Some(connection.clone());

        for track in ctx.local_tracks {
            connection.add_track(track.clone()).await?;
        }

        Ok(connection)
    }

    async fn flush_candidates(&mut self, connection: &Arc<dyn MediaConnection>) {
        if !self.pending_candidates.is_empty() {
            debug!(
                "Applying {} queued candidate(s) from {}",
                self.pending_candidates.len(),
                self.remote
            );
        }

        while let Some(candidate) = self.pending_candidates.pop_front() {
            self.apply_candidate(connection, candidate).await;
        }
    }

    async fn apply_candidate(
        &self,
        connection: &Arc<dyn MediaConnection>,
        candidate: IceCandidate,
    ) -> CandidateDisposition {
        match connection.add_ice_candidate(candidate).await {
            Ok(()) => CandidateDisposition::Applied,
            Err(e) => {
                warn!("Failed to add candidate from {}: {}", self.remote, e);
                CandidateDisposition::Rejected
            }
        }
    }

    fn start_deadline(&mut self, events: mpsc::UnboundedSender<SessionEvent>, timeout: Duration) {
        self.cancel_deadline();
        self.round += 1;

        let (remote, epoch, round) = (self.remote, self.epoch, self.round);
        self.deadline = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(SessionEvent {
                remote,
                epoch,
                kind: SessionEventKind::NegotiationDeadline { round },
            });
        }));
    }

    fn cancel_deadline(&mut self) {
        if let Some(handle) = self.deadline.take() {
            handle.abort();
        }
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.cancel_deadline();
    }
}
