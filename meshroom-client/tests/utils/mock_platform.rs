use async_trait::async_trait;
use meshroom_client::{
    ConnectionEvents, LinkState, LocalTrack, MediaConnection, MediaPlatform, NegotiationError,
};
use meshroom_core::{ConnectionId, IceCandidate, IceServerConfig, SdpKind, SessionDescription};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// One recorded call on a [`MockConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCall {
    AddTrack(String),
    CreateOffer,
    CreateAnswer,
    SetRemote(SdpKind),
    AddCandidate(String),
    Close,
}

/// Media connection that records every call.
pub struct MockConnection {
    pub index: usize,
    pub remote: ConnectionId,
    calls: Mutex<Vec<ConnectionCall>>,
    events: ConnectionEvents,
    fail_offer: bool,
    reject_candidates: bool,
}

impl MockConnection {
    pub async fn calls(&self) -> Vec<ConnectionCall> {
        self.calls.lock().await.clone()
    }

    pub async fn was_closed(&self) -> bool {
        self.calls.lock().await.contains(&ConnectionCall::Close)
    }

    /// Candidates applied so far, in order.
    pub async fn applied_candidates(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                ConnectionCall::AddCandidate(candidate) => Some(candidate.clone()),
                _ => None,
            })
            .collect()
    }

    /// Simulates a transport state callback.
    pub fn emit_link_state(&self, state: LinkState) {
        self.events.link_state(state);
    }

    /// Simulates a locally gathered candidate.
    pub fn emit_local_candidate(&self, candidate: &str) {
        self.events.local_candidate(Some(IceCandidate::new(candidate)));
    }

    async fn record(&self, call: ConnectionCall) {
        tracing::debug!("[MockConnection {}] {:?}", self.index, call);
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl MediaConnection for MockConnection {
    async fn add_track(&self, track: Arc<dyn LocalTrack>) -> Result<(), NegotiationError> {
        self.record(ConnectionCall::AddTrack(track.id().to_owned()))
            .await;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        self.record(ConnectionCall::CreateOffer).await;
        if self.fail_offer {
            return Err(NegotiationError::Platform("offer failed".into()));
        }
        Ok(SessionDescription::offer(format!("offer-{}", self.index)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        self.record(ConnectionCall::CreateAnswer).await;
        Ok(SessionDescription::answer(format!("answer-{}", self.index)))
    }

    async fn set_remote_description(
        &self,
        descriptor: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.record(ConnectionCall::SetRemote(descriptor.kind)).await;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        self.record(ConnectionCall::AddCandidate(candidate.candidate.clone()))
            .await;
        if self.reject_candidates {
            return Err(NegotiationError::Platform(
                "Unknown ufrag for candidate".into(),
            ));
        }
        Ok(())
    }

    async fn close(&self) {
        self.record(ConnectionCall::Close).await;
    }
}

/// Media platform handing out [`MockConnection`]s.
#[derive(Clone, Default)]
pub struct MockPlatform {
    connections: Arc<Mutex<Vec<Arc<MockConnection>>>>,
    created: Arc<AtomicUsize>,
    fail_offers: Arc<AtomicBool>,
    reject_candidates: Arc<AtomicBool>,
    last_ice_servers: Arc<Mutex<Vec<IceServerConfig>>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_offers(&self, fail: bool) {
        self.fail_offers.store(fail, Ordering::SeqCst);
    }

    pub fn reject_candidates(&self, reject: bool) {
        self.reject_candidates.store(reject, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// ICE servers handed to the most recent connection.
    pub async fn last_ice_servers(&self) -> Vec<IceServerConfig> {
        self.last_ice_servers.lock().await.clone()
    }

    pub async fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().await.clone()
    }

    /// Connections opened towards `remote`, oldest first.
    pub async fn connections_to(&self, remote: &ConnectionId) -> Vec<Arc<MockConnection>> {
        self.connections
            .lock()
            .await
            .iter()
            .filter(|c| &c.remote == remote)
            .cloned()
            .collect()
    }

    pub async fn latest_to(&self, remote: &ConnectionId) -> Option<Arc<MockConnection>> {
        self.connections_to(remote).await.pop()
    }
}

#[async_trait]
impl MediaPlatform for MockPlatform {
    async fn create_connection(
        &self,
        ice_servers: &[IceServerConfig],
        events: ConnectionEvents,
    ) -> Result<Arc<dyn MediaConnection>, NegotiationError> {
        *self.last_ice_servers.lock().await = ice_servers.to_vec();
        let index = self.created.fetch_add(1, Ordering::SeqCst);
        let connection = Arc::new(MockConnection {
            index,
            remote: events.remote(),
            calls: Mutex::new(Vec::new()),
            events,
            fail_offer: self.fail_offers.load(Ordering::SeqCst),
            reject_candidates: self.reject_candidates.load(Ordering::SeqCst),
        });

        self.connections.lock().await.push(connection.clone());
        Ok(connection)
    }
}
