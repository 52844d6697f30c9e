/// Negotiation progress of one peer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    /// Local offer sent, waiting for the answer.
    OfferPending,
    /// Both descriptions applied, waiting for the transport.
    Negotiating,
    Connected,
    Failed,
    Closed,
}

impl SessionState {
    /// A session past the offer stage owns a live negotiation.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Negotiating | SessionState::Connected)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

/// What happened to a remote ICE candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDisposition {
    Queued,
    Applied,
    Rejected,
    Dropped,
}
