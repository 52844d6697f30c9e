use crate::error::NegotiationError;
use crate::platform::{
    ConnectionEvents, LinkState, LocalTrack, MediaConnection, RemoteTrack, TrackKind,
};
use crate::rtc::RtcLocalTrack;
use async_trait::async_trait;
use meshroom_core::{IceCandidate, SdpKind, SessionDescription};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// webrtc-rs peer connection reporting through [`ConnectionEvents`].
pub struct RtcConnection {
    peer_connection: Arc<RTCPeerConnection>,
}

impl RtcConnection {
    pub fn new(peer_connection: Arc<RTCPeerConnection>, events: ConnectionEvents) -> Self {
        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events = state_events.clone();

                Box::pin(async move {
                    info!("Peer connection with {} is {:?}", events.remote(), s);
                    if let Some(link) = link_state(s) {
                        events.link_state(link);
                    }
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();

            Box::pin(async move {
                let Some(candidate) = c else {
                    events.local_candidate(None);
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => events.local_candidate(Some(from_rtc_candidate(init))),
                    Err(e) => warn!("Failed to serialize local candidate: {}", e),
                }
            })
        }));

        let track_events = events;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();

                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        _ => return,
                    };
                    debug!("Remote {:?} track from {}", kind, events.remote());

                    events.remote_track(RemoteTrack {
                        id: track.id(),
                        stream_id: track.stream_id(),
                        kind,
                        handle: track,
                    });
                })
            },
        ));

        Self { peer_connection }
    }

    pub fn peer_connection(&self) -> Arc<RTCPeerConnection> {
        Arc::clone(&self.peer_connection)
    }
}

fn link_state(state: RTCPeerConnectionState) -> Option<LinkState> {
    match state {
        RTCPeerConnectionState::New => Some(LinkState::New),
        RTCPeerConnectionState::Connecting => Some(LinkState::Connecting),
        RTCPeerConnectionState::Connected => Some(LinkState::Connected),
        RTCPeerConnectionState::Disconnected => Some(LinkState::Disconnected),
        RTCPeerConnectionState::Failed => Some(LinkState::Failed),
        RTCPeerConnectionState::Closed => Some(LinkState::Closed),
        _ => None,
    }
}

fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_m_line_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn to_rtc_candidate(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_m_line_index,
        username_fragment: candidate.username_fragment,
    }
}

#[async_trait]
impl MediaConnection for RtcConnection {
    async fn add_track(&self, track: Arc<dyn LocalTrack>) -> Result<(), NegotiationError> {
        let Some(local) = track.as_any().downcast_ref::<RtcLocalTrack>() else {
            return Err(NegotiationError::Platform(format!(
                "track {} was not captured by the webrtc platform",
                track.id()
            )));
        };

        self.peer_connection
            .add_track(local.track() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(NegotiationError::platform)?;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(NegotiationError::platform)?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .map_err(NegotiationError::platform)?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(NegotiationError::platform)?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .map_err(NegotiationError::platform)?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_remote_description(
        &self,
        descriptor: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let desc = match descriptor.kind {
            SdpKind::Offer => RTCSessionDescription::offer(descriptor.sdp),
            SdpKind::Answer => RTCSessionDescription::answer(descriptor.sdp),
        }
        .map_err(NegotiationError::platform)?;

        self.peer_connection
            .set_remote_description(desc)
            .await
            .map_err(NegotiationError::platform)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        self.peer_connection
            .add_ice_candidate(to_rtc_candidate(candidate))
            .await
            .map_err(NegotiationError::platform)
    }

    async fn close(&self) {
        if let Err(e) = self.peer_connection.close().await {
            warn!("Failed to close peer connection: {}", e);
        }
    }
}
