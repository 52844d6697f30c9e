use crate::error::NegotiationError;
use crate::platform::{ConnectionEvents, MediaConnection, MediaPlatform};
use crate::rtc::RtcConnection;
use async_trait::async_trait;
use meshroom_core::IceServerConfig;
use std::sync::Arc;
use tracing::debug;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;

/// Native media platform on webrtc-rs.
pub struct RtcPlatform {
    api: API,
}

impl RtcPlatform {
    pub fn new() -> Result<Self, NegotiationError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(NegotiationError::platform)?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(NegotiationError::platform)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api })
    }
}

fn to_rtc_ice_servers(ice_servers: &[IceServerConfig]) -> Vec<RTCIceServer> {
    ice_servers
        .iter()
        .map(|server| RTCIceServer {
            urls: server.urls.clone(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect()
}

#[async_trait]
impl MediaPlatform for RtcPlatform {
    async fn create_connection(
        &self,
        ice_servers: &[IceServerConfig],
        events: ConnectionEvents,
    ) -> Result<Arc<dyn MediaConnection>, NegotiationError> {
        let rtc_config = RTCConfiguration {
            ice_servers: to_rtc_ice_servers(ice_servers),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            self.api
                .new_peer_connection(rtc_config)
                .await
                .map_err(NegotiationError::platform)?,
        );
        debug!("Peer connection created for {}", events.remote());

        Ok(Arc::new(RtcConnection::new(peer_connection, events)))
    }
}
