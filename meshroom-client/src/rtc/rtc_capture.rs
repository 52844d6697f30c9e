use crate::config::CaptureConstraints;
use crate::error::CaptureError;
use crate::platform::{CaptureDevices, LocalTrack, TrackKind};
use crate::rtc::RtcLocalTrack;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Capture source producing writable sample tracks.
///
/// Only one set of live tracks exists at a time; a second acquisition while the previous tracks
/// are still running fails with [`CaptureError::Busy`].
#[derive(Default)]
pub struct RtcCaptureDevices {
    active: Mutex<Vec<Arc<RtcLocalTrack>>>,
}

impl RtcCaptureDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks handed out by the last successful acquisition that are still running.
    pub fn active_tracks(&self) -> Vec<Arc<RtcLocalTrack>> {
        match self.active.lock() {
            Ok(active) => active.iter().filter(|t| !t.is_stopped()).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl CaptureDevices for RtcCaptureDevices {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Vec<Arc<dyn LocalTrack>>, CaptureError> {
        if !constraints.audio && !constraints.video {
            return Err(CaptureError::NotFound);
        }

        let mut active = self
            .active
            .lock()
            .map_err(|e| CaptureError::Other(e.to_string()))?;
        if active.iter().any(|t| !t.is_stopped()) {
            return Err(CaptureError::Busy);
        }

        let stream_id = "meshroom-local";
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(Arc::new(RtcLocalTrack::new(TrackKind::Audio, "audio", stream_id)));
        }
        if constraints.video {
            tracks.push(Arc::new(RtcLocalTrack::new(TrackKind::Video, "video", stream_id)));
        }

        debug!(
            "Capture started ({}x{}, {} track(s))",
            constraints.width,
            constraints.height,
            tracks.len()
        );
        *active = tracks.clone();

        Ok(tracks
            .into_iter()
            .map(|t| t as Arc<dyn LocalTrack>)
            .collect())
    }
}
