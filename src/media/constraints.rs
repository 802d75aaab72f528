//! Local media capture constraints.

use crate::conf;

/// Constraints applicable to a video track captured from a camera.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VideoTrackConstraints {
    /// ID of the video input device to capture from.
    ///
    /// Platform default camera is used if `None`.
    device_id: Option<String>,
}

impl VideoTrackConstraints {
    /// Returns ID of the required video input device, if any.
    #[inline]
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Sets ID of the required video input device.
    #[inline]
    pub fn set_device_id(&mut self, device_id: String) {
        self.device_id = Some(device_id);
    }
}

/// Constraints of the local [`MediaStream`] request.
///
/// Audio is never requested, so these are video constraints only.
///
/// [`MediaStream`]: super::MediaStream
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MediaStreamConstraints {
    video: VideoTrackConstraints,
}

impl MediaStreamConstraints {
    /// Returns [`VideoTrackConstraints`] of these [`MediaStreamConstraints`].
    #[inline]
    #[must_use]
    pub fn video(&self) -> &VideoTrackConstraints {
        &self.video
    }

    /// Returns mutable [`VideoTrackConstraints`] of these
    /// [`MediaStreamConstraints`].
    #[inline]
    pub fn video_mut(&mut self) -> &mut VideoTrackConstraints {
        &mut self.video
    }
}

impl From<&conf::Media> for MediaStreamConstraints {
    fn from(conf: &conf::Media) -> Self {
        Self {
            video: VideoTrackConstraints {
                device_id: conf.device_id.clone(),
            },
        }
    }
}
