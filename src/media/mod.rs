//! Local media acquisition and the [`MediaStream`]s exchanged with remote
//! participants.

mod constraints;
mod device_info;
mod manager;
mod track;

#[cfg(test)]
#[doc(inline)]
pub use self::{manager::MockMediaDevices, track::MockMediaStreamTrack};
#[doc(inline)]
pub use self::{
    constraints::{MediaStreamConstraints, VideoTrackConstraints},
    device_info::{
        MediaDeviceInfo, MediaDeviceKind, RawMediaDeviceInfo,
        UnknownMediaDeviceKind,
    },
    manager::{MediaDevices, MediaError, MediaManager, MediaManagerError},
    track::{MediaKind, MediaStream, MediaStreamTrack, TrackState},
};
