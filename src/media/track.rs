//! [MediaStreamTrack][1] abstraction and [MediaStream][2] built of them.
//!
//! [1]: https://www.w3.org/TR/mediacapture-streams/#mediastreamtrack
//! [2]: https://www.w3.org/TR/mediacapture-streams/#mediastream

use std::{fmt, rc::Rc};

use derive_more::Display;

/// Media exchange kind of a [`MediaStreamTrack`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum MediaKind {
    /// Audio track.
    #[display(fmt = "audio")]
    Audio,

    /// Video track.
    #[display(fmt = "video")]
    Video,
}

/// Representation of [MediaStreamTrackState][1].
///
/// [1]: https://www.w3.org/TR/mediacapture-streams/#dom-mediastreamtrackstate
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrackState {
    /// Track is active: its source is connected and delivers media.
    Live,

    /// Track has been stopped and will never deliver media again.
    Ended,
}

/// Platform [MediaStreamTrack][1] that is either captured locally or received
/// from a remote participant.
///
/// [1]: https://www.w3.org/TR/mediacapture-streams/#mediastreamtrack
#[cfg_attr(test, mockall::automock)]
pub trait MediaStreamTrack {
    /// Returns unique identifier of this [`MediaStreamTrack`].
    fn id(&self) -> String;

    /// Returns [`MediaKind`] of this [`MediaStreamTrack`].
    fn kind(&self) -> MediaKind;

    /// Returns ID of the device this [`MediaStreamTrack`] is captured from,
    /// if known.
    fn device_id(&self) -> Option<String>;

    /// Returns current [`TrackState`] of this [`MediaStreamTrack`].
    fn ready_state(&self) -> TrackState;

    /// Permanently stops this [`MediaStreamTrack`], releasing its source.
    ///
    /// Stopping an already stopped [`MediaStreamTrack`] is a no-op.
    fn stop(&self);
}

/// Collection of [`MediaStreamTrack`]s delivered together.
#[derive(Clone, Default)]
pub struct MediaStream {
    tracks: Vec<Rc<dyn MediaStreamTrack>>,
}

impl MediaStream {
    /// Builds new [`MediaStream`] from the provided [`MediaStreamTrack`]s.
    #[inline]
    #[must_use]
    pub fn from_tracks(tracks: Vec<Rc<dyn MediaStreamTrack>>) -> Self {
        Self { tracks }
    }

    /// Returns all [`MediaStreamTrack`]s of this [`MediaStream`].
    #[inline]
    #[must_use]
    pub fn tracks(&self) -> &[Rc<dyn MediaStreamTrack>] {
        &self.tracks
    }

    /// Returns the first [`MediaKind::Video`] [`MediaStreamTrack`] of this
    /// [`MediaStream`], if any.
    #[must_use]
    pub fn video_track(&self) -> Option<Rc<dyn MediaStreamTrack>> {
        self.tracks
            .iter()
            .find(|t| t.kind() == MediaKind::Video)
            .cloned()
    }

    /// Stops all [`MediaStreamTrack`]s of this [`MediaStream`].
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Indicates whether all [`MediaStreamTrack`]s of this [`MediaStream`] are
    /// [`TrackState::Ended`].
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.tracks
            .iter()
            .all(|t| t.ready_state() == TrackState::Ended)
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field(
                "tracks",
                &self.tracks.iter().map(|t| t.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
