//! Signalling protocol exchanged between participants through a relay.
//!
//! Messages are JSON objects tagged with a `type` field:
//!
//! ```json
//! {"type": "video-offer", "sender": "a", "target": "b", "sdp": "..."}
//! ```

mod relay;

use derive_more::{Display, From};
use futures::stream::LocalBoxStream;
use medea_macro::dispatchable;
use serde::{Deserialize, Serialize};
use tracerr::Traced;
use uuid::Uuid;

#[doc(inline)]
pub use self::relay::{Relay, RelayEndpoint};

/// ID of a participant of a mesh call.
#[derive(
    Clone,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[from(forward)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Generates new random [`ParticipantId`].
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Representation of [RTCIceCandidateInit][1] object.
///
/// [1]: https://www.w3.org/TR/webrtc/#dom-rtcicecandidateinit
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IceCandidate {
    /// [`candidate` field][2] of the discovered [RTCIceCandidate][1].
    ///
    /// Empty string means end of candidates.
    ///
    /// [1]: https://www.w3.org/TR/webrtc/#dom-rtcicecandidate
    /// [2]: https://www.w3.org/TR/webrtc/#dom-rtcicecandidate-candidate
    pub candidate: String,

    /// [`sdpMLineIndex` field][2] of the discovered [RTCIceCandidate][1].
    ///
    /// [1]: https://www.w3.org/TR/webrtc/#dom-rtcicecandidate
    /// [2]: https://www.w3.org/TR/webrtc/#dom-rtcicecandidate-sdpmlineindex
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,

    /// [`sdpMid` field][2] of the discovered [RTCIceCandidate][1].
    ///
    /// [1]: https://www.w3.org/TR/webrtc/#dom-rtcicecandidate
    /// [2]: https://www.w3.org/TR/webrtc/#dom-rtcicecandidate-sdpmid
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
}

impl IceCandidate {
    /// Indicates whether this [`IceCandidate`] is an end-of-candidates marker.
    #[inline]
    #[must_use]
    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.is_empty()
    }
}

/// Message relayed between two participants to negotiate their
/// `PeerTransport`.
#[dispatchable(self: &Self, async_trait(?Send))]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalingMessage {
    /// SDP offer from `sender` to `target`.
    VideoOffer {
        sender: ParticipantId,
        target: ParticipantId,
        sdp: String,
    },

    /// SDP answer from `sender` to `target`.
    VideoAnswer {
        sender: ParticipantId,
        target: ParticipantId,
        sdp: String,
    },

    /// ICE candidate discovered by `sender` for its connection with `target`.
    NewIceCandidate {
        sender: ParticipantId,
        target: ParticipantId,
        candidate: IceCandidate,
    },
}

impl SignalingMessage {
    /// Returns [`ParticipantId`] of this [`SignalingMessage`] author.
    #[must_use]
    pub fn sender(&self) -> &ParticipantId {
        match self {
            Self::VideoOffer { sender, .. }
            | Self::VideoAnswer { sender, .. }
            | Self::NewIceCandidate { sender, .. } => sender,
        }
    }

    /// Returns [`ParticipantId`] this [`SignalingMessage`] is addressed to.
    #[must_use]
    pub fn target(&self) -> &ParticipantId {
        match self {
            Self::VideoOffer { target, .. }
            | Self::VideoAnswer { target, .. }
            | Self::NewIceCandidate { target, .. } => target,
        }
    }
}

/// Errors that may occur when exchanging [`SignalingMessage`]s.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum SignalingError {
    /// [`SignalingMessage::sender`] differs from the participant the message
    /// is sent on behalf of.
    #[display(
        fmt = "Message sender `{}` does not match source `{}`",
        actual,
        expected
    )]
    SenderMismatch {
        /// [`ParticipantId`] the message was sent on behalf of.
        expected: ParticipantId,

        /// [`ParticipantId`] that was written into the message.
        actual: ParticipantId,
    },

    /// Participant with the same [`ParticipantId`] is registered already.
    #[display(fmt = "Participant `{}` is registered already", _0)]
    DuplicateParticipant(ParticipantId),

    /// [`SignalingChannel`] is closed and cannot carry messages anymore.
    #[display(fmt = "Signalling channel is closed")]
    Closed,
}

/// Out-of-band relay carrying [`SignalingMessage`]s between participants.
///
/// Closing of the channel is signalled by the end of the stream returned from
/// [`SignalingChannel::on_message`].
#[cfg_attr(test, mockall::automock)]
pub trait SignalingChannel {
    /// Sends the provided [`SignalingMessage`] to its
    /// [`SignalingMessage::target`].
    ///
    /// # Errors
    ///
    /// Errors if the message cannot be relayed.
    fn send(&self, msg: SignalingMessage) -> Result<(), Traced<SignalingError>>;

    /// Returns [`LocalBoxStream`] of all [`SignalingMessage`]s addressed to
    /// the local participant.
    fn on_message(&self) -> LocalBoxStream<'static, SignalingMessage>;
}
