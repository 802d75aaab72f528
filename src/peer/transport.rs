//! Platform seam of a peer-to-peer media connection.

use std::rc::Rc;

use async_trait::async_trait;
use derive_more::Display;
use futures::stream::LocalBoxStream;

use crate::{
    media::{MediaStream, MediaStreamTrack},
    signaling::{IceCandidate, ParticipantId},
};

/// Representation of [RTCSdpType][1] together with the SDP it describes.
///
/// [1]: https://w3.org/TR/webrtc/#dom-rtcsdptype
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SdpType {
    /// [`offer` type][1] of SDP.
    ///
    /// [1]: https://w3.org/TR/webrtc/#dom-rtcsdptype-offer
    Offer(String),

    /// [`answer` type][1] of SDP.
    ///
    /// [1]: https://w3.org/TR/webrtc/#dom-rtcsdptype-answer
    Answer(String),
}

/// Representation of [RTCSignalingState][1].
///
/// [1]: https://w3.org/TR/webrtc/#dom-rtcsignalingstate
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum SignalingState {
    /// No offer/answer exchange is in progress.
    #[display(fmt = "stable")]
    Stable,

    /// Local offer has been applied.
    #[display(fmt = "have-local-offer")]
    HaveLocalOffer,

    /// Remote offer has been applied.
    #[display(fmt = "have-remote-offer")]
    HaveRemoteOffer,

    /// Remote offer and local provisional answer have been applied.
    #[display(fmt = "have-local-pranswer")]
    HaveLocalPranswer,

    /// Local offer and remote provisional answer have been applied.
    #[display(fmt = "have-remote-pranswer")]
    HaveRemotePranswer,

    /// Connection is closed.
    #[display(fmt = "closed")]
    Closed,
}

/// Representation of [RTCPeerConnectionState][1].
///
/// [1]: https://w3.org/TR/webrtc/#dom-rtcpeerconnectionstate
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum PeerConnectionState {
    /// At least one transport is in the `new` state and none is in a
    /// `connecting`, `checking`, `failed` or `disconnected` state.
    #[display(fmt = "new")]
    New,

    /// At least one transport is establishing a connection.
    #[display(fmt = "connecting")]
    Connecting,

    /// All transports are connected.
    #[display(fmt = "connected")]
    Connected,

    /// At least one transport has lost its connection.
    #[display(fmt = "disconnected")]
    Disconnected,

    /// At least one transport has failed.
    #[display(fmt = "failed")]
    Failed,

    /// Connection is closed.
    #[display(fmt = "closed")]
    Closed,
}

impl PeerConnectionState {
    /// Indicates whether a connection in this state can't carry media anymore
    /// and should be hung up.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Closed)
    }
}

/// Events raised by a [`PeerTransport`].
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// Local description must change, so a new offer should be made.
    NegotiationNeeded,

    /// New local ICE candidate has been gathered.
    IceCandidateDiscovered(IceCandidate),

    /// Remote participant started sending media.
    NewRemoteStream(Rc<MediaStream>),

    /// [`PeerConnectionState`] has changed.
    ConnectionStateChanged(PeerConnectionState),

    /// [`SignalingState`] has changed.
    SignalingStateChanged(SignalingState),
}

/// Handle of a local track sent by a [`PeerTransport`] (its sender).
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub struct OutboundTrackHandle(pub u32);

/// Errors reported by a [`PeerTransport`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum TransportError {
    /// Transport for a remote participant cannot be created.
    #[display(fmt = "Failed to create transport: {}", _0)]
    CreateTransportFailed(String),

    /// SDP offer cannot be created.
    #[display(fmt = "Failed to create SDP offer: {}", _0)]
    CreateOfferFailed(String),

    /// SDP answer cannot be created.
    #[display(fmt = "Failed to create SDP answer: {}", _0)]
    CreateAnswerFailed(String),

    /// Local description cannot be applied.
    #[display(fmt = "Failed to set local description: {}", _0)]
    SetLocalDescriptionFailed(String),

    /// Remote description cannot be applied.
    #[display(fmt = "Failed to set remote description: {}", _0)]
    SetRemoteDescriptionFailed(String),

    /// Remote ICE candidate cannot be applied.
    #[display(fmt = "Failed to add ICE candidate: {}", _0)]
    AddIceCandidateFailed(String),

    /// Local track cannot be attached.
    #[display(fmt = "Failed to add track: {}", _0)]
    AddTrackFailed(String),

    /// Local track cannot be replaced.
    #[display(fmt = "Failed to replace track: {}", _0)]
    ReplaceTrackFailed(String),
}

/// Peer-to-peer media connection with a single remote participant.
///
/// Behaves like an [RTCPeerConnection][1], with its callbacks replaced by the
/// [`PeerTransport::on_event`] stream.
///
/// [1]: https://w3.org/TR/webrtc/#dom-rtcpeerconnection
#[cfg_attr(test, mockall::automock)]
#[async_trait(?Send)]
pub trait PeerTransport {
    /// Creates an SDP offer.
    async fn create_offer(&self) -> Result<String, TransportError>;

    /// Creates an SDP answer to the applied remote offer.
    async fn create_answer(&self) -> Result<String, TransportError>;

    /// Applies the provided SDP as the local description.
    async fn set_local_description(
        &self,
        sdp: SdpType,
    ) -> Result<(), TransportError>;

    /// Applies the provided SDP as the remote description.
    ///
    /// Applying a remote offer while a local offer is pending rolls the local
    /// offer back.
    async fn set_remote_description(
        &self,
        sdp: SdpType,
    ) -> Result<(), TransportError>;

    /// Adds the provided remote [`IceCandidate`].
    async fn add_ice_candidate(
        &self,
        candidate: IceCandidate,
    ) -> Result<(), TransportError>;

    /// Starts sending the provided local track.
    async fn add_track(
        &self,
        track: Rc<dyn MediaStreamTrack>,
    ) -> Result<OutboundTrackHandle, TransportError>;

    /// Replaces the track sent by the provided [`OutboundTrackHandle`].
    async fn replace_track(
        &self,
        handle: OutboundTrackHandle,
        track: Rc<dyn MediaStreamTrack>,
    ) -> Result<(), TransportError>;

    /// Returns current [`SignalingState`].
    fn signaling_state(&self) -> SignalingState;

    /// Closes this [`PeerTransport`]. Idempotent.
    fn close(&self);

    /// Returns [`LocalBoxStream`] of all the [`TransportEvent`]s raised by
    /// this [`PeerTransport`].
    fn on_event(&self) -> LocalBoxStream<'static, TransportEvent>;
}

/// Factory of [`PeerTransport`]s.
#[cfg_attr(test, mockall::automock)]
pub trait TransportFactory {
    /// Creates new [`PeerTransport`] connecting to the participant with the
    /// provided [`ParticipantId`].
    ///
    /// # Errors
    ///
    /// With [`TransportError::CreateTransportFailed`] if the platform refuses
    /// to create it.
    fn create(
        &self,
        peer_id: &ParticipantId,
    ) -> Result<Rc<dyn PeerTransport>, TransportError>;
}
