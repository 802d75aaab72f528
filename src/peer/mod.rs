//! Connections with remote participants.

mod repo;
mod session;
mod transport;

use std::rc::Rc;

use derive_more::{Display, From};
use medea_macro::dispatchable;

use crate::{
    media::MediaStream,
    signaling::{IceCandidate, ParticipantId},
};

#[cfg(test)]
#[doc(inline)]
pub use self::transport::{MockPeerTransport, MockTransportFactory};
#[doc(inline)]
pub use self::{
    repo::PeerRepository,
    session::{NegotiationState, PeerSession},
    transport::{
        OutboundTrackHandle, PeerConnectionState, PeerTransport, SdpType,
        SignalingState, TransportError, TransportEvent, TransportFactory,
    },
};

/// Errors that may occur in [`PeerSession`]s handling.
#[derive(Clone, Debug, Display, Eq, From, PartialEq)]
pub enum PeerError {
    /// There is no [`PeerSession`] with the provided [`ParticipantId`].
    #[display(fmt = "No session with participant `{}`", _0)]
    #[from(ignore)]
    UnknownSession(ParticipantId),

    /// [`PeerSession`] with the provided [`ParticipantId`] exists already.
    #[display(fmt = "Session with participant `{}` exists already", _0)]
    #[from(ignore)]
    DuplicateSession(ParticipantId),

    /// Remote [`IceCandidate`] was rejected by the [`PeerTransport`].
    #[display(fmt = "ICE candidate rejected: {}", _0)]
    #[from(ignore)]
    IceCandidateRejected(TransportError),

    /// [`PeerTransport`] operation failed.
    #[display(fmt = "{}", _0)]
    Transport(TransportError),
}

/// Events emitted from [`PeerTransport`]s, tagged with the remote
/// participant they're related to.
#[dispatchable(self: &Self, async_trait(?Send))]
#[derive(Clone, Debug)]
pub enum PeerEvent {
    /// [`PeerTransport`] needs a new offer to be made.
    NegotiationNeeded {
        /// Remote participant of the [`PeerTransport`].
        peer_id: ParticipantId,
    },

    /// [`PeerTransport`] discovered new local [`IceCandidate`].
    IceCandidateDiscovered {
        /// Remote participant of the [`PeerTransport`].
        peer_id: ParticipantId,

        /// Discovered [`IceCandidate`].
        candidate: IceCandidate,
    },

    /// [`PeerTransport`] received new [`MediaStream`] from the remote
    /// participant.
    NewRemoteStream {
        /// Remote participant of the [`PeerTransport`].
        peer_id: ParticipantId,

        /// Received [`MediaStream`].
        stream: Rc<MediaStream>,
    },

    /// [`PeerTransport`]'s [`PeerConnectionState`] changed.
    ConnectionStateChanged {
        /// Remote participant of the [`PeerTransport`].
        peer_id: ParticipantId,

        /// New [`PeerConnectionState`].
        state: PeerConnectionState,
    },

    /// [`PeerTransport`]'s [`SignalingState`] changed.
    SignalingStateChanged {
        /// Remote participant of the [`PeerTransport`].
        peer_id: ParticipantId,

        /// New [`SignalingState`].
        state: SignalingState,
    },
}

impl PeerEvent {
    /// Tags the provided [`TransportEvent`] with the remote participant's
    /// [`ParticipantId`].
    #[must_use]
    pub fn new(peer_id: ParticipantId, event: TransportEvent) -> Self {
        match event {
            TransportEvent::NegotiationNeeded => {
                Self::NegotiationNeeded { peer_id }
            }
            TransportEvent::IceCandidateDiscovered(candidate) => {
                Self::IceCandidateDiscovered { peer_id, candidate }
            }
            TransportEvent::NewRemoteStream(stream) => {
                Self::NewRemoteStream { peer_id, stream }
            }
            TransportEvent::ConnectionStateChanged(state) => {
                Self::ConnectionStateChanged { peer_id, state }
            }
            TransportEvent::SignalingStateChanged(state) => {
                Self::SignalingStateChanged { peer_id, state }
            }
        }
    }

    /// Returns [`ParticipantId`] this [`PeerEvent`] is related to.
    #[must_use]
    pub fn peer_id(&self) -> &ParticipantId {
        match self {
            Self::NegotiationNeeded { peer_id }
            | Self::IceCandidateDiscovered { peer_id, .. }
            | Self::NewRemoteStream { peer_id, .. }
            | Self::ConnectionStateChanged { peer_id, .. }
            | Self::SignalingStateChanged { peer_id, .. } => peer_id,
        }
    }
}
