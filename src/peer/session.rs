//! Negotiation state of a connection with a single remote participant.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use futures::lock::{Mutex, MutexGuard};

use crate::{media::MediaStream, signaling::ParticipantId};

use super::{OutboundTrackHandle, PeerTransport, SignalingState};

/// Stage of the offer/answer exchange of a [`PeerSession`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NegotiationState {
    /// No local offer is being made or waits for an answer.
    Idle,

    /// Local offer is being created and sent.
    Offering,

    /// Local offer has been sent and waits for an answer.
    AwaitingAnswer,

    /// Remote offer collided with the local one and has been ignored.
    Ignoring,
}

/// Connection with a single remote participant and its perfect negotiation
/// state.
pub struct PeerSession {
    /// [`ParticipantId`] of the remote participant.
    id: ParticipantId,

    /// Whether this side yields when offers collide.
    polite: bool,

    /// Underlying [`PeerTransport`].
    transport: Rc<dyn PeerTransport>,

    /// Current [`NegotiationState`].
    state: Cell<NegotiationState>,

    /// Whether the last remote offer has been ignored because of a collision.
    ///
    /// Stays set until the next remote offer is accepted, so remote ICE
    /// candidate failures are suppressed all that time.
    ignore_offer: Cell<bool>,

    /// Handle of the local track attached to the [`PeerTransport`].
    outbound_track: Cell<Option<OutboundTrackHandle>>,

    /// [`MediaStream`] received from the remote participant.
    remote_stream: RefCell<Option<Rc<MediaStream>>>,

    /// Serializes offer/answer cycles.
    negotiation: Mutex<()>,
}

impl PeerSession {
    /// Creates new [`PeerSession`] in [`NegotiationState::Idle`].
    #[must_use]
    pub fn new(
        id: ParticipantId,
        polite: bool,
        transport: Rc<dyn PeerTransport>,
    ) -> Self {
        Self {
            id,
            polite,
            transport,
            state: Cell::new(NegotiationState::Idle),
            ignore_offer: Cell::new(false),
            outbound_track: Cell::new(None),
            remote_stream: RefCell::new(None),
            negotiation: Mutex::new(()),
        }
    }

    /// Returns [`ParticipantId`] of the remote participant.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Indicates whether this side yields when offers collide.
    #[inline]
    #[must_use]
    pub fn is_polite(&self) -> bool {
        self.polite
    }

    /// Returns the underlying [`PeerTransport`].
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &Rc<dyn PeerTransport> {
        &self.transport
    }

    /// Returns current [`NegotiationState`].
    #[inline]
    #[must_use]
    pub fn negotiation_state(&self) -> NegotiationState {
        self.state.get()
    }

    /// Indicates whether a local offer is being created and sent right now.
    #[inline]
    #[must_use]
    pub fn is_making_offer(&self) -> bool {
        self.state.get() == NegotiationState::Offering
    }

    /// Indicates whether the last remote offer has been ignored.
    #[inline]
    #[must_use]
    pub fn is_ignoring_offer(&self) -> bool {
        self.ignore_offer.get()
    }

    /// Waits until no other offer/answer cycle runs on this [`PeerSession`]
    /// and holds it off until the returned guard is dropped.
    #[inline]
    pub async fn lock_negotiation(&self) -> MutexGuard<'_, ()> {
        self.negotiation.lock().await
    }

    /// Marks a local offer as being made.
    pub fn begin_offer(&self) {
        self.state.set(NegotiationState::Offering);
    }

    /// Marks a local offer as finished, either sent or failed.
    pub fn finish_offer(&self, sent: bool) {
        self.state.set(if sent {
            NegotiationState::AwaitingAnswer
        } else {
            NegotiationState::Idle
        });
    }

    /// Decides whether the provided remote offer must be ignored, remembering
    /// the decision.
    ///
    /// Offers collide if a local offer is being made or the
    /// [`PeerTransport`] is not [`SignalingState::Stable`]. Only the
    /// impolite side ignores colliding offers.
    pub fn decide_on_offer(&self) -> bool {
        let collision = self.is_making_offer()
            || self.transport.signaling_state() != SignalingState::Stable;
        let ignore = !self.polite && collision;
        self.ignore_offer.set(ignore);
        if ignore && !self.is_making_offer() {
            self.state.set(NegotiationState::Ignoring);
        }
        ignore
    }

    /// Marks the remote offer as answered.
    pub fn offer_answered(&self) {
        self.state.set(NegotiationState::Idle);
    }

    /// Marks the remote answer to the local offer as applied.
    pub fn answer_applied(&self) {
        if self.state.get() != NegotiationState::Offering {
            self.state.set(NegotiationState::Idle);
        }
    }

    /// Returns handle of the local track attached to the [`PeerTransport`].
    #[inline]
    #[must_use]
    pub fn outbound_track(&self) -> Option<OutboundTrackHandle> {
        self.outbound_track.get()
    }

    /// Remembers handle of the local track attached to the [`PeerTransport`].
    #[inline]
    pub fn set_outbound_track(&self, handle: OutboundTrackHandle) {
        self.outbound_track.set(Some(handle));
    }

    /// Returns [`MediaStream`] received from the remote participant.
    #[inline]
    #[must_use]
    pub fn remote_stream(&self) -> Option<Rc<MediaStream>> {
        self.remote_stream.borrow().clone()
    }

    /// Stores [`MediaStream`] received from the remote participant.
    #[inline]
    pub fn set_remote_stream(&self, stream: Rc<MediaStream>) {
        self.remote_stream.replace(Some(stream));
    }

    /// Takes [`MediaStream`] received from the remote participant out of
    /// this [`PeerSession`].
    #[inline]
    pub fn take_remote_stream(&self) -> Option<Rc<MediaStream>> {
        self.remote_stream.borrow_mut().take()
    }
}

impl fmt::Debug for PeerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerSession")
            .field("id", &self.id)
            .field("polite", &self.polite)
            .field("state", &self.state.get())
            .field("ignore_offer", &self.ignore_offer.get())
            .field("outbound_track", &self.outbound_track.get())
            .finish()
    }
}
