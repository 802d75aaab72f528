//! Perfect negotiation of [`PeerSession`]s.
//!
//! The inviting side of a session is impolite and the invited one is polite.
//! When offers collide the impolite side ignores the remote offer, while the
//! polite side drops its own one and answers.

use std::rc::Rc;

use async_trait::async_trait;
use tracerr::Traced;

use crate::{
    log::prelude::*,
    media::MediaStream,
    peer::{
        PeerConnectionState, PeerError, PeerEventHandler, PeerSession,
        SdpType, SignalingState,
    },
    signaling::{
        IceCandidate, ParticipantId, SignalingMessage,
        SignalingMessageHandler,
    },
};

use super::{InnerOrchestrator, Notification, OrchestratorError};

impl InnerOrchestrator {
    /// Indicates whether a [`SignalingMessage`] from `sender` to `target` is
    /// meant for the local participant.
    fn is_addressed_to_self(
        &self,
        sender: &ParticipantId,
        target: &ParticipantId,
    ) -> bool {
        let addressed = self.self_id.borrow().as_ref() == Some(target);
        if !addressed {
            warn!(
                "Dropping message from {} addressed to {} instead of {:?}",
                sender,
                target,
                self.self_id.borrow()
            );
        }
        addressed
    }

    /// Makes an offer to the remote participant of the provided
    /// [`PeerSession`].
    pub(super) async fn negotiate(
        &self,
        peer: &PeerSession,
    ) -> Result<(), Traced<OrchestratorError>> {
        let self_id = self.self_id().map_err(tracerr::wrap!())?;
        let _negotiation = peer.lock_negotiation().await;

        peer.begin_offer();
        let res: Result<(), Traced<OrchestratorError>> = async {
            let transport = peer.transport();
            let sdp = transport
                .create_offer()
                .await
                .map_err(tracerr::from_and_wrap!())?;
            transport
                .set_local_description(SdpType::Offer(sdp.clone()))
                .await
                .map_err(tracerr::from_and_wrap!())?;
            self.send(SignalingMessage::VideoOffer {
                sender: self_id,
                target: peer.id().clone(),
                sdp,
            })
        }
        .await;
        peer.finish_offer(res.is_ok());
        debug!("Offer cycle with {} finished: {:?}", peer.id(), peer);

        res
    }
}

/// Inbound [`SignalingMessage`]s handling.
#[async_trait(?Send)]
impl SignalingMessageHandler for InnerOrchestrator {
    type Output = Result<(), Traced<OrchestratorError>>;

    /// Answers the offer unless it collides with the local one on the
    /// impolite side.
    async fn on_video_offer(
        &self,
        sender: ParticipantId,
        target: ParticipantId,
        sdp: String,
    ) -> Self::Output {
        if !self.is_addressed_to_self(&sender, &target) {
            return Ok(());
        }
        let peer = self
            .peers
            .borrow_mut()
            .get_or_create(&sender)
            .map_err(tracerr::map_from_and_wrap!())?;
        let _negotiation = peer.lock_negotiation().await;

        if peer.decide_on_offer() {
            debug!("Ignoring offer from {} colliding with own one", sender);
            return Ok(());
        }

        let transport = Rc::clone(peer.transport());
        transport
            .set_remote_description(SdpType::Offer(sdp))
            .await
            .map_err(tracerr::from_and_wrap!())?;
        self.attach_local_stream(&peer)
            .await
            .map_err(tracerr::wrap!())?;
        let answer = transport
            .create_answer()
            .await
            .map_err(tracerr::from_and_wrap!())?;
        transport
            .set_local_description(SdpType::Answer(answer.clone()))
            .await
            .map_err(tracerr::from_and_wrap!())?;
        peer.offer_answered();

        self.send(SignalingMessage::VideoAnswer {
            sender: target,
            target: sender,
            sdp: answer,
        })
        .map_err(tracerr::wrap!())
    }

    /// Applies the answer to the local offer.
    async fn on_video_answer(
        &self,
        sender: ParticipantId,
        target: ParticipantId,
        sdp: String,
    ) -> Self::Output {
        if !self.is_addressed_to_self(&sender, &target) {
            return Ok(());
        }
        let peer = self
            .peers
            .borrow()
            .get_existing(&sender)
            .map_err(tracerr::map_from_and_wrap!())?;
        let _negotiation = peer.lock_negotiation().await;

        peer.transport()
            .set_remote_description(SdpType::Answer(sdp))
            .await
            .map_err(tracerr::from_and_wrap!())?;
        peer.answer_applied();
        Ok(())
    }

    /// Adds the remote [`IceCandidate`], tolerating its failure while the
    /// session ignores offers.
    async fn on_new_ice_candidate(
        &self,
        sender: ParticipantId,
        target: ParticipantId,
        candidate: IceCandidate,
    ) -> Self::Output {
        if !self.is_addressed_to_self(&sender, &target) {
            return Ok(());
        }
        let peer = self
            .peers
            .borrow()
            .get_existing(&sender)
            .map_err(tracerr::map_from_and_wrap!())?;

        match peer.transport().add_ice_candidate(candidate).await {
            Ok(()) => Ok(()),
            Err(e) if peer.is_ignoring_offer() => {
                debug!("Suppressed ICE candidate error of {}: {}", sender, e);
                Ok(())
            }
            Err(e) => Err(tracerr::new!(OrchestratorError::from(
                PeerError::IceCandidateRejected(e)
            ))),
        }
    }
}

/// [`PeerSession`]s' transport events handling.
#[async_trait(?Send)]
impl PeerEventHandler for InnerOrchestrator {
    type Output = Result<(), Traced<OrchestratorError>>;

    /// Makes a new offer, unless the session is gone already.
    async fn on_negotiation_needed(
        &self,
        peer_id: ParticipantId,
    ) -> Self::Output {
        let peer = self.peers.borrow().get(&peer_id);
        match peer {
            Some(peer) => self.negotiate(&peer).await,
            None => {
                debug!("Negotiation needed for hung up {}", peer_id);
                Ok(())
            }
        }
    }

    /// Forwards the local [`IceCandidate`] to the remote participant.
    async fn on_ice_candidate_discovered(
        &self,
        peer_id: ParticipantId,
        candidate: IceCandidate,
    ) -> Self::Output {
        if candidate.is_end_of_candidates()
            || self.peers.borrow().get(&peer_id).is_none()
        {
            return Ok(());
        }
        let self_id = self.self_id().map_err(tracerr::wrap!())?;
        self.send(SignalingMessage::NewIceCandidate {
            sender: self_id,
            target: peer_id,
            candidate,
        })
        .map_err(tracerr::wrap!())
    }

    /// Stores the remote [`MediaStream`] and shows it if there is a
    /// [`Viewer`] for it.
    ///
    /// [`Viewer`]: crate::viewer::Viewer
    async fn on_new_remote_stream(
        &self,
        peer_id: ParticipantId,
        stream: Rc<MediaStream>,
    ) -> Self::Output {
        let peer = self.peers.borrow().get(&peer_id);
        let peer = match peer {
            Some(peer) => peer,
            None => {
                debug!("Dropping MediaStream of hung up {}", peer_id);
                return Ok(());
            }
        };
        peer.set_remote_stream(Rc::clone(&stream));

        let viewer = self.viewers.borrow().remote(&peer_id);
        if let Some(viewer) = viewer {
            viewer.show(&stream);
        }
        self.notify(Notification::RemoteStreamAdded(peer_id));
        Ok(())
    }

    /// Hangs up the session once its connection is lost.
    async fn on_connection_state_changed(
        &self,
        peer_id: ParticipantId,
        state: PeerConnectionState,
    ) -> Self::Output {
        debug!("Connection with {} is {}", peer_id, state);
        if state.is_terminal() {
            self.hang_up(&peer_id);
        }
        Ok(())
    }

    /// Hangs up the session once its signalling is closed.
    async fn on_signaling_state_changed(
        &self,
        peer_id: ParticipantId,
        state: SignalingState,
    ) -> Self::Output {
        if state == SignalingState::Closed {
            self.hang_up(&peer_id);
        }
        Ok(())
    }
}
