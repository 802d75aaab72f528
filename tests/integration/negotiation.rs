//! Perfect negotiation between participants.

use medea_mesh::{
    peer::{NegotiationState, SdpType, SignalingState, TransportEvent},
    signaling::IceCandidate,
    SignalingMessage,
};
use tokio::task::LocalSet;

use crate::{
    mock::{answer, candidate, id, offer, Call, Participant},
    settle,
};

#[tokio::test]
async fn offer_from_unknown_peer_creates_polite_session_and_answers() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.invite(id("bob")).await.unwrap();
            alice.signaling.take_sent();

            alice.signaling.inject(offer("carol", "alice", "carol's offer"));
            settle().await;

            assert!(!alice.orchestrator.session(&id("bob")).unwrap().is_polite());
            let carol = alice.orchestrator.session(&id("carol")).unwrap();
            assert!(carol.is_polite());
            assert_eq!(carol.negotiation_state(), NegotiationState::Idle);
            assert_eq!(
                alice.signaling.take_sent(),
                vec![answer("alice", "carol", "answer to carol")],
            );
            assert_eq!(
                alice.transport("carol").signaling_state_now(),
                SignalingState::Stable,
            );
        })
        .await;
}

#[tokio::test]
async fn answer_completes_offer() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.invite(id("bob")).await.unwrap();
            let session = alice.orchestrator.session(&id("bob")).unwrap();
            assert_eq!(
                session.negotiation_state(),
                NegotiationState::AwaitingAnswer,
            );

            alice.signaling.inject(answer("bob", "alice", "bob's answer"));
            settle().await;

            assert_eq!(session.negotiation_state(), NegotiationState::Idle);
            assert_eq!(
                alice.transport("bob").calls().last(),
                Some(&Call::SetRemote(SdpType::Answer(
                    "bob's answer".to_owned()
                ))),
            );
        })
        .await;
}

#[tokio::test]
async fn messages_for_unknown_sessions_create_nothing() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");

            alice.signaling.inject(candidate("bob", "alice", "candidate:1"));
            alice.signaling.inject(answer("bob", "alice", "bob's answer"));
            settle().await;

            assert!(alice.orchestrator.session_ids().is_empty());
            assert!(alice.signaling.take_sent().is_empty());
        })
        .await;
}

#[tokio::test]
async fn misaddressed_messages_are_dropped() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");

            alice.signaling.inject(offer("bob", "carol", "not for alice"));
            settle().await;

            assert!(alice.orchestrator.session_ids().is_empty());
            assert!(alice.signaling.take_sent().is_empty());
        })
        .await;
}

#[tokio::test]
async fn local_candidates_are_forwarded_except_end_marker() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.invite(id("bob")).await.unwrap();
            alice.signaling.take_sent();
            let transport = alice.transport("bob");

            for c in &["candidate:1 1 udp 1 10.0.0.1 5000 typ host", ""] {
                transport.emit(TransportEvent::IceCandidateDiscovered(
                    IceCandidate {
                        candidate: (*c).to_owned(),
                        sdp_m_line_index: Some(0),
                        sdp_mid: Some("0".to_owned()),
                    },
                ));
            }
            settle().await;

            assert_eq!(
                alice.signaling.take_sent(),
                vec![candidate(
                    "alice",
                    "bob",
                    "candidate:1 1 udp 1 10.0.0.1 5000 typ host"
                )],
            );
        })
        .await;
}

#[tokio::test]
async fn remote_candidates_are_added() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.invite(id("bob")).await.unwrap();

            alice.signaling.inject(candidate("bob", "alice", "candidate:7"));
            settle().await;

            assert_eq!(
                alice
                    .transport("bob")
                    .count(|c| *c == Call::AddIceCandidate(
                        "candidate:7".to_owned()
                    )),
                1,
            );
        })
        .await;
}

#[tokio::test]
async fn impolite_side_ignores_colliding_offer() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.invite(id("bob")).await.unwrap();
            alice.signaling.take_sent();
            let transport = alice.transport("bob");
            transport.reject_candidates.set(true);

            alice.signaling.inject(offer("bob", "alice", "bob's offer"));
            alice.signaling.inject(candidate("bob", "alice", "candidate:9"));
            settle().await;

            let session = alice.orchestrator.session(&id("bob")).unwrap();
            assert!(session.is_ignoring_offer());
            assert_eq!(session.negotiation_state(), NegotiationState::Ignoring);
            assert!(alice.signaling.take_sent().is_empty());
            assert_eq!(
                transport.count(|c| matches!(c, Call::SetRemote(_))),
                0,
            );
            // Failed candidate of the ignored offer is tolerated.
            assert_eq!(alice.orchestrator.session_ids(), vec![id("bob")]);

            alice.signaling.inject(answer("bob", "alice", "bob's answer"));
            settle().await;
            assert_eq!(session.negotiation_state(), NegotiationState::Idle);
            assert_eq!(
                transport.signaling_state_now(),
                SignalingState::Stable,
            );
        })
        .await;
}

#[tokio::test]
async fn offer_after_ignored_collision_awaits_answer() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.invite(id("bob")).await.unwrap();
            settle().await;
            alice.signaling.take_sent();
            let transport = alice.transport("bob");

            alice.signaling.inject(offer("bob", "alice", "bob's offer"));
            alice.signaling.inject(answer("bob", "alice", "bob's answer"));
            settle().await;
            let session = alice.orchestrator.session(&id("bob")).unwrap();
            assert!(session.is_ignoring_offer());
            assert_eq!(session.negotiation_state(), NegotiationState::Idle);

            transport.emit(TransportEvent::NegotiationNeeded);
            settle().await;

            assert_eq!(
                alice.signaling.take_sent(),
                vec![offer("alice", "bob", "offer to bob #2")],
            );
            assert_eq!(
                session.negotiation_state(),
                NegotiationState::AwaitingAnswer,
            );
        })
        .await;
}

#[tokio::test]
async fn polite_side_yields_own_offer() {
    LocalSet::new()
        .run_until(async {
            let bob = Participant::spawn("bob");
            bob.signaling.inject(offer("alice", "bob", "first offer"));
            settle().await;
            bob.signaling.take_sent();
            let transport = bob.transport("alice");

            transport.emit(TransportEvent::NegotiationNeeded);
            settle().await;
            assert_eq!(
                bob.signaling.take_sent(),
                vec![offer("bob", "alice", "offer to alice #1")],
            );

            bob.signaling.inject(offer("alice", "bob", "second offer"));
            settle().await;

            let session = bob.orchestrator.session(&id("alice")).unwrap();
            assert!(!session.is_ignoring_offer());
            assert_eq!(session.negotiation_state(), NegotiationState::Idle);
            assert_eq!(
                bob.signaling.take_sent(),
                vec![answer("bob", "alice", "answer to alice")],
            );
            assert_eq!(
                transport.signaling_state_now(),
                SignalingState::Stable,
            );
        })
        .await;
}

#[tokio::test]
async fn glare_resolves_to_impolite_offer() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            let bob = Participant::spawn("bob");

            alice.orchestrator.invite(id("bob")).await.unwrap();
            alice.signaling.deliver_to(&bob.signaling);
            settle().await;
            bob.signaling.deliver_to(&alice.signaling);
            settle().await;
            let at_alice = alice.orchestrator.session(&id("bob")).unwrap();
            let at_bob = bob.orchestrator.session(&id("alice")).unwrap();
            assert_eq!(at_alice.negotiation_state(), NegotiationState::Idle);

            // Both sides renegotiate at once.
            alice.transport("bob").emit(TransportEvent::NegotiationNeeded);
            bob.transport("alice").emit(TransportEvent::NegotiationNeeded);
            settle().await;
            let from_alice = alice.signaling.take_sent();
            let from_bob = bob.signaling.take_sent();
            assert!(matches!(
                from_alice.as_slice(),
                [SignalingMessage::VideoOffer { .. }]
            ));
            assert!(matches!(
                from_bob.as_slice(),
                [SignalingMessage::VideoOffer { .. }]
            ));

            for msg in from_alice {
                bob.signaling.inject(msg);
            }
            for msg in from_bob {
                alice.signaling.inject(msg);
            }
            settle().await;

            assert!(at_alice.is_ignoring_offer());
            assert!(alice.signaling.take_sent().is_empty());
            assert!(!at_bob.is_ignoring_offer());
            assert_eq!(
                bob.signaling.take_sent(),
                vec![answer("bob", "alice", "answer to alice")],
            );
            assert_eq!(
                bob.transport("alice").calls().iter().rev().find_map(|c| {
                    match c {
                        Call::SetRemote(SdpType::Offer(sdp)) => Some(sdp.clone()),
                        _ => None,
                    }
                }),
                Some("offer to bob #2".to_owned()),
            );

            bob.signaling.deliver_to(&alice.signaling);
            settle().await;
            assert_eq!(
                alice.transport("bob").signaling_state_now(),
                SignalingState::Stable,
            );
            assert_eq!(
                bob.transport("alice").signaling_state_now(),
                SignalingState::Stable,
            );
        })
        .await;
}
