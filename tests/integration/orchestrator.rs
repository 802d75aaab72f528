//! Control surface of the `Orchestrator`.

use std::rc::Rc;

use futures::{FutureExt as _, StreamExt as _};
use medea_mesh::{
    media::{MediaDeviceInfo, MediaDeviceKind, MediaError, MediaManagerError},
    peer::{PeerConnectionState, PeerError, TransportEvent},
    Notification, OrchestratorError,
};
use tokio::task::LocalSet;

use crate::{
    mock::{id, stream_of, Call, FakeTrack, FakeViewer, Participant},
    settle,
};

#[tokio::test]
async fn start_without_id_fails_without_side_effects() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            let orchestrator = medea_mesh::Orchestrator::new(
                &medea_mesh::conf::Media::default(),
                Rc::clone(&alice.devices) as _,
                Rc::clone(&alice.signaling) as _,
                Rc::clone(&alice.transports) as _,
            );

            let err = orchestrator.start().await.unwrap_err().into_inner();

            assert_eq!(err, OrchestratorError::NotStarted);
            assert!(!orchestrator.is_started());
            assert_eq!(alice.devices.requests(), 0);
            assert!(orchestrator.local_stream().is_none());
            assert!(orchestrator.session_ids().is_empty());
        })
        .await;
}

#[tokio::test]
async fn start_is_idempotent_and_lists_devices() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            let mut notifications = alice.orchestrator.subscribe();

            alice.orchestrator.start().await.unwrap();
            alice.orchestrator.start().await.unwrap();

            assert!(alice.orchestrator.is_started());
            assert_eq!(alice.devices.requests(), 1);
            let kinds: Vec<_> = alice
                .orchestrator
                .media_devices()
                .into_iter()
                .map(|d| d.kind)
                .collect();
            assert_eq!(
                kinds,
                vec![
                    MediaDeviceKind::VideoInput,
                    MediaDeviceKind::VideoInput,
                    MediaDeviceKind::AudioInput,
                ],
            );
            assert_eq!(
                notifications.next().await,
                Some(Notification::MediaDevicesEnumerated(
                    alice.orchestrator.media_devices()
                )),
            );
            assert!(notifications.next().now_or_never().is_none());
        })
        .await;
}

#[tokio::test]
async fn media_failure_leaves_orchestrator_stopped() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.devices.deny.set(true);

            let err = alice.orchestrator.start().await.unwrap_err();

            assert_eq!(
                err.into_inner(),
                OrchestratorError::Media(
                    MediaManagerError::MediaAcquisitionFailed(
                        MediaError::PermissionDenied
                    )
                ),
            );
            assert!(!alice.orchestrator.is_started());
        })
        .await;
}

#[tokio::test]
async fn stop_is_idempotent() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.start().await.unwrap();
            alice.orchestrator.invite(id("bob")).await.unwrap();
            settle().await;

            alice.orchestrator.stop();
            let after_first = alice.orchestrator.session_ids();
            alice.orchestrator.stop();

            assert!(after_first.is_empty());
            assert!(alice.orchestrator.session_ids().is_empty());
            assert!(!alice.orchestrator.is_started());
            assert!(alice.orchestrator.local_stream().is_none());
            assert!(alice.devices.live_tracks().is_empty());
            assert_eq!(
                alice.transport("bob").count(|c| *c == Call::Close),
                1,
            );
        })
        .await;
}

#[tokio::test]
async fn invite_attaches_local_video_and_offers() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.start().await.unwrap();

            alice.orchestrator.invite(id("bob")).await.unwrap();
            settle().await;

            let session = alice.orchestrator.session(&id("bob")).unwrap();
            assert!(!session.is_polite());
            let transport = alice.transport("bob");
            assert_eq!(
                transport.count(|c| matches!(c, Call::AddTrack(_))),
                1,
            );
            assert_eq!(
                alice.signaling.take_sent(),
                vec![crate::mock::offer("alice", "bob", "offer to bob #1")],
            );
        })
        .await;
}

#[tokio::test]
async fn invite_without_media_negotiates_right_away() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");

            alice.orchestrator.invite(id("bob")).await.unwrap();

            let transport = alice.transport("bob");
            assert_eq!(
                transport.count(|c| matches!(c, Call::AddTrack(_))),
                0,
            );
            assert_eq!(
                alice.signaling.take_sent(),
                vec![crate::mock::offer("alice", "bob", "offer to bob #1")],
            );
        })
        .await;
}

#[tokio::test]
async fn invite_of_existing_session_fails() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.invite(id("bob")).await.unwrap();

            let err = alice
                .orchestrator
                .invite(id("bob"))
                .await
                .unwrap_err()
                .into_inner();

            assert_eq!(
                err,
                OrchestratorError::Peer(PeerError::DuplicateSession(id(
                    "bob"
                ))),
            );
            assert_eq!(alice.orchestrator.session_ids(), vec![id("bob")]);
        })
        .await;
}

#[tokio::test]
async fn registry_tracks_active_sessions() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            for peer in &["bob", "carol", "dave"] {
                alice.orchestrator.invite(id(peer)).await.unwrap();
            }
            alice.orchestrator.hang_up(&id("carol"));
            alice.orchestrator.hang_up(&id("carol"));
            alice.orchestrator.hang_up(&id("nobody"));

            assert_eq!(
                alice.orchestrator.session_ids(),
                vec![id("bob"), id("dave")],
            );
            assert!(alice.transport("carol").is_closed());
            assert!(!alice.transport("bob").is_closed());
        })
        .await;
}

#[tokio::test]
async fn hang_up_notifies_once_before_closing_transport() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            let viewer = Rc::new(FakeViewer::default());
            alice.orchestrator.invite(id("bob")).await.unwrap();
            alice
                .orchestrator
                .bind_remote_viewer(id("bob"), Rc::clone(&viewer) as _);
            let notifications =
                Rc::new(std::cell::RefCell::new(alice.orchestrator.subscribe()));

            let remote = FakeTrack::new("bob-cam", None);
            let transport = alice.transport("bob");
            transport.emit(TransportEvent::NewRemoteStream(stream_of(&remote)));
            settle().await;
            assert!(viewer.showing().is_some());

            let seen_on_close = Rc::new(std::cell::RefCell::new(Vec::new()));
            {
                let notifications = Rc::clone(&notifications);
                let seen = Rc::clone(&seen_on_close);
                transport.on_close(move || {
                    let mut rx = notifications.borrow_mut();
                    while let Some(Some(n)) = rx.next().now_or_never() {
                        seen.borrow_mut().push(n);
                    }
                });
            }

            alice.orchestrator.hang_up(&id("bob"));
            alice.orchestrator.hang_up(&id("bob"));

            assert_eq!(
                *seen_on_close.borrow(),
                vec![
                    Notification::RemoteStreamAdded(id("bob")),
                    Notification::RemoteStreamRemoved(id("bob")),
                ],
            );
            assert!(notifications.borrow_mut().next().now_or_never().is_none());
            assert!(remote.is_stopped());
            assert!(viewer.showing().is_none());
            assert!(alice.orchestrator.session(&id("bob")).is_none());
        })
        .await;
}

#[tokio::test]
async fn change_camera_releases_previous_stream() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.start().await.unwrap();
            alice.orchestrator.invite(id("bob")).await.unwrap();
            settle().await;

            alice.orchestrator.change_camera("usb".to_owned()).await.unwrap();
            let once = alice.orchestrator.local_stream().unwrap();
            alice.orchestrator.change_camera("usb".to_owned()).await.unwrap();
            let twice = alice.orchestrator.local_stream().unwrap();

            assert!(once.is_ended());
            assert!(!twice.is_ended());
            let live = alice.devices.live_tracks();
            assert_eq!(live.len(), 1);
            assert_eq!(
                twice.video_track().unwrap().device_id(),
                once.video_track().unwrap().device_id(),
            );

            let transport = alice.transport("bob");
            let session = alice.orchestrator.session(&id("bob")).unwrap();
            let handle = session.outbound_track().unwrap();
            assert_eq!(
                transport.calls().last(),
                Some(&Call::ReplaceTrack(handle, "usb#2".to_owned())),
            );
            assert_eq!(
                transport.count(|c| matches!(c, Call::AddTrack(_))),
                1,
            );
        })
        .await;
}

#[tokio::test]
async fn camera_chosen_before_start_is_used_on_start() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");

            alice.orchestrator.change_camera("usb".to_owned()).await.unwrap();
            assert_eq!(alice.devices.requests(), 0);
            alice.orchestrator.start().await.unwrap();

            let stream = alice.orchestrator.local_stream().unwrap();
            assert_eq!(
                stream.video_track().unwrap().device_id().as_deref(),
                Some("usb"),
            );
        })
        .await;
}

#[tokio::test]
async fn set_video_input_rejects_non_video_devices() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.start().await.unwrap();

            let err = alice
                .orchestrator
                .set_video_input(MediaDeviceInfo {
                    device_id: "mic".to_owned(),
                    kind: MediaDeviceKind::AudioInput,
                    label: "Mic".to_owned(),
                })
                .await
                .unwrap_err()
                .into_inner();
            assert_eq!(
                err,
                OrchestratorError::InvalidDeviceKind(
                    MediaDeviceKind::AudioInput
                ),
            );
            assert_eq!(alice.devices.requests(), 1);

            let usb = alice
                .orchestrator
                .media_devices()
                .into_iter()
                .find(|d| d.device_id == "usb")
                .unwrap();
            alice.orchestrator.set_video_input(usb).await.unwrap();
            assert_eq!(alice.devices.requests(), 2);
        })
        .await;
}

#[tokio::test]
async fn viewers_show_streams_whenever_bound() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            let local = Rc::new(FakeViewer::default());
            let early = Rc::new(FakeViewer::default());
            let late = Rc::new(FakeViewer::default());

            alice.orchestrator.bind_local_viewer(Rc::clone(&local) as _);
            assert!(local.showing().is_none());
            alice.orchestrator.start().await.unwrap();
            assert!(Rc::ptr_eq(
                &local.showing().unwrap(),
                &alice.orchestrator.local_stream().unwrap(),
            ));

            alice.orchestrator.invite(id("bob")).await.unwrap();
            alice
                .orchestrator
                .bind_remote_viewer(id("bob"), Rc::clone(&early) as _);
            let remote = stream_of(&FakeTrack::new("bob-cam", None));
            alice
                .transport("bob")
                .emit(TransportEvent::NewRemoteStream(Rc::clone(&remote)));
            settle().await;
            assert!(Rc::ptr_eq(&early.showing().unwrap(), &remote));

            alice
                .orchestrator
                .bind_remote_viewer(id("bob"), Rc::clone(&late) as _);
            assert!(Rc::ptr_eq(&late.showing().unwrap(), &remote));

            alice.orchestrator.unbind_remote_viewer(&id("bob"));
            assert!(late.showing().is_none());
        })
        .await;
}

#[tokio::test]
async fn hang_up_of_unknown_peer_keeps_early_viewer() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            let viewer = Rc::new(FakeViewer::default());
            alice
                .orchestrator
                .bind_remote_viewer(id("bob"), Rc::clone(&viewer) as _);

            alice.orchestrator.hang_up(&id("bob"));
            assert_eq!(viewer.cleared.get(), 0);

            alice.orchestrator.invite(id("bob")).await.unwrap();
            let remote = stream_of(&FakeTrack::new("bob-cam", None));
            alice
                .transport("bob")
                .emit(TransportEvent::NewRemoteStream(Rc::clone(&remote)));
            settle().await;
            assert!(Rc::ptr_eq(&viewer.showing().unwrap(), &remote));
        })
        .await;
}

#[tokio::test]
async fn lost_connection_hangs_up_session() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.invite(id("bob")).await.unwrap();
            alice.orchestrator.invite(id("carol")).await.unwrap();

            alice.transport("bob").emit(TransportEvent::ConnectionStateChanged(
                PeerConnectionState::Connected,
            ));
            settle().await;
            assert_eq!(alice.orchestrator.session_ids().len(), 2);

            alice.transport("bob").emit(TransportEvent::ConnectionStateChanged(
                PeerConnectionState::Failed,
            ));
            alice.transport("carol").emit(
                TransportEvent::SignalingStateChanged(
                    medea_mesh::peer::SignalingState::Closed,
                ),
            );
            settle().await;

            assert!(alice.orchestrator.session_ids().is_empty());
            assert!(alice.transport("bob").is_closed());
            assert!(alice.transport("carol").is_closed());
        })
        .await;
}

#[tokio::test]
async fn closed_signaling_hangs_up_everything() {
    LocalSet::new()
        .run_until(async {
            let alice = Participant::spawn("alice");
            alice.orchestrator.invite(id("bob")).await.unwrap();
            alice.orchestrator.invite(id("carol")).await.unwrap();
            settle().await;

            alice.signaling.close();
            settle().await;

            assert!(alice.orchestrator.session_ids().is_empty());
            assert!(alice.transport("bob").is_closed());
            assert!(alice.transport("carol").is_closed());
        })
        .await;
}
