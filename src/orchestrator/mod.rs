//! Multi-peer negotiation orchestrator: keeps a session with every remote
//! participant, negotiates them and feeds them with the local media.

mod distribution;
mod negotiation;

use std::{
    cell::{Cell, RefCell},
    ops::Deref as _,
    rc::Rc,
};

use derive_more::{Display, From};
use futures::{
    channel::mpsc,
    future::LocalBoxFuture,
    stream::{LocalBoxStream, SelectAll},
    FutureExt as _, StreamExt as _,
};
use tracerr::Traced;

use crate::{
    conf,
    log::prelude::*,
    media::{
        MediaDeviceInfo, MediaDeviceKind, MediaDevices, MediaManager,
        MediaManagerError, MediaStream, MediaStreamConstraints,
    },
    peer::{
        PeerError, PeerEvent, PeerRepository, PeerSession, TransportError,
        TransportFactory,
    },
    signaling::{
        ParticipantId, SignalingChannel, SignalingError, SignalingMessage,
    },
    viewer::{Viewer, ViewerBindings},
};

/// Errors that may occur in an [`Orchestrator`].
#[derive(Clone, Debug, Display, Eq, From, PartialEq)]
pub enum OrchestratorError {
    /// Local [`ParticipantId`] is not set.
    #[display(fmt = "Local participant ID is not set")]
    #[from(ignore)]
    NotStarted,

    /// Device of non-video kind was selected as a video input.
    #[display(fmt = "`{}` device cannot be used as video input", _0)]
    #[from(ignore)]
    InvalidDeviceKind(MediaDeviceKind),

    /// [`PeerSession`] handling failed.
    #[display(fmt = "{}", _0)]
    Peer(PeerError),

    /// Local media handling failed.
    #[display(fmt = "{}", _0)]
    Media(MediaManagerError),

    /// [`SignalingChannel`] failed to relay a message.
    #[display(fmt = "Signalling failed: {}", _0)]
    Signaling(SignalingError),
}

impl From<TransportError> for OrchestratorError {
    #[inline]
    fn from(err: TransportError) -> Self {
        Self::Peer(PeerError::Transport(err))
    }
}

/// Notifications emitted by an [`Orchestrator`] to its owner.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Notification {
    /// Available media devices have been listed.
    MediaDevicesEnumerated(Vec<MediaDeviceInfo>),

    /// [`MediaStream`] from the remote participant has arrived.
    RemoteStreamAdded(ParticipantId),

    /// [`MediaStream`] from the remote participant has gone.
    RemoteStreamRemoved(ParticipantId),
}

/// Actual data of an [`Orchestrator`].
///
/// Shared between the [`Orchestrator`] and its event loop.
struct InnerOrchestrator {
    /// [`ParticipantId`] of the local participant.
    self_id: RefCell<Option<ParticipantId>>,

    /// Whether the local media has been started.
    started: Cell<bool>,

    /// Relay of [`SignalingMessage`]s.
    signaling: Rc<dyn SignalingChannel>,

    /// Controller of the local [`MediaStream`].
    media: MediaManager,

    /// Sessions with remote participants.
    peers: RefCell<PeerRepository>,

    /// [`Viewer`]s of the local and remote [`MediaStream`]s.
    viewers: RefCell<ViewerBindings>,

    /// Subscribers to [`Notification`]s.
    subscribers: RefCell<Vec<mpsc::UnboundedSender<Notification>>>,

    /// [`PeerEvent`] streams of the newly created [`PeerSession`]s, taken by
    /// [`Orchestrator::run`].
    new_peers: RefCell<
        Option<mpsc::UnboundedReceiver<LocalBoxStream<'static, PeerEvent>>>,
    >,
}

impl InnerOrchestrator {
    /// Returns [`ParticipantId`] of the local participant.
    ///
    /// # Errors
    ///
    /// With [`OrchestratorError::NotStarted`] if it's not set.
    fn self_id(&self) -> Result<ParticipantId, Traced<OrchestratorError>> {
        self.self_id
            .borrow()
            .clone()
            .ok_or_else(|| tracerr::new!(OrchestratorError::NotStarted))
    }

    /// Sends the provided [`SignalingMessage`] via [`SignalingChannel`].
    fn send(
        &self,
        msg: SignalingMessage,
    ) -> Result<(), Traced<OrchestratorError>> {
        self.signaling
            .send(msg)
            .map_err(tracerr::map_from_and_wrap!())
    }

    /// Sends the provided [`Notification`] to all the subscribers.
    fn notify(&self, notification: Notification) {
        self.subscribers
            .borrow_mut()
            .retain(|tx| tx.unbounded_send(notification.clone()).is_ok());
    }

    /// Tears down [`PeerSession`] with the provided remote participant.
    ///
    /// No-op if there is no such [`PeerSession`].
    fn hang_up(&self, id: &ParticipantId) {
        let peer = self.peers.borrow().get(id);
        let peer = match peer {
            Some(peer) => peer,
            None => return,
        };

        let viewer = self.viewers.borrow_mut().unbind_remote(id);
        if let Some(viewer) = viewer {
            viewer.clear();
        }
        if let Some(stream) = peer.take_remote_stream() {
            stream.stop();
            self.notify(Notification::RemoteStreamRemoved(id.clone()));
        }
        peer.transport().close();
        self.peers.borrow_mut().remove(id);
        info!("Hung up session with {}", id);
    }

    /// Tears down all the [`PeerSession`]s.
    fn hang_up_all(&self) {
        let ids = self.peers.borrow().ids();
        for id in ids {
            self.hang_up(&id);
        }
    }
}

/// Coordinator of media sessions between the local participant and any
/// number of remote ones.
///
/// Event handling happens in the future returned by [`Orchestrator::run`],
/// which must be driven on a local executor.
pub struct Orchestrator(Rc<InnerOrchestrator>);

impl Orchestrator {
    /// Creates new [`Orchestrator`] capturing media from the provided
    /// [`MediaDevices`], exchanging [`SignalingMessage`]s via the provided
    /// [`SignalingChannel`] and connecting with [`TransportFactory`]-made
    /// transports.
    #[must_use]
    pub fn new(
        conf: &conf::Media,
        devices: Rc<dyn MediaDevices>,
        signaling: Rc<dyn SignalingChannel>,
        transports: Rc<dyn TransportFactory>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded();
        Self(Rc::new(InnerOrchestrator {
            self_id: RefCell::new(None),
            started: Cell::new(false),
            signaling,
            media: MediaManager::new(
                devices,
                MediaStreamConstraints::from(conf),
            ),
            peers: RefCell::new(PeerRepository::new(transports, tx)),
            viewers: RefCell::default(),
            subscribers: RefCell::default(),
            new_peers: RefCell::new(Some(rx)),
        }))
    }

    /// Returns the event loop of this [`Orchestrator`], handling inbound
    /// [`SignalingMessage`]s and [`PeerEvent`]s one by one.
    ///
    /// Loop ends when the [`SignalingChannel`] closes (hanging up all the
    /// sessions) or this [`Orchestrator`] is dropped. Only the first returned
    /// loop does anything.
    #[allow(clippy::mut_mut)]
    pub fn run(&self) -> LocalBoxFuture<'static, ()> {
        enum LoopEvent {
            Signaling(SignalingMessage),
            SignalingClosed,
            NewPeer(LocalBoxStream<'static, PeerEvent>),
            Peer(PeerEvent),
        }

        let new_peers = self.0.new_peers.borrow_mut().take();
        let signaling = self.0.signaling.on_message();
        let inner = Rc::downgrade(&self.0);

        async move {
            let mut new_peers = match new_peers {
                Some(rx) => rx.fuse(),
                None => {
                    warn!("Orchestrator event loop is running already");
                    return;
                }
            };
            let mut signaling = signaling.fuse();
            let mut peer_events = SelectAll::new();

            loop {
                let event = futures::select! {
                    msg = signaling.next() => msg.map_or(
                        LoopEvent::SignalingClosed,
                        LoopEvent::Signaling,
                    ),
                    events = new_peers.select_next_some() => {
                        LoopEvent::NewPeer(events)
                    }
                    event = peer_events.select_next_some() => {
                        LoopEvent::Peer(event)
                    }
                };

                let inner = match inner.upgrade() {
                    Some(inner) => inner,
                    None => {
                        debug!("Orchestrator dropped, stopping event loop");
                        break;
                    }
                };
                match event {
                    LoopEvent::Signaling(msg) => {
                        let sender = msg.sender().clone();
                        if let Err(e) = msg.dispatch_with(inner.deref()).await
                        {
                            let (err, trace) = e.into_parts();
                            error!(
                                "Failed to handle message from {}: {}\n{}",
                                sender, err, trace
                            );
                        }
                    }
                    LoopEvent::SignalingClosed => {
                        info!("Signalling channel closed, hanging up");
                        inner.hang_up_all();
                        break;
                    }
                    LoopEvent::NewPeer(events) => {
                        peer_events.push(events);
                    }
                    LoopEvent::Peer(event) => {
                        let peer_id = event.peer_id().clone();
                        if let Err(e) = event.dispatch_with(inner.deref()).await
                        {
                            let (err, trace) = e.into_parts();
                            error!(
                                "Failed to handle event of {}: {}\n{}",
                                peer_id, err, trace
                            );
                        }
                    }
                }
            }
        }
        .boxed_local()
    }

    /// Sets [`ParticipantId`] of the local participant.
    pub fn set_self_id(&self, id: ParticipantId) {
        self.0.self_id.replace(Some(id));
    }

    /// Returns [`ParticipantId`] of the local participant, if set.
    #[must_use]
    pub fn self_id(&self) -> Option<ParticipantId> {
        self.0.self_id.borrow().clone()
    }

    /// Indicates whether the local media has been started.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.0.started.get()
    }

    /// Acquires the local [`MediaStream`], distributes it to all the sessions
    /// and the local [`Viewer`], and lists the available media devices.
    ///
    /// No-op if started already.
    ///
    /// # Errors
    ///
    /// With [`OrchestratorError::NotStarted`] if local [`ParticipantId`] is
    /// not set. Nothing is touched in this case.
    ///
    /// With [`OrchestratorError::Media`] if the local [`MediaStream`] cannot
    /// be acquired.
    ///
    /// With [`OrchestratorError::Peer`] if the local [`MediaStream`] cannot be
    /// attached to some session.
    pub async fn start(&self) -> Result<(), Traced<OrchestratorError>> {
        let self_id = self.0.self_id().map_err(tracerr::wrap!())?;
        if self.0.started.get() {
            return Ok(());
        }
        info!("Starting local media of {}", self_id);

        self.0
            .media
            .restart()
            .await
            .map_err(tracerr::map_from_and_wrap!())?;
        self.0.started.set(true);

        match self.0.media.enumerate_devices().await {
            Ok(devices) => {
                self.0.notify(Notification::MediaDevicesEnumerated(devices));
            }
            Err(e) => warn!("Media devices are unknown: {}", e.into_inner()),
        }

        self.0.distribute().await.map_err(tracerr::wrap!())
    }

    /// Hangs up all the sessions and releases the local [`MediaStream`].
    ///
    /// Idempotent.
    pub fn stop(&self) {
        self.0.hang_up_all();
        self.0.media.stop();
        if self.0.started.replace(false) {
            info!("Stopped local media");
        }
    }

    /// Creates an impolite session with the provided remote participant and
    /// starts its negotiation.
    ///
    /// # Errors
    ///
    /// With [`OrchestratorError::NotStarted`] if local [`ParticipantId`] is
    /// not set.
    ///
    /// With [`OrchestratorError::Peer`] if a session with this participant
    /// exists already, or the session cannot be created or negotiated.
    pub async fn invite(
        &self,
        peer_id: ParticipantId,
    ) -> Result<(), Traced<OrchestratorError>> {
        self.0.self_id().map_err(tracerr::wrap!())?;

        let peer = self
            .0
            .peers
            .borrow_mut()
            .create_outbound(peer_id)
            .map_err(tracerr::map_from_and_wrap!())?;

        let attached = self
            .0
            .attach_local_stream(&peer)
            .await
            .map_err(tracerr::wrap!())?;
        if !attached {
            // No track was added, so the transport won't ask for an offer.
            self.0.negotiate(&peer).await.map_err(tracerr::wrap!())?;
        }
        Ok(())
    }

    /// Captures video from the provided device and distributes it to all the
    /// sessions.
    ///
    /// Before [`Orchestrator::start`] only remembers the device.
    ///
    /// # Errors
    ///
    /// With [`OrchestratorError::Media`] if the new [`MediaStream`] cannot be
    /// acquired.
    ///
    /// With [`OrchestratorError::Peer`] if it cannot be attached to some
    /// session. Remaining sessions are not updated in this case.
    pub async fn change_camera(
        &self,
        device_id: String,
    ) -> Result<(), Traced<OrchestratorError>> {
        if !self.0.started.get() {
            self.0.media.set_device(device_id);
            return Ok(());
        }
        debug!("Switching camera to {}", device_id);

        self.0
            .media
            .change_device(device_id)
            .await
            .map_err(tracerr::map_from_and_wrap!())?;
        self.0.distribute().await.map_err(tracerr::wrap!())
    }

    /// Uses the provided video input device as a camera.
    ///
    /// # Errors
    ///
    /// With [`OrchestratorError::InvalidDeviceKind`] if the device is not a
    /// [`MediaDeviceKind::VideoInput`].
    ///
    /// Errors if [`Orchestrator::change_camera`] errors.
    pub async fn set_video_input(
        &self,
        device: MediaDeviceInfo,
    ) -> Result<(), Traced<OrchestratorError>> {
        if device.kind != MediaDeviceKind::VideoInput {
            return Err(tracerr::new!(OrchestratorError::InvalidDeviceKind(
                device.kind
            )));
        }
        self.change_camera(device.device_id)
            .await
            .map_err(tracerr::wrap!())
    }

    /// Binds [`Viewer`] of the provided remote participant, showing its
    /// [`MediaStream`] right away if it has arrived already.
    pub fn bind_remote_viewer(
        &self,
        peer_id: ParticipantId,
        viewer: Rc<dyn Viewer>,
    ) {
        let stream = self
            .0
            .peers
            .borrow()
            .get(&peer_id)
            .and_then(|peer| peer.remote_stream());
        if let Some(stream) = stream {
            viewer.show(&stream);
        }
        self.0.viewers.borrow_mut().bind_remote(peer_id, viewer);
    }

    /// Unbinds and clears [`Viewer`] of the provided remote participant.
    pub fn unbind_remote_viewer(&self, peer_id: &ParticipantId) {
        let viewer = self.0.viewers.borrow_mut().unbind_remote(peer_id);
        if let Some(viewer) = viewer {
            viewer.clear();
        }
    }

    /// Binds [`Viewer`] of the local [`MediaStream`], showing it right away
    /// if the local media is started.
    pub fn bind_local_viewer(&self, viewer: Rc<dyn Viewer>) {
        self.0.viewers.borrow_mut().bind_local(viewer);
        self.0.show_local_stream();
    }

    /// Tears down the session with the provided remote participant.
    ///
    /// No-op if there is no such session.
    pub fn hang_up(&self, peer_id: &ParticipantId) {
        self.0.hang_up(peer_id);
    }

    /// Returns media devices listed on the last [`Orchestrator::start`].
    #[must_use]
    pub fn media_devices(&self) -> Vec<MediaDeviceInfo> {
        self.0.media.known_devices()
    }

    /// Returns the local [`MediaStream`], if started.
    #[must_use]
    pub fn local_stream(&self) -> Option<Rc<MediaStream>> {
        self.0.media.current()
    }

    /// Subscribes to [`Notification`]s of this [`Orchestrator`].
    pub fn subscribe(&self) -> LocalBoxStream<'static, Notification> {
        let (tx, rx) = mpsc::unbounded();
        self.0.subscribers.borrow_mut().push(tx);
        rx.boxed_local()
    }

    /// Returns session with the provided remote participant, if any.
    #[must_use]
    pub fn session(&self, peer_id: &ParticipantId) -> Option<Rc<PeerSession>> {
        self.0.peers.borrow().get(peer_id)
    }

    /// Returns [`ParticipantId`]s of all the remote participants having a
    /// session.
    #[must_use]
    pub fn session_ids(&self) -> Vec<ParticipantId> {
        self.0.peers.borrow().ids()
    }
}
