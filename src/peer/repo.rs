use std::{collections::HashMap, rc::Rc};

use futures::{channel::mpsc, stream::LocalBoxStream, StreamExt as _};
use tracerr::Traced;

use crate::{log::prelude::*, signaling::ParticipantId};

use super::{PeerError, PeerEvent, PeerSession, TransportFactory};

/// [`PeerSession`]s factory and repository.
#[allow(clippy::module_name_repetitions)]
pub struct PeerRepository {
    /// Remote [`ParticipantId`] to its [`PeerSession`].
    peers: HashMap<ParticipantId, Rc<PeerSession>>,

    /// Factory of the [`PeerSession`]s' transports.
    transports: Rc<dyn TransportFactory>,

    /// Sender of the [`PeerEvent`] streams of all the [`PeerSession`]s
    /// created by this repository.
    peer_events_sender:
        mpsc::UnboundedSender<LocalBoxStream<'static, PeerEvent>>,
}

impl PeerRepository {
    /// Creates new empty [`PeerRepository`].
    #[inline]
    #[must_use]
    pub fn new(
        transports: Rc<dyn TransportFactory>,
        peer_events_sender: mpsc::UnboundedSender<
            LocalBoxStream<'static, PeerEvent>,
        >,
    ) -> Self {
        Self {
            peers: HashMap::new(),
            transports,
            peer_events_sender,
        }
    }

    /// Returns [`PeerSession`] with the provided [`ParticipantId`], creating
    /// a polite one if there is none.
    ///
    /// # Errors
    ///
    /// With [`PeerError::Transport`] if a transport for the new
    /// [`PeerSession`] cannot be created.
    pub fn get_or_create(
        &mut self,
        id: &ParticipantId,
    ) -> Result<Rc<PeerSession>, Traced<PeerError>> {
        if let Some(peer) = self.peers.get(id) {
            return Ok(Rc::clone(peer));
        }
        self.insert(id.clone(), true).map_err(tracerr::wrap!())
    }

    /// Returns [`PeerSession`] with the provided [`ParticipantId`].
    ///
    /// # Errors
    ///
    /// With [`PeerError::UnknownSession`] if there is no such
    /// [`PeerSession`].
    pub fn get_existing(
        &self,
        id: &ParticipantId,
    ) -> Result<Rc<PeerSession>, Traced<PeerError>> {
        self.peers
            .get(id)
            .cloned()
            .ok_or_else(|| tracerr::new!(PeerError::UnknownSession(id.clone())))
    }

    /// Creates new impolite [`PeerSession`] with the provided
    /// [`ParticipantId`].
    ///
    /// # Errors
    ///
    /// With [`PeerError::DuplicateSession`] if such [`PeerSession`] exists
    /// already.
    ///
    /// With [`PeerError::Transport`] if a transport for the new
    /// [`PeerSession`] cannot be created.
    pub fn create_outbound(
        &mut self,
        id: ParticipantId,
    ) -> Result<Rc<PeerSession>, Traced<PeerError>> {
        if self.peers.contains_key(&id) {
            return Err(tracerr::new!(PeerError::DuplicateSession(id)));
        }
        self.insert(id, false).map_err(tracerr::wrap!())
    }

    /// Creates new [`PeerSession`] and starts forwarding its [`PeerEvent`]s.
    fn insert(
        &mut self,
        id: ParticipantId,
        polite: bool,
    ) -> Result<Rc<PeerSession>, Traced<PeerError>> {
        let transport = self
            .transports
            .create(&id)
            .map_err(tracerr::from_and_wrap!())?;

        let events = {
            let peer_id = id.clone();
            transport
                .on_event()
                .map(move |ev| PeerEvent::new(peer_id.clone(), ev))
                .boxed_local()
        };
        if self.peer_events_sender.unbounded_send(events).is_err() {
            warn!("PeerEvent stream of {} has no receiver", id);
        }

        debug!("Created PeerSession with {} [polite = {}]", id, polite);
        let peer = Rc::new(PeerSession::new(id.clone(), polite, transport));
        self.peers.insert(id, Rc::clone(&peer));

        Ok(peer)
    }

    /// Returns [`PeerSession`] with the provided [`ParticipantId`], if any.
    #[inline]
    #[must_use]
    pub fn get(&self, id: &ParticipantId) -> Option<Rc<PeerSession>> {
        self.peers.get(id).cloned()
    }

    /// Removes [`PeerSession`] with the provided [`ParticipantId`].
    ///
    /// No-op if there is no such [`PeerSession`].
    #[inline]
    pub fn remove(&mut self, id: &ParticipantId) -> Option<Rc<PeerSession>> {
        self.peers.remove(id)
    }

    /// Returns [`ParticipantId`]s of all the [`PeerSession`]s.
    #[must_use]
    pub fn ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<_> = self.peers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns all the [`PeerSession`]s ordered by their [`ParticipantId`]s.
    #[must_use]
    pub fn sessions(&self) -> Vec<Rc<PeerSession>> {
        let mut sessions: Vec<_> = self.peers.values().cloned().collect();
        sessions.sort_by(|a, b| a.id().cmp(b.id()));
        sessions
    }

    /// Returns number of the [`PeerSession`]s.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Indicates whether there are no [`PeerSession`]s.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
