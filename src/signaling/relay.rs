//! In-memory [`SignalingChannel`] implementation routing
//! [`SignalingMessage`]s between participants living in the same process.

use std::{
    cell::RefCell,
    collections::HashMap,
    rc::{Rc, Weak},
};

use futures::{channel::mpsc, stream::LocalBoxStream, StreamExt as _};
use tracerr::Traced;

use crate::log::prelude::*;

use super::{ParticipantId, SignalingChannel, SignalingError, SignalingMessage};

/// Subscribers of a single participant's inbound [`SignalingMessage`]s.
type Mailbox = Rc<RefCell<Vec<mpsc::UnboundedSender<SignalingMessage>>>>;

/// Registry of participants the [`Relay`] routes messages between.
#[derive(Debug, Default)]
struct InnerRelay {
    mailboxes: HashMap<ParticipantId, Mailbox>,
}

impl InnerRelay {
    /// Delivers the provided [`SignalingMessage`] to all subscribers of its
    /// target. Messages to unknown targets are dropped.
    fn route(&self, msg: SignalingMessage) {
        match self.mailboxes.get(msg.target()) {
            Some(mailbox) => {
                mailbox
                    .borrow_mut()
                    .retain(|tx| tx.unbounded_send(msg.clone()).is_ok());
            }
            None => {
                debug!(
                    "Dropping message from {} to unknown participant {}",
                    msg.sender(),
                    msg.target()
                );
            }
        }
    }
}

/// Relay between participants of a mesh call.
///
/// Participants [`Relay::register`] themselves and receive a
/// [`RelayEndpoint`] to exchange [`SignalingMessage`]s with the others.
#[derive(Clone, Debug, Default)]
pub struct Relay(Rc<RefCell<InnerRelay>>);

impl Relay {
    /// Creates new empty [`Relay`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers new participant in this [`Relay`].
    ///
    /// Returns its [`RelayEndpoint`] and [`ParticipantId`]s of all the
    /// participants registered before. The newcomer is expected to invite
    /// them.
    ///
    /// # Errors
    ///
    /// With [`SignalingError::DuplicateParticipant`] if participant with the
    /// provided [`ParticipantId`] is registered already.
    pub fn register(
        &self,
        id: ParticipantId,
    ) -> Result<(RelayEndpoint, Vec<ParticipantId>), Traced<SignalingError>>
    {
        let mut inner = self.0.borrow_mut();
        if inner.mailboxes.contains_key(&id) {
            return Err(tracerr::new!(SignalingError::DuplicateParticipant(
                id
            )));
        }
        debug!("Registering participant {} in Relay", id);

        let mut to_invite: Vec<_> = inner.mailboxes.keys().cloned().collect();
        to_invite.sort();

        let mailbox = Mailbox::default();
        inner.mailboxes.insert(id.clone(), Rc::clone(&mailbox));

        Ok((
            RelayEndpoint {
                id,
                relay: Rc::downgrade(&self.0),
                mailbox: Rc::downgrade(&mailbox),
            },
            to_invite,
        ))
    }

    /// Unregisters participant with the provided [`ParticipantId`], ending
    /// all its [`SignalingChannel::on_message`] streams.
    ///
    /// No-op if there is no such participant.
    pub fn unregister(&self, id: &ParticipantId) {
        if let Some(mailbox) = self.0.borrow_mut().mailboxes.remove(id) {
            debug!("Unregistered participant {} from Relay", id);
            mailbox.borrow_mut().clear();
        }
    }

    /// Returns [`ParticipantId`]s of all registered participants.
    #[must_use]
    pub fn participants(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<_> =
            self.0.borrow().mailboxes.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// [`SignalingChannel`] of a single participant registered in a [`Relay`].
///
/// Unregisters the participant on [`Drop`].
#[derive(Debug)]
pub struct RelayEndpoint {
    /// [`ParticipantId`] this [`RelayEndpoint`] sends on behalf of.
    id: ParticipantId,

    /// [`Relay`] this [`RelayEndpoint`] is registered in.
    relay: Weak<RefCell<InnerRelay>>,

    /// Subscribers to this participant's inbound messages.
    mailbox: Weak<RefCell<Vec<mpsc::UnboundedSender<SignalingMessage>>>>,
}

impl RelayEndpoint {
    /// Returns [`ParticipantId`] of this [`RelayEndpoint`].
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Unregisters this [`RelayEndpoint`] from its [`Relay`].
    ///
    /// No-op if this [`RelayEndpoint`] has been unregistered already, even if
    /// its [`ParticipantId`] was registered again since then.
    pub fn close(&self) {
        let (relay, mailbox) =
            match (self.relay.upgrade(), self.mailbox.upgrade()) {
                (Some(relay), Some(mailbox)) => (relay, mailbox),
                _ => return,
            };
        let mut relay = relay.borrow_mut();
        let is_registered = relay
            .mailboxes
            .get(&self.id)
            .map_or(false, |m| Rc::ptr_eq(m, &mailbox));
        if is_registered {
            relay.mailboxes.remove(&self.id);
            mailbox.borrow_mut().clear();
            debug!("Participant {} closed its RelayEndpoint", self.id);
        }
    }
}

impl SignalingChannel for RelayEndpoint {
    fn send(&self, msg: SignalingMessage) -> Result<(), Traced<SignalingError>> {
        if msg.sender() != &self.id {
            return Err(tracerr::new!(SignalingError::SenderMismatch {
                expected: self.id.clone(),
                actual: msg.sender().clone(),
            }));
        }
        let relay = self
            .relay
            .upgrade()
            .ok_or_else(|| tracerr::new!(SignalingError::Closed))?;
        let relay = relay.borrow();
        if self.mailbox.upgrade().is_none()
            || !relay.mailboxes.contains_key(&self.id)
        {
            return Err(tracerr::new!(SignalingError::Closed));
        }
        relay.route(msg);
        Ok(())
    }

    fn on_message(&self) -> LocalBoxStream<'static, SignalingMessage> {
        let (tx, rx) = mpsc::unbounded();
        if let Some(mailbox) = self.mailbox.upgrade() {
            mailbox.borrow_mut().push(tx);
        }
        rx.boxed_local()
    }
}

impl Drop for RelayEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}
