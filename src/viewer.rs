//! Rendering surfaces of [`MediaStream`]s.

use std::{collections::HashMap, rc::Rc};

use crate::{media::MediaStream, signaling::ParticipantId};

/// Sink displaying a [`MediaStream`], like an HTML `<video>` element.
#[cfg_attr(test, mockall::automock)]
pub trait Viewer {
    /// Starts displaying the provided [`MediaStream`], replacing the
    /// displayed one.
    fn show(&self, stream: &Rc<MediaStream>);

    /// Stops displaying anything.
    fn clear(&self);
}

/// [`Viewer`]s bound to the local and remote participants.
///
/// Bindings live independently from sessions: a [`Viewer`] may be bound
/// before or after the participant's [`MediaStream`] arrives.
#[derive(Default)]
pub struct ViewerBindings {
    /// [`Viewer`] of the local [`MediaStream`].
    local: Option<Rc<dyn Viewer>>,

    /// [`Viewer`]s of the remote participants' [`MediaStream`]s.
    remote: HashMap<ParticipantId, Rc<dyn Viewer>>,
}

impl ViewerBindings {
    /// Binds [`Viewer`] of the local [`MediaStream`], returning the previous
    /// one.
    #[inline]
    pub fn bind_local(
        &mut self,
        viewer: Rc<dyn Viewer>,
    ) -> Option<Rc<dyn Viewer>> {
        self.local.replace(viewer)
    }

    /// Returns [`Viewer`] of the local [`MediaStream`].
    #[inline]
    #[must_use]
    pub fn local(&self) -> Option<Rc<dyn Viewer>> {
        self.local.clone()
    }

    /// Binds [`Viewer`] of the provided remote participant, returning the
    /// previous one.
    #[inline]
    pub fn bind_remote(
        &mut self,
        id: ParticipantId,
        viewer: Rc<dyn Viewer>,
    ) -> Option<Rc<dyn Viewer>> {
        self.remote.insert(id, viewer)
    }

    /// Unbinds [`Viewer`] of the provided remote participant, returning it.
    #[inline]
    pub fn unbind_remote(
        &mut self,
        id: &ParticipantId,
    ) -> Option<Rc<dyn Viewer>> {
        self.remote.remove(id)
    }

    /// Returns [`Viewer`] of the provided remote participant.
    #[inline]
    #[must_use]
    pub fn remote(&self, id: &ParticipantId) -> Option<Rc<dyn Viewer>> {
        self.remote.get(id).cloned()
    }
}
