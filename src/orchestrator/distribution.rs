//! Feeding sessions and [`Viewer`]s with the local [`MediaStream`].
//!
//! [`Viewer`]: crate::viewer::Viewer
//! [`MediaStream`]: crate::media::MediaStream

use tracerr::Traced;

use crate::{log::prelude::*, peer::PeerSession};

use super::{InnerOrchestrator, OrchestratorError};

impl InnerOrchestrator {
    /// Sends video of the local [`MediaStream`] to the provided
    /// [`PeerSession`], replacing the previously sent one.
    ///
    /// Returns `false` if there was nothing to send.
    ///
    /// [`MediaStream`]: crate::media::MediaStream
    pub(super) async fn attach_local_stream(
        &self,
        peer: &PeerSession,
    ) -> Result<bool, Traced<OrchestratorError>> {
        let track = match self.media.current().and_then(|s| s.video_track()) {
            Some(track) => track,
            None => {
                info!("No local video to send to {}", peer.id());
                return Ok(false);
            }
        };

        let transport = peer.transport();
        match peer.outbound_track() {
            Some(handle) => {
                transport
                    .replace_track(handle, track)
                    .await
                    .map_err(tracerr::from_and_wrap!())?;
            }
            None => {
                let handle = transport
                    .add_track(track)
                    .await
                    .map_err(tracerr::from_and_wrap!())?;
                peer.set_outbound_track(handle);
            }
        }
        Ok(true)
    }

    /// Sends the local [`MediaStream`] to every [`PeerSession`] one by one
    /// and shows it in the local [`Viewer`].
    ///
    /// Stops on the first failed [`PeerSession`].
    ///
    /// [`MediaStream`]: crate::media::MediaStream
    /// [`Viewer`]: crate::viewer::Viewer
    pub(super) async fn distribute(
        &self,
    ) -> Result<(), Traced<OrchestratorError>> {
        self.show_local_stream();

        let peers = self.peers.borrow().sessions();
        for peer in peers {
            self.attach_local_stream(&peer)
                .await
                .map_err(tracerr::wrap!())?;
        }
        Ok(())
    }

    /// Shows the local [`MediaStream`] in the local [`Viewer`], if both
    /// exist.
    ///
    /// [`MediaStream`]: crate::media::MediaStream
    /// [`Viewer`]: crate::viewer::Viewer
    pub(super) fn show_local_stream(&self) {
        let viewer = self.viewers.borrow().local();
        if let (Some(viewer), Some(stream)) = (viewer, self.media.current()) {
            viewer.show(&stream);
        }
    }
}
