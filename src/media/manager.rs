//! Acquiring and storing the local [`MediaStream`].

use std::{cell::RefCell, convert::TryFrom as _, rc::Rc};

use async_trait::async_trait;
use derive_more::Display;
use tracerr::Traced;

use crate::log::prelude::*;

use super::{
    MediaDeviceInfo, MediaStream, MediaStreamConstraints, RawMediaDeviceInfo,
};

/// Errors reported by a platform [`MediaDevices`] implementation.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum MediaError {
    /// User or platform denied access to the requested devices.
    #[display(fmt = "Permission to access media devices denied")]
    PermissionDenied,

    /// Requested device is absent or is used by another application.
    #[display(fmt = "Media device `{}` is unavailable", _0)]
    DeviceUnavailable(String),

    /// Any other platform failure.
    #[display(fmt = "Platform media error: {}", _0)]
    Platform(String),
}

/// Errors that may occur in a [`MediaManager`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum MediaManagerError {
    /// Occurs when local [`MediaStream`] cannot be acquired.
    #[display(fmt = "Failed to acquire local media: {}", _0)]
    MediaAcquisitionFailed(MediaError),

    /// Occurs when media devices cannot be listed.
    #[display(fmt = "Failed to enumerate media devices: {}", _0)]
    EnumerateDevicesFailed(MediaError),
}

/// Platform [MediaDevices][1] interface providing access to connected media
/// input devices.
///
/// [1]: https://w3.org/TR/mediacapture-streams/#mediadevices
#[cfg_attr(test, mockall::automock)]
#[async_trait(?Send)]
pub trait MediaDevices {
    /// Prompts for a permission to use media inputs and produces a
    /// [`MediaStream`] satisfying the provided [`MediaStreamConstraints`].
    async fn get_user_media(
        &self,
        constraints: MediaStreamConstraints,
    ) -> Result<MediaStream, MediaError>;

    /// Lists all the available media input and output devices.
    async fn enumerate_devices(
        &self,
    ) -> Result<Vec<RawMediaDeviceInfo>, MediaError>;
}

/// Controller of the local [`MediaStream`].
///
/// Holds at most one [`MediaStream`] at a time: the previous one is always
/// stopped before a new one is requested.
pub struct MediaManager {
    /// Platform media interface.
    devices: Rc<dyn MediaDevices>,

    /// Constraints used for the next [`MediaManager::restart`].
    constraints: RefCell<MediaStreamConstraints>,

    /// Currently active local [`MediaStream`].
    stream: RefCell<Option<Rc<MediaStream>>>,

    /// Devices listed by the last [`MediaManager::enumerate_devices`] call.
    known_devices: RefCell<Vec<MediaDeviceInfo>>,
}

impl MediaManager {
    /// Creates new [`MediaManager`] acquiring media via the provided
    /// [`MediaDevices`].
    #[must_use]
    pub fn new(
        devices: Rc<dyn MediaDevices>,
        constraints: MediaStreamConstraints,
    ) -> Self {
        Self {
            devices,
            constraints: RefCell::new(constraints),
            stream: RefCell::default(),
            known_devices: RefCell::default(),
        }
    }

    /// Stops the current [`MediaStream`] (if any) and acquires a new one
    /// satisfying the current [`MediaStreamConstraints`].
    ///
    /// # Errors
    ///
    /// With [`MediaManagerError::MediaAcquisitionFailed`] if the platform
    /// fails to provide a [`MediaStream`]. The previous [`MediaStream`] stays
    /// stopped in this case.
    pub async fn restart(
        &self,
    ) -> Result<Rc<MediaStream>, Traced<MediaManagerError>> {
        self.stop();

        let constraints = self.constraints.borrow().clone();
        let stream = self
            .devices
            .get_user_media(constraints)
            .await
            .map(Rc::new)
            .map_err(|e| {
                tracerr::new!(MediaManagerError::MediaAcquisitionFailed(e))
            })?;

        // A concurrent restart may have finished first.
        if let Some(prev) = self.stream.replace(Some(Rc::clone(&stream))) {
            prev.stop();
        }
        debug!("Local MediaStream acquired: {:?}", stream);

        Ok(stream)
    }

    /// Selects the video input device to capture from, without touching the
    /// current [`MediaStream`].
    pub fn set_device(&self, device_id: String) {
        self.constraints.borrow_mut().video_mut().set_device_id(device_id);
    }

    /// Selects the video input device to capture from and
    /// [restarts][`MediaManager::restart`] the local [`MediaStream`].
    ///
    /// # Errors
    ///
    /// Errors if [`MediaManager::restart`] errors.
    pub async fn change_device(
        &self,
        device_id: String,
    ) -> Result<Rc<MediaStream>, Traced<MediaManagerError>> {
        self.set_device(device_id);
        self.restart().await.map_err(tracerr::wrap!())
    }

    /// Stops and forgets the current [`MediaStream`].
    ///
    /// No-op if there is no [`MediaStream`].
    pub fn stop(&self) {
        if let Some(stream) = self.stream.borrow_mut().take() {
            debug!("Stopping local MediaStream: {:?}", stream);
            stream.stop();
        }
    }

    /// Returns the current [`MediaStream`], if any.
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<Rc<MediaStream>> {
        self.stream.borrow().clone()
    }

    /// Returns the current [`MediaStreamConstraints`].
    #[inline]
    #[must_use]
    pub fn constraints(&self) -> MediaStreamConstraints {
        self.constraints.borrow().clone()
    }

    /// Lists the available media devices, remembering the result.
    ///
    /// Devices of kinds unknown to this crate are skipped.
    ///
    /// # Errors
    ///
    /// With [`MediaManagerError::EnumerateDevicesFailed`] if the platform
    /// fails to list devices.
    pub async fn enumerate_devices(
        &self,
    ) -> Result<Vec<MediaDeviceInfo>, Traced<MediaManagerError>> {
        let raw = self.devices.enumerate_devices().await.map_err(|e| {
            tracerr::new!(MediaManagerError::EnumerateDevicesFailed(e))
        })?;

        let devices: Vec<_> = raw
            .into_iter()
            .filter_map(|info| match MediaDeviceInfo::try_from(info) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!("Skipping media device: {}", e);
                    None
                }
            })
            .collect();
        self.known_devices.replace(devices.clone());

        Ok(devices)
    }

    /// Returns devices listed by the last successful
    /// [`MediaManager::enumerate_devices`] call.
    #[inline]
    #[must_use]
    pub fn known_devices(&self) -> Vec<MediaDeviceInfo> {
        self.known_devices.borrow().clone()
    }
}
