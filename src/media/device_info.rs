//! [MediaDeviceInfo][1] related objects.
//!
//! [1]: https://www.w3.org/TR/mediacapture-streams/#device-info

use std::{convert::TryFrom, str::FromStr};

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Representation of [MediaDeviceKind][1].
///
/// [1]: https://www.w3.org/TR/mediacapture-streams/#dom-mediadevicekind
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MediaDeviceKind {
    /// Audio input device (for example, a microphone).
    #[display(fmt = "audioinput")]
    AudioInput,

    /// Audio output device (for example, a pair of headphones).
    #[display(fmt = "audiooutput")]
    AudioOutput,

    /// Video input device (for example, a webcam).
    #[display(fmt = "videoinput")]
    VideoInput,
}

/// Error of parsing unknown [`MediaDeviceKind`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display(fmt = "Unknown media device kind: {}", _0)]
pub struct UnknownMediaDeviceKind(pub String);

impl FromStr for MediaDeviceKind {
    type Err = UnknownMediaDeviceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audioinput" => Ok(Self::AudioInput),
            "audiooutput" => Ok(Self::AudioOutput),
            "videoinput" => Ok(Self::VideoInput),
            _ => Err(UnknownMediaDeviceKind(s.to_owned())),
        }
    }
}

/// Representation of [MediaDeviceInfo][1].
///
/// [1]: https://www.w3.org/TR/mediacapture-streams/#device-info
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDeviceInfo {
    /// Unique identifier of the represented device.
    pub device_id: String,

    /// Kind of the represented device.
    pub kind: MediaDeviceKind,

    /// Label describing the represented device (for example "External USB
    /// Webcam"). Empty if the device has no associated label.
    pub label: String,
}

/// Raw device description as reported by a platform, whose `kind` may be
/// something this crate doesn't know about.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMediaDeviceInfo {
    /// Unique identifier of the represented device.
    pub device_id: String,

    /// Kind of the represented device.
    pub kind: String,

    /// Label describing the represented device.
    pub label: String,
}

impl TryFrom<RawMediaDeviceInfo> for MediaDeviceInfo {
    type Error = UnknownMediaDeviceKind;

    fn try_from(raw: RawMediaDeviceInfo) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: raw.kind.parse()?,
            device_id: raw.device_id,
            label: raw.label,
        })
    }
}
