//! Local media capture settings.

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Local media capture settings.
///
/// Audio is never captured, so only video input is configurable.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct Media {
    /// ID of the video input device to capture from on start.
    ///
    /// Platform default camera is used if `None`. Defaults to `None`.
    #[default(None)]
    pub device_id: Option<String>,
}
