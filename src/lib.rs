//! Multi-peer WebRTC mesh negotiation.
//!
//! [`Orchestrator`] keeps a session with every remote participant of a call,
//! negotiates them with the "perfect negotiation" protocol over a
//! [`SignalingChannel`] and sends the local camera video to all of them.
//!
//! [`Orchestrator`]: orchestrator::Orchestrator
//! [`SignalingChannel`]: signaling::SignalingChannel

#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

pub mod conf;
pub mod log;
pub mod media;
pub mod orchestrator;
pub mod peer;
pub mod signaling;
pub mod viewer;

#[doc(inline)]
pub use self::{
    conf::Conf,
    orchestrator::{Notification, Orchestrator, OrchestratorError},
    signaling::{ParticipantId, Relay, SignalingMessage},
};
