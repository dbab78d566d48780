//! Client-side runtime for human-in-the-loop workflow interactions.
//!
//! Inbound events enter through [`EventIngress`], become entries in the
//! [`HitlController`]'s registry, and leave as responses delivered by the
//! [`ResponseDispatcher`]. Every resolved interaction is followed by a
//! [`SessionRecovery`] pass.

pub mod channel;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod ingress;
pub mod recovery;
pub mod registry;
pub mod session;
pub mod util;

#[cfg(test)]
mod testing;

pub use channel::{DuplexChannel, WsChannel};
pub use collaborators::{
    Collaborators, Presenter, RecoveryChoice, ReloadHandle, Severity, StatusReporter, Transcript,
    TranscriptEntry, TranscriptRole,
};
pub use config::RuntimeConfig;
pub use controller::{HitlController, HitlControllerBuilder};
pub use dispatcher::ResponseDispatcher;
pub use ingress::{EventIngress, IngressAction};
pub use recovery::{
    HttpRecoveryEndpoint, RecoveryEndpoint, RecoveryReport, SessionIdentity, SessionRecovery,
};
pub use registry::InteractionRegistry;
pub use session::SessionTracker;
