pub mod error;
pub mod events;
pub mod ids;
pub mod interaction;
pub mod outcome;

pub use error::{FailureReason, HitlError};
pub use events::{
    Envelope, ExecutionResult, HitlResponse, IngressMessage, RecoverRequest, RecoverResponse,
    RecoveryReason, ResponseFields,
};
pub use ids::InteractionId;
pub use interaction::{
    InteractionDraft, InteractionKind, InteractionPayload, InteractionStage, PendingInteraction,
};
pub use outcome::{DeliveryPath, InteractionOutcome};
