pub mod archive;
pub mod audit;
pub mod codehook;
pub mod config;
pub mod dialog;
pub mod domain;
pub mod errors;
pub mod persistence;

pub use archive::{ArchiveError, BlobStore, LogArchiver, LogBatch, LogEvent, LogSubscriptionEvent};
pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use codehook::{build_response, CodeHookEvent, CodeHookResponse};
pub use dialog::{
    ConstraintTable, InvocationReason, SlotValidator, TurnDirective, TurnRequest, TurnResponder,
    ValidationVerdict,
};
pub use domain::{Order, OrderId, Slot, SlotName, SlotSet};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use persistence::{persist_order, OrderStore, StoreError};
