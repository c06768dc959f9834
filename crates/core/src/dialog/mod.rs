pub mod constraints;
pub mod responder;
pub mod validator;

pub use constraints::{ConstraintTable, SlotConstraint, LEGO_MODELS, LEGO_SIZES};
pub use responder::{
    InvocationReason, TurnDirective, TurnRequest, TurnResponder, DEFAULT_FULFILLMENT_MESSAGE,
};
pub use validator::{SlotValidator, ValidationVerdict};
