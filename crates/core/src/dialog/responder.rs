use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::dialog::validator::{SlotValidator, ValidationVerdict};
use crate::domain::slot::{SlotName, SlotSet};
use crate::errors::{ApplicationError, DomainError};
use crate::persistence::{persist_order, OrderStore};

pub const DEFAULT_FULFILLMENT_MESSAGE: &str = "I've placed your order";

const ACTOR: &str = "turn-responder";

/// Why the runtime invoked the code hook this turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationReason {
    DialogCodeHook,
    FulfillmentCodeHook,
}

impl InvocationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DialogCodeHook => "DialogCodeHook",
            Self::FulfillmentCodeHook => "FulfillmentCodeHook",
        }
    }
}

impl fmt::Display for InvocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvocationReason {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "DialogCodeHook" => Ok(Self::DialogCodeHook),
            "FulfillmentCodeHook" => Ok(Self::FulfillmentCodeHook),
            other => Err(DomainError::UnsupportedInvocation { reason: other.to_string() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnDirective {
    ElicitSlot { slot: SlotName, message: String },
    Delegate,
    Close { message: String },
}

impl TurnDirective {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ElicitSlot { .. } => "ElicitSlot",
            Self::Delegate => "Delegate",
            Self::Close { .. } => "Close",
        }
    }
}

/// One turn as delivered by the runtime.
#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub invocation_source: String,
    pub intent_name: String,
    pub slots: SlotSet,
    pub session_id: Option<String>,
    pub correlation_id: String,
}

impl TurnRequest {
    pub fn new(
        invocation_source: impl Into<String>,
        intent_name: impl Into<String>,
        slots: SlotSet,
    ) -> Self {
        Self {
            invocation_source: invocation_source.into(),
            intent_name: intent_name.into(),
            slots,
            session_id: None,
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }
}

pub struct TurnResponder {
    validator: SlotValidator,
    store: Arc<dyn OrderStore>,
    audit: Arc<dyn AuditSink>,
    fulfillment_message: String,
}

impl TurnResponder {
    pub fn new(
        validator: SlotValidator,
        store: Arc<dyn OrderStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            validator,
            store,
            audit,
            fulfillment_message: DEFAULT_FULFILLMENT_MESSAGE.to_string(),
        }
    }

    pub fn with_fulfillment_message(mut self, message: impl Into<String>) -> Self {
        self.fulfillment_message = message.into();
        self
    }

    /// Produces the directive for one turn. Mid-dialog turns never write; a
    /// fulfillment turn writes exactly one order and closes only if the write
    /// succeeded.
    pub async fn respond(&self, turn: &TurnRequest) -> Result<TurnDirective, ApplicationError> {
        let reason = match turn.invocation_source.parse::<InvocationReason>() {
            Ok(reason) => reason,
            Err(error) => {
                warn!(
                    event_name = "dialog.turn.unsupported_invocation",
                    correlation_id = %turn.correlation_id,
                    invocation_source = %turn.invocation_source,
                    "rejecting turn with unknown invocation source"
                );
                self.audit.emit(
                    self.event(turn, "turn.unsupported_invocation", AuditOutcome::Rejected)
                        .with_metadata("invocation_source", turn.invocation_source.clone()),
                );
                return Err(error.into());
            }
        };

        debug!(
            event_name = "dialog.turn.received",
            correlation_id = %turn.correlation_id,
            invocation_source = %reason,
            intent = %turn.intent_name,
            slot_count = turn.slots.len(),
            "turn received"
        );

        match reason {
            InvocationReason::DialogCodeHook => Ok(self.validate_turn(turn)),
            InvocationReason::FulfillmentCodeHook => self.fulfill_turn(turn).await,
        }
    }

    fn validate_turn(&self, turn: &TurnRequest) -> TurnDirective {
        match self.validator.validate(&turn.slots) {
            ValidationVerdict::Invalid { slot, message } => {
                self.audit.emit(
                    self.event(turn, "turn.elicit_slot", AuditOutcome::Success)
                        .with_metadata("slot", slot.as_str()),
                );
                TurnDirective::ElicitSlot { slot, message }
            }
            ValidationVerdict::Valid => {
                self.audit.emit(self.event(turn, "turn.delegated", AuditOutcome::Success));
                TurnDirective::Delegate
            }
        }
    }

    async fn fulfill_turn(&self, turn: &TurnRequest) -> Result<TurnDirective, ApplicationError> {
        match persist_order(self.store.as_ref(), self.validator.table(), &turn.slots).await {
            Ok(order_id) => {
                info!(
                    event_name = "dialog.order.persisted",
                    correlation_id = %turn.correlation_id,
                    order_id = %order_id,
                    "order saved"
                );
                self.audit.emit(
                    self.event(turn, "turn.closed", AuditOutcome::Success).with_order(order_id),
                );
                Ok(TurnDirective::Close { message: self.fulfillment_message.clone() })
            }
            Err(error) => {
                warn!(
                    event_name = "dialog.order.persist_failed",
                    correlation_id = %turn.correlation_id,
                    error = %error,
                    "order was not saved; turn will not close"
                );
                self.audit.emit(
                    self.event(turn, "turn.persist_failed", AuditOutcome::Failed)
                        .with_metadata("error", error.to_string()),
                );
                Err(error)
            }
        }
    }

    fn event(&self, turn: &TurnRequest, event_type: &str, outcome: AuditOutcome) -> AuditEvent {
        AuditEvent::new(
            turn.session_id.clone(),
            turn.correlation_id.clone(),
            event_type,
            AuditCategory::Dialog,
            ACTOR,
            outcome,
        )
        .with_metadata("intent", turn.intent_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{InvocationReason, TurnDirective, TurnRequest, TurnResponder};
    use crate::audit::{AuditOutcome, InMemoryAuditSink};
    use crate::dialog::validator::SlotValidator;
    use crate::domain::order::Order;
    use crate::domain::slot::{SlotName, SlotSet};
    use crate::errors::{ApplicationError, DomainError};
    use crate::persistence::{OrderStore, StoreError};

    #[derive(Default)]
    struct CountingStore {
        orders: Mutex<Vec<Order>>,
        fail: bool,
    }

    impl CountingStore {
        fn failing() -> Self {
            Self { orders: Mutex::new(Vec::new()), fail: true }
        }

        fn orders(&self) -> Vec<Order> {
            self.orders.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl OrderStore for CountingStore {
        async fn put(&self, order: &Order) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError("connection reset".to_string()));
            }
            self.orders.lock().expect("lock").push(order.clone());
            Ok(())
        }
    }

    fn responder(store: Arc<CountingStore>, sink: InMemoryAuditSink) -> TurnResponder {
        TurnResponder::new(SlotValidator::default(), store, Arc::new(sink))
    }

    fn tank_medium() -> SlotSet {
        SlotSet::new().with(SlotName::LegoModel, "tank").with(SlotName::LegoSize, "medium")
    }

    #[test]
    fn invocation_reason_parsing_is_closed() {
        assert_eq!(
            "DialogCodeHook".parse::<InvocationReason>(),
            Ok(InvocationReason::DialogCodeHook)
        );
        assert_eq!(
            "FulfillmentCodeHook".parse::<InvocationReason>(),
            Ok(InvocationReason::FulfillmentCodeHook)
        );
        assert_eq!(
            "dialogcodehook".parse::<InvocationReason>(),
            Err(DomainError::UnsupportedInvocation { reason: "dialogcodehook".to_string() })
        );
    }

    #[tokio::test]
    async fn empty_slots_elicit_model() {
        let store = Arc::new(CountingStore::default());
        let responder = responder(store.clone(), InMemoryAuditSink::default());

        let directive = responder
            .respond(&TurnRequest::new("DialogCodeHook", "OrderLego", SlotSet::new()))
            .await
            .expect("directive");

        assert_eq!(
            directive,
            TurnDirective::ElicitSlot {
                slot: SlotName::LegoModel,
                message: "Which model do you want (ship, tank, rocket)?".to_string(),
            }
        );
        assert!(store.orders().is_empty());
    }

    #[tokio::test]
    async fn model_only_elicits_size() {
        let responder = responder(Arc::new(CountingStore::default()), InMemoryAuditSink::default());
        let slots = SlotSet::new().with(SlotName::LegoModel, "tank");

        let directive = responder
            .respond(&TurnRequest::new("DialogCodeHook", "OrderLego", slots))
            .await
            .expect("directive");

        assert!(matches!(directive, TurnDirective::ElicitSlot { slot: SlotName::LegoSize, .. }));
    }

    #[tokio::test]
    async fn complete_slots_delegate_without_writing() {
        let store = Arc::new(CountingStore::default());
        let sink = InMemoryAuditSink::default();
        let responder = responder(store.clone(), sink.clone());

        let directive = responder
            .respond(&TurnRequest::new("DialogCodeHook", "OrderLego", tank_medium()))
            .await
            .expect("directive");

        assert_eq!(directive, TurnDirective::Delegate);
        assert!(store.orders().is_empty());
        assert_eq!(sink.events()[0].event_type, "turn.delegated");
    }

    #[tokio::test]
    async fn fulfillment_persists_once_and_closes() {
        let store = Arc::new(CountingStore::default());
        let sink = InMemoryAuditSink::default();
        let responder = responder(store.clone(), sink.clone());

        let directive = responder
            .respond(
                &TurnRequest::new("FulfillmentCodeHook", "OrderLego", tank_medium())
                    .in_session("session-7"),
            )
            .await
            .expect("directive");

        assert_eq!(
            directive,
            TurnDirective::Close { message: "I've placed your order".to_string() }
        );
        let orders = store.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].value(SlotName::LegoModel), Some("tank"));
        assert_eq!(orders[0].value(SlotName::LegoSize), Some("medium"));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "turn.closed");
        assert_eq!(events[0].session_id.as_deref(), Some("session-7"));
        assert_eq!(events[0].order_id.as_ref(), Some(&orders[0].id));
    }

    #[tokio::test]
    async fn identical_fulfillments_get_distinct_ids() {
        let store = Arc::new(CountingStore::default());
        let responder = responder(store.clone(), InMemoryAuditSink::default());
        let turn = TurnRequest::new("FulfillmentCodeHook", "OrderLego", tank_medium());

        responder.respond(&turn).await.expect("first");
        responder.respond(&turn).await.expect("second");

        let orders = store.orders();
        assert_eq!(orders.len(), 2);
        assert_ne!(orders[0].id, orders[1].id);
    }

    #[tokio::test]
    async fn failed_write_does_not_close() {
        let store = Arc::new(CountingStore::failing());
        let sink = InMemoryAuditSink::default();
        let responder = responder(store.clone(), sink.clone());

        let error = responder
            .respond(&TurnRequest::new("FulfillmentCodeHook", "OrderLego", tank_medium()))
            .await
            .expect_err("write fails");

        assert!(matches!(error, ApplicationError::Persistence(_)));
        assert!(store.orders().is_empty());
        let events = sink.events();
        assert_eq!(events[0].event_type, "turn.persist_failed");
        assert_eq!(events[0].outcome, AuditOutcome::Failed);
    }

    #[tokio::test]
    async fn unknown_reason_is_fatal() {
        let store = Arc::new(CountingStore::default());
        let sink = InMemoryAuditSink::default();
        let responder = responder(store.clone(), sink.clone());

        let error = responder
            .respond(&TurnRequest::new("Unknown", "OrderLego", tank_medium()))
            .await
            .expect_err("unsupported");

        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::UnsupportedInvocation {
                reason: "Unknown".to_string()
            })
        );
        assert!(store.orders().is_empty());
        assert_eq!(sink.events()[0].event_type, "turn.unsupported_invocation");
    }

    #[tokio::test]
    async fn fulfillment_message_is_configurable() {
        let responder = responder(Arc::new(CountingStore::default()), InMemoryAuditSink::default())
            .with_fulfillment_message("Your bricks are on the way");

        let directive = responder
            .respond(&TurnRequest::new("FulfillmentCodeHook", "OrderLego", tank_medium()))
            .await
            .expect("directive");

        assert_eq!(
            directive,
            TurnDirective::Close { message: "Your bricks are on the way".to_string() }
        );
    }
}
