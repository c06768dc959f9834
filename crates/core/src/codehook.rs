//! JSON contract between the conversational runtime and the code hook.
//!
//! Inbound events carry the invocation source and the intent with its slots;
//! outbound responses carry one dialog action plus an optional plain-text
//! message. Slots are echoed back exactly as received so the runtime keeps
//! whatever it has already resolved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::dialog::responder::{TurnDirective, TurnRequest};
use crate::domain::slot::{Slot, SlotName, SlotSet};

pub type WireSlots = BTreeMap<String, Option<WireSlot>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeHookEvent {
    pub invocation_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_transcript: Option<String>,
    pub session_state: SessionState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub intent: WireIntent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_attributes: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireIntent {
    pub name: String,
    #[serde(default)]
    pub slots: WireSlots,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<IntentState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_state: Option<String>,
}

/// One slot exactly as the runtime sent it. The payload is kept whole so that
/// list values, sub-slots and any field added later survive the echo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireSlot(pub Value);

impl WireSlot {
    pub fn from_original(value: impl Into<String>) -> Self {
        Self(json!({
            "shape": "Scalar",
            "value": { "originalValue": value.into() }
        }))
    }

    /// The transcribed text the user actually said.
    pub fn original_value(&self) -> Option<&str> {
        self.0.pointer("/value/originalValue")?.as_str()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentState {
    InProgress,
    Waiting,
    ReadyForFulfillment,
    FulfillmentInProgress,
    Fulfilled,
    Failed,
    /// Any state this handler does not know about. Inbound only.
    #[serde(other)]
    Unrecognized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogActionType {
    ElicitSlot,
    Delegate,
    Close,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogAction {
    #[serde(rename = "type")]
    pub action_type: DialogActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_to_elicit: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSessionState {
    pub dialog_action: DialogAction,
    pub intent: WireIntent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub content_type: String,
    pub content: String,
}

impl WireMessage {
    pub fn plain_text(content: impl Into<String>) -> Self {
        Self { content_type: "PlainText".to_string(), content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeHookResponse {
    pub session_state: ResponseSessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<WireMessage>>,
}

impl CodeHookEvent {
    /// Known slots only. Unknown wire slot names are left to the runtime.
    pub fn slot_set(&self) -> SlotSet {
        let mut slots = SlotSet::new();
        for (name, wire) in &self.session_state.intent.slots {
            let Ok(slot_name) = name.parse::<SlotName>() else {
                debug!(slot = %name, "ignoring slot outside the order schema");
                continue;
            };
            let raw = wire.as_ref().and_then(WireSlot::original_value).map(str::to_string);
            slots.insert(Slot { name: slot_name, raw });
        }
        slots
    }

    pub fn to_turn(&self) -> TurnRequest {
        let turn = TurnRequest::new(
            self.invocation_source.clone(),
            self.session_state.intent.name.clone(),
            self.slot_set(),
        );
        match &self.session_id {
            Some(session_id) => turn.in_session(session_id.clone()),
            None => turn,
        }
    }
}

/// Encodes a directive for the runtime, echoing the event's intent name and slots.
pub fn build_response(event: &CodeHookEvent, directive: &TurnDirective) -> CodeHookResponse {
    let (action_type, slot_to_elicit, state, message) = match directive {
        TurnDirective::ElicitSlot { slot, message } => (
            DialogActionType::ElicitSlot,
            Some(slot.as_str().to_string()),
            IntentState::InProgress,
            Some(message.clone()),
        ),
        TurnDirective::Delegate => {
            (DialogActionType::Delegate, None, IntentState::InProgress, None)
        }
        TurnDirective::Close { message } => {
            (DialogActionType::Close, None, IntentState::Fulfilled, Some(message.clone()))
        }
    };

    CodeHookResponse {
        session_state: ResponseSessionState {
            dialog_action: DialogAction { action_type, slot_to_elicit },
            intent: WireIntent {
                name: event.session_state.intent.name.clone(),
                slots: event.session_state.intent.slots.clone(),
                state: Some(state),
                confirmation_state: None,
            },
        },
        messages: message.map(|content| vec![WireMessage::plain_text(content)]),
    }
}
