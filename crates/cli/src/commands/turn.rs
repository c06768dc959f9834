use std::sync::Arc;

use brickbot_core::{
    audit::InMemoryAuditSink,
    codehook::{build_response, CodeHookEvent, SessionState, WireIntent, WireSlot, WireSlots},
    config::AppConfig,
    dialog::{ConstraintTable, SlotValidator, TurnResponder},
    persistence::OrderStore,
};
use brickbot_db::{InMemoryOrderRepository, SqlOrderRepository};
use clap::Args;

use crate::commands::{load_config, open_pool, runtime, to_data, CommandResult, Failure};

pub const DEFAULT_INTENT: &str = "OrderLego";

#[derive(Debug, Clone, Args)]
pub struct TurnArgs {
    #[arg(long, help = "Invocation reason, e.g. DialogCodeHook or FulfillmentCodeHook")]
    pub reason: String,
    #[arg(long, default_value = DEFAULT_INTENT, help = "Intent name echoed in the response")]
    pub intent: String,
    #[arg(long = "slot", value_name = "NAME=VALUE", help = "Slot value; may be repeated")]
    pub slots: Vec<String>,
    #[arg(long, help = "Write orders to an in-memory store instead of the database")]
    pub dry_run: bool,
}

pub fn run(args: TurnArgs) -> CommandResult {
    let slots = match parse_slots(&args.slots) {
        Ok(slots) => slots,
        Err(message) => return CommandResult::failure("turn", "invalid_argument", message, 2),
    };
    let config = match load_config("turn") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("turn") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let event = CodeHookEvent {
        invocation_source: args.reason.clone(),
        session_id: None,
        input_transcript: None,
        session_state: SessionState {
            intent: WireIntent {
                name: args.intent.clone(),
                slots,
                state: None,
                confirmation_state: None,
            },
            session_attributes: None,
        },
    };

    let result = runtime.block_on(replay(&config, &event, args.dry_run));

    match result {
        Ok(response) => CommandResult::success_with_data(
            "turn",
            if args.dry_run { "turn answered (dry run)" } else { "turn answered" },
            Some(response),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("turn", error_class, message, exit_code)
        }
    }
}

async fn replay(
    config: &AppConfig,
    event: &CodeHookEvent,
    dry_run: bool,
) -> Result<serde_json::Value, Failure> {
    let pool = if dry_run { None } else { Some(open_pool(config).await?) };
    let store: Arc<dyn OrderStore> = match &pool {
        Some(pool) => Arc::new(SqlOrderRepository::new(pool.clone())),
        None => Arc::new(InMemoryOrderRepository::default()),
    };

    let responder = TurnResponder::new(
        SlotValidator::new(ConstraintTable::default()),
        store,
        Arc::new(InMemoryAuditSink::default()),
    )
    .with_fulfillment_message(config.dialog.fulfillment_message.clone());

    let outcome = responder.respond(&event.to_turn()).await;
    if let Some(pool) = pool {
        pool.close().await;
    }

    let directive = outcome.map_err(|error| ("turn_failed", error.to_string(), 6u8))?;
    to_data(build_response(event, &directive))
}

/// Parses repeated `Name=value` arguments. Names are passed through unchanged
/// so unknown slots are echoed like any other wire slot.
pub fn parse_slots(raw: &[String]) -> Result<WireSlots, String> {
    let mut slots = WireSlots::new();
    for entry in raw {
        let Some((name, value)) = entry.split_once('=') else {
            return Err(format!("slot `{entry}` must look like Name=value"));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("slot `{entry}` has an empty name"));
        }
        slots.insert(name.to_string(), Some(WireSlot::from_original(value)));
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::parse_slots;

    #[test]
    fn parses_name_value_pairs() {
        let slots = parse_slots(&["LegoModel=Tank".to_string(), "LegoSize= small".to_string()])
            .expect("valid slots");

        assert_eq!(slots.len(), 2);
        let model = slots["LegoModel"].as_ref().and_then(|slot| slot.original_value());
        assert_eq!(model, Some("Tank"));
    }

    #[test]
    fn rejects_missing_separator_and_empty_name() {
        assert!(parse_slots(&["LegoModel".to_string()]).is_err());
        assert!(parse_slots(&["=tank".to_string()]).is_err());
    }

    #[test]
    fn empty_value_is_kept_as_blank_slot() {
        let slots = parse_slots(&["LegoSize=".to_string()]).expect("valid slots");
        let size = slots["LegoSize"].as_ref().and_then(|slot| slot.original_value());
        assert_eq!(size, Some(""));
    }
}
