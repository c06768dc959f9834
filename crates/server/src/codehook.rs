use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use brickbot_core::{
    codehook::{build_response, CodeHookEvent},
    dialog::TurnResponder,
    errors::InterfaceError,
};
use secrecy::SecretString;
use tracing::{info, warn};

use crate::response::{authorized, correlation_id, interface_error, unauthorized};

#[derive(Clone)]
pub struct CodeHookState {
    responder: Arc<TurnResponder>,
    api_token: Option<Arc<SecretString>>,
}

impl CodeHookState {
    pub fn new(responder: Arc<TurnResponder>, api_token: Option<SecretString>) -> Self {
        Self { responder, api_token: api_token.map(Arc::new) }
    }
}

pub fn router(state: CodeHookState) -> Router {
    Router::new().route("/codehook", post(handle_turn)).with_state(state)
}

async fn handle_turn(
    State(state): State<CodeHookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = correlation_id(&headers);

    if !authorized(&headers, state.api_token.as_deref()) {
        warn!(
            event_name = "http.codehook.unauthorized",
            correlation_id = %correlation_id,
            "rejecting code hook call without a valid bearer token"
        );
        return unauthorized(&correlation_id);
    }

    let event: CodeHookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(error) => {
            warn!(
                event_name = "http.codehook.malformed",
                correlation_id = %correlation_id,
                error = %error,
                "code hook payload did not parse"
            );
            return interface_error(InterfaceError::BadRequest {
                message: error.to_string(),
                correlation_id,
            });
        }
    };

    let turn = event.to_turn().with_correlation_id(correlation_id.clone());
    match state.responder.respond(&turn).await {
        Ok(directive) => {
            info!(
                event_name = "http.codehook.responded",
                correlation_id = %correlation_id,
                dialog_action = directive.kind(),
                "code hook turn answered"
            );
            Json(build_response(&event, &directive)).into_response()
        }
        Err(error) => {
            warn!(
                event_name = "http.codehook.failed",
                correlation_id = %correlation_id,
                error = %error,
                "code hook turn failed"
            );
            interface_error(error.into_interface(correlation_id))
        }
    }
}
