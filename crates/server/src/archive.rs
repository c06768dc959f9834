use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use brickbot_core::{
    archive::{ArchiveError, BlobStore, LogArchiver, LogSubscriptionEvent},
    errors::{ApplicationError, InterfaceError},
};
use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, warn};

use crate::response::{authorized, correlation_id, interface_error, unauthorized};

/// Blob store rooted at a local directory. Keys map to relative paths.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, ArchiveError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(ArchiveError::InvalidKey {
                key: key.to_string(),
                reason: "key must be a relative path without `..`".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), ArchiveError> {
        let path = self.resolve(key)?;
        let write_error = |error: std::io::Error| ArchiveError::Write {
            key: key.to_string(),
            message: error.to_string(),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }
        tokio::fs::write(&path, body).await.map_err(write_error)
    }
}

pub type SharedArchiver = Arc<LogArchiver<FsBlobStore>>;

#[derive(Clone)]
struct ArchiveState {
    archiver: SharedArchiver,
    api_token: Option<Arc<SecretString>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArchiveResponse {
    pub stored: Vec<String>,
}

/// Routes for log archival, guarded by the same bearer token as the code hook.
/// Nothing is mounted when archival is disabled, so `/logs` falls through to a 404.
pub fn router(archiver: Option<SharedArchiver>, api_token: Option<SecretString>) -> Router {
    match archiver {
        Some(archiver) => {
            let state = ArchiveState { archiver, api_token: api_token.map(Arc::new) };
            Router::new().route("/logs", post(archive_logs)).with_state(state)
        }
        None => Router::new(),
    }
}

async fn archive_logs(
    State(state): State<ArchiveState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = correlation_id(&headers);

    if !authorized(&headers, state.api_token.as_deref()) {
        warn!(
            event_name = "http.logs.unauthorized",
            correlation_id = %correlation_id,
            "rejecting log batch without a valid bearer token"
        );
        return unauthorized(&correlation_id);
    }

    let event: LogSubscriptionEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(error) => {
            return interface_error(InterfaceError::BadRequest {
                message: error.to_string(),
                correlation_id,
            });
        }
    };

    match state.archiver.archive(&event).await {
        Ok(stored) => {
            info!(
                event_name = "http.logs.archived",
                correlation_id = %correlation_id,
                stored = stored.len(),
                "log batch archived"
            );
            Json(ArchiveResponse { stored }).into_response()
        }
        Err(error) => {
            warn!(
                event_name = "http.logs.failed",
                correlation_id = %correlation_id,
                error = %error,
                "log batch archival failed"
            );
            let interface = match error {
                ArchiveError::Write { .. } => {
                    ApplicationError::from(error).into_interface(correlation_id)
                }
                other => InterfaceError::BadRequest { message: other.to_string(), correlation_id },
            };
            interface_error(interface)
        }
    }
}
