use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use garcon_agent::runtime::ConversationRuntime;
use garcon_slack::transport::TransportMode;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::ingress::{self, IngressState};

#[derive(Clone)]
pub struct HealthState {
    runtime: Arc<ConversationRuntime>,
    transport_mode: TransportMode,
}

impl HealthState {
    pub fn new(runtime: Arc<ConversationRuntime>, transport_mode: TransportMode) -> Self {
        Self { runtime, transport_mode }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub transport: HealthCheck,
    pub active_sessions: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Serves `/health`, plus `/slack/events` when the Events API ingress is enabled,
/// until `shutdown` fires.
pub async fn spawn(
    bind_address: &str,
    port: u16,
    state: HealthState,
    ingress: Option<IngressState>,
    shutdown: oneshot::Receiver<()>,
) -> std::io::Result<JoinHandle<()>> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    let mut app = router(state);
    if let Some(ingress) = ingress {
        app = app.merge(ingress::router(ingress));
    }

    info!(
        event_name = "system.http.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "http listener started"
    );

    Ok(tokio::spawn(async move {
        let served = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown.await;
        });
        if let Err(error) = served.await {
            error!(
                event_name = "system.http.error",
                correlation_id = "bootstrap",
                error = %error,
                "http listener terminated unexpectedly"
            );
        }
    }))
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let transport = transport_check(state.transport_mode);
    let ready = transport.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!(
                "garcon-server runtime initialized with {} known users",
                state.runtime.roster().len()
            ),
        },
        transport,
        active_sessions: state.runtime.sessions().active_count().await,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn transport_check(mode: TransportMode) -> HealthCheck {
    match mode {
        TransportMode::EventsApi => HealthCheck {
            status: "ready",
            detail: "slack events api ingress mounted at /slack/events".to_owned(),
        },
        TransportMode::Noop => HealthCheck {
            status: "degraded",
            detail: "no slack signing secret configured; no messages will arrive".to_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use garcon_agent::collaborators::Collaborators;
    use garcon_agent::conversation::IntentClassifier;
    use garcon_agent::runtime::{ConversationRuntime, RuntimeSettings};
    use garcon_core::domain::message::IncomingMessage;
    use garcon_core::domain::roster::Roster;
    use garcon_slack::transport::TransportMode;

    use crate::health::{health, HealthState};

    fn runtime() -> Arc<ConversationRuntime> {
        let roster = Roster::new("G4RC0NB0T", "garcon").with_member("U1", "brainfart");
        Arc::new(ConversationRuntime::new(
            IntentClassifier::new().expect("patterns compile"),
            roster.clone(),
            Collaborators::offline(roster),
            RuntimeSettings::default(),
        ))
    }

    #[tokio::test]
    async fn health_is_ready_with_events_api_and_counts_active_sessions() {
        let runtime = runtime();
        runtime.handle_message(&IncomingMessage::new("C1", "U1", "oh, garçon?")).await;
        runtime.handle_message(&IncomingMessage::new("C2", "U1", "lunch?")).await;

        let (status, Json(payload)) =
            health(State(HealthState::new(runtime, TransportMode::EventsApi))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.transport.status, "ready");
        assert_eq!(payload.service.status, "ready");
        assert_eq!(payload.active_sessions, 1);
    }

    #[tokio::test]
    async fn health_is_degraded_without_a_transport() {
        let (status, Json(payload)) =
            health(State(HealthState::new(runtime(), TransportMode::Noop))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.transport.status, "degraded");
        assert_eq!(payload.service.status, "ready");
        assert_eq!(payload.active_sessions, 0);
    }
}
