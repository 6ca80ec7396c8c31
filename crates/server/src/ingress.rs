use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use garcon_slack::events::{parse_callback, CallbackBody, EnvelopeParseError};
use garcon_slack::signature::{verify_request, SignatureError};
use garcon_slack::transport::EnvelopeSender;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

#[derive(Clone)]
pub struct IngressState {
    signing_secret: SecretString,
    sender: EnvelopeSender,
    clock: fn() -> i64,
}

impl IngressState {
    pub fn new(signing_secret: SecretString, sender: EnvelopeSender) -> Self {
        Self { signing_secret, sender, clock: unix_now }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }
}

fn unix_now() -> i64 {
    Utc::now().timestamp()
}

#[derive(Debug, PartialEq, Eq)]
pub enum IngressReply {
    Challenge(String),
    Queued { envelope_id: String },
    Ignored,
}

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Parse(#[from] EnvelopeParseError),
    #[error("envelope queue is closed")]
    QueueClosed,
}

impl IngressError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingHeader(_) | Self::Signature(_) => StatusCode::UNAUTHORIZED,
            Self::Parse(_) => StatusCode::BAD_REQUEST,
            Self::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize)]
struct ChallengeBody {
    challenge: String,
}

impl IntoResponse for IngressReply {
    fn into_response(self) -> Response {
        match self {
            Self::Challenge(challenge) => Json(ChallengeBody { challenge }).into_response(),
            Self::Queued { .. } | Self::Ignored => StatusCode::OK.into_response(),
        }
    }
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

pub fn router(state: IngressState) -> Router {
    Router::new().route("/slack/events", post(slack_events)).with_state(state)
}

pub async fn slack_events(
    State(state): State<IngressState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<IngressReply, IngressError> {
    let result = accept_callback(&state, &headers, &body).await;
    if let Err(error) = &result {
        warn!(
            event_name = "ingress.slack.request_rejected",
            correlation_id = "ingress",
            status = error.status_code().as_u16(),
            error = %error,
            "slack events request rejected"
        );
    }
    result
}

/// Verifies the request signature, then answers challenges or queues the envelope.
pub async fn accept_callback(
    state: &IngressState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<IngressReply, IngressError> {
    let timestamp = header(headers, TIMESTAMP_HEADER)?;
    let signature = header(headers, SIGNATURE_HEADER)?;
    verify_request(
        state.signing_secret.expose_secret().as_bytes(),
        timestamp,
        body,
        signature,
        (state.clock)(),
    )?;

    match parse_callback(body)? {
        CallbackBody::UrlVerification { challenge } => Ok(IngressReply::Challenge(challenge)),
        CallbackBody::Event(envelope) => {
            let envelope_id = envelope.envelope_id.clone();
            state.sender.send(envelope).await.map_err(|_| IngressError::QueueClosed)?;
            debug!(
                event_name = "ingress.slack.envelope_queued",
                correlation_id = %envelope_id,
                "queued slack envelope"
            );
            Ok(IngressReply::Queued { envelope_id })
        }
        CallbackBody::Ignored { callback_type } => {
            debug!(
                event_name = "ingress.slack.callback_ignored",
                correlation_id = "ingress",
                callback_type = %callback_type,
                "ignoring slack callback"
            );
            Ok(IngressReply::Ignored)
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, IngressError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(IngressError::MissingHeader(name))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Bytes,
        extract::State,
        http::{HeaderMap, HeaderValue, StatusCode},
        response::IntoResponse,
    };
    use garcon_slack::events::SlackEvent;
    use garcon_slack::signature::sign_request;
    use garcon_slack::transport::{ChannelTransport, EnvelopeTransport};
    use secrecy::SecretString;

    use super::{
        accept_callback, slack_events, IngressError, IngressReply, IngressState,
        SIGNATURE_HEADER, TIMESTAMP_HEADER,
    };

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const NOW: i64 = 1_730_000_000;

    fn fixed_clock() -> i64 {
        NOW
    }

    fn state() -> (IngressState, ChannelTransport) {
        let (transport, sender) = ChannelTransport::new(8);
        let secret = SecretString::from(SECRET.to_owned());
        let state = IngressState::new(secret, sender).with_clock(fixed_clock);
        (state, transport)
    }

    fn signed_headers(body: &[u8], timestamp: i64) -> HeaderMap {
        let timestamp = timestamp.to_string();
        let signature = sign_request(SECRET.as_bytes(), &timestamp, body).expect("sign");
        let mut headers = HeaderMap::new();
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_str(&timestamp).expect("header"));
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature).expect("header"));
        headers
    }

    #[tokio::test]
    async fn answers_url_verification_challenges() {
        let (state, _transport) = state();
        let body = br#"{"type":"url_verification","challenge":"3eZbrw1a"}"#;

        let reply = accept_callback(&state, &signed_headers(body, NOW), body).await.expect("ok");

        assert_eq!(reply, IngressReply::Challenge("3eZbrw1a".to_owned()));
    }

    #[tokio::test]
    async fn queues_signed_message_events_for_the_runner() {
        let (state, transport) = state();
        let body = br#"{"type":"event_callback","event_id":"Ev42",
            "event":{"type":"message","channel":"C1","user":"U1","text":"oh, garcon?"}}"#;

        let reply = accept_callback(&state, &signed_headers(body, NOW - 30), body).await;
        assert_eq!(
            reply.expect("queued"),
            IngressReply::Queued { envelope_id: "Ev42".to_owned() }
        );

        let envelope = transport.next_envelope().await.expect("receive").expect("envelope");
        assert_eq!(envelope.envelope_id, "Ev42");
        assert!(matches!(envelope.event, SlackEvent::Message(ref event) if event.user_id == "U1"));
    }

    #[tokio::test]
    async fn rejects_unsigned_forged_and_stale_requests() {
        let (state, _transport) = state();
        let body = br#"{"type":"url_verification","challenge":"x"}"#;

        let missing = accept_callback(&state, &HeaderMap::new(), body).await;
        assert!(matches!(missing, Err(IngressError::MissingHeader(TIMESTAMP_HEADER))));

        let forged = accept_callback(&state, &signed_headers(b"{}", NOW), body).await;
        assert!(matches!(forged, Err(IngressError::Signature(_))));

        let stale = accept_callback(&state, &signed_headers(body, NOW - 3_600), body).await;
        assert!(matches!(stale, Err(IngressError::Signature(_))));
    }

    #[tokio::test]
    async fn handler_maps_errors_to_status_codes() {
        let (state, transport) = state();
        let body = b"not json";

        let malformed = slack_events(
            State(state.clone()),
            signed_headers(body, NOW),
            Bytes::from_static(body),
        )
        .await
        .into_response();
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

        let unsigned = slack_events(State(state.clone()), HeaderMap::new(), Bytes::new())
            .await
            .into_response();
        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

        transport.disconnect().await.expect("disconnect");
        let event = br#"{"type":"event_callback","event_id":"Ev9",
            "event":{"type":"message","channel":"C1","user":"U1","text":"hi"}}"#;
        let closed =
            slack_events(State(state), signed_headers(event, NOW), Bytes::from_static(event))
                .await
                .into_response();
        assert_eq!(closed.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_callback_types_are_acknowledged() {
        let (state, _transport) = state();
        let body = br#"{"type":"app_rate_limited","minute_rate_limited":1518467820}"#;

        let reply = accept_callback(&state, &signed_headers(body, NOW), body).await.expect("ok");
        assert_eq!(reply, IngressReply::Ignored);
    }
}
