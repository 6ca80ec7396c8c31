use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use garcon_agent::runtime::ConversationRuntime;
use garcon_core::domain::message::{IncomingMessage, OutgoingMessage};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "channel")]
    pub channel_id: String,
    #[serde(rename = "user", default)]
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    /// Edits, joins and bot posts carry a subtype; plain user messages do not.
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

impl MessageEvent {
    pub fn to_incoming(&self) -> IncomingMessage {
        IncomingMessage::new(self.channel_id.clone(), self.user_id.clone(), self.text.clone())
    }
}

/// Body of an Events API request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackBody {
    UrlVerification { challenge: String },
    Event(SlackEnvelope),
    Ignored { callback_type: String },
}

#[derive(Debug, Error)]
pub enum EnvelopeParseError {
    #[error("events api body is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("events api body is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct RawCallback {
    #[serde(rename = "type")]
    callback_type: String,
    challenge: Option<String>,
    event_id: Option<String>,
    event: Option<serde_json::Value>,
}

pub fn parse_callback(body: &[u8]) -> Result<CallbackBody, EnvelopeParseError> {
    let raw: RawCallback = serde_json::from_slice(body)?;
    match raw.callback_type.as_str() {
        "url_verification" => {
            let challenge = raw.challenge.ok_or(EnvelopeParseError::MissingField("challenge"))?;
            Ok(CallbackBody::UrlVerification { challenge })
        }
        "event_callback" => {
            let envelope_id = raw.event_id.ok_or(EnvelopeParseError::MissingField("event_id"))?;
            let event = raw.event.ok_or(EnvelopeParseError::MissingField("event"))?;
            Ok(CallbackBody::Event(SlackEnvelope { envelope_id, event: parse_event(event)? }))
        }
        _ => Ok(CallbackBody::Ignored { callback_type: raw.callback_type }),
    }
}

fn parse_event(event: serde_json::Value) -> Result<SlackEvent, EnvelopeParseError> {
    let event_type = event
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(EnvelopeParseError::MissingField("event.type"))?
        .to_owned();

    if event_type != "message" {
        return Ok(SlackEvent::Unsupported { event_type });
    }
    Ok(SlackEvent::Message(serde_json::from_value(event)?))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<OutgoingMessage>),
    Processed,
    Ignored,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("chat transport rejected the message: {0}")]
    Rejected(String),
    #[error("chat transport unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Sink(#[from] SinkError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

/// Where replies go once the runtime has produced them.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn post(&self, message: &OutgoingMessage) -> Result<(), SinkError>;
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn conversation_dispatcher(
    runtime: Arc<ConversationRuntime>,
    sink: Arc<dyn MessageSink>,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(runtime, sink));
    dispatcher
}

/// Feeds channel messages into the conversation runtime and posts its replies in order.
pub struct MessageHandler {
    runtime: Arc<ConversationRuntime>,
    sink: Arc<dyn MessageSink>,
}

impl MessageHandler {
    pub fn new(runtime: Arc<ConversationRuntime>, sink: Arc<dyn MessageSink>) -> Self {
        Self { runtime, sink }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if let Some(subtype) = &event.subtype {
            debug!(
                event_name = "ingress.slack.message_skipped",
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel_id,
                subtype = %subtype,
                "message subtype is not conversational"
            );
            return Ok(HandlerResult::Ignored);
        }

        let replies = self
            .runtime
            .handle_message_with_correlation(&event.to_incoming(), &ctx.correlation_id)
            .await;
        if replies.is_empty() {
            return Ok(HandlerResult::Processed);
        }

        for reply in &replies {
            self.sink.post(reply).await?;
        }
        Ok(HandlerResult::Responded(replies))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use garcon_agent::collaborators::Collaborators;
    use garcon_agent::conversation::IntentClassifier;
    use garcon_agent::runtime::{ConversationRuntime, RuntimeSettings};
    use garcon_core::domain::message::OutgoingMessage;
    use garcon_core::domain::roster::Roster;
    use tokio::sync::Mutex;

    use super::{
        conversation_dispatcher, parse_callback, CallbackBody, EventContext, EventDispatcher,
        EventHandlerError, HandlerResult, MessageEvent, MessageSink, SinkError, SlackEnvelope,
        SlackEvent,
    };

    #[derive(Default)]
    struct RecordingSink {
        posted: Mutex<Vec<OutgoingMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn post(&self, message: &OutgoingMessage) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Unavailable("workspace unreachable".to_owned()));
            }
            self.posted.lock().await.push(message.clone());
            Ok(())
        }
    }

    fn runtime() -> Arc<ConversationRuntime> {
        let roster = Roster::new("G4RC0NB0T", "garcon").with_member("U1", "brainfart");
        let classifier = IntentClassifier::new().expect("patterns compile");
        Arc::new(ConversationRuntime::new(
            classifier,
            roster.clone(),
            Collaborators::offline(roster),
            RuntimeSettings::default(),
        ))
    }

    fn message(text: &str, subtype: Option<&str>) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: "Ev01".to_owned(),
            event: SlackEvent::Message(MessageEvent {
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned(),
                text: text.to_owned(),
                subtype: subtype.map(str::to_owned),
                ts: Some("1730000000.1000".to_owned()),
            }),
        }
    }

    #[tokio::test]
    async fn greeting_is_answered_through_the_sink() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = conversation_dispatcher(runtime(), sink.clone());
        assert_eq!(dispatcher.handler_count(), 1);

        let result = dispatcher
            .dispatch(&message("oh, garçon?", None), &EventContext::default())
            .await
            .expect("dispatch");

        assert!(matches!(result, HandlerResult::Responded(ref replies) if replies.len() == 1));
        let posted = sink.posted.lock().await;
        assert_eq!(posted[0].text, "Hi, @brainfart! Would you like to place an order?");
    }

    #[tokio::test]
    async fn edited_messages_are_ignored() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = conversation_dispatcher(runtime(), sink.clone());

        let result = dispatcher
            .dispatch(&message("oh, garçon?", Some("message_changed")), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
        assert!(sink.posted.lock().await.is_empty());
    }

    #[tokio::test]
    async fn chatter_is_processed_without_replies() {
        let dispatcher = conversation_dispatcher(runtime(), Arc::new(RecordingSink::default()));

        let result = dispatcher
            .dispatch(&message("lunch soon?", None), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Processed);
    }

    #[tokio::test]
    async fn sink_failures_surface_as_handler_errors() {
        let sink = Arc::new(RecordingSink { fail: true, ..RecordingSink::default() });
        let dispatcher = conversation_dispatcher(runtime(), sink);

        let result =
            dispatcher.dispatch(&message("oh, garçon?", None), &EventContext::default()).await;

        assert_eq!(
            result.err().map(|error| error.to_string()),
            Some(
                EventHandlerError::Sink(SinkError::Unavailable("workspace unreachable".to_owned()))
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();
        assert_eq!(dispatcher.handler_count(), 0);
        let envelope = SlackEnvelope {
            envelope_id: "Ev02".to_owned(),
            event: SlackEvent::Unsupported { event_type: "reaction_added".to_owned() },
        };

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[test]
    fn parses_url_verification_and_message_callbacks() {
        let verification = parse_callback(br#"{"type":"url_verification","challenge":"3eZbrw1a"}"#)
            .expect("parse verification");
        assert_eq!(
            verification,
            CallbackBody::UrlVerification { challenge: "3eZbrw1a".to_owned() }
        );

        let callback = parse_callback(
            br#"{"type":"event_callback","event_id":"Ev08MFMKH6",
                "event":{"type":"message","channel":"C1N3MEUMN","user":"U1",
                         "text":"oh, garcon?","ts":"1.2"}}"#,
        )
        .expect("parse message");
        let CallbackBody::Event(envelope) = callback else {
            panic!("expected an event callback");
        };
        assert_eq!(envelope.envelope_id, "Ev08MFMKH6");
        let SlackEvent::Message(event) = envelope.event else {
            panic!("expected a message event");
        };
        assert_eq!(event.channel_id, "C1N3MEUMN");
        assert_eq!(event.subtype, None);
    }

    #[test]
    fn non_message_events_are_unsupported() {
        let callback = parse_callback(
            br#"{"type":"event_callback","event_id":"Ev1","event":{"type":"reaction_added"}}"#,
        )
        .expect("parse");
        assert_eq!(
            callback,
            CallbackBody::Event(SlackEnvelope {
                envelope_id: "Ev1".to_owned(),
                event: SlackEvent::Unsupported { event_type: "reaction_added".to_owned() },
            })
        );
    }

    #[test]
    fn malformed_bodies_are_errors() {
        assert!(parse_callback(b"not json").is_err());
        assert!(parse_callback(br#"{"type":"event_callback","event_id":"Ev1"}"#).is_err());
    }
}
