use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("could not open the envelope stream: {0}")]
    Connect(String),
    #[error("envelope stream read failed: {0}")]
    Receive(String),
    #[error("envelope could not be acknowledged: {0}")]
    Acknowledge(String),
    #[error("envelope stream did not close cleanly: {0}")]
    Disconnect(String),
    #[error("envelope stream is closed")]
    Closed,
}

/// Exponential backoff between stream sessions, capped at `max_delay`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Sessions opened after the first one fails.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Retries without sleeping.
    pub fn immediate(max_retries: u32) -> Self {
        Self { max_retries, initial_delay: Duration::ZERO, max_delay: Duration::ZERO }
    }

    fn delay_before(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry.min(16));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// A source of Slack envelopes. `next_envelope` yields `None` once the stream has ended.
#[async_trait]
pub trait EnvelopeTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Used when no ingress is configured: the stream is empty from the start.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl EnvelopeTransport for NoopTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// How envelopes reach the runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportMode {
    /// Nothing is received; the runner returns as soon as it connects.
    Noop,
    /// Envelopes are pushed in by the signed Events API endpoint.
    EventsApi,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::EventsApi => "events_api",
        }
    }
}

/// Hands verified envelopes from the HTTP ingress to a `ChannelTransport`.
#[derive(Clone, Debug)]
pub struct EnvelopeSender {
    queue: mpsc::Sender<SlackEnvelope>,
}

impl EnvelopeSender {
    /// Waits for queue space; fails once the transport has been disconnected.
    pub async fn send(&self, envelope: SlackEnvelope) -> Result<(), TransportError> {
        self.queue.send(envelope).await.map_err(|_| TransportError::Closed)
    }
}

/// Transport fed over an in-process queue. The stream ends once every sender is dropped.
pub struct ChannelTransport {
    queue: Mutex<mpsc::Receiver<SlackEnvelope>>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (Self, EnvelopeSender) {
        let (queue_tx, queue_rx) = mpsc::channel(capacity.max(1));
        (Self { queue: Mutex::new(queue_rx) }, EnvelopeSender { queue: queue_tx })
    }
}

#[async_trait]
impl EnvelopeTransport for ChannelTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(self.queue.lock().await.recv().await)
    }

    // The HTTP response is the acknowledgement.
    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.queue.lock().await.close();
        Ok(())
    }
}

/// Channel and author of a message envelope, for log correlation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Origin<'a> {
    channel_id: &'a str,
    user_id: &'a str,
}

impl<'a> Origin<'a> {
    fn of(envelope: &'a SlackEnvelope) -> Self {
        match &envelope.event {
            SlackEvent::Message(event) => {
                Self { channel_id: &event.channel_id, user_id: &event.user_id }
            }
            SlackEvent::Unsupported { .. } => Self { channel_id: "unknown", user_id: "unknown" },
        }
    }
}

/// Pulls envelopes off a transport, acknowledges them, and dispatches them one at a time.
pub struct EnvelopeRunner {
    transport: Arc<dyn EnvelopeTransport>,
    dispatcher: EventDispatcher,
    policy: ReconnectPolicy,
}

impl EnvelopeRunner {
    pub fn new(
        transport: Arc<dyn EnvelopeTransport>,
        dispatcher: EventDispatcher,
        policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, policy }
    }

    /// Runs until the stream ends. Transport failures are retried with backoff and, once
    /// retries run out, logged rather than returned so the rest of the process keeps serving.
    pub async fn start(&self) -> Result<()> {
        let mut retry = 0;
        loop {
            let Err(error) = self.pump(retry).await else {
                return Ok(());
            };

            if retry >= self.policy.max_retries {
                warn!(
                    event_name = "ingress.slack.transport_abandoned",
                    correlation_id = "transport",
                    retries = retry,
                    error = %error,
                    "envelope transport kept failing; no more messages will be received"
                );
                return Ok(());
            }

            let delay = self.policy.delay_before(retry);
            warn!(
                event_name = "ingress.slack.transport_failed",
                correlation_id = "transport",
                retry,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "envelope transport failed; reconnecting"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            retry += 1;
        }
    }

    async fn pump(&self, retry: u32) -> Result<(), TransportError> {
        self.transport.connect().await?;
        info!(
            event_name = "ingress.slack.transport_connected",
            correlation_id = "transport",
            retry,
            "envelope transport connected"
        );

        while let Some(envelope) = self.transport.next_envelope().await? {
            self.deliver(&envelope).await;
        }

        info!(
            event_name = "ingress.slack.transport_drained",
            correlation_id = "transport",
            "envelope stream ended"
        );
        self.transport.disconnect().await
    }

    async fn deliver(&self, envelope: &SlackEnvelope) {
        let origin = Origin::of(envelope);
        let correlation_id = envelope.envelope_id.as_str();
        info!(
            event_name = "ingress.slack.envelope_received",
            correlation_id,
            event_type = ?envelope.event.event_type(),
            channel_id = origin.channel_id,
            user_id = origin.user_id,
            "received slack envelope"
        );

        match self.transport.acknowledge(correlation_id).await {
            Ok(()) => debug!(event_name = "ingress.slack.ack_sent", correlation_id),
            Err(error) => warn!(
                event_name = "ingress.slack.ack_failed",
                correlation_id,
                error = %error,
                "envelope not acknowledged; dispatching anyway"
            ),
        }

        let context = EventContext { correlation_id: correlation_id.to_owned() };
        match self.dispatcher.dispatch(envelope, &context).await {
            Ok(HandlerResult::Responded(replies)) => debug!(
                event_name = "ingress.slack.replies_posted",
                correlation_id,
                channel_id = origin.channel_id,
                reply_count = replies.len(),
                "posted conversation replies"
            ),
            Ok(HandlerResult::Processed | HandlerResult::Ignored) => {}
            Err(error) => warn!(
                event_name = "ingress.slack.dispatch_failed",
                correlation_id,
                channel_id = origin.channel_id,
                user_id = origin.user_id,
                error = %error,
                "event dispatch failed; moving on to the next envelope"
            ),
        }
    }
}
