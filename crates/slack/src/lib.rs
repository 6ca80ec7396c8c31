//! Slack plumbing for the garcon bot.
//!
//! - **Events** (`events`) - Events API payloads, the dispatcher and the message handler
//!   that feeds the conversation runtime
//! - **Transport** (`transport`) - envelope pump with reconnect backoff; envelopes arrive
//!   over a channel filled by the HTTP ingress
//! - **Signature** (`signature`) - `X-Slack-Signature` verification
//! - **Web API** (`web`) - `auth.test`, `users.list` and `chat.postMessage`
//!
//! ```text
//! POST /slack/events → verify → EnvelopeSender → EnvelopeRunner → EventDispatcher
//!                                                                     ↓
//!                         chat.postMessage ← MessageSink ← ConversationRuntime
//! ```

pub mod events;
pub mod signature;
pub mod transport;
pub mod web;

pub use events::{
    conversation_dispatcher, parse_callback, CallbackBody, EventDispatcher, MessageSink,
    SlackEnvelope, SlackEvent,
};
pub use transport::{
    ChannelTransport, EnvelopeRunner, EnvelopeSender, NoopTransport, ReconnectPolicy,
    TransportMode,
};
pub use web::SlackWebClient;
