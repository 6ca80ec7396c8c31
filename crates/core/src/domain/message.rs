use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub channel: ChannelId,
    pub author_id: String,
    pub text: String,
}

impl IncomingMessage {
    pub fn new(
        channel: impl Into<String>,
        author_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self { channel: ChannelId(channel.into()), author_id: author_id.into(), text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub channel: ChannelId,
    pub text: String,
}

impl OutgoingMessage {
    pub fn new(channel: ChannelId, text: impl Into<String>) -> Self {
        Self { channel, text: text.into() }
    }

    /// Empty replies are never handed to the transport.
    pub fn is_sendable(&self) -> bool {
        !self.text.trim().is_empty()
    }
}
