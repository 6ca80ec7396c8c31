use garcon_core::domain::message::{IncomingMessage, OutgoingMessage};

use crate::collaborators::ChannelAllowList;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundDecision {
    Accept,
    Discard { reason_code: &'static str },
}

/// Checks run around the dialogue engine: before classification and before transport.
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageGuard;

impl MessageGuard {
    pub fn evaluate_inbound(&self, message: &IncomingMessage, self_id: &str) -> InboundDecision {
        if message.author_id.trim().is_empty() {
            return InboundDecision::Discard { reason_code: "empty_author" };
        }
        if message.author_id == self_id {
            return InboundDecision::Discard { reason_code: "self_authored" };
        }
        InboundDecision::Accept
    }

    /// Drops blank replies and replies to channels the allow-list refuses.
    pub fn filter_outbound<A>(
        &self,
        replies: Vec<OutgoingMessage>,
        allow_list: &A,
    ) -> Vec<OutgoingMessage>
    where
        A: ChannelAllowList + ?Sized,
    {
        replies
            .into_iter()
            .filter(|reply| reply.is_sendable() && allow_list.allows(&reply.channel))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use garcon_core::domain::message::{ChannelId, IncomingMessage, OutgoingMessage};

    use super::{InboundDecision, MessageGuard};
    use crate::collaborators::StaticAllowList;

    #[test]
    fn messages_from_the_bot_or_nobody_are_discarded() {
        let guard = MessageGuard;
        assert_eq!(
            guard.evaluate_inbound(&IncomingMessage::new("C1", "G4RC0NB0T", "hi"), "G4RC0NB0T"),
            InboundDecision::Discard { reason_code: "self_authored" }
        );
        assert_eq!(
            guard.evaluate_inbound(&IncomingMessage::new("C1", "", "oh, garçon?"), "G4RC0NB0T"),
            InboundDecision::Discard { reason_code: "empty_author" }
        );
        assert_eq!(
            guard.evaluate_inbound(&IncomingMessage::new("C1", "LOLWTFBBQ", "hi"), "G4RC0NB0T"),
            InboundDecision::Accept
        );
    }

    #[test]
    fn outbound_filter_drops_blank_and_disallowed_replies() {
        let allowed = ChannelId("C1".to_owned());
        let blocked = ChannelId("C2".to_owned());
        let replies = vec![
            OutgoingMessage::new(allowed.clone(), "Is that correct?"),
            OutgoingMessage::new(allowed.clone(), "   "),
            OutgoingMessage::new(blocked, "Alright, then!"),
        ];

        let sent = MessageGuard.filter_outbound(replies, &StaticAllowList::new(["C1"]));
        assert_eq!(sent, vec![OutgoingMessage::new(allowed, "Is that correct?")]);
    }
}
