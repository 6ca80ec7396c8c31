use std::fmt;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collaborator {
    Identity,
    RestaurantLookup,
    Delivery,
    ChatTransport,
}

impl Collaborator {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Identity => "identity resolver",
            Self::RestaurantLookup => "restaurant lookup",
            Self::Delivery => "delivery service",
            Self::ChatTransport => "chat transport",
        }
    }
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{collaborator} timed out after {after_secs}s")]
    Timeout { collaborator: Collaborator, after_secs: u64 },
    #[error("{collaborator} unavailable: {message}")]
    Unavailable { collaborator: Collaborator, message: String },
    #[error("{collaborator} rejected the request: {message}")]
    Rejected { collaborator: Collaborator, message: String },
}

impl CollaboratorError {
    pub fn unavailable(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self::Unavailable { collaborator, message: message.into() }
    }

    pub fn rejected(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self::Rejected { collaborator, message: message.into() }
    }

    pub fn collaborator(&self) -> Collaborator {
        match self {
            Self::Timeout { collaborator, .. }
            | Self::Unavailable { collaborator, .. }
            | Self::Rejected { collaborator, .. } => *collaborator,
        }
    }

    /// Chat-safe explanation; transport details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout { collaborator, .. } => {
                format!("the {collaborator} took too long to answer")
            }
            Self::Unavailable { collaborator, .. } => {
                format!("the {collaborator} is unreachable right now")
            }
            Self::Rejected { collaborator, message } => {
                format!("the {collaborator} said \"{message}\"")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Collaborator, CollaboratorError};

    #[test]
    fn timeout_message_hides_duration_from_users() {
        let error = CollaboratorError::Timeout { collaborator: Collaborator::Delivery, after_secs: 10 };
        assert_eq!(error.to_string(), "delivery service timed out after 10s");
        assert_eq!(error.user_message(), "the delivery service took too long to answer");
    }

    #[test]
    fn unavailable_message_hides_transport_detail() {
        let error = CollaboratorError::unavailable(
            Collaborator::RestaurantLookup,
            "connection refused (os error 111)",
        );
        assert!(!error.user_message().contains("os error"));
        assert_eq!(error.collaborator(), Collaborator::RestaurantLookup);
    }

    #[test]
    fn rejection_message_is_quoted() {
        let error = CollaboratorError::rejected(Collaborator::Delivery, "address out of range");
        assert_eq!(error.user_message(), "the delivery service said \"address out of range\"");
    }
}
