pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::message::{ChannelId, IncomingMessage, OutgoingMessage};
pub use domain::order::OrderLedger;
pub use domain::restaurant::{DeliveryConfirmation, DeliveryRequest, Restaurant};
pub use domain::roster::Roster;
pub use domain::session::Session;
pub use errors::{Collaborator, CollaboratorError};
pub use flows::{FlowDefinition, FlowEngine, GroupOrderFlow, Intent, Reaction, RouteOutcome, Stage};
