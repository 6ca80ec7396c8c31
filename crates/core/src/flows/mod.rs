pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, GroupOrderFlow};
pub use states::{Intent, Reaction, RouteOutcome, Stage};
