use serde::{Deserialize, Serialize};

use crate::domain::order::OrderLedger;
use crate::domain::restaurant::Restaurant;
use crate::flows::states::Stage;

/// State of one group-order conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub stage: Stage,
    pub self_id: String,
    pub interlocutor_id: Option<String>,
    pub requested_restaurant: Option<String>,
    pub restaurant: Option<Restaurant>,
    pub ledger: OrderLedger,
}

impl Session {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            stage: Stage::Uninitiated,
            self_id: self_id.into(),
            interlocutor_id: None,
            requested_restaurant: None,
            restaurant: None,
            ledger: OrderLedger::new(),
        }
    }

    /// Back to the zero-value conversation. `self_id` survives.
    pub fn reset(&mut self) {
        self.stage = Stage::Uninitiated;
        self.interlocutor_id = None;
        self.requested_restaurant = None;
        self.restaurant = None;
        self.ledger.clear();
    }

    /// Drops the order and restaurant but keeps the interlocutor.
    pub fn start_over(&mut self) {
        self.requested_restaurant = None;
        self.restaurant = None;
        self.ledger.clear();
        self.stage = Stage::Ordering;
    }

    pub fn is_interlocutor(&self, user_id: &str) -> bool {
        self.interlocutor_id.as_deref() == Some(user_id)
    }

    /// Restaurant as the group named it; `None` after a start-over.
    pub fn restaurant_label(&self) -> Option<&str> {
        self.requested_restaurant.as_deref().filter(|name| !name.trim().is_empty())
    }
}
