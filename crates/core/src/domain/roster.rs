use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Snapshot of the workspace members the bot can name, including itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    self_id: String,
    self_name: String,
    members: HashMap<String, String>,
}

impl Roster {
    pub fn new(self_id: impl Into<String>, self_name: impl Into<String>) -> Self {
        let self_id = self_id.into();
        let self_name = self_name.into();
        let mut members = HashMap::new();
        members.insert(self_id.clone(), self_name.clone());
        Self { self_id, self_name, members }
    }

    pub fn with_member(
        mut self,
        user_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        self.insert(user_id, display_name);
        self
    }

    pub fn insert(&mut self, user_id: impl Into<String>, display_name: impl Into<String>) {
        let user_id = user_id.into();
        if user_id == self.self_id {
            return;
        }
        self.members.insert(user_id, display_name.into());
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn self_name(&self) -> &str {
        &self.self_name
    }

    pub fn display_name(&self, user_id: &str) -> Option<&str> {
        self.members.get(user_id).map(String::as_str)
    }

    /// Falls back to the raw id for users the roster has never seen.
    pub fn name_or_id<'a>(&'a self, user_id: &'a str) -> &'a str {
        self.display_name(user_id).unwrap_or(user_id)
    }

    /// True when the id is the bot itself or resolves to the bot's display name.
    pub fn resolves_to_self(&self, user_id: &str) -> bool {
        if user_id == self.self_id {
            return true;
        }
        self.display_name(user_id).is_some_and(|name| name.eq_ignore_ascii_case(&self.self_name))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
