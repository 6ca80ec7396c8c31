use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-participant order items keyed by user id. One item per user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLedger {
    items: BTreeMap<String, String>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `item` for `user_id`, returning the item it replaced.
    pub fn add_item(
        &mut self,
        user_id: impl Into<String>,
        item: impl Into<String>,
    ) -> Option<String> {
        self.items.insert(user_id.into(), item.into())
    }

    pub fn item_for(&self, user_id: &str) -> Option<&str> {
        self.items.get(user_id).map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(user, item)| (user.as_str(), item.as_str()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// One `"<Name>: <item>"` line per entry, sorted, trailing whitespace trimmed.
    pub fn manifest<'a, F>(&'a self, display_name: F) -> String
    where
        F: Fn(&'a str) -> &'a str,
    {
        let mut lines = self
            .entries()
            .map(|(user, item)| format!("{}: {}", capitalize(display_name(user)), item))
            .collect::<Vec<_>>();
        lines.sort();
        lines.join("\n").trim_end().to_owned()
    }

    /// The restaurant clause is left out when no restaurant is known.
    pub fn status_summary<'a, F>(&'a self, restaurant: Option<&str>, display_name: F) -> String
    where
        F: Fn(&'a str) -> &'a str,
    {
        let from = restaurant.map(|name| format!(" from {name}")).unwrap_or_default();
        format!("Here's what I have for your order{from}:\n```\n{}\n```", self.manifest(display_name))
    }
}

pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{capitalize, OrderLedger};

    #[test]
    fn last_write_wins_per_user() {
        let mut ledger = OrderLedger::new();
        assert_eq!(ledger.add_item("bob", "burger"), None);
        assert_eq!(ledger.add_item("bob", "poutine"), Some("burger".to_owned()));

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.item_for("bob"), Some("poutine"));
    }

    #[test]
    fn summary_capitalizes_names_and_sorts_lines() {
        let mut ledger = OrderLedger::new();
        ledger.add_item("U2", "tuna melt");
        ledger.add_item("U1", "a peach melba");

        let summary = ledger.status_summary(Some("the Chili's on 45th & Lamar"), |user| match user {
            "U1" => "brainfart",
            "U2" => "alice",
            other => other,
        });

        assert_eq!(
            summary,
            "Here's what I have for your order from the Chili's on 45th & Lamar:\n```\nAlice: tuna melt\nBrainfart: a peach melba\n```"
        );
    }

    #[test]
    fn summary_without_a_restaurant_drops_the_clause() {
        let mut ledger = OrderLedger::new();
        ledger.add_item("bob", "burger");
        assert_eq!(
            ledger.status_summary(None, |user| user),
            "Here's what I have for your order:\n```\nBob: burger\n```"
        );
    }

    #[test]
    fn manifest_trims_trailing_whitespace() {
        let mut ledger = OrderLedger::new();
        ledger.add_item("bob", "burger   ");
        assert_eq!(ledger.manifest(|user| user), "Bob: burger");
    }

    #[test]
    fn capitalize_handles_empty_and_unicode() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("émile"), "Émile");
    }
}
