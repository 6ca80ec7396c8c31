use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restaurant {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Restaurant {
    /// A restaurant nobody has looked up yet; pickup falls back to the requested name.
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self { name: name.into(), address: String::new(), phone: None }
    }

    pub fn pickup_location(&self) -> &str {
        if self.address.trim().is_empty() {
            &self.name
        } else {
            &self.address
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub manifest: String,
    pub pickup: String,
    pub dropoff: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfirmation {
    pub delivery_id: String,
    pub fee: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::Restaurant;

    #[test]
    fn pickup_prefers_address_over_name() {
        let resolved = Restaurant {
            name: "Chili's".to_owned(),
            address: "4500 N Lamar Blvd".to_owned(),
            phone: Some("512-555-0100".to_owned()),
        };
        assert_eq!(resolved.pickup_location(), "4500 N Lamar Blvd");
        assert_eq!(Restaurant::unresolved("Chili's").pickup_location(), "Chili's");
    }
}
