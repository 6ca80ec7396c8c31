use async_trait::async_trait;
use garcon_agent::collaborators::{DeliveryPlacer, RestaurantResolver};
use garcon_core::domain::restaurant::{DeliveryConfirmation, DeliveryRequest, Restaurant};
use garcon_core::errors::{Collaborator, CollaboratorError};
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Looks restaurants up with `GET {base}/restaurants?name=&near=`.
#[derive(Clone)]
pub struct HttpRestaurantResolver {
    client: Client,
    base_url: String,
}

impl HttpRestaurantResolver {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_owned() }
    }
}

#[async_trait]
impl RestaurantResolver for HttpRestaurantResolver {
    async fn resolve(&self, name: &str, near: &str) -> Result<Restaurant, CollaboratorError> {
        let collaborator = Collaborator::RestaurantLookup;
        let response = self
            .client
            .get(format!("{}/restaurants", self.base_url))
            .query(&[("name", name), ("near", near)])
            .send()
            .await
            .map_err(|error| CollaboratorError::unavailable(collaborator, error.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            let message = format!("no restaurant named {name}");
            return Err(CollaboratorError::rejected(collaborator, message));
        }
        let restaurant: Restaurant = decode(collaborator, response).await?;
        debug!(
            event_name = "collaborator.restaurant.resolved",
            restaurant = %restaurant.name,
            has_address = !restaurant.address.is_empty(),
            "restaurant resolved"
        );
        Ok(restaurant)
    }
}

/// Books couriers with `POST {base}/deliveries` using a bearer key.
#[derive(Clone)]
pub struct HttpDeliveryPlacer {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpDeliveryPlacer {
    pub fn new(client: Client, base_url: &str, api_key: SecretString) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_owned(), api_key }
    }
}

#[derive(Serialize)]
struct DeliveryBody<'a> {
    manifest: &'a str,
    pickup_address: &'a str,
    dropoff_address: &'a str,
}

#[derive(Deserialize)]
struct DeliveryResponse {
    id: String,
    #[serde(default)]
    fee: Decimal,
    #[serde(default)]
    eta_minutes: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: String,
}

#[async_trait]
impl DeliveryPlacer for HttpDeliveryPlacer {
    async fn place(
        &self,
        request: &DeliveryRequest,
    ) -> Result<DeliveryConfirmation, CollaboratorError> {
        let collaborator = Collaborator::Delivery;
        let response = self
            .client
            .post(format!("{}/deliveries", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&DeliveryBody {
                manifest: &request.manifest,
                pickup_address: &request.pickup,
                dropoff_address: &request.dropoff,
            })
            .send()
            .await
            .map_err(|error| CollaboratorError::unavailable(collaborator, error.to_string()))?;

        let placed: DeliveryResponse = decode(collaborator, response).await?;
        Ok(DeliveryConfirmation {
            delivery_id: placed.id,
            fee: placed.fee,
            eta_minutes: placed.eta_minutes,
        })
    }
}

async fn decode<T>(collaborator: Collaborator, response: Response) -> Result<T, CollaboratorError>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status();
    if status.is_client_error() {
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => format!("http {}", status.as_u16()),
        };
        return Err(CollaboratorError::rejected(collaborator, message));
    }
    if !status.is_success() {
        warn!(
            event_name = "collaborator.http.status",
            collaborator = %collaborator,
            status = status.as_u16(),
            "collaborator returned an unexpected status"
        );
        return Err(classify_status(collaborator, status));
    }
    response.json().await.map_err(|error| {
        CollaboratorError::unavailable(collaborator, format!("unreadable response: {error}"))
    })
}

fn classify_status(collaborator: Collaborator, status: StatusCode) -> CollaboratorError {
    if status.is_client_error() {
        CollaboratorError::rejected(collaborator, format!("http {}", status.as_u16()))
    } else {
        CollaboratorError::unavailable(collaborator, format!("http {}", status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use garcon_core::errors::{Collaborator, CollaboratorError};
    use reqwest::StatusCode;
    use rust_decimal::Decimal;

    use super::{classify_status, DeliveryResponse, ErrorBody};

    #[test]
    fn delivery_responses_default_missing_fee_and_eta() {
        let placed: DeliveryResponse =
            serde_json::from_str(r#"{"id":"del_42"}"#).expect("delivery json");
        assert_eq!(placed.id, "del_42");
        assert_eq!(placed.fee, Decimal::ZERO);
        assert_eq!(placed.eta_minutes, None);

        let placed: DeliveryResponse =
            serde_json::from_str(r#"{"id":"del_43","fee":"7.25","eta_minutes":35}"#)
                .expect("delivery json");
        assert_eq!(placed.fee, Decimal::new(725, 2));
        assert_eq!(placed.eta_minutes, Some(35));
    }

    #[test]
    fn error_bodies_accept_either_field_name() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"address out of range"}"#).expect("error json");
        assert_eq!(body.message, "address out of range");

        let body: ErrorBody = serde_json::from_str(r#"{"message":"closed"}"#).expect("error json");
        assert_eq!(body.message, "closed");
    }

    #[test]
    fn server_errors_are_unavailability() {
        assert_eq!(
            classify_status(Collaborator::Delivery, StatusCode::BAD_GATEWAY),
            CollaboratorError::unavailable(Collaborator::Delivery, "http 502")
        );
        assert_eq!(
            classify_status(Collaborator::RestaurantLookup, StatusCode::TOO_MANY_REQUESTS),
            CollaboratorError::rejected(Collaborator::RestaurantLookup, "http 429")
        );
    }
}
