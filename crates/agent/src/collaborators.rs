use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use garcon_core::domain::message::ChannelId;
use garcon_core::domain::restaurant::{DeliveryConfirmation, DeliveryRequest, Restaurant};
use garcon_core::domain::roster::Roster;
use garcon_core::errors::{Collaborator, CollaboratorError};
use rust_decimal::Decimal;

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn roster(&self) -> Result<Roster, CollaboratorError>;
}

pub trait ChannelAllowList: Send + Sync {
    fn allows(&self, channel: &ChannelId) -> bool;
}

#[async_trait]
pub trait RestaurantResolver: Send + Sync {
    async fn resolve(&self, name: &str, near: &str) -> Result<Restaurant, CollaboratorError>;
}

#[async_trait]
pub trait DeliveryPlacer: Send + Sync {
    async fn place(
        &self,
        request: &DeliveryRequest,
    ) -> Result<DeliveryConfirmation, CollaboratorError>;
}

/// The external services one runtime talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityResolver>,
    pub allow_list: Arc<dyn ChannelAllowList>,
    pub restaurants: Arc<dyn RestaurantResolver>,
    pub delivery: Arc<dyn DeliveryPlacer>,
}

impl Collaborators {
    /// Everything offline: a fixed roster, every channel allowed, no real lookups or bookings.
    pub fn offline(roster: Roster) -> Self {
        Self {
            identity: Arc::new(StaticIdentity::new(roster)),
            allow_list: Arc::new(StaticAllowList::allow_all()),
            restaurants: Arc::new(PassthroughRestaurantResolver),
            delivery: Arc::new(DryRunDeliveryPlacer::default()),
        }
    }

    pub fn with_allow_list(mut self, allow_list: impl ChannelAllowList + 'static) -> Self {
        self.allow_list = Arc::new(allow_list);
        self
    }

    pub fn with_restaurants(mut self, restaurants: impl RestaurantResolver + 'static) -> Self {
        self.restaurants = Arc::new(restaurants);
        self
    }

    pub fn with_delivery(mut self, delivery: impl DeliveryPlacer + 'static) -> Self {
        self.delivery = Arc::new(delivery);
        self
    }
}

/// Runs a collaborator call, turning an elapsed deadline into `CollaboratorError::Timeout`.
pub async fn call_with_timeout<T, F>(
    collaborator: Collaborator,
    timeout: Duration,
    call: F,
) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout { collaborator, after_secs: timeout.as_secs() }),
    }
}

#[derive(Clone, Debug)]
pub struct StaticIdentity {
    roster: Roster,
}

impl StaticIdentity {
    pub fn new(roster: Roster) -> Self {
        Self { roster }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentity {
    async fn roster(&self) -> Result<Roster, CollaboratorError> {
        Ok(self.roster.clone())
    }
}

/// Configured channel allow-list; an empty list allows every channel.
#[derive(Clone, Debug, Default)]
pub struct StaticAllowList {
    channels: HashSet<String>,
}

impl StaticAllowList {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { channels: channels.into_iter().map(Into::into).collect() }
    }
}

impl ChannelAllowList for StaticAllowList {
    fn allows(&self, channel: &ChannelId) -> bool {
        self.channels.is_empty() || self.channels.contains(channel.as_str())
    }
}

/// Treats the requested name as the restaurant, with no address lookup.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughRestaurantResolver;

#[async_trait]
impl RestaurantResolver for PassthroughRestaurantResolver {
    async fn resolve(&self, name: &str, _near: &str) -> Result<Restaurant, CollaboratorError> {
        Ok(Restaurant::unresolved(name))
    }
}

/// Books nothing; hands back sequential `dry-run-N` ids with no fee.
#[derive(Debug, Default)]
pub struct DryRunDeliveryPlacer {
    placed: AtomicU64,
}

impl DryRunDeliveryPlacer {
    pub fn placed(&self) -> u64 {
        self.placed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DeliveryPlacer for DryRunDeliveryPlacer {
    async fn place(
        &self,
        request: &DeliveryRequest,
    ) -> Result<DeliveryConfirmation, CollaboratorError> {
        if request.manifest.trim().is_empty() {
            return Err(CollaboratorError::rejected(Collaborator::Delivery, "manifest is empty"));
        }
        let sequence = self.placed.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(DeliveryConfirmation {
            delivery_id: format!("dry-run-{sequence}"),
            fee: Decimal::ZERO,
            eta_minutes: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use garcon_core::domain::message::ChannelId;
    use garcon_core::domain::restaurant::DeliveryRequest;
    use garcon_core::errors::{Collaborator, CollaboratorError};

    use super::{
        call_with_timeout, ChannelAllowList, DeliveryPlacer, DryRunDeliveryPlacer,
        PassthroughRestaurantResolver, RestaurantResolver, StaticAllowList,
    };

    #[test]
    fn empty_allow_list_allows_everything() {
        let allow_all = StaticAllowList::allow_all();
        assert!(allow_all.allows(&ChannelId("C1".to_owned())));

        let restricted = StaticAllowList::new(["C1N3MEUMN"]);
        assert!(restricted.allows(&ChannelId("C1N3MEUMN".to_owned())));
        assert!(!restricted.allows(&ChannelId("C0THER".to_owned())));
    }

    #[tokio::test]
    async fn passthrough_resolver_echoes_the_name() {
        let restaurant = PassthroughRestaurantResolver.resolve("Chili's", "downtown").await;
        assert_eq!(restaurant.map(|value| value.name), Ok("Chili's".to_owned()));
    }

    #[tokio::test]
    async fn dry_run_placer_numbers_deliveries() {
        let placer = DryRunDeliveryPlacer::default();
        let request = DeliveryRequest {
            manifest: "Bob: burger".to_owned(),
            pickup: "Chili's".to_owned(),
            dropoff: "HQ".to_owned(),
        };

        let first = placer.place(&request).await.map(|value| value.delivery_id);
        let second = placer.place(&request).await.map(|value| value.delivery_id);

        assert_eq!(first, Ok("dry-run-1".to_owned()));
        assert_eq!(second, Ok("dry-run-2".to_owned()));
        assert_eq!(placer.placed(), 2);
    }

    #[tokio::test]
    async fn slow_calls_become_timeouts() {
        let result: Result<(), CollaboratorError> =
            call_with_timeout(Collaborator::RestaurantLookup, Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(CollaboratorError::Timeout { collaborator: Collaborator::RestaurantLookup, .. })
        ));
    }
}
