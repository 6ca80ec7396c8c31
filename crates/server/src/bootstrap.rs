use std::sync::Arc;

use garcon_agent::collaborators::{
    Collaborators, DeliveryPlacer, DryRunDeliveryPlacer, IdentityResolver,
    PassthroughRestaurantResolver, RestaurantResolver, StaticAllowList,
};
use garcon_agent::runtime::{ApplicationError, ConversationRuntime, RuntimeSettings};
use garcon_core::config::{AppConfig, ConfigError, LoadOptions};
use garcon_slack::events::{conversation_dispatcher, MessageSink};
use garcon_slack::transport::{
    ChannelTransport, EnvelopeRunner, EnvelopeTransport, NoopTransport, ReconnectPolicy,
    TransportMode,
};
use garcon_slack::web::SlackWebClient;
use reqwest::Client;
use thiserror::Error;
use tracing::info;

use crate::ingress::IngressState;
use crate::integrations::{HttpDeliveryPlacer, HttpRestaurantResolver};

/// Envelopes the ingress may queue ahead of the runner before requests start waiting.
const INGRESS_QUEUE_DEPTH: usize = 64;

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<ConversationRuntime>,
    pub runner: EnvelopeRunner,
    pub transport_mode: TransportMode,
    pub ingress: Option<IngressState>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Runtime(#[from] ApplicationError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        bot_name = %config.slack.bot_name,
        "starting application bootstrap"
    );

    let slack = Arc::new(SlackWebClient::new(
        config.slack.bot_token.clone(),
        config.slack.bot_name.clone(),
    ));
    let collaborators = build_collaborators(&config, Client::new(), slack.clone());
    assemble(config, collaborators, slack).await
}

/// Picks real HTTP integrations where base URLs are configured and offline stand-ins elsewhere.
pub fn build_collaborators(
    config: &AppConfig,
    client: Client,
    identity: Arc<dyn IdentityResolver>,
) -> Collaborators {
    let restaurants: Arc<dyn RestaurantResolver> = match &config.restaurants.base_url {
        Some(base_url) => Arc::new(HttpRestaurantResolver::new(client.clone(), base_url)),
        None => Arc::new(PassthroughRestaurantResolver),
    };
    let delivery: Arc<dyn DeliveryPlacer> =
        match (&config.delivery.base_url, &config.delivery.api_key) {
            (Some(base_url), Some(api_key)) => {
                Arc::new(HttpDeliveryPlacer::new(client, base_url, api_key.clone()))
            }
            _ => Arc::new(DryRunDeliveryPlacer::default()),
        };

    let restaurant_lookup =
        if config.restaurants.base_url.is_some() { "http" } else { "passthrough" };
    info!(
        event_name = "system.bootstrap.collaborators",
        correlation_id = "bootstrap",
        restaurant_lookup,
        delivery = if config.delivery.base_url.is_some() { "http" } else { "dry_run" },
        allowed_channels = config.slack.allowed_channels.len(),
        "collaborators selected"
    );

    Collaborators {
        identity,
        allow_list: Arc::new(StaticAllowList::new(config.slack.allowed_channels.iter().cloned())),
        restaurants,
        delivery,
    }
}

/// Starts the runtime, wires replies to `sink`, and chooses the envelope transport.
pub async fn assemble(
    config: AppConfig,
    collaborators: Collaborators,
    sink: Arc<dyn MessageSink>,
) -> Result<Application, BootstrapError> {
    let runtime = Arc::new(
        ConversationRuntime::start(collaborators, RuntimeSettings::from_config(&config)).await?,
    );
    let dispatcher = conversation_dispatcher(runtime.clone(), sink);

    let (transport, transport_mode, ingress): (Arc<dyn EnvelopeTransport>, _, _) =
        match &config.slack.signing_secret {
            Some(signing_secret) => {
                let (transport, sender) = ChannelTransport::new(INGRESS_QUEUE_DEPTH);
                let ingress = IngressState::new(signing_secret.clone(), sender);
                (Arc::new(transport), TransportMode::EventsApi, Some(ingress))
            }
            None => (Arc::new(NoopTransport), TransportMode::Noop, None),
        };

    info!(
        event_name = "system.bootstrap.transport_selected",
        correlation_id = "bootstrap",
        transport_mode = transport_mode.as_str(),
        "slack transport selected"
    );

    Ok(Application {
        config,
        runtime,
        runner: EnvelopeRunner::new(transport, dispatcher, ReconnectPolicy::default()),
        transport_mode,
        ingress,
    })
}
