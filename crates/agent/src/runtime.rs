use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use garcon_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, InMemoryAuditSink};
use garcon_core::config::{AppConfig, ConfigError};
use garcon_core::domain::message::{IncomingMessage, OutgoingMessage};
use garcon_core::domain::restaurant::DeliveryRequest;
use garcon_core::domain::roster::Roster;
use garcon_core::domain::session::Session;
use garcon_core::errors::{Collaborator, CollaboratorError};
use garcon_core::flows::{FlowEngine, GroupOrderFlow, Intent, Reaction, Stage};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collaborators::{call_with_timeout, Collaborators};
use crate::conversation::{ClassificationContext, IntentClassifier};
use crate::guardrails::{InboundDecision, MessageGuard};
use crate::patterns::{PatternError, PatternLibrary};
use crate::replies::{self, HelpKind};
use crate::sessions::SessionRegistry;

const ROSTER_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("could not load the workspace roster: {0}")]
    Roster(#[source] CollaboratorError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub collaborator_timeout: Duration,
    pub dropoff_address: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { collaborator_timeout: Duration::from_secs(10), dropoff_address: String::new() }
    }
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            collaborator_timeout: config.collaborator_timeout(),
            dropoff_address: config.conversation.dropoff_address.clone(),
        }
    }
}

struct RosterCache {
    roster: Arc<Roster>,
    refreshed_at: Instant,
}

/// Drives every channel's conversation: guard, classify, route, react, filter.
pub struct ConversationRuntime {
    classifier: IntentClassifier,
    engine: FlowEngine<GroupOrderFlow>,
    guard: MessageGuard,
    sessions: SessionRegistry,
    roster: RwLock<RosterCache>,
    collaborators: Collaborators,
    settings: RuntimeSettings,
    audit: Arc<dyn AuditSink>,
    sequence: AtomicU64,
}

impl ConversationRuntime {
    /// Compiles the patterns and loads the roster through the identity resolver.
    pub async fn start(
        collaborators: Collaborators,
        settings: RuntimeSettings,
    ) -> Result<Self, ApplicationError> {
        let classifier = IntentClassifier::new()?;
        let roster = call_with_timeout(
            Collaborator::Identity,
            settings.collaborator_timeout,
            collaborators.identity.roster(),
        )
        .await
        .map_err(ApplicationError::Roster)?;

        info!(
            event_name = "runtime.started",
            bot_id = roster.self_id(),
            bot_name = roster.self_name(),
            roster_size = roster.len(),
            "conversation runtime ready"
        );
        Ok(Self::new(classifier, roster, collaborators, settings))
    }

    pub fn new(
        classifier: IntentClassifier,
        roster: Roster,
        collaborators: Collaborators,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            classifier,
            engine: FlowEngine::default(),
            guard: MessageGuard,
            sessions: SessionRegistry::new(),
            roster: RwLock::new(RosterCache {
                roster: Arc::new(roster),
                refreshed_at: Instant::now(),
            }),
            collaborators,
            settings,
            audit: Arc::new(InMemoryAuditSink::default()),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn roster(&self) -> Arc<Roster> {
        match self.roster.read() {
            Ok(cache) => cache.roster.clone(),
            Err(poisoned) => poisoned.into_inner().roster.clone(),
        }
    }

    pub async fn refresh_roster(&self) -> Result<usize, CollaboratorError> {
        let roster = call_with_timeout(
            Collaborator::Identity,
            self.settings.collaborator_timeout,
            self.collaborators.identity.roster(),
        )
        .await?;
        let size = roster.len();

        let mut cache = match self.roster.write() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.roster = Arc::new(roster);
        cache.refreshed_at = Instant::now();
        Ok(size)
    }

    pub async fn handle_message(&self, message: &IncomingMessage) -> Vec<OutgoingMessage> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.handle_message_with_correlation(message, &format!("msg-{sequence}")).await
    }

    pub async fn handle_message_with_correlation(
        &self,
        message: &IncomingMessage,
        correlation_id: &str,
    ) -> Vec<OutgoingMessage> {
        let mut roster = self.roster();
        let audit = AuditContext::new(
            Some(message.channel.as_str().to_owned()),
            correlation_id,
            message.author_id.clone(),
        );

        if let InboundDecision::Discard { reason_code } =
            self.guard.evaluate_inbound(message, roster.self_id())
        {
            debug!(
                event_name = "conversation.message_discarded",
                correlation_id,
                channel_id = message.channel.as_str(),
                reason_code,
                "inbound message discarded before classification"
            );
            self.audit.emit(
                audit
                    .event(
                        "conversation.message_discarded",
                        AuditCategory::Ingress,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("reason_code", reason_code),
            );
            return Vec::new();
        }

        if roster.display_name(&message.author_id).is_none() && self.roster_is_stale() {
            match self.refresh_roster().await {
                Ok(size) => {
                    debug!(
                        event_name = "runtime.roster_refreshed",
                        correlation_id,
                        roster_size = size
                    );
                    roster = self.roster();
                }
                Err(error) => warn!(
                    event_name = "runtime.roster_refresh_failed",
                    correlation_id,
                    error = %error,
                    "continuing with the cached roster"
                ),
            }
        }

        let session = self.sessions.session(&message.channel, roster.self_id());
        let mut session = session.lock().await;
        let from_stage = session.stage;

        let context = ClassificationContext {
            roster: &roster,
            interlocutor_id: session.interlocutor_id.as_deref(),
        };
        let intent = self.classifier.classify(from_stage, message, &context);
        let outcome = self.engine.route_with_audit(from_stage, intent, self.audit.as_ref(), &audit);

        let Some(reaction) = outcome.reaction else {
            debug!(
                event_name = "conversation.no_reaction",
                correlation_id,
                channel_id = message.channel.as_str(),
                stage = from_stage.as_str(),
                intent = intent.as_str(),
                "no reaction for stage and intent"
            );
            return Vec::new();
        };

        let reaction_context = ReactionContext {
            message,
            roster: &roster,
            patterns: self.classifier.patterns(),
            collaborators: &self.collaborators,
            settings: &self.settings,
        };
        let result = react(reaction, intent, &mut session, &reaction_context).await;

        if let Some(error) = &result.failure {
            warn!(
                event_name = "conversation.collaborator_failed",
                correlation_id,
                channel_id = message.channel.as_str(),
                collaborator = error.collaborator().label(),
                error = %error,
                "collaborator call failed; apologising in channel"
            );
            self.audit.emit(
                audit
                    .event(
                        "collaborator.call_failed",
                        AuditCategory::Collaborator,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("collaborator", error.collaborator().label())
                    .with_metadata("error", error.to_string()),
            );
        }

        let replies = result
            .replies
            .into_iter()
            .map(|text| OutgoingMessage::new(message.channel.clone(), text))
            .collect::<Vec<_>>();
        let produced = replies.len();
        let replies = self.guard.filter_outbound(replies, self.collaborators.allow_list.as_ref());

        info!(
            event_name = "conversation.reaction_applied",
            correlation_id,
            channel_id = message.channel.as_str(),
            reaction = reaction.as_str(),
            from_stage = from_stage.as_str(),
            to_stage = session.stage.as_str(),
            replies = replies.len(),
            suppressed = produced - replies.len(),
            "reaction applied"
        );
        self.audit.emit(
            audit
                .event(
                    "conversation.reaction_applied",
                    AuditCategory::Conversation,
                    AuditOutcome::Success,
                )
                .with_metadata("reaction", reaction.as_str())
                .with_metadata("from_stage", from_stage.as_str())
                .with_metadata("to_stage", session.stage.as_str()),
        );

        replies
    }

    fn roster_is_stale(&self) -> bool {
        let refreshed_at = match self.roster.read() {
            Ok(cache) => cache.refreshed_at,
            Err(poisoned) => poisoned.into_inner().refreshed_at,
        };
        refreshed_at.elapsed() >= ROSTER_REFRESH_INTERVAL
    }
}

struct ReactionContext<'a> {
    message: &'a IncomingMessage,
    roster: &'a Roster,
    patterns: &'a PatternLibrary,
    collaborators: &'a Collaborators,
    settings: &'a RuntimeSettings,
}

impl ReactionContext<'_> {
    fn author_name(&self) -> &str {
        self.roster.name_or_id(&self.message.author_id)
    }
}

#[derive(Debug, Default)]
struct ReactionResult {
    replies: Vec<String>,
    failure: Option<CollaboratorError>,
}

impl ReactionResult {
    fn reply(text: String) -> Self {
        Self { replies: vec![text], failure: None }
    }

    fn failed(text: String, error: CollaboratorError) -> Self {
        Self { replies: vec![text], failure: Some(error) }
    }
}

async fn react(
    reaction: Reaction,
    intent: Intent,
    session: &mut Session,
    context: &ReactionContext<'_>,
) -> ReactionResult {
    match reaction {
        Reaction::Greet => greet(session, context),
        Reaction::Cancel => cancel(session),
        Reaction::AcceptRestaurant => accept_restaurant(session, context).await,
        Reaction::Help => {
            let kind = if intent == Intent::Inquisitive {
                HelpKind::Requested
            } else {
                HelpKind::Misunderstood
            };
            help(kind, session.stage, context)
        }
        Reaction::AddItem => add_item(session, context),
        Reaction::ReportStatus => report_status(session, context),
        Reaction::BeginConfirmation => begin_confirmation(session, context),
        Reaction::PlaceOrder => place_order(session, context).await,
        Reaction::StartOver => start_over(session),
    }
}

fn greet(session: &mut Session, context: &ReactionContext<'_>) -> ReactionResult {
    session.interlocutor_id = Some(context.message.author_id.clone());
    session.stage = Stage::Prompted;
    ReactionResult::reply(replies::greeting(context.author_name()))
}

fn cancel(session: &mut Session) -> ReactionResult {
    session.reset();
    ReactionResult::reply(replies::cancelled())
}

fn help(kind: HelpKind, stage: Stage, context: &ReactionContext<'_>) -> ReactionResult {
    let bot_name = context.roster.self_name();
    ReactionResult::reply(replies::help(kind, stage, context.author_name(), bot_name))
}

async fn accept_restaurant(
    session: &mut Session,
    context: &ReactionContext<'_>,
) -> ReactionResult {
    let Some(requested) = context.patterns.restaurant(&context.message.text) else {
        return help(HelpKind::Misunderstood, session.stage, context);
    };

    let resolved = call_with_timeout(
        Collaborator::RestaurantLookup,
        context.settings.collaborator_timeout,
        context
            .collaborators
            .restaurants
            .resolve(&requested, &context.settings.dropoff_address),
    )
    .await;

    match resolved {
        Ok(restaurant) => {
            let prompt = replies::restaurant_prompt(&requested);
            session.requested_restaurant = Some(requested);
            session.restaurant = Some(restaurant);
            session.stage = Stage::Ordering;
            ReactionResult::reply(prompt)
        }
        Err(error) => {
            ReactionResult::failed(replies::restaurant_unavailable(&requested, &error), error)
        }
    }
}

fn add_item(session: &mut Session, context: &ReactionContext<'_>) -> ReactionResult {
    let item = context
        .patterns
        .directed_body(&context.message.text, context.roster)
        .and_then(|body| context.patterns.item(&body));
    let Some(item) = item else {
        return help(HelpKind::Misunderstood, session.stage, context);
    };

    session.ledger.add_item(context.message.author_id.clone(), item);
    ReactionResult::reply(replies::item_acknowledged(context.author_name()))
}

fn report_status(session: &Session, context: &ReactionContext<'_>) -> ReactionResult {
    let restaurant = session.restaurant_label();
    if session.ledger.is_empty() {
        return ReactionResult::reply(replies::empty_status(restaurant));
    }
    ReactionResult::reply(
        session.ledger.status_summary(restaurant, |user| context.roster.name_or_id(user)),
    )
}

fn begin_confirmation(session: &mut Session, context: &ReactionContext<'_>) -> ReactionResult {
    session.stage = Stage::Confirmation;
    let summary = session
        .ledger
        .status_summary(session.restaurant_label(), |user| context.roster.name_or_id(user));
    ReactionResult {
        replies: vec![replies::confirmation_opening(), summary, replies::confirmation_question()],
        failure: None,
    }
}

async fn place_order(session: &mut Session, context: &ReactionContext<'_>) -> ReactionResult {
    if session.ledger.is_empty() {
        session.stage = Stage::Ordering;
        return ReactionResult::reply(replies::nothing_to_place(session.restaurant_label()));
    }

    // After a start-over there is no pickup; ask the interlocutor again and keep the ledger.
    let pickup = session.restaurant.as_ref().map(|restaurant| restaurant.pickup_location().to_owned());
    let Some(pickup) = pickup else {
        let reply = match session.interlocutor_id.as_deref() {
            Some(interlocutor) => replies::restaurant_needed(context.roster.name_or_id(interlocutor)),
            None => replies::restaurant_needed(context.author_name()),
        };
        session.stage = Stage::Prompted;
        return ReactionResult::reply(reply);
    };
    let request = DeliveryRequest {
        manifest: session.ledger.manifest(|user| context.roster.name_or_id(user)),
        pickup,
        dropoff: context.settings.dropoff_address.clone(),
    };

    let placed = call_with_timeout(
        Collaborator::Delivery,
        context.settings.collaborator_timeout,
        context.collaborators.delivery.place(&request),
    )
    .await;

    match placed {
        Ok(confirmation) => {
            session.reset();
            ReactionResult::reply(replies::order_placed(&confirmation))
        }
        Err(error) => ReactionResult::failed(replies::delivery_failed(&error), error),
    }
}

fn start_over(session: &mut Session) -> ReactionResult {
    session.start_over();
    ReactionResult::reply(replies::start_over())
}
