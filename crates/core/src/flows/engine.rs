use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::flows::states::{Intent, Reaction, RouteOutcome, Stage};

pub trait FlowDefinition {
    fn initial_stage(&self) -> Stage;
    fn reaction(&self, stage: Stage, intent: Intent) -> Option<Reaction>;
}

/// The group food-order conversation.
#[derive(Clone, Debug, Default)]
pub struct GroupOrderFlow;

impl FlowDefinition for GroupOrderFlow {
    fn initial_stage(&self) -> Stage {
        Stage::Uninitiated
    }

    fn reaction(&self, stage: Stage, intent: Intent) -> Option<Reaction> {
        group_order_reaction(stage, intent)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_stage(&self) -> Stage {
        self.flow.initial_stage()
    }

    pub fn route(&self, stage: Stage, intent: Intent) -> RouteOutcome {
        RouteOutcome { stage, intent, reaction: self.flow.reaction(stage, intent) }
    }

    pub fn route_with_audit<S>(
        &self,
        stage: Stage,
        intent: Intent,
        sink: &S,
        audit: &AuditContext,
    ) -> RouteOutcome
    where
        S: AuditSink + ?Sized,
    {
        let outcome = self.route(stage, intent);
        let event = match outcome.reaction {
            Some(reaction) => audit
                .event("flow.reaction_selected", AuditCategory::Flow, AuditOutcome::Success)
                .with_metadata("reaction", reaction.as_str()),
            None => audit.event("flow.reaction_missing", AuditCategory::Flow, AuditOutcome::Rejected),
        };
        sink.emit(
            event
                .with_metadata("stage", stage.as_str())
                .with_metadata("intent", intent.as_str()),
        );
        outcome
    }
}

impl Default for FlowEngine<GroupOrderFlow> {
    fn default() -> Self {
        Self::new(GroupOrderFlow)
    }
}

fn group_order_reaction(stage: Stage, intent: Intent) -> Option<Reaction> {
    use Intent::{
        Affirmative, Cancelling, Contributing, Indeterminable, Inquisitive, Insufficient,
        Irrelevant, Negative, Status,
    };
    use Stage::{Confirmation, Ordering, Prompted, Uninitiated};

    match (stage, intent) {
        (_, Cancelling) => Some(Reaction::Cancel),

        (Uninitiated, Affirmative) => Some(Reaction::Greet),
        (
            Uninitiated,
            Negative | Contributing | Status | Inquisitive | Insufficient | Indeterminable
            | Irrelevant,
        ) => None,

        (Prompted, Affirmative) => Some(Reaction::AcceptRestaurant),
        (Prompted, Inquisitive | Insufficient) => Some(Reaction::Help),
        // Outsiders and refusals are both classified negative here; neither gets a reply.
        (Prompted, Negative) => None,
        (Prompted, Contributing | Status | Indeterminable | Irrelevant) => None,

        (Ordering, Contributing) => Some(Reaction::AddItem),
        (Ordering, Status) => Some(Reaction::ReportStatus),
        (Ordering, Affirmative) => Some(Reaction::BeginConfirmation),
        (Ordering, Inquisitive | Indeterminable) => Some(Reaction::Help),
        (Ordering, Negative | Insufficient | Irrelevant) => None,

        (Confirmation, Affirmative) => Some(Reaction::PlaceOrder),
        (Confirmation, Negative) => Some(Reaction::StartOver),
        (Confirmation, Inquisitive | Insufficient) => Some(Reaction::Help),
        (Confirmation, Contributing | Status | Indeterminable | Irrelevant) => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, AuditOutcome, InMemoryAuditSink};
    use crate::flows::engine::{FlowDefinition, FlowEngine, GroupOrderFlow};
    use crate::flows::states::{Intent, Reaction, Stage};

    #[test]
    fn happy_path_walks_every_stage() {
        let engine = FlowEngine::default();
        assert_eq!(engine.initial_stage(), Stage::Uninitiated);

        let steps = [
            (Stage::Uninitiated, Intent::Affirmative, Reaction::Greet),
            (Stage::Prompted, Intent::Affirmative, Reaction::AcceptRestaurant),
            (Stage::Ordering, Intent::Contributing, Reaction::AddItem),
            (Stage::Ordering, Intent::Status, Reaction::ReportStatus),
            (Stage::Ordering, Intent::Affirmative, Reaction::BeginConfirmation),
            (Stage::Confirmation, Intent::Affirmative, Reaction::PlaceOrder),
        ];

        for (stage, intent, expected) in steps {
            assert_eq!(engine.route(stage, intent).reaction, Some(expected), "{stage:?}/{intent:?}");
        }
    }

    #[test]
    fn cancellation_is_routed_from_every_stage() {
        for stage in Stage::ALL {
            assert_eq!(GroupOrderFlow.reaction(stage, Intent::Cancelling), Some(Reaction::Cancel));
        }
    }

    #[test]
    fn pairs_outside_the_table_have_no_reaction() {
        let table = [
            (Stage::Uninitiated, Intent::Affirmative, Reaction::Greet),
            (Stage::Prompted, Intent::Affirmative, Reaction::AcceptRestaurant),
            (Stage::Prompted, Intent::Inquisitive, Reaction::Help),
            (Stage::Prompted, Intent::Insufficient, Reaction::Help),
            (Stage::Ordering, Intent::Contributing, Reaction::AddItem),
            (Stage::Ordering, Intent::Status, Reaction::ReportStatus),
            (Stage::Ordering, Intent::Affirmative, Reaction::BeginConfirmation),
            (Stage::Ordering, Intent::Inquisitive, Reaction::Help),
            (Stage::Ordering, Intent::Indeterminable, Reaction::Help),
            (Stage::Confirmation, Intent::Affirmative, Reaction::PlaceOrder),
            (Stage::Confirmation, Intent::Negative, Reaction::StartOver),
            (Stage::Confirmation, Intent::Inquisitive, Reaction::Help),
            (Stage::Confirmation, Intent::Insufficient, Reaction::Help),
        ];
        let engine = FlowEngine::default();

        for stage in Stage::ALL {
            for intent in Intent::ALL {
                let expected = if intent == Intent::Cancelling {
                    Some(Reaction::Cancel)
                } else {
                    table
                        .iter()
                        .find(|(row_stage, row_intent, _)| *row_stage == stage && *row_intent == intent)
                        .map(|(_, _, reaction)| *reaction)
                };
                let outcome = engine.route(stage, intent);
                assert_eq!(outcome.reaction, expected, "{stage:?}/{intent:?}");
                assert_eq!((outcome.stage, outcome.intent), (stage, intent));
            }
        }
    }

    #[test]
    fn prompted_negative_has_no_reaction() {
        assert_eq!(GroupOrderFlow.reaction(Stage::Prompted, Intent::Negative), None);
    }

    #[test]
    fn uninitiated_only_reacts_to_greeting_and_cancel() {
        let reacting = Intent::ALL
            .into_iter()
            .filter(|intent| GroupOrderFlow.reaction(Stage::Uninitiated, *intent).is_some())
            .collect::<Vec<_>>();
        assert_eq!(reacting, vec![Intent::Affirmative, Intent::Cancelling]);
    }

    #[test]
    fn help_is_offered_for_stage_specific_misses() {
        assert_eq!(GroupOrderFlow.reaction(Stage::Prompted, Intent::Insufficient), Some(Reaction::Help));
        assert_eq!(
            GroupOrderFlow.reaction(Stage::Ordering, Intent::Indeterminable),
            Some(Reaction::Help)
        );
        assert_eq!(
            GroupOrderFlow.reaction(Stage::Confirmation, Intent::Insufficient),
            Some(Reaction::Help)
        );
        assert_eq!(GroupOrderFlow.reaction(Stage::Ordering, Intent::Insufficient), None);
    }

    #[test]
    fn confirmation_negative_starts_over() {
        assert_eq!(
            GroupOrderFlow.reaction(Stage::Confirmation, Intent::Negative),
            Some(Reaction::StartOver)
        );
    }

    #[test]
    fn routing_emits_audit_events() {
        let engine = FlowEngine::default();
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new(Some("C1".to_owned()), "env-42", "U1");

        engine.route_with_audit(Stage::Ordering, Intent::Status, &sink, &audit);
        engine.route_with_audit(Stage::Prompted, Intent::Negative, &sink, &audit);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "flow.reaction_selected");
        assert_eq!(events[0].metadata.get("reaction").map(String::as_str), Some("report_status"));
        assert_eq!(events[1].event_type, "flow.reaction_missing");
        assert_eq!(events[1].outcome, AuditOutcome::Rejected);
        assert_eq!(events[1].channel_id.as_deref(), Some("C1"));
        assert_eq!(events[1].correlation_id, "env-42");
    }
}
