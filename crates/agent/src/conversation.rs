use garcon_core::domain::message::IncomingMessage;
use garcon_core::domain::roster::Roster;
use garcon_core::flows::{Intent, Stage};

use crate::patterns::{normalize_text, PatternError, PatternLibrary, PatternName};

const AFFIRMATIVES: [&str; 5] = ["yes", "yup", "yep", "sure", "ok"];
const NEGATIVES: [&str; 4] = ["no", "nope", "cancel", "neup"];

/// What the classifier may look at besides the message itself.
#[derive(Clone, Copy, Debug)]
pub struct ClassificationContext<'a> {
    pub roster: &'a Roster,
    pub interlocutor_id: Option<&'a str>,
}

#[derive(Clone, Debug)]
pub struct IntentClassifier {
    patterns: PatternLibrary,
}

impl IntentClassifier {
    pub fn new() -> Result<Self, PatternError> {
        Ok(Self::with_patterns(PatternLibrary::new()?))
    }

    pub fn with_patterns(patterns: PatternLibrary) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &PatternLibrary {
        &self.patterns
    }

    pub fn classify(
        &self,
        stage: Stage,
        message: &IncomingMessage,
        context: &ClassificationContext<'_>,
    ) -> Intent {
        let directed = self.patterns.directed_body(&message.text, context.roster);

        if let Some(body) = directed.as_deref() {
            if self.patterns.matches(PatternName::Cancel, body) {
                return Intent::Cancelling;
            }
            if self.patterns.matches(PatternName::Help, body) {
                return Intent::Inquisitive;
            }
        }

        match stage {
            Stage::Uninitiated => self.classify_uninitiated(message),
            Stage::Prompted => self.classify_prompted(message, context),
            Stage::Ordering => self.classify_ordering(directed.as_deref()),
            Stage::Confirmation => classify_confirmation(&message.text),
        }
    }

    fn classify_uninitiated(&self, message: &IncomingMessage) -> Intent {
        if self.patterns.matches(PatternName::Greeting, message.text.trim()) {
            Intent::Affirmative
        } else {
            Intent::Irrelevant
        }
    }

    fn classify_prompted(
        &self,
        message: &IncomingMessage,
        context: &ClassificationContext<'_>,
    ) -> Intent {
        if context.interlocutor_id != Some(message.author_id.as_str()) {
            return Intent::Negative;
        }
        if is_negative(&message.text) {
            return Intent::Negative;
        }
        if self.patterns.restaurant(&message.text).is_some() {
            return Intent::Affirmative;
        }
        Intent::Insufficient
    }

    fn classify_ordering(&self, directed: Option<&str>) -> Intent {
        let Some(body) = directed else {
            return Intent::Indeterminable;
        };
        if self.patterns.matches(PatternName::Item, body) {
            Intent::Contributing
        } else if self.patterns.matches(PatternName::Status, body) {
            Intent::Status
        } else if self.patterns.matches(PatternName::Ready, body) {
            Intent::Affirmative
        } else {
            Intent::Indeterminable
        }
    }
}

fn classify_confirmation(text: &str) -> Intent {
    if is_affirmative(text) {
        Intent::Affirmative
    } else if is_negative(text) {
        Intent::Negative
    } else {
        Intent::Insufficient
    }
}

pub fn is_affirmative(text: &str) -> bool {
    AFFIRMATIVES.contains(&normalize_text(text).as_str())
}

pub fn is_negative(text: &str) -> bool {
    NEGATIVES.contains(&normalize_text(text).as_str())
}
