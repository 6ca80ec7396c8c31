use std::collections::BTreeMap;
use std::fmt;

use garcon_core::domain::roster::Roster;
use regex::Regex;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatternName {
    Greeting,
    Addressing,
    Cancel,
    Help,
    OrderInitiation,
    Item,
    Status,
    Ready,
}

impl PatternName {
    pub const ALL: [PatternName; 8] = [
        PatternName::Greeting,
        PatternName::Addressing,
        PatternName::Cancel,
        PatternName::Help,
        PatternName::OrderInitiation,
        PatternName::Item,
        PatternName::Status,
        PatternName::Ready,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Addressing => "addressing",
            Self::Cancel => "cancel",
            Self::Help => "help",
            Self::OrderInitiation => "order_initiation",
            Self::Item => "item",
            Self::Status => "status",
            Self::Ready => "ready",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            Self::Greeting => r"(?i)^oh, gar[çc]on\?$",
            // Body patterns below run against the text after the mention.
            Self::Addressing => {
                r"(?is)^\s*(?:(?:ok|okay),?\s+)?<@(?P<user>[0-9A-Za-z]+)>[:,]?\s*(?P<body>.*)$"
            }
            Self::Cancel => r"(?i)^(?:abort|go away|leave|shut up)[.!]*\s*$",
            Self::Help => r"(?i)^help(?:\s+(?:me|us))?[.!]*\s*$",
            Self::OrderInitiation => {
                r"(?i)(?:we'd|we would) like to (?:place an )?order (?:(?:for|from)\b\s*)?(?P<restaurant>.*)"
            }
            Self::Item => r"(?is)^(?:(?:i would|i'd) like|i'll have)\s+(?P<item>.+)$",
            Self::Status => r"(?i)^(?:what does|what's) our order look like(?: so far)?\b",
            Self::Ready => r"(?i)^i think (?:we are|we're) ready\b",
        }
    }

    fn slots(&self) -> &'static [&'static str] {
        match self {
            Self::Addressing => &["user", "body"],
            Self::OrderInitiation => &["restaurant"],
            Self::Item => &["item"],
            Self::Greeting | Self::Cancel | Self::Help | Self::Status | Self::Ready => &[],
        }
    }
}

impl fmt::Display for PatternName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("pattern `{name}` failed to compile: {source}")]
pub struct PatternError {
    pub name: PatternName,
    #[source]
    pub source: regex::Error,
}

#[derive(Clone, Debug)]
pub struct Pattern {
    name: PatternName,
    regex: Regex,
}

impl Pattern {
    pub fn compile(name: PatternName) -> Result<Self, PatternError> {
        let regex = Regex::new(name.source()).map_err(|source| PatternError { name, source })?;
        Ok(Self { name, regex })
    }

    pub fn name(&self) -> PatternName {
        self.name
    }

    pub fn slots(&self) -> &'static [&'static str] {
        self.name.slots()
    }
}

/// Named values captured by a pattern's first match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotValues {
    values: BTreeMap<&'static str, String>,
}

impl SlotValues {
    pub fn get(&self, slot: &str) -> Option<&str> {
        self.values.get(slot).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Addressed {
    pub user_id: String,
    pub body: String,
}

#[derive(Clone, Debug)]
pub struct PatternLibrary {
    patterns: BTreeMap<PatternName, Pattern>,
}

impl PatternLibrary {
    pub fn new() -> Result<Self, PatternError> {
        let patterns = PatternName::ALL
            .into_iter()
            .map(|name| Pattern::compile(name).map(|pattern| (name, pattern)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, name: PatternName, text: &str) -> bool {
        let text = fold_apostrophes(text);
        self.patterns.get(&name).is_some_and(|pattern| pattern.regex.is_match(&text))
    }

    /// Captures of the first match, or `None` when the pattern does not match.
    pub fn extract(&self, name: PatternName, text: &str) -> Option<SlotValues> {
        let pattern = self.patterns.get(&name)?;
        let text = fold_apostrophes(text);
        let captures = pattern.regex.captures(&text)?;

        let values = pattern
            .slots()
            .iter()
            .filter_map(|slot| captures.name(slot).map(|value| (*slot, value.as_str().to_owned())))
            .collect();
        Some(SlotValues { values })
    }

    pub fn addressed(&self, text: &str) -> Option<Addressed> {
        let slots = self.extract(PatternName::Addressing, text)?;
        Some(Addressed {
            user_id: slots.get("user")?.to_owned(),
            body: slots.get("body").unwrap_or_default().trim().to_owned(),
        })
    }

    /// Body of a message whose mention resolves to the bot.
    pub fn directed_body(&self, text: &str, roster: &Roster) -> Option<String> {
        let addressed = self.addressed(text)?;
        roster.resolves_to_self(&addressed.user_id).then_some(addressed.body)
    }

    pub fn restaurant(&self, text: &str) -> Option<String> {
        let slots = self.extract(PatternName::OrderInitiation, text)?;
        let restaurant = trim_trailing_punctuation(slots.get("restaurant")?);
        (!restaurant.is_empty()).then(|| restaurant.to_owned())
    }

    /// Item requested in a directed body. A single leading article is dropped.
    pub fn item(&self, body: &str) -> Option<String> {
        let slots = self.extract(PatternName::Item, body)?;
        let item = trim_trailing_punctuation(slots.get("item")?);
        let item = strip_article(item);
        (!item.is_empty()).then(|| item.to_owned())
    }
}

pub fn normalize_text(text: &str) -> String {
    let stripped = fold_apostrophes(text)
        .chars()
        .filter(|ch| !is_stripped(*ch))
        .collect::<String>()
        .to_lowercase();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_stripped(ch: char) -> bool {
    matches!(
        ch,
        '.' | ',' | '/' | '!' | '$' | '%' | '^' | '*' | ';' | ':' | '{' | '}' | '`' | '=' | '-'
            | '?' | '\n'
    )
}

fn fold_apostrophes(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}'], "'")
}

fn trim_trailing_punctuation(text: &str) -> &str {
    text.trim().trim_end_matches(['.', '!', '?']).trim_end()
}

fn strip_article(item: &str) -> &str {
    for article in ["a ", "an "] {
        let prefixed =
            item.get(..article.len()).is_some_and(|head| head.eq_ignore_ascii_case(article));
        if prefixed && item.len() > article.len() {
            return item[article.len()..].trim_start();
        }
    }
    item
}
