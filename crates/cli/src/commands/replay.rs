use std::fs;
use std::path::Path;

use garcon_agent::collaborators::Collaborators;
use garcon_agent::conversation::IntentClassifier;
use garcon_agent::patterns::PatternError;
use garcon_agent::runtime::{ConversationRuntime, RuntimeSettings};
use garcon_core::domain::message::{ChannelId, IncomingMessage};
use garcon_core::domain::roster::Roster;
use serde::Serialize;
use thiserror::Error;

use crate::commands::CommandResult;

pub const DEFAULT_BOT_ID: &str = "UGARCON";
pub const DEFAULT_BOT_NAME: &str = "garcon";
pub const DEFAULT_CHANNEL: &str = "CREPLAY";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("could not read script: {0}")]
    Read(#[from] std::io::Error),
    #[error("line {line}: unknown directive `{directive}`")]
    UnknownDirective { line: usize, directive: String },
    #[error("line {line}: `{directive}` needs {expected}")]
    MissingArgument { line: usize, directive: &'static str, expected: &'static str },
    #[error("line {line}: expected `<author_id>: <text>`")]
    MalformedMessage { line: usize },
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("dialogue patterns failed to compile: {0}")]
    Patterns(#[from] PatternError),
    #[error("failed to initialize async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("could not serialize the replay report: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReplayError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Script(_) => "script_invalid",
            Self::Patterns(_) => "patterns",
            Self::Runtime(_) => "runtime_init",
            Self::Serialization(_) => "serialization",
        }
    }

    /// A bad script is the caller's fault (2); anything else is ours (3).
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Script(_) => 2,
            Self::Patterns(_) | Self::Runtime(_) | Self::Serialization(_) => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptedMessage {
    pub line: usize,
    pub channel: String,
    pub author_id: String,
    pub text: String,
}

/// A parsed transcript: who is who, then the messages in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayScript {
    pub bot_id: String,
    pub bot_name: String,
    pub users: Vec<(String, String)>,
    pub messages: Vec<ScriptedMessage>,
}

impl ReplayScript {
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let mut script = Self {
            bot_id: DEFAULT_BOT_ID.to_owned(),
            bot_name: DEFAULT_BOT_NAME.to_owned(),
            users: Vec::new(),
            messages: Vec::new(),
        };
        let mut channel = DEFAULT_CHANNEL.to_owned();

        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if let Some(directive) = trimmed.strip_prefix('!') {
                let (name, arguments) = next_word(directive);
                let (first, rest) = next_word(arguments);
                let first = Some(first).filter(|value| !value.is_empty());
                let rest = Some(rest).filter(|value| !value.is_empty());
                match name {
                    "bot" => {
                        let (Some(id), Some(bot_name)) = (first, rest) else {
                            return Err(ScriptError::MissingArgument {
                                line,
                                directive: "!bot",
                                expected: "an id and a name",
                            });
                        };
                        script.bot_id = id.to_owned();
                        script.bot_name = bot_name.to_owned();
                    }
                    "user" => {
                        let (Some(id), Some(display_name)) = (first, rest) else {
                            return Err(ScriptError::MissingArgument {
                                line,
                                directive: "!user",
                                expected: "an id and a name",
                            });
                        };
                        script.users.push((id.to_owned(), display_name.to_owned()));
                    }
                    "channel" => {
                        let Some(id) = first else {
                            return Err(ScriptError::MissingArgument {
                                line,
                                directive: "!channel",
                                expected: "a channel id",
                            });
                        };
                        channel = id.to_owned();
                    }
                    other => {
                        return Err(ScriptError::UnknownDirective {
                            line,
                            directive: other.to_owned(),
                        })
                    }
                }
                continue;
            }

            let Some((author_id, text)) = trimmed.split_once(':') else {
                return Err(ScriptError::MalformedMessage { line });
            };
            let author_id = author_id.trim();
            if author_id.is_empty() || author_id.contains(char::is_whitespace) {
                return Err(ScriptError::MalformedMessage { line });
            }
            script.messages.push(ScriptedMessage {
                line,
                channel: channel.clone(),
                author_id: author_id.to_owned(),
                text: text.trim().to_owned(),
            });
        }

        Ok(script)
    }

    pub fn roster(&self) -> Roster {
        let mut roster = Roster::new(self.bot_id.clone(), self.bot_name.clone());
        for (id, name) in &self.users {
            roster.insert(id.clone(), name.clone());
        }
        roster
    }
}

/// Splits off the first whitespace-delimited word; the remainder is trimmed.
fn next_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

#[derive(Debug, Serialize)]
pub struct Exchange {
    pub line: usize,
    pub channel: String,
    pub author_id: String,
    pub text: String,
    pub replies: Vec<String>,
    pub stage: &'static str,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    command: &'static str,
    status: &'static str,
    exchanges: Vec<Exchange>,
}

/// Runs every scripted message through an offline runtime, in order.
pub async fn replay(script: &ReplayScript) -> Result<Vec<Exchange>, ReplayError> {
    let classifier = IntentClassifier::new()?;
    let roster = script.roster();
    let runtime = ConversationRuntime::new(
        classifier,
        roster.clone(),
        Collaborators::offline(roster),
        RuntimeSettings::default(),
    );

    let mut exchanges = Vec::with_capacity(script.messages.len());
    for message in &script.messages {
        let incoming = IncomingMessage::new(
            message.channel.clone(),
            message.author_id.clone(),
            message.text.clone(),
        );
        let replies = runtime.handle_message(&incoming).await;
        let stage = runtime
            .sessions()
            .snapshot(&ChannelId(message.channel.clone()))
            .await
            .map(|session| session.stage.as_str())
            .unwrap_or("uninitiated");
        exchanges.push(Exchange {
            line: message.line,
            channel: message.channel.clone(),
            author_id: message.author_id.clone(),
            text: message.text.clone(),
            replies: replies.into_iter().map(|reply| reply.text).collect(),
            stage,
        });
    }
    Ok(exchanges)
}

pub fn run(path: &Path, json_output: bool) -> CommandResult {
    match replay_file(path, json_output) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure(
            "replay",
            error.error_class(),
            error.to_string(),
            error.exit_code(),
        ),
    }
}

fn replay_file(path: &Path, json_output: bool) -> Result<String, ReplayError> {
    let source = fs::read_to_string(path).map_err(ScriptError::from)?;
    let script = ReplayScript::parse(&source)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ReplayError::Runtime)?;
    let exchanges = runtime.block_on(replay(&script))?;

    if json_output {
        let report = ReplayReport { command: "replay", status: "ok", exchanges };
        return Ok(serde_json::to_string_pretty(&report)?);
    }
    Ok(render_human(&script, &exchanges))
}

fn render_human(script: &ReplayScript, exchanges: &[Exchange]) -> String {
    let roster = script.roster();
    let mut lines = Vec::new();
    for exchange in exchanges {
        lines.push(format!(
            "[{}] {}: {}",
            exchange.channel,
            roster.name_or_id(&exchange.author_id),
            exchange.text
        ));
        for reply in &exchange.replies {
            lines.push(format!("[{}] {}: {reply}", exchange.channel, script.bot_name));
        }
    }
    if let Some(last) = exchanges.last() {
        lines.push(format!("(stage after line {}: {})", last.line, last.stage));
    }
    lines.join("\n")
}
