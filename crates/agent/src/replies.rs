//! Fixed chat replies. Every user-facing string the bot sends is built here.

use garcon_core::domain::restaurant::DeliveryConfirmation;
use garcon_core::errors::CollaboratorError;
use garcon_core::flows::Stage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HelpKind {
    /// The user asked for help.
    Requested,
    /// The bot could not make sense of the message.
    Misunderstood,
}

pub fn greeting(name: &str) -> String {
    format!("Hi, @{name}! Would you like to place an order?")
}

pub fn cancelled() -> String {
    "Very well then, I'll disappear for now!".to_owned()
}

pub fn restaurant_prompt(restaurant: &str) -> String {
    format!("Okay, what would everyone like from {restaurant}?")
}

pub fn item_acknowledged(name: &str) -> String {
    format!("Okay @{name}, I've got your order.")
}

pub fn confirmation_opening() -> String {
    "Alright, then!".to_owned()
}

pub fn confirmation_question() -> String {
    "Is that correct?".to_owned()
}

pub fn start_over() -> String {
    "Okay, I'll start over.".to_owned()
}

pub fn empty_status(restaurant: Option<&str>) -> String {
    match restaurant {
        Some(restaurant) => format!("Nobody has ordered anything from {restaurant} yet."),
        None => "Nobody has ordered anything yet.".to_owned(),
    }
}

pub fn nothing_to_place(restaurant: Option<&str>) -> String {
    match restaurant {
        Some(restaurant) => {
            format!("There's nothing to send off yet! What would everyone like from {restaurant}?")
        }
        None => "There's nothing to send off yet! What would everyone like?".to_owned(),
    }
}

pub fn restaurant_needed(name: &str) -> String {
    format!("I don't know where to order from yet, @{name}! Which restaurant should I send this to?")
}

pub fn order_placed(confirmation: &DeliveryConfirmation) -> String {
    let eta = confirmation
        .eta_minutes
        .map(|minutes| format!(", ETA {minutes} minutes"))
        .unwrap_or_default();
    format!(
        "Okay, I'll send this order off! Delivery {} is booked (fee ${:.2}{eta}).",
        confirmation.delivery_id, confirmation.fee
    )
}

pub fn restaurant_unavailable(restaurant: &str, error: &CollaboratorError) -> String {
    format!(
        "I'm sorry, I couldn't look up {restaurant}: {}. Could you try again or pick another place?",
        error.user_message()
    )
}

pub fn delivery_failed(error: &CollaboratorError) -> String {
    format!(
        "I'm sorry, I couldn't send this order off: {}. Say yes to try again, or no to start over.",
        error.user_message()
    )
}

pub fn help(kind: HelpKind, stage: Stage, name: &str, bot_name: &str) -> String {
    let intro = match kind {
        HelpKind::Requested => format!("Sure thing, @{name}!"),
        HelpKind::Misunderstood => {
            format!("I'm sorry, @{name}, I couldn't understand what you said.")
        }
    };

    let mut examples = stage_examples(stage, bot_name);
    examples.push(format!("@{bot_name}, go away"));
    examples.push(format!("@{bot_name}, help!"));

    let lines = examples.iter().map(|example| format!(" • {example}")).collect::<Vec<_>>();
    format!("{intro} Here are some things I might understand:\n{}\n", lines.join("\n"))
}

fn stage_examples(stage: Stage, bot_name: &str) -> Vec<String> {
    match stage {
        Stage::Uninitiated => vec!["oh, garçon?".to_owned()],
        Stage::Prompted => vec![
            "We'd like to place an order for the Chili's at 45th & Lamar".to_owned(),
            "We would like to order from the Chili's at 45th & Lamar".to_owned(),
        ],
        Stage::Ordering => vec![
            format!("@{bot_name}, I'd like the peach melba"),
            format!("@{bot_name}, what does our order look like so far?"),
            format!("ok, @{bot_name}, I think we're ready"),
        ],
        Stage::Confirmation => vec!["yes".to_owned(), "no".to_owned()],
    }
}
