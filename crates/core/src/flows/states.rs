use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Uninitiated,
    Prompted,
    Ordering,
    Confirmation,
}

impl Stage {
    pub const ALL: [Stage; 4] =
        [Stage::Uninitiated, Stage::Prompted, Stage::Ordering, Stage::Confirmation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitiated => "uninitiated",
            Self::Prompted => "prompted",
            Self::Ordering => "ordering",
            Self::Confirmation => "confirmation",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Affirmative,
    Negative,
    Cancelling,
    Contributing,
    Status,
    Inquisitive,
    Insufficient,
    Indeterminable,
    Irrelevant,
}

impl Intent {
    pub const ALL: [Intent; 9] = [
        Intent::Affirmative,
        Intent::Negative,
        Intent::Cancelling,
        Intent::Contributing,
        Intent::Status,
        Intent::Inquisitive,
        Intent::Insufficient,
        Intent::Indeterminable,
        Intent::Irrelevant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Affirmative => "affirmative",
            Self::Negative => "negative",
            Self::Cancelling => "cancelling",
            Self::Contributing => "contributing",
            Self::Status => "status",
            Self::Inquisitive => "inquisitive",
            Self::Insufficient => "insufficient",
            Self::Indeterminable => "indeterminable",
            Self::Irrelevant => "irrelevant",
        }
    }
}

/// What the bot does in response to a classified message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    Greet,
    Cancel,
    AcceptRestaurant,
    Help,
    AddItem,
    ReportStatus,
    BeginConfirmation,
    PlaceOrder,
    StartOver,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greet => "greet",
            Self::Cancel => "cancel",
            Self::AcceptRestaurant => "accept_restaurant",
            Self::Help => "help",
            Self::AddItem => "add_item",
            Self::ReportStatus => "report_status",
            Self::BeginConfirmation => "begin_confirmation",
            Self::PlaceOrder => "place_order",
            Self::StartOver => "start_over",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOutcome {
    pub stage: Stage,
    pub intent: Intent,
    pub reaction: Option<Reaction>,
}
