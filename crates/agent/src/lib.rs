//! Dialogue engine for the group food-order bot.
//!
//! A message flows through:
//! 1. **Guard** (`guardrails`) - drop messages from the bot itself or from nobody
//! 2. **Classification** (`conversation`) - stage-conditioned intent from the `patterns` library
//! 3. **Routing** - `garcon_core::flows` maps `(Stage, Intent)` to a `Reaction`
//! 4. **Reaction** (`runtime`) - mutate the channel's session, call collaborators, build `replies`
//! 5. **Outbound filter** - drop blank replies and channels outside the allow-list
//!
//! Sessions are kept per channel (`sessions`). External services sit behind the
//! traits in `collaborators` and every call to them is bounded by a timeout.

pub mod collaborators;
pub mod conversation;
pub mod guardrails;
pub mod patterns;
pub mod replies;
pub mod runtime;
pub mod sessions;

pub use collaborators::{
    ChannelAllowList, Collaborators, DeliveryPlacer, DryRunDeliveryPlacer, IdentityResolver,
    PassthroughRestaurantResolver, RestaurantResolver, StaticAllowList, StaticIdentity,
};
pub use conversation::{ClassificationContext, IntentClassifier};
pub use patterns::{PatternError, PatternLibrary, PatternName, SlotValues};
pub use runtime::{ApplicationError, ConversationRuntime, RuntimeSettings};
pub use sessions::SessionRegistry;
