pub mod message;
pub mod order;
pub mod restaurant;
pub mod roster;
pub mod session;
