pub mod conversation;
pub mod intent;
pub mod reservation;

pub use conversation::{ConversationState, NextAction, TurnResult};
pub use intent::Intent;
pub use reservation::Reservation;
