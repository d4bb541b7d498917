use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::Intent;

/// What the dialogue machine expects the next utterance to supply.
/// Exactly one state is active per call; only the dialogue engine
/// transitions it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Initial,
    CollectingName,
    CollectingContact,
    CollectingDate,
    CollectingTime,
    CollectingGuests,
    CollectingReservationId,
    ConfirmingReservation,
    Completed,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Initial => "initial",
            ConversationState::CollectingName => "collecting_name",
            ConversationState::CollectingContact => "collecting_contact",
            ConversationState::CollectingDate => "collecting_date",
            ConversationState::CollectingTime => "collecting_time",
            ConversationState::CollectingGuests => "collecting_guests",
            ConversationState::CollectingReservationId => "collecting_reservation_id",
            ConversationState::ConfirmingReservation => "confirming_reservation",
            ConversationState::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "collecting_name" => ConversationState::CollectingName,
            "collecting_contact" => ConversationState::CollectingContact,
            "collecting_date" => ConversationState::CollectingDate,
            "collecting_time" => ConversationState::CollectingTime,
            "collecting_guests" => ConversationState::CollectingGuests,
            "collecting_reservation_id" => ConversationState::CollectingReservationId,
            "confirming_reservation" => ConversationState::ConfirmingReservation,
            "completed" => ConversationState::Completed,
            _ => ConversationState::Initial,
        }
    }
}

/// What the telephony adapter should do after speaking the response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    None,
    CollectName,
    CollectContact,
    ConfirmContact,
    CollectDate,
    CollectTime,
    ConfirmTime,
    CollectGuests,
    CollectReservationId,
    ConfirmReservation,
    Complete,
    Hangup,
}

impl NextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextAction::None => "none",
            NextAction::CollectName => "collect_name",
            NextAction::CollectContact => "collect_contact",
            NextAction::ConfirmContact => "confirm_contact",
            NextAction::CollectDate => "collect_date",
            NextAction::CollectTime => "collect_time",
            NextAction::ConfirmTime => "confirm_time",
            NextAction::CollectGuests => "collect_guests",
            NextAction::CollectReservationId => "collect_reservation_id",
            NextAction::ConfirmReservation => "confirm_reservation",
            NextAction::Complete => "complete",
            NextAction::Hangup => "hangup",
        }
    }
}

/// Outcome of one dialogue turn, returned to the telephony adapter.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: HashMap<String, String>,
    pub response_text: String,
    pub next_action: NextAction,
    pub needs_more_info: bool,
}
