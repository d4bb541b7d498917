use serde::{Deserialize, Serialize};

/// Caller's coarse-grained goal for a single utterance.
///
/// Declaration order matters: the classifier breaks score ties in favor of
/// the first-declared intent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    MakeReservation,
    CheckReservation,
    CancelReservation,
    Greeting,
    Help,
    Goodbye,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::MakeReservation => "make_reservation",
            Intent::CheckReservation => "check_reservation",
            Intent::CancelReservation => "cancel_reservation",
            Intent::Greeting => "greeting",
            Intent::Help => "help",
            Intent::Goodbye => "goodbye",
            Intent::Unknown => "unknown",
        }
    }
}
