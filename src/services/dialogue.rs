//! Per-call dialogue state machine.
//!
//! One call to [`process_user_input`] is one conversational turn: load the
//! call's state, classify and extract, decide the reply, persist the new
//! state. All `ConversationState` transitions happen here and only here —
//! the extractor reports what it saw, this module decides what to do with it.

use std::collections::HashMap;

use crate::models::{ConversationState, Intent, NextAction, Reservation, TurnResult};
use crate::services::nlu::entities::{capitalize, extract_entities, normalize_digit_words};
use crate::services::nlu::intent::recognize_intent;
use crate::services::nlu::patterns::PatternLibrary;
use crate::services::store::{self, SessionStore};

const CONFIRMATION_WORDS: &[&str] = &[
    "yes", "yeah", "yep", "correct", "right", "that's right", "that is correct", "yup",
];
const REJECTION_WORDS: &[&str] =
    &["no", "nope", "incorrect", "wrong", "try again", "that's wrong"];

const HOURS_NOTICE: &str = "Please note our restaurant is open from 9am to 10pm.";

/// Run one dialogue turn for `call_id`.
pub async fn process_user_input(
    store: &dyn SessionStore,
    call_id: &str,
    utterance: &str,
) -> anyhow::Result<TurnResult> {
    let current_state = load_state(store, call_id).await?;
    let (intent, confidence) = recognize_intent(utterance);
    let entities = extract_entities(utterance, &current_state);

    tracing::info!(
        call_id = %call_id,
        state = current_state.as_str(),
        intent = intent.as_str(),
        confidence,
        "processing turn"
    );

    let session = store::session_key(call_id);
    match intent {
        Intent::CheckReservation => store.set(&session, "action_type", "check").await?,
        Intent::CancelReservation => store.set(&session, "action_type", "cancel").await?,
        _ => {}
    }

    let mut turn = TurnResult {
        intent,
        confidence,
        entities,
        response_text: String::new(),
        next_action: NextAction::None,
        needs_more_info: true,
    };

    match current_state {
        ConversationState::Initial => handle_initial(store, call_id, intent, &mut turn).await?,
        ConversationState::CollectingName => {
            handle_name(store, call_id, utterance, &mut turn).await?
        }
        ConversationState::CollectingContact => {
            match store.get(&session, "pending_contact").await? {
                Some(pending) if is_confirmation(utterance) => {
                    commit_contact(store, call_id, &pending, &mut turn).await?
                }
                Some(_) if is_rejection(utterance) => {
                    store.delete(&session, "pending_contact").await?;
                    turn.response_text = "No problem. Please say your phone number again, \
                                          or you can say it digit by digit."
                        .to_string();
                    turn.next_action = NextAction::CollectContact;
                }
                // Neither yes nor no: treat it as a fresh phone number attempt.
                _ => handle_contact(store, call_id, utterance, &mut turn).await?,
            }
        }
        ConversationState::CollectingDate => {
            handle_date(store, call_id, utterance, &mut turn).await?
        }
        ConversationState::CollectingTime => match store.get(&session, "pending_time").await? {
            Some(pending) if is_confirmation(utterance) => {
                let text = format!("Perfect! Time: {pending}. How many people will be dining?");
                commit_time(store, call_id, &pending, text, &mut turn).await?;
            }
            Some(_) if is_rejection(utterance) => {
                store.delete(&session, "pending_time").await?;
                turn.response_text =
                    "No problem. Please say the time again. Remember, we're open from 9am to 10pm."
                        .to_string();
                turn.next_action = NextAction::CollectTime;
            }
            _ => handle_time(store, call_id, utterance, &mut turn).await?,
        },
        ConversationState::CollectingGuests => handle_guests(store, call_id, &mut turn).await?,
        ConversationState::CollectingReservationId => {
            handle_reservation_id(store, call_id, utterance, &mut turn).await?
        }
        ConversationState::ConfirmingReservation | ConversationState::Completed => {
            handle_wrap_up(intent, &mut turn)
        }
    }

    Ok(turn)
}

async fn handle_initial(
    store: &dyn SessionStore,
    call_id: &str,
    intent: Intent,
    turn: &mut TurnResult,
) -> anyhow::Result<()> {
    match intent {
        Intent::MakeReservation => {
            turn.response_text = "Great! I'd be happy to help you make a reservation. \
                                  May I please have your name?"
                .to_string();
            set_state(store, call_id, ConversationState::CollectingName).await?;
            turn.next_action = NextAction::CollectName;
        }
        Intent::CheckReservation => {
            turn.response_text = "I can help you check your reservation. \
                                  Please provide your reservation ID."
                .to_string();
            set_state(store, call_id, ConversationState::CollectingReservationId).await?;
            turn.next_action = NextAction::CollectReservationId;
        }
        Intent::CancelReservation => {
            turn.response_text = "I can help you cancel your reservation. \
                                  Please provide your reservation ID."
                .to_string();
            set_state(store, call_id, ConversationState::CollectingReservationId).await?;
            turn.next_action = NextAction::CollectReservationId;
        }
        Intent::Help => {
            turn.response_text = "I can help you make a new reservation, check an existing \
                                  reservation, or cancel a reservation. What would you like to do?"
                .to_string();
        }
        Intent::Greeting => {
            turn.response_text = "Hello! Welcome to our Restaurant Reservation System. \
                                  I can help you make a reservation, check an existing \
                                  reservation, or cancel a reservation. What would you like to do?"
                .to_string();
        }
        Intent::Goodbye => {
            turn.response_text = "Thank you for calling. Have a great day!".to_string();
            turn.next_action = NextAction::Hangup;
            turn.needs_more_info = false;
        }
        Intent::Unknown => {
            turn.response_text = "I didn't quite understand that. You can say 'make a \
                                  reservation', 'check reservation', or 'cancel reservation'. \
                                  How may I help you?"
                .to_string();
        }
    }
    Ok(())
}

async fn handle_name(
    store: &dyn SessionStore,
    call_id: &str,
    utterance: &str,
    turn: &mut TurnResult,
) -> anyhow::Result<()> {
    let name = match turn.entities.get("name").cloned() {
        Some(name) => Some(name),
        // Best effort: capitalize whatever words survive, however many.
        None => {
            let fallback: Vec<String> = utterance
                .split_whitespace()
                .filter(|w| w.len() > 1)
                .map(|w| capitalize(w))
                .collect();
            if fallback.is_empty() {
                None
            } else {
                Some(fallback.join(" "))
            }
        }
    };

    match name {
        Some(name) => {
            store
                .set(&store::draft_key(call_id), "name", &name)
                .await?;
            turn.response_text =
                format!("Thank you, {name}. What's the best phone number to reach you?");
            set_state(store, call_id, ConversationState::CollectingContact).await?;
            turn.next_action = NextAction::CollectContact;
        }
        None => {
            turn.response_text =
                "I didn't catch your name. Could you please say your name again?".to_string();
        }
    }
    Ok(())
}

async fn handle_contact(
    store: &dyn SessionStore,
    call_id: &str,
    utterance: &str,
    turn: &mut TurnResult,
) -> anyhow::Result<()> {
    let contact = match turn.entities.get("contact").cloned() {
        Some(contact) => Some(contact),
        None => recover_contact_digits(utterance),
    };

    match contact {
        Some(contact) => {
            store
                .set(&store::session_key(call_id), "pending_contact", &contact)
                .await?;
            let spoken = format_contact_for_speech(&contact);
            turn.response_text = format!(
                "I have {spoken}. Is that correct? Say yes to continue, or no to try again."
            );
            turn.next_action = NextAction::ConfirmContact;
        }
        None => {
            turn.response_text = "I'm having trouble catching your phone number. Could you \
                                  please say it slowly, digit by digit? For example, say \
                                  'five five five, one two three, four five six seven'."
                .to_string();
        }
    }
    Ok(())
}

/// Aggressive phone-number recovery: strip filler words, keep any digits,
/// then convert spelled-out digits and try again. Ten digits is the floor
/// for something we are willing to read back.
fn recover_contact_digits(utterance: &str) -> Option<String> {
    let lib = PatternLibrary::global();
    let cleaned = lib
        .filler_words
        .replace_all(&utterance.to_lowercase(), " ")
        .into_owned();

    let digits: String = cleaned.chars().filter(char::is_ascii_digit).collect();
    let digits = if digits.len() >= 10 {
        digits
    } else {
        normalize_digit_words(&cleaned)
            .chars()
            .filter(char::is_ascii_digit)
            .collect()
    };

    if digits.len() >= 10 {
        Some(digits.chars().take(15).collect())
    } else {
        None
    }
}

async fn commit_contact(
    store: &dyn SessionStore,
    call_id: &str,
    contact: &str,
    turn: &mut TurnResult,
) -> anyhow::Result<()> {
    store
        .set(&store::draft_key(call_id), "contact", contact)
        .await?;
    store
        .delete(&store::session_key(call_id), "pending_contact")
        .await?;
    turn.response_text = "Great! What date would you like to make the reservation for? \
                          For example, you can say 'tomorrow', 'next Friday', or a specific \
                          date like 'January fifteenth' or 'the fifteenth of January'."
        .to_string();
    set_state(store, call_id, ConversationState::CollectingDate).await?;
    turn.next_action = NextAction::CollectDate;
    Ok(())
}

async fn handle_date(
    store: &dyn SessionStore,
    call_id: &str,
    utterance: &str,
    turn: &mut TurnResult,
) -> anyhow::Result<()> {
    if let Some(date) = turn.entities.get("date").cloned() {
        return commit_date(store, call_id, &date, turn).await;
    }

    let retry = bump_retry(store, call_id, "date_retry_count").await?;

    // Narrow rescan: a month name right before a day number is usually what
    // the caller meant even when the full rules missed.
    let lower = utterance.to_lowercase();
    if let Some(caps) = PatternLibrary::global().month_day.captures(&lower) {
        let date = format!("{} {}", &caps[1], &caps[2]);
        return commit_date(store, call_id, &date, turn).await;
    }

    turn.response_text = match retry {
        1 => {
            "I didn't catch the date clearly. Please say the date again. You can say it \
             like 'November twentieth' or 'November 20th' or just 'tomorrow'."
        }
        2 => {
            "Let me try a different way. Please say the month first, then the day. \
             For example: 'November' pause 'twenty'."
        }
        _ => {
            "I'm still having trouble. Please say the month name, then pause, then say \
             the day number. For example, say: 'November' pause 'twenty'."
        }
    }
    .to_string();
    Ok(())
}

async fn commit_date(
    store: &dyn SessionStore,
    call_id: &str,
    date: &str,
    turn: &mut TurnResult,
) -> anyhow::Result<()> {
    store.set(&store::draft_key(call_id), "date", date).await?;
    store
        .delete(&store::session_key(call_id), "date_retry_count")
        .await?;
    turn.entities.insert("date".to_string(), date.to_string());
    turn.response_text = format!(
        "Reservation for {date}. What time would you like? {HOURS_NOTICE} \
         You can say the time in any format, like '1pm', '1 o'clock', or just '1'."
    );
    set_state(store, call_id, ConversationState::CollectingTime).await?;
    turn.next_action = NextAction::CollectTime;
    Ok(())
}

async fn handle_time(
    store: &dyn SessionStore,
    call_id: &str,
    utterance: &str,
    turn: &mut TurnResult,
) -> anyhow::Result<()> {
    let lib = PatternLibrary::global();

    if let Some(time) = turn.entities.get("time").cloned() {
        if lib.bare_number.is_match(&time) {
            if let Ok(hour) = time.parse::<u32>() {
                return propose_ambiguous_hour(store, call_id, hour, turn).await;
            }
        }
        if time_within_hours(&time) {
            let text = format!("Time: {time}. How many people will be dining?");
            return commit_time(store, call_id, &time, text, turn).await;
        }
        turn.response_text = format!(
            "I'm sorry, but our restaurant is only open from 9am to 10pm. \
             You requested {time}. Please choose a time between 9am and 10pm."
        );
        return Ok(());
    }

    let retry = bump_retry(store, call_id, "time_retry_count").await?;

    let lower = utterance.to_lowercase();
    let hour = lib
        .hour
        .captures(&lower)
        .and_then(|caps| caps[1].parse::<u32>().ok());
    let meridiem = lib.meridiem.find(&lower).map(|m| m.as_str().to_string());

    match (hour, meridiem) {
        (Some(hour), Some(meridiem)) => {
            let candidate = format!("{hour} {meridiem}");
            if time_within_hours(&candidate) {
                let text = format!("Time: {candidate}. How many people will be dining?");
                commit_time(store, call_id, &candidate, text, turn).await?;
            } else {
                turn.response_text = format!(
                    "I'm sorry, but our restaurant is only open from 9am to 10pm. \
                     You requested {candidate}. Please choose a time between 9am and 10pm."
                );
            }
        }
        (Some(hour), None) => propose_ambiguous_hour(store, call_id, hour, turn).await?,
        (None, _) => {
            turn.response_text = match retry {
                1 => {
                    "I didn't catch the time clearly. Please say the time again. You can \
                     say '1pm', '1 o'clock', or just '1'. Remember, we're open from 9am to 10pm."
                }
                2 => {
                    "Let me try a different way. Please say the hour first, then whether \
                     it's morning or evening. For example: 'one' pause 'PM'. We're open \
                     from 9am to 10pm."
                }
                _ => {
                    "I'm still having trouble. Please try saying just the hour number and \
                     whether it's AM or PM. For example: '1' pause 'PM'. Our restaurant is \
                     open from 9am to 10pm."
                }
            }
            .to_string();
        }
    }
    Ok(())
}

/// A bare hour with no meridiem is never committed directly. When the pm
/// reading falls inside opening hours we assume a dinner booking and ask for
/// confirmation; otherwise the caller has to pick am or pm themselves.
async fn propose_ambiguous_hour(
    store: &dyn SessionStore,
    call_id: &str,
    hour: u32,
    turn: &mut TurnResult,
) -> anyhow::Result<()> {
    if (1..=12).contains(&hour) {
        let assumed = format!("{hour} pm");
        if time_within_hours(&assumed) {
            store
                .set(&store::session_key(call_id), "pending_time", &assumed)
                .await?;
            turn.entities.insert("time".to_string(), assumed.clone());
            turn.response_text =
                format!("I have {assumed}. Is that correct? Say yes to continue.");
            turn.next_action = NextAction::ConfirmTime;
        } else {
            turn.response_text = format!(
                "I heard {hour}. Is that in the morning or evening? Please say \
                 '{hour}am' or '{hour}pm'. Remember, we're open from 9am to 10pm."
            );
        }
    } else {
        turn.response_text = format!(
            "I heard {hour}, but that doesn't seem like a valid time. Please say a \
             time between 9am and 10pm, like '1pm', '1 o'clock', or '7pm'."
        );
    }
    Ok(())
}

async fn commit_time(
    store: &dyn SessionStore,
    call_id: &str,
    time: &str,
    response_text: String,
    turn: &mut TurnResult,
) -> anyhow::Result<()> {
    let session = store::session_key(call_id);
    store.set(&store::draft_key(call_id), "time", time).await?;
    store.delete(&session, "pending_time").await?;
    store.delete(&session, "time_retry_count").await?;
    turn.entities.insert("time".to_string(), time.to_string());
    turn.response_text = response_text;
    set_state(store, call_id, ConversationState::CollectingGuests).await?;
    turn.next_action = NextAction::CollectGuests;
    Ok(())
}

async fn handle_guests(
    store: &dyn SessionStore,
    call_id: &str,
    turn: &mut TurnResult,
) -> anyhow::Result<()> {
    match turn.entities.get("guests").cloned() {
        Some(guests) => {
            let draft_key = store::draft_key(call_id);
            store.set(&draft_key, "guests", &guests).await?;

            let draft = store.get_all(&draft_key).await?;
            turn.response_text = format_reservation_summary(&draft);
            set_state(store, call_id, ConversationState::ConfirmingReservation).await?;
            turn.next_action = NextAction::ConfirmReservation;
            turn.needs_more_info = false;
        }
        None => {
            turn.response_text =
                "How many people will be dining? Please say the number.".to_string();
        }
    }
    Ok(())
}

async fn handle_reservation_id(
    store: &dyn SessionStore,
    call_id: &str,
    utterance: &str,
    turn: &mut TurnResult,
) -> anyhow::Result<()> {
    let upper = utterance.to_uppercase();
    let reservation_id = match turn.entities.get("reservation_id").cloned() {
        Some(id) => Some(id),
        // Looser rescan: spelled-out ids often come back shorter than the
        // strict rule expects.
        None => PatternLibrary::global()
            .loose_reservation_id
            .captures(&upper)
            .map(|caps| caps[1].to_string()),
    };

    let Some(reservation_id) = reservation_id else {
        turn.response_text = "I didn't catch your reservation ID. Please say your \
                              reservation ID again, or spell it out."
            .to_string();
        return Ok(());
    };

    let session = store::session_key(call_id);
    let action_type = store.get(&session, "action_type").await?;
    let record_key = store::reservation_key(&reservation_id);
    let found = store.exists(&record_key).await?;

    if action_type.as_deref() == Some("cancel") {
        if found {
            store.delete_key(&record_key).await?;
            tracing::info!(reservation_id = %reservation_id, "reservation cancelled");
            turn.response_text = format!(
                "Your reservation {reservation_id} has been successfully cancelled. \
                 Thank you for letting us know."
            );
        } else {
            turn.response_text = format!(
                "I couldn't find a reservation with ID {reservation_id}. Please \
                 double-check your reservation ID and try again, or contact our staff \
                 for assistance."
            );
        }
    } else if found {
        let record = store.get_all(&record_key).await?;
        let reservation = Reservation::from_fields(&reservation_id, &record);
        turn.response_text = format!(
            "I found your reservation. Reservation ID: {}. Name: {}. Date: {}. \
             Time: {}. Number of guests: {}. Is there anything else I can help you with?",
            reservation.reservation_id,
            reservation.name,
            reservation.date,
            reservation.time,
            reservation.guests,
        );
    } else {
        turn.response_text = format!(
            "I couldn't find a reservation with ID {reservation_id}. Please verify \
             your reservation ID and try again."
        );
    }

    set_state(store, call_id, ConversationState::Completed).await?;
    turn.next_action = NextAction::Complete;
    turn.needs_more_info = false;
    Ok(())
}

fn handle_wrap_up(intent: Intent, turn: &mut TurnResult) {
    if intent == Intent::Goodbye {
        turn.response_text = "Thank you for calling. Have a great day!".to_string();
        turn.next_action = NextAction::Hangup;
        turn.needs_more_info = false;
    } else {
        turn.response_text = "Is there anything else I can help you with?".to_string();
    }
}

async fn load_state(
    store: &dyn SessionStore,
    call_id: &str,
) -> anyhow::Result<ConversationState> {
    Ok(store
        .get(&store::session_key(call_id), "conversation_state")
        .await?
        .map(|s| ConversationState::parse(&s))
        .unwrap_or(ConversationState::Initial))
}

async fn set_state(
    store: &dyn SessionStore,
    call_id: &str,
    state: ConversationState,
) -> anyhow::Result<()> {
    store
        .set(
            &store::session_key(call_id),
            "conversation_state",
            state.as_str(),
        )
        .await
}

async fn bump_retry(
    store: &dyn SessionStore,
    call_id: &str,
    counter: &str,
) -> anyhow::Result<i64> {
    let session = store::session_key(call_id);
    let retry = store
        .get(&session, counter)
        .await?
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0)
        + 1;
    store.set(&session, counter, &retry.to_string()).await?;
    Ok(retry)
}

fn is_confirmation(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    CONFIRMATION_WORDS.iter().any(|w| lower.contains(w))
}

fn is_rejection(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    REJECTION_WORDS.iter().any(|w| lower.contains(w))
}

/// Opening hours are 9am to 10pm: am hours 9-11, pm hours 12 and 1-10.
/// Times that carry no hour digits or no meridiem are accepted as-is — the
/// ambiguous cases go through confirmation before they ever reach here.
fn time_within_hours(time: &str) -> bool {
    let lower = time.to_lowercase();
    let Some(hour) = PatternLibrary::global()
        .any_hour
        .captures(&lower)
        .and_then(|caps| caps[1].parse::<u32>().ok())
    else {
        return true;
    };

    if lower.contains("am") {
        (9..=11).contains(&hour)
    } else if lower.contains("pm") {
        hour == 12 || (1..=10).contains(&hour)
    } else {
        true
    }
}

/// Read a phone number back the way TTS should speak it: digit words,
/// grouped 3-3-4 for ten-digit numbers. Emails are spoken as-is.
fn format_contact_for_speech(contact: &str) -> String {
    if contact.contains('@') {
        return contact.to_string();
    }

    let words: Vec<&str> = contact
        .chars()
        .filter(char::is_ascii_digit)
        .map(digit_word)
        .collect();

    if words.len() == 10 {
        format!(
            "{}, {}, {}",
            words[..3].join(" "),
            words[3..6].join(" "),
            words[6..].join(" ")
        )
    } else {
        words.join(", ")
    }
}

fn digit_word(digit: char) -> &'static str {
    match digit {
        '0' => "zero",
        '1' => "one",
        '2' => "two",
        '3' => "three",
        '4' => "four",
        '5' => "five",
        '6' => "six",
        '7' => "seven",
        '8' => "eight",
        '9' => "nine",
        _ => "",
    }
}

fn format_reservation_summary(draft: &HashMap<String, String>) -> String {
    let field = |name: &str, default: &str| {
        draft
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    };
    format!(
        "Perfect! Let me confirm your reservation details. Name: {}, Date: {}, \
         Time: {}, Number of guests: {}. Your reservation has been recorded. \
         Is this correct?",
        field("name", "Customer"),
        field("date", "the selected date"),
        field("time", "the selected time"),
        field("guests", "N/A"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::db;
    use crate::services::store::sqlite::SqliteStore;

    fn test_store() -> SqliteStore {
        let conn = db::init_db(":memory:").unwrap();
        SqliteStore::new(Arc::new(Mutex::new(conn)))
    }

    async fn seed_state(store: &dyn SessionStore, call_id: &str, state: ConversationState) {
        store
            .set(&store::session_key(call_id), "conversation_state", state.as_str())
            .await
            .unwrap();
    }

    async fn stored_state(store: &dyn SessionStore, call_id: &str) -> ConversationState {
        load_state(store, call_id).await.unwrap()
    }

    #[tokio::test]
    async fn booking_intent_starts_name_collection() {
        let store = test_store();
        let turn = process_user_input(&store, "CA1", "I'd like to book a table")
            .await
            .unwrap();

        assert_eq!(turn.intent, Intent::MakeReservation);
        assert_eq!(turn.next_action, NextAction::CollectName);
        assert!(turn.needs_more_info);
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::CollectingName
        );
    }

    #[tokio::test]
    async fn goodbye_in_initial_state_hangs_up() {
        let store = test_store();
        let turn = process_user_input(&store, "CA1", "goodbye").await.unwrap();

        assert_eq!(turn.next_action, NextAction::Hangup);
        assert!(!turn.needs_more_info);
    }

    #[tokio::test]
    async fn unrecognized_initial_input_reprompts_without_advancing() {
        let store = test_store();
        let turn = process_user_input(&store, "CA1", "purple monkey dishwasher")
            .await
            .unwrap();

        assert_eq!(turn.intent, Intent::Unknown);
        assert_eq!(turn.next_action, NextAction::None);
        assert!(turn.needs_more_info);
        assert_eq!(stored_state(&store, "CA1").await, ConversationState::Initial);
    }

    #[tokio::test]
    async fn check_intent_records_action_type() {
        let store = test_store();
        let turn = process_user_input(&store, "CA1", "check my reservation please")
            .await
            .unwrap();

        assert_eq!(turn.next_action, NextAction::CollectReservationId);
        assert_eq!(
            store
                .get(&store::session_key("CA1"), "action_type")
                .await
                .unwrap()
                .as_deref(),
            Some("check")
        );
    }

    #[tokio::test]
    async fn name_turn_commits_and_advances_to_contact() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingName).await;

        let turn = process_user_input(&store, "CA1", "john smith").await.unwrap();

        assert_eq!(turn.next_action, NextAction::CollectContact);
        assert!(turn.response_text.contains("John Smith"));
        assert_eq!(
            store
                .get(&store::draft_key("CA1"), "name")
                .await
                .unwrap()
                .as_deref(),
            Some("John Smith")
        );
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::CollectingContact
        );
    }

    #[tokio::test]
    async fn long_names_fall_back_to_raw_capitalization() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingName).await;

        let turn = process_user_input(&store, "CA1", "alexander benjamin christopher davidson smith")
            .await
            .unwrap();

        assert_eq!(turn.next_action, NextAction::CollectContact);
        assert_eq!(
            store
                .get(&store::draft_key("CA1"), "name")
                .await
                .unwrap()
                .as_deref(),
            Some("Alexander Benjamin Christopher Davidson Smith")
        );
    }

    #[tokio::test]
    async fn contact_goes_pending_until_confirmed() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingContact).await;

        let turn = process_user_input(&store, "CA1", "555-123-4567").await.unwrap();

        assert_eq!(turn.next_action, NextAction::ConfirmContact);
        assert!(turn.response_text.contains("five five five, one two three"));
        assert_eq!(
            store
                .get(&store::session_key("CA1"), "pending_contact")
                .await
                .unwrap()
                .as_deref(),
            Some("5551234567")
        );
        // Not committed yet.
        assert_eq!(
            store.get(&store::draft_key("CA1"), "contact").await.unwrap(),
            None
        );
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::CollectingContact
        );
    }

    #[tokio::test]
    async fn confirming_contact_commits_and_moves_to_date() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingContact).await;
        store
            .set(&store::session_key("CA1"), "pending_contact", "5551234567")
            .await
            .unwrap();

        let turn = process_user_input(&store, "CA1", "yes").await.unwrap();

        assert_eq!(turn.next_action, NextAction::CollectDate);
        assert_eq!(
            store
                .get(&store::draft_key("CA1"), "contact")
                .await
                .unwrap()
                .as_deref(),
            Some("5551234567")
        );
        assert_eq!(
            store
                .get(&store::session_key("CA1"), "pending_contact")
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::CollectingDate
        );
    }

    #[tokio::test]
    async fn rejecting_contact_clears_pending_and_reprompts() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingContact).await;
        store
            .set(&store::session_key("CA1"), "pending_contact", "5551234567")
            .await
            .unwrap();

        let turn = process_user_input(&store, "CA1", "nope").await.unwrap();

        assert_eq!(turn.next_action, NextAction::CollectContact);
        assert_eq!(
            store
                .get(&store::session_key("CA1"), "pending_contact")
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::CollectingContact
        );
    }

    #[tokio::test]
    async fn spelled_out_digits_recover_into_a_pending_contact() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingContact).await;

        let turn = process_user_input(
            &store,
            "CA1",
            "five five five one two three four five six seven",
        )
        .await
        .unwrap();

        assert_eq!(turn.next_action, NextAction::ConfirmContact);
        assert_eq!(
            store
                .get(&store::session_key("CA1"), "pending_contact")
                .await
                .unwrap()
                .as_deref(),
            Some("5551234567")
        );
    }

    #[tokio::test]
    async fn date_turn_advances_to_time() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingDate).await;

        let turn = process_user_input(&store, "CA1", "november twentieth").await.unwrap();

        assert_eq!(turn.next_action, NextAction::CollectTime);
        assert_eq!(
            store
                .get(&store::draft_key("CA1"), "date")
                .await
                .unwrap()
                .as_deref(),
            Some("november twentieth")
        );
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::CollectingTime
        );
    }

    #[tokio::test]
    async fn date_retries_escalate_and_reset_on_success() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingDate).await;

        let first = process_user_input(&store, "CA1", "hmm").await.unwrap();
        let second = process_user_input(&store, "CA1", "hmm").await.unwrap();
        let third = process_user_input(&store, "CA1", "hmm").await.unwrap();

        assert!(first.needs_more_info);
        assert_ne!(first.response_text, second.response_text);
        assert_ne!(second.response_text, third.response_text);
        assert_ne!(first.response_text, third.response_text);
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::CollectingDate
        );

        let success = process_user_input(&store, "CA1", "tomorrow").await.unwrap();
        assert_eq!(success.next_action, NextAction::CollectTime);
        assert_eq!(
            store
                .get(&store::session_key("CA1"), "date_retry_count")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn month_day_fallback_rescues_a_missed_date() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingDate).await;

        // "um november 20 maybe" — full rules match "november 20" directly,
        // so force the fallback with an ordinal the main rules reject.
        let turn = process_user_input(&store, "CA1", "november 20ish").await.unwrap();

        assert_eq!(turn.next_action, NextAction::CollectTime);
        assert_eq!(
            store
                .get(&store::draft_key("CA1"), "date")
                .await
                .unwrap()
                .as_deref(),
            Some("november 20")
        );
    }

    #[tokio::test]
    async fn valid_times_commit_and_advance() {
        for time in ["9am", "10pm", "12pm"] {
            let store = test_store();
            seed_state(&store, "CA1", ConversationState::CollectingTime).await;

            let turn = process_user_input(&store, "CA1", time).await.unwrap();
            assert_eq!(turn.next_action, NextAction::CollectGuests, "time {time}");
            assert_eq!(
                stored_state(&store, "CA1").await,
                ConversationState::CollectingGuests
            );
        }
    }

    #[tokio::test]
    async fn out_of_hours_times_are_rejected() {
        for time in ["8am", "11pm"] {
            let store = test_store();
            seed_state(&store, "CA1", ConversationState::CollectingTime).await;

            let turn = process_user_input(&store, "CA1", time).await.unwrap();
            assert_eq!(turn.next_action, NextAction::None, "time {time}");
            assert!(turn.response_text.contains("9am to 10pm"));
            assert_eq!(
                stored_state(&store, "CA1").await,
                ConversationState::CollectingTime
            );
        }
    }

    #[tokio::test]
    async fn bare_hour_goes_pending_pm_and_confirms() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingTime).await;

        let turn = process_user_input(&store, "CA1", "7").await.unwrap();

        assert_eq!(turn.next_action, NextAction::ConfirmTime);
        assert_eq!(
            store
                .get(&store::session_key("CA1"), "pending_time")
                .await
                .unwrap()
                .as_deref(),
            Some("7 pm")
        );
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::CollectingTime
        );

        let followup = process_user_input(&store, "CA1", "yes").await.unwrap();
        assert_eq!(followup.next_action, NextAction::CollectGuests);
        assert_eq!(
            store
                .get(&store::draft_key("CA1"), "time")
                .await
                .unwrap()
                .as_deref(),
            Some("7 pm")
        );
        assert_eq!(
            store
                .get(&store::session_key("CA1"), "pending_time")
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::CollectingGuests
        );
    }

    #[tokio::test]
    async fn bare_eleven_asks_for_meridiem_instead_of_assuming_pm() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingTime).await;

        let turn = process_user_input(&store, "CA1", "11").await.unwrap();

        assert_eq!(turn.next_action, NextAction::None);
        assert!(turn.response_text.contains("morning or evening"));
        assert_eq!(
            store
                .get(&store::session_key("CA1"), "pending_time")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn rejecting_pending_time_reprompts() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingTime).await;
        store
            .set(&store::session_key("CA1"), "pending_time", "7 pm")
            .await
            .unwrap();

        let turn = process_user_input(&store, "CA1", "no").await.unwrap();

        assert_eq!(turn.next_action, NextAction::CollectTime);
        assert_eq!(
            store
                .get(&store::session_key("CA1"), "pending_time")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn time_retries_escalate_when_no_hour_is_heard() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingTime).await;

        let first = process_user_input(&store, "CA1", "whenever").await.unwrap();
        let second = process_user_input(&store, "CA1", "whenever").await.unwrap();

        assert!(first.needs_more_info);
        assert_ne!(first.response_text, second.response_text);
    }

    #[tokio::test]
    async fn guests_complete_collection_with_a_summary() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingGuests).await;
        let draft = store::draft_key("CA1");
        store.set(&draft, "name", "John Smith").await.unwrap();
        store.set(&draft, "contact", "5551234567").await.unwrap();
        store.set(&draft, "date", "tomorrow").await.unwrap();
        store.set(&draft, "time", "7 pm").await.unwrap();

        let turn = process_user_input(&store, "CA1", "4 people").await.unwrap();

        assert_eq!(turn.next_action, NextAction::ConfirmReservation);
        assert!(!turn.needs_more_info);
        assert!(turn.response_text.contains("Name: John Smith"));
        assert!(turn.response_text.contains("Number of guests: 4"));
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::ConfirmingReservation
        );
    }

    #[tokio::test]
    async fn missing_guest_count_reprompts_and_keeps_listening() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingGuests).await;

        let turn = process_user_input(&store, "CA1", "the whole family").await.unwrap();

        assert!(turn.needs_more_info);
        assert_eq!(turn.next_action, NextAction::None);
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::CollectingGuests
        );
    }

    #[tokio::test]
    async fn cancel_with_unknown_id_reports_not_found_and_completes() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingReservationId).await;
        store
            .set(&store::session_key("CA1"), "action_type", "cancel")
            .await
            .unwrap();

        let turn = process_user_input(&store, "CA1", "ABCD1234").await.unwrap();

        assert!(turn.response_text.contains("couldn't find"));
        assert_eq!(turn.next_action, NextAction::Complete);
        assert!(!turn.needs_more_info);
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::Completed
        );
    }

    #[tokio::test]
    async fn cancel_with_known_id_deletes_the_record() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingReservationId).await;
        store
            .set(&store::session_key("CA1"), "action_type", "cancel")
            .await
            .unwrap();
        let record = store::reservation_key("ABCD1234");
        store.set(&record, "name", "John Smith").await.unwrap();

        let turn = process_user_input(&store, "CA1", "ABCD1234").await.unwrap();

        assert!(turn.response_text.contains("successfully cancelled"));
        assert_eq!(turn.next_action, NextAction::Complete);
        assert!(!store.exists(&record).await.unwrap());
    }

    #[tokio::test]
    async fn check_with_known_id_reads_back_the_record() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingReservationId).await;
        store
            .set(&store::session_key("CA1"), "action_type", "check")
            .await
            .unwrap();
        let record = store::reservation_key("ABCD1234");
        store.set(&record, "name", "John Smith").await.unwrap();
        store.set(&record, "date", "november twentieth").await.unwrap();
        store.set(&record, "time", "7 pm").await.unwrap();
        store.set(&record, "guests", "4").await.unwrap();

        let turn = process_user_input(&store, "CA1", "it is ABCD1234").await.unwrap();

        assert!(turn.response_text.contains("Name: John Smith"));
        assert!(turn.response_text.contains("Number of guests: 4"));
        assert_eq!(turn.next_action, NextAction::Complete);
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::Completed
        );
    }

    #[tokio::test]
    async fn missing_reservation_id_reprompts() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::CollectingReservationId).await;
        store
            .set(&store::session_key("CA1"), "action_type", "check")
            .await
            .unwrap();

        let turn = process_user_input(&store, "CA1", "uh hm").await.unwrap();

        assert!(turn.response_text.contains("reservation ID"));
        assert!(turn.needs_more_info);
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::CollectingReservationId
        );
    }

    #[tokio::test]
    async fn confirming_state_is_idempotent_for_repeated_confirmations() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::ConfirmingReservation).await;

        let first = process_user_input(&store, "CA1", "yes that's right").await.unwrap();
        let second = process_user_input(&store, "CA1", "yes that's right").await.unwrap();

        assert_eq!(first.response_text, second.response_text);
        assert_eq!(first.next_action, NextAction::None);
        assert_eq!(
            stored_state(&store, "CA1").await,
            ConversationState::ConfirmingReservation
        );
    }

    #[tokio::test]
    async fn goodbye_after_completion_hangs_up() {
        let store = test_store();
        seed_state(&store, "CA1", ConversationState::Completed).await;

        let turn = process_user_input(&store, "CA1", "thanks, bye").await.unwrap();

        assert_eq!(turn.next_action, NextAction::Hangup);
        assert!(!turn.needs_more_info);
    }

    #[test]
    fn opening_hours_validation() {
        assert!(time_within_hours("9am"));
        assert!(!time_within_hours("8am"));
        assert!(time_within_hours("10pm"));
        assert!(!time_within_hours("11pm"));
        assert!(time_within_hours("12pm"));
        // No digits or no meridiem: accepted as-is.
        assert!(time_within_hours("evening"));
        assert!(time_within_hours("7:30"));
    }

    #[test]
    fn contact_speech_formatting() {
        assert_eq!(
            format_contact_for_speech("5551234567"),
            "five five five, one two three, four five six seven"
        );
        assert_eq!(
            format_contact_for_speech("jane@example.com"),
            "jane@example.com"
        );
    }
}
