//! State-aware entity extraction.
//!
//! Each field is tried independently against its ordered rule list, first
//! match wins. An utterance can therefore yield several fields at once; the
//! dialogue engine decides which of them the current state actually wants.
//! Absence of a key means "not found" — extraction itself never fails.

use std::collections::HashMap;

use regex::Captures;

use crate::models::ConversationState;
use crate::services::nlu::patterns::PatternLibrary;

/// Extraction order is date, time, guests, reservation id, name, contact so
/// the bare-number guest fallback cannot shadow the more specific rules.
pub fn extract_entities(
    utterance: &str,
    current_state: &ConversationState,
) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    let lower = utterance.to_lowercase();
    let lib = PatternLibrary::global();

    if let Some(date) = extract_date(lib, &lower) {
        entities.insert("date".to_string(), date);
    }
    if let Some(time) = extract_time(lib, &lower) {
        entities.insert("time".to_string(), time);
    }
    if let Some(guests) = extract_guests(lib, &lower) {
        entities.insert("guests".to_string(), guests);
    }
    if let Some(id) = lib.reservation_id.captures(&utterance.to_uppercase()) {
        entities.insert("reservation_id".to_string(), id[1].to_string());
    }
    if *current_state == ConversationState::CollectingName {
        if let Some(name) = extract_name(utterance) {
            entities.insert("name".to_string(), name);
        }
    }
    if let Some(contact) = extract_contact(lib, &lower) {
        entities.insert("contact".to_string(), contact);
    }

    entities
}

fn extract_date(lib: &PatternLibrary, lower: &str) -> Option<String> {
    for pattern in &lib.dates {
        if let Some(m) = pattern.find(lower) {
            let matched = m.as_str();
            if matched.contains("of") {
                return Some(reorder_day_of_month(matched));
            }
            return Some(matched.to_string());
        }
    }
    None
}

/// Rewrite "20th of november" (or "the 20th of november") as "november 20th"
/// so dates are stored month-first.
fn reorder_day_of_month(matched: &str) -> String {
    let parts: Vec<&str> = matched.split_whitespace().collect();
    match parts.iter().position(|w| *w == "of") {
        Some(i) if i > 0 && i < parts.len() - 1 => {
            format!("{} {}", parts[i + 1], parts[..i].join(" "))
        }
        _ => matched.to_string(),
    }
}

fn extract_time(lib: &PatternLibrary, lower: &str) -> Option<String> {
    for pattern in &lib.times {
        if let Some(m) = pattern.find(lower) {
            let matched = m.as_str().trim();
            if matched.contains("clock") {
                return Some(normalize_oclock(lib, matched));
            }
            return Some(matched.to_string());
        }
    }
    None
}

/// "seven o'clock" becomes "7 pm": spelled numbers one..twelve convert to
/// digits, and a missing meridiem defaults to pm (dinner hours).
fn normalize_oclock(lib: &PatternLibrary, matched: &str) -> String {
    let number = lib
        .clock_number
        .captures(matched)
        .map(|caps| spoken_number_to_digits(&caps[1]));
    let meridiem = lib.meridiem.find(matched).map(|m| m.as_str());

    match number {
        Some(number) => format!("{} {}", number, meridiem.unwrap_or("pm")),
        None => matched.to_string(),
    }
}

fn spoken_number_to_digits(word: &str) -> String {
    match word {
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "ten" => "10",
        "eleven" => "11",
        "twelve" => "12",
        other => return other.to_string(),
    }
    .to_string()
}

fn extract_guests(lib: &PatternLibrary, lower: &str) -> Option<String> {
    for pattern in &lib.guests {
        if let Some(caps) = pattern.captures(lower) {
            if let Ok(guests) = caps[1].parse::<u32>() {
                if (1..=20).contains(&guests) {
                    return Some(guests.to_string());
                }
            }
        }
    }
    None
}

fn extract_name(utterance: &str) -> Option<String> {
    let candidates: Vec<String> = utterance
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(capitalize)
        .collect();

    if (1..=3).contains(&candidates.len()) {
        Some(candidates.join(" "))
    } else {
        None
    }
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn extract_contact(lib: &PatternLibrary, lower: &str) -> Option<String> {
    let normalized = normalize_digit_words(lower);

    for pattern in &lib.phones {
        if let Some(caps) = pattern.captures(&normalized) {
            let digits: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.len() >= 10 {
                return Some(digits);
            }
        }
    }

    lib.email.find(lower).map(|m| m.as_str().to_string())
}

/// Replace spelled-out digit words with digits, word-boundary aware, so
/// "five five five" becomes "5 5 5" without touching words like "phone".
pub fn normalize_digit_words(input: &str) -> String {
    PatternLibrary::global()
        .digit_words
        .replace_all(input, |caps: &Captures| digit_for_word(&caps[1]).to_string())
        .into_owned()
}

fn digit_for_word(word: &str) -> &'static str {
    match word {
        "zero" | "oh" | "o" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        _ => "",
    }
}
