//! Static recognition rule sets for the classifier and extractor.
//!
//! Patterns are data: each field has an ordered list tried top-to-bottom with
//! first-match-wins semantics. Reordering a list changes extraction priority,
//! so new rules should be appended within their list unless they are meant to
//! take precedence.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Intent;

const MONTHS: &str =
    "january|february|march|april|may|june|july|august|september|october|november|december";

const DAY_WORDS: &str = "first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth\
|eleventh|twelfth|thirteenth|fourteenth|fifteenth|sixteenth|seventeenth|eighteenth|nineteenth\
|twentieth|twenty[- ]first|twenty[- ]second|twenty[- ]third|twenty[- ]fourth|twenty[- ]fifth\
|twenty[- ]sixth|twenty[- ]seventh|twenty[- ]eighth|twenty[- ]ninth|thirtieth|thirty[- ]first";

pub struct PatternLibrary {
    intents: Vec<(Intent, Vec<Regex>)>,
    /// Date rules, in priority order: relative phrase, "Month Day[ordinal]",
    /// "[the] Day of Month", numeric date, "Month Day", weekday.
    pub dates: Vec<Regex>,
    /// Time rules, in priority order: "H:MM am/pm", "H am/pm", "H o'clock",
    /// "at/by H", bare-number-only input, day-part words, "half/quarter
    /// past/to H".
    pub times: Vec<Regex>,
    /// Guest-count rules: "N people", "table/reservation for N", bare N.
    pub guests: Vec<Regex>,
    /// Strict and loose reservation-id scans (applied to uppercased input).
    pub reservation_id: Regex,
    pub loose_reservation_id: Regex,
    /// Narrow month+day rescan used by the dialogue date fallback.
    pub month_day: Regex,
    /// Phone rules: bare digit run, NNN-NNN-NNNN, NNN-NNNNNNN, (NNN) NNN-NNNN.
    pub phones: Vec<Regex>,
    pub email: Regex,
    /// Spelled-out digit words, including spoken "oh"/"o" for zero.
    pub digit_words: Regex,
    /// Filler words stripped before the aggressive phone-number fallback.
    pub filler_words: Regex,
    pub hour: Regex,
    /// Boundary-free hour scan for validating already-extracted times, where
    /// the digits may be glued to a meridiem ("8am").
    pub any_hour: Regex,
    pub meridiem: Regex,
    /// A value that is nothing but a one- or two-digit number.
    pub bare_number: Regex,
    /// Number inside an "o'clock" match, digits or spelled one..twelve.
    pub clock_number: Regex,
}

impl PatternLibrary {
    pub fn global() -> &'static PatternLibrary {
        static LIBRARY: OnceLock<PatternLibrary> = OnceLock::new();
        LIBRARY.get_or_init(PatternLibrary::new)
    }

    pub fn intents(&self) -> &[(Intent, Vec<Regex>)] {
        &self.intents
    }

    fn new() -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("invalid pattern");

        let intents = vec![
            (
                Intent::MakeReservation,
                vec![
                    compile(r"\b(make|create|book|reserve|new reservation|want to reserve|need a table)\b"),
                    compile(r"\b(table for|reservation for|book a table)\b"),
                ],
            ),
            (
                Intent::CheckReservation,
                vec![
                    compile(r"\b(check|view|see|look up|find|status of|details of)\s+(my |the )?reservation\b"),
                    compile(r"\breservation (status|details|info)\b"),
                    compile(r"\bwhat is (my |the )?reservation\b"),
                ],
            ),
            (
                Intent::CancelReservation,
                vec![
                    compile(r"\b(cancel|delete|remove|cancel my|cancel the|remove my)\s+(reservation|booking)\b"),
                    compile(r"\bcancel\b"),
                ],
            ),
            (
                Intent::Greeting,
                vec![compile(
                    r"\b(hi|hello|hey|greetings|good morning|good afternoon|good evening)\b",
                )],
            ),
            (
                Intent::Help,
                vec![compile(r"\b(help|what can you do|options|menu|assistance|support)\b")],
            ),
            (
                Intent::Goodbye,
                vec![compile(r"\b(bye|goodbye|thanks|thank you|done|finish|exit|end)\b")],
            ),
        ];

        let dates = vec![
            compile(
                r"\b(today|tomorrow|next week|this week|next monday|next tuesday|next wednesday|next thursday|next friday|next saturday|next sunday)\b",
            ),
            compile(&format!(
                r"\b({MONTHS})\s+(\d{{1,2}}(?:st|nd|rd|th)?|{DAY_WORDS})\b"
            )),
            compile(&format!(
                r"\b(?:the\s+)?(\d{{1,2}}(?:st|nd|rd|th)?|{DAY_WORDS})\s+of\s+({MONTHS})\b"
            )),
            compile(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\b"),
            compile(&format!(r"\b({MONTHS})\s+(\d{{1,2}})\b")),
            compile(r"\b(?:next\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b"),
        ];

        let times = vec![
            compile(r"\b(\d{1,2}):(\d{2})\s*(am|pm)\b"),
            compile(r"\b(\d{1,2})\s*(am|pm)\b"),
            compile(
                r"\b(\d{1,2}|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\s*o['-]?clock\s*(am|pm)?\b",
            ),
            compile(r"\b(at|by|around|about)\s+(\d{1,2})\b"),
            compile(r"^\s*(\d{1,2})\s*$"),
            compile(r"\b(morning|afternoon|evening|night|noon|midnight|lunch|dinner)\b"),
            compile(r"\b(half|quarter)\s+(past|to)\s+(\d{1,2})\s*(am|pm)?\b"),
        ];

        let guests = vec![
            compile(r"\b(\d+)\s*(people|guests|persons|pax)\b"),
            compile(r"\b(?:table for|reservation for)\s+(\d+)\b"),
            compile(r"\b(\d+)\b"),
        ];

        let phones = vec![
            compile(r"\b(\d{10,15})\b"),
            compile(r"\b(\d{3}[-.\s]?\d{3}[-.\s]?\d{4})\b"),
            compile(r"\b(\d{3}[-.\s]?\d{7})\b"),
            compile(r"(\(\d{3}\)[-.\s]?\d{3}[-.\s]?\d{4})"),
        ];

        Self {
            intents,
            dates,
            times,
            guests,
            reservation_id: compile(r"\b([A-Z0-9]{6,10})\b"),
            loose_reservation_id: compile(r"\b([A-Z0-9]{4,10})\b"),
            month_day: compile(&format!(r"\b({MONTHS})\s+(\d{{1,2}})\w*\b")),
            phones,
            email: compile(r"\b[\w.-]+@[\w.-]+\.\w+\b"),
            digit_words: compile(
                r"\b(zero|one|two|three|four|five|six|seven|eight|nine|oh|o)\b",
            ),
            filler_words: compile(r"\b(my|phone|number|is|contact|reach|me|at)\b"),
            hour: compile(r"\b(\d{1,2})\b"),
            any_hour: compile(r"(\d{1,2})"),
            meridiem: compile(r"\b(am|pm)\b"),
            bare_number: compile(r"^\d{1,2}$"),
            clock_number: compile(
                r"\b(\d{1,2}|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\b",
            ),
        }
    }
}
