use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A confirmed reservation as stored under `reservation:{reservation_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,
    pub name: String,
    pub contact: String,
    pub date: String,
    pub time: String,
    pub guests: String,
    pub created_at: String,
}

impl Reservation {
    /// Build from a stored field map, filling absent fields with "N/A" so
    /// lookup responses always have something to say.
    pub fn from_fields(reservation_id: &str, fields: &HashMap<String, String>) -> Self {
        let field = |name: &str| fields.get(name).cloned().unwrap_or_else(|| "N/A".to_string());
        Self {
            reservation_id: reservation_id.to_string(),
            name: field("name"),
            contact: field("contact"),
            date: field("date"),
            time: field("time"),
            guests: field("guests"),
            created_at: fields.get("created_at").cloned().unwrap_or_default(),
        }
    }

    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("reservation_id", self.reservation_id.clone()),
            ("name", self.name.clone()),
            ("contact", self.contact.clone()),
            ("date", self.date.clone()),
            ("time", self.time.clone()),
            ("guests", self.guests.clone()),
            ("created_at", self.created_at.clone()),
        ]
    }
}
