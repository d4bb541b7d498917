//! Turning a confirmed draft into a stored reservation record.

use chrono::Utc;

use crate::models::Reservation;
use crate::services::store::{self, SessionStore};

/// Reservation identifiers are 8 uppercase alphanumeric characters, carved
/// out of a v4 UUID so they stay unguessable without a counter.
pub fn generate_reservation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// Copy the call's draft into a permanent `reservation:{id}` record.
/// Called by the adapter once the dialogue engine reports the draft is
/// complete; the draft itself is cleaned up with the session when the call
/// ends.
pub async fn finalize_reservation(
    store: &dyn SessionStore,
    call_id: &str,
) -> anyhow::Result<Reservation> {
    let draft = store.get_all(&store::draft_key(call_id)).await?;

    let reservation_id = generate_reservation_id();
    let mut reservation = Reservation::from_fields(&reservation_id, &draft);
    reservation.created_at = Utc::now()
        .naive_utc()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    let record_key = store::reservation_key(&reservation_id);
    for (field, value) in reservation.to_fields() {
        store.set(&record_key, field, &value).await?;
    }

    tracing::info!(
        call_id = %call_id,
        reservation_id = %reservation_id,
        "reservation recorded"
    );
    Ok(reservation)
}

/// Read an id back character by character so TTS doesn't try to pronounce it.
pub fn format_id_for_speech(reservation_id: &str) -> String {
    reservation_id
        .chars()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
