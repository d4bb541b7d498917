pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;

/// Narrow key-value contract over the external session/reservation store.
///
/// Keys are hashes of string fields. The backing service must serialize
/// read-modify-write sequences per key; callers never assume cross-field
/// transactions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str, field: &str) -> anyhow::Result<Option<String>>;
    async fn get_all(&self, key: &str) -> anyhow::Result<HashMap<String, String>>;
    async fn set(&self, key: &str, field: &str, value: &str) -> anyhow::Result<()>;
    async fn delete(&self, key: &str, field: &str) -> anyhow::Result<()>;
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;
    async fn delete_key(&self, key: &str) -> anyhow::Result<()>;
}

pub fn session_key(call_id: &str) -> String {
    format!("call_session:{call_id}")
}

pub fn draft_key(call_id: &str) -> String {
    format!("reservation_data:{call_id}")
}

pub fn reservation_key(reservation_id: &str) -> String {
    format!("reservation:{reservation_id}")
}
