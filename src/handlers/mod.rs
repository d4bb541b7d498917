pub mod health;
pub mod twiml;
pub mod voice;
