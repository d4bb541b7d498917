use crate::config::AppConfig;
use crate::services::store::SessionStore;

pub struct AppState {
    pub store: Box<dyn SessionStore>,
    pub config: AppConfig,
}
