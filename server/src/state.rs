use crate::db::Database;
use crate::repositories::EventRepository;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub events: EventRepository,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            events: EventRepository::new(db),
        }
    }
}
