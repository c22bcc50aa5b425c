use sqlx::SqlitePool;

/// Shared handles for request handlers. Holds no per-request data.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
