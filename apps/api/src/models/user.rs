use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The verified identity behind a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SessionIdentity {
    pub user_id: Uuid,
    pub email: String,
}
