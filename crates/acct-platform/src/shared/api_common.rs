//! Common API types

use serde::Serialize;
use utoipa::ToSchema;

/// Plain `{ message }` response body used by mutation endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
