//! Response helpers. Success bodies are the bare object or array.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// Error payload: `{"error": "...", "error_code": "..."}`.
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    pub error_code: String,
}

pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<T>) {
    (StatusCode::OK, Json(data))
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(data))
}
