//! Response envelope shared by every JSON endpoint
//!
//! Success: `{ "status": "success", "data": { ... } }`
//! Failure: `{ "status": "error", "data": { "message": "...", "errorId"?: "..." } }`

use axum::{Json, http::StatusCode};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: Status,
    pub data: T,
}

/// Payload of an error envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
}

/// 200 OK with the success envelope
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: Status::Success,
        data,
    })
}

/// 201 Created with the success envelope
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok(data))
}

pub fn error(message: impl Into<String>, error_id: Option<String>) -> Json<Envelope<ErrorBody>> {
    Json(Envelope {
        status: Status::Error,
        data: ErrorBody {
            message: message.into(),
            error_id,
        },
    })
}
