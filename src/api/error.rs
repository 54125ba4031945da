//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Wire form of registry errors
//!
//! Every error leaves the service as `{"error_code": <int>, "message":
//! "<text>"}` with the HTTP status the error kind dictates.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// The canonical error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_code: i32,
    pub message: String,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error_code: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_serialization() {
        let body = ErrorBody {
            error_code: 40401,
            message: "subject not found".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error_code"], 40401);
        assert_eq!(json["message"], "subject not found");
    }
}
