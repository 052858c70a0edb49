use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

// -- Error Handling

/// A categorized HTTP error with a JSON body. Handlers return this for every
/// failure path so callers always get a status and a message, never a hang or
/// an unhandled fault.
pub struct HTTPError {
    status: StatusCode,
    message: String,
}

impl HTTPError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message }).to_string();
        Response::builder()
            .status(self.status)
            .header("Content-Type", "application/json")
            .body(body.into())
            .unwrap()
    }
}
