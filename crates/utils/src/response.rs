use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Envelope shared by the CRUD routes of the admin API.
#[derive(Debug, Serialize, Deserialize, TS)]
pub struct ApiResponse<T, E = T> {
    success: bool,
    data: Option<T>,
    error_data: Option<E>,
    message: Option<String>,
}

impl<T, E> ApiResponse<T, E> {
    /// Creates a successful response, with `data` and no message.
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            message: None,
            error_data: None,
        }
    }

    /// Creates an error response, with `message` and no data.
    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            message: Some(message.to_string()),
            error_data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_serializes_data() {
        let json = serde_json::to_value(ApiResponse::<&str>::success("ok")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], "ok");
        assert!(json["message"].is_null());
    }

    #[test]
    fn test_error_carries_message() {
        let response = ApiResponse::<()>::error("slug already exists");
        assert!(!response.is_success());
        assert_eq!(response.message(), Some("slug already exists"));
    }
}
