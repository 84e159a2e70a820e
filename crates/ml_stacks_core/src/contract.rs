use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const STATUS_COMPLETED: &str = "Completed";
pub const STATUS_FAILED: &str = "Failed";

/// Lambda proxy-integration response understood by API Gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
    /// Set when `body` carries base64 of a payload that is not UTF-8.
    #[serde(rename = "isBase64Encoded", default)]
    pub is_base64_encoded: bool,
}

impl ApiGatewayResponse {
    pub fn raw(status_code: u16, content_type: &str, body: String) -> Self {
        Self {
            status_code,
            headers: json!({ "Content-Type": content_type }),
            body,
            is_base64_encoded: false,
        }
    }

    /// Response whose `body` is already base64; API Gateway decodes it.
    pub fn base64_encoded(status_code: u16, content_type: &str, encoded_body: String) -> Self {
        Self {
            is_base64_encoded: true,
            ..Self::raw(status_code, content_type, encoded_body)
        }
    }

    pub fn json(status_code: u16, payload: &impl Serialize) -> Self {
        match serde_json::to_string(payload) {
            Ok(body) => Self::raw(status_code, "application/json", body),
            Err(error) => Self::error(500, "serialization_error", &error.to_string()),
        }
    }

    pub fn error(status_code: u16, error: &str, message: &str) -> Self {
        Self::raw(
            status_code,
            "application/json",
            json!({
                "error": error,
                "message": message,
            })
            .to_string(),
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Result of a batch-transform invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransformStatus {
    pub status: String,
    pub name: String,
}

impl TransformStatus {
    pub fn completed(name: impl Into<String>) -> Self {
        Self {
            status: STATUS_COMPLETED.to_string(),
            name: name.into(),
        }
    }

    pub fn failed(name: impl Into<String>) -> Self {
        Self {
            status: STATUS_FAILED.to_string(),
            name: name.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainingStarted {
    pub training_job_name: String,
    pub training_job_arn: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_response_serializes_proxy_shape() {
        let response = ApiGatewayResponse::raw(200, "text/csv", "0.93".to_string());
        let value = serde_json::to_value(&response).expect("response should serialize");

        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["headers"]["Content-Type"], "text/csv");
        assert_eq!(value["body"], "0.93");
        assert_eq!(value["isBase64Encoded"], false);
    }

    #[test]
    fn base64_response_sets_the_flag() {
        let response =
            ApiGatewayResponse::base64_encoded(200, "application/x-protobuf", "AP8=".to_string());
        let value = serde_json::to_value(&response).expect("response should serialize");

        assert_eq!(value["isBase64Encoded"], true);
        assert_eq!(value["body"], "AP8=");
        assert_eq!(value["headers"]["Content-Type"], "application/x-protobuf");
    }

    #[test]
    fn error_response_carries_code_and_message() {
        let response = ApiGatewayResponse::error(500, "invoke_failed", "endpoint not found");
        let body: Value = serde_json::from_str(&response.body).expect("body should be json");

        assert!(!response.is_success());
        assert_eq!(body["error"], "invoke_failed");
        assert_eq!(body["message"], "endpoint not found");
    }

    #[test]
    fn transform_status_serializes_status_and_name() {
        let value = serde_json::to_value(TransformStatus::failed("batch-2026-01-01-00-00-00"))
            .expect("status should serialize");
        assert_eq!(
            value,
            json!({"status": "Failed", "name": "batch-2026-01-01-00-00-00"})
        );
    }
}
