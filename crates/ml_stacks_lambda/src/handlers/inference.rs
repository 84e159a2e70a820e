use base64::Engine;
use ml_stacks_core::contract::ApiGatewayResponse;
use ml_stacks_core::env::InferenceEnv;
use ml_stacks_core::jobs::InvokeRequest;
use serde_json::Value;

use crate::adapters::object_store::ObjectFetcher;
use crate::adapters::sagemaker::EndpointInvoker;

/// Invokes the configured endpoint with the request body, falling back to the
/// configured sample object when the request carries no body.
pub fn handle_inference_event(
    event: Value,
    env: &InferenceEnv,
    invoker: &dyn EndpointInvoker,
    fetcher: &dyn ObjectFetcher,
) -> ApiGatewayResponse {
    let body = match extract_body(&event) {
        Ok(Some(body)) => body,
        Ok(None) => match &env.sample_object {
            Some(location) => match fetcher.get_object(&location.bucket, &location.key) {
                Ok(bytes) => bytes,
                Err(message) => {
                    tracing::error!(
                        bucket = %location.bucket,
                        key = %location.key,
                        error = %message,
                        "failed to fetch sample object"
                    );
                    return ApiGatewayResponse::error(500, "fetch_failed", &message);
                }
            },
            None => {
                return ApiGatewayResponse::error(
                    400,
                    "validation_error",
                    "Request body is empty and no sample object is configured",
                )
            }
        },
        Err(message) => return ApiGatewayResponse::error(400, "validation_error", &message),
    };

    let request = InvokeRequest {
        endpoint_name: env.endpoint_name.clone(),
        content_type: env.content_type.clone(),
        body,
    };

    match invoker.invoke_endpoint(&request) {
        Ok(response) => {
            tracing::info!(
                endpoint_name = %request.endpoint_name,
                request_bytes = request.body.len(),
                response_bytes = response.body.len(),
                "endpoint invoked"
            );
            let content_type = response.content_type.as_deref().unwrap_or("text/plain");
            match String::from_utf8(response.body) {
                Ok(text) => ApiGatewayResponse::raw(200, content_type, text),
                Err(error) => ApiGatewayResponse::base64_encoded(
                    200,
                    content_type,
                    base64::engine::general_purpose::STANDARD.encode(error.into_bytes()),
                ),
            }
        }
        Err(message) => {
            tracing::error!(
                endpoint_name = %request.endpoint_name,
                error = %message,
                "endpoint invocation failed"
            );
            ApiGatewayResponse::error(500, "invoke_failed", &message)
        }
    }
}

/// Pulls the payload out of a proxy event or a direct invocation.
///
/// `Ok(None)` means the caller sent nothing usable as a body.
fn extract_body(event: &Value) -> Result<Option<Vec<u8>>, String> {
    let (body, base64_encoded) = match event {
        Value::Null => return Ok(None),
        Value::String(text) => (Value::String(text.clone()), false),
        Value::Object(object) => match object.get("body") {
            Some(body) => (
                body.clone(),
                object
                    .get("isBase64Encoded")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            ),
            None => return Ok(None),
        },
        _ => return Err("Request payload must be a JSON object or string".to_string()),
    };

    match body {
        Value::Null => Ok(None),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) if base64_encoded => base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .map(Some)
            .map_err(|error| format!("Malformed base64 body: {error}")),
        Value::String(text) => Ok(Some(text.into_bytes())),
        other => serde_json::to_vec(&other)
            .map(Some)
            .map_err(|error| format!("Malformed JSON body: {error}")),
    }
}
