use chrono::{DateTime, Utc};
use ml_stacks_core::contract::{ApiGatewayResponse, TrainingStarted};
use ml_stacks_core::env::TrainingEnv;
use ml_stacks_core::jobs::TrainingJobRequest;

use crate::adapters::sagemaker::TrainingJobs;

/// Starts one training job named after the configured prefix and `now`.
pub fn handle_training_event(
    env: &TrainingEnv,
    now: DateTime<Utc>,
    jobs: &dyn TrainingJobs,
) -> ApiGatewayResponse {
    let request = match TrainingJobRequest::from_env(env, now) {
        Ok(request) => request,
        Err(error) => {
            tracing::error!(error = %error, "cannot build training job request");
            return ApiGatewayResponse::error(500, "invalid_job_name", &error.to_string());
        }
    };

    match jobs.create_training_job(&request) {
        Ok(training_job_arn) => {
            tracing::info!(
                training_job_name = %request.training_job_name,
                training_job_arn = %training_job_arn,
                max_depth = env.max_depth,
                "training job created"
            );
            ApiGatewayResponse::json(
                200,
                &TrainingStarted {
                    training_job_name: request.training_job_name,
                    training_job_arn,
                },
            )
        }
        Err(message) => {
            tracing::error!(
                training_job_name = %request.training_job_name,
                error = %message,
                "training job creation failed"
            );
            ApiGatewayResponse::error(500, "create_training_job_failed", &message)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;
    use serde_json::Value;

    use super::*;

    struct CapturingJobs {
        requests: Mutex<Vec<TrainingJobRequest>>,
        fail_with: Option<String>,
    }

    impl CapturingJobs {
        fn new(fail_with: Option<&str>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                fail_with: fail_with.map(str::to_string),
            }
        }

        fn requests(&self) -> Vec<TrainingJobRequest> {
            self.requests.lock().expect("poisoned mutex").clone()
        }
    }

    impl TrainingJobs for CapturingJobs {
        fn create_training_job(&self, request: &TrainingJobRequest) -> Result<String, String> {
            self.requests
                .lock()
                .expect("poisoned mutex")
                .push(request.clone());
            match &self.fail_with {
                Some(message) => Err(message.clone()),
                None => Ok(format!(
                    "arn:aws:sagemaker:us-east-1:123456789012:training-job/{}",
                    request.training_job_name
                )),
            }
        }
    }

    fn env(prefix: &str) -> TrainingEnv {
        TrainingEnv {
            training_job_prefix: prefix.to_string(),
            container: "xgboost:1.7-1".to_string(),
            role_arn: "arn:aws:iam::123456789012:role/sagemaker-execution".to_string(),
            s3_input_train: "s3://bucket/train".to_string(),
            s3_input_validation: "s3://bucket/validation".to_string(),
            s3_output: "s3://bucket/output".to_string(),
            max_depth: 5,
            instance_type: "ml.m4.xlarge".to_string(),
            instance_count: 1,
            volume_size_gb: 5,
            max_runtime_seconds: 3600,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 6, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn returns_started_job_on_success() {
        let jobs = CapturingJobs::new(None);
        let response = handle_training_event(&env("xgb-"), now(), &jobs);

        assert_eq!(response.status_code, 200);
        let body: TrainingStarted =
            serde_json::from_str(&response.body).expect("body should parse");
        assert_eq!(body.training_job_name, "xgb-2026-10-17-06-00-00");
        assert!(body.training_job_arn.ends_with("training-job/xgb-2026-10-17-06-00-00"));
        assert_eq!(jobs.requests()[0].role_arn, env("xgb-").role_arn);
    }

    #[test]
    fn reports_sdk_failure() {
        let jobs = CapturingJobs::new(Some("ResourceLimitExceeded"));
        let response = handle_training_event(&env("xgb-"), now(), &jobs);

        assert_eq!(response.status_code, 500);
        let body: Value = serde_json::from_str(&response.body).expect("body should be json");
        assert_eq!(body["error"], "create_training_job_failed");
    }

    #[test]
    fn invalid_prefix_never_reaches_sagemaker() {
        let jobs = CapturingJobs::new(None);
        let response = handle_training_event(&env("bad_prefix_"), now(), &jobs);

        assert_eq!(response.status_code, 500);
        assert!(jobs.requests().is_empty());
    }
}
