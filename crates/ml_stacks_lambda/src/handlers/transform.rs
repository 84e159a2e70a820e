use chrono::{DateTime, Utc};
use ml_stacks_core::contract::TransformStatus;
use ml_stacks_core::env::TransformEnv;
use ml_stacks_core::jobs::{job_timestamp, TransformJobRequest};

use crate::adapters::sagemaker::TransformJobs;

/// Starts one batch-transform job and reports whether the request was accepted.
///
/// SDK failures are logged and reported as `Failed`; they never surface as
/// an invocation error.
pub fn handle_transform_event(
    env: &TransformEnv,
    now: DateTime<Utc>,
    jobs: &dyn TransformJobs,
) -> TransformStatus {
    let request = match TransformJobRequest::from_env(env, now) {
        Ok(request) => request,
        Err(error) => {
            tracing::error!(error = %error, "cannot build transform job request");
            return TransformStatus::failed(format!(
                "{}{}",
                env.transform_job_name,
                job_timestamp(now)
            ));
        }
    };

    match jobs.create_transform_job(&request) {
        Ok(transform_job_arn) => {
            tracing::info!(
                transform_job_name = %request.transform_job_name,
                transform_job_arn = %transform_job_arn,
                model_name = %request.model_name,
                "transform job created"
            );
            TransformStatus::completed(request.transform_job_name)
        }
        Err(message) => {
            tracing::error!(
                transform_job_name = %request.transform_job_name,
                error = %message,
                "transform job creation failed"
            );
            TransformStatus::failed(request.transform_job_name)
        }
    }
}
