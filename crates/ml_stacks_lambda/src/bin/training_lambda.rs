use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use ml_stacks_core::contract::ApiGatewayResponse;
use ml_stacks_core::env::TrainingEnv;
use ml_stacks_lambda::adapters::aws::SageMakerJobsClient;
use ml_stacks_lambda::handlers::training::handle_training_event;
use ml_stacks_lambda::telemetry::init_tracing;
use serde_json::Value;

async fn handle_request(
    _event: LambdaEvent<Value>,
    env: &TrainingEnv,
    jobs: &SageMakerJobsClient,
) -> Result<ApiGatewayResponse, Error> {
    Ok(handle_training_event(env, Utc::now(), jobs))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let env = TrainingEnv::from_process_env().map_err(|error| Error::from(error.to_string()))?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let jobs = SageMakerJobsClient {
        client: aws_sdk_sagemaker::Client::new(&aws_config),
    };

    lambda_runtime::run(service_fn(|event| handle_request(event, &env, &jobs))).await
}
