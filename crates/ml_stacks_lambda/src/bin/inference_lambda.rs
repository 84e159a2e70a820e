use lambda_runtime::{service_fn, Error, LambdaEvent};
use ml_stacks_core::contract::ApiGatewayResponse;
use ml_stacks_core::env::InferenceEnv;
use ml_stacks_lambda::adapters::aws::{S3ObjectFetcher, SageMakerRuntimeClient};
use ml_stacks_lambda::handlers::inference::handle_inference_event;
use ml_stacks_lambda::telemetry::init_tracing;
use serde_json::Value;

struct RuntimeDependencies {
    env: InferenceEnv,
    invoker: SageMakerRuntimeClient,
    fetcher: S3ObjectFetcher,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<ApiGatewayResponse, Error> {
    Ok(handle_inference_event(
        event.payload,
        &deps.env,
        &deps.invoker,
        &deps.fetcher,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let env = InferenceEnv::from_process_env().map_err(|error| Error::from(error.to_string()))?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        env,
        invoker: SageMakerRuntimeClient {
            client: aws_sdk_sagemakerruntime::Client::new(&aws_config),
        },
        fetcher: S3ObjectFetcher {
            client: aws_sdk_s3::Client::new(&aws_config),
        },
    };

    lambda_runtime::run(service_fn(|event| handle_request(event, &deps))).await
}
