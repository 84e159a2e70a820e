//! AWS SDK implementations of the adapter traits.
//!
//! The handlers are synchronous, so each call blocks on the runtime that
//! `lambda_runtime` is driving. That requires the multi-threaded runtime.

use std::collections::HashMap;
use std::future::Future;

use aws_sdk_sagemaker::error::DisplayErrorContext;
use aws_sdk_sagemaker::types::{
    AlgorithmSpecification, AssemblyType, BatchStrategy, Channel, DataSource, OutputDataConfig,
    ResourceConfig, S3DataDistribution, S3DataSource, S3DataType, SplitType, StoppingCondition,
    TrainingInputMode, TrainingInstanceType, TransformDataSource, TransformInput,
    TransformInstanceType, TransformOutput, TransformResources, TransformS3DataSource,
};
use aws_sdk_sagemakerruntime::primitives::Blob;
use ml_stacks_core::jobs::{self, InvokeRequest, TrainingJobRequest, TransformJobRequest};

use super::object_store::ObjectFetcher;
use super::sagemaker::{EndpointInvoker, InvokeResponse, TrainingJobs, TransformJobs};

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

pub struct SageMakerJobsClient {
    pub client: aws_sdk_sagemaker::Client,
}

pub struct SageMakerRuntimeClient {
    pub client: aws_sdk_sagemakerruntime::Client,
}

pub struct S3ObjectFetcher {
    pub client: aws_sdk_s3::Client,
}

fn training_channel(channel: &jobs::Channel) -> Channel {
    let source = &channel.data_source.s3_data_source;
    let s3_source = S3DataSource::builder()
        .s3_data_type(S3DataType::from(source.s3_data_type.as_str()))
        .s3_uri(&source.s3_uri)
        .set_s3_data_distribution_type(
            source
                .s3_data_distribution_type
                .as_deref()
                .map(S3DataDistribution::from),
        )
        .build();

    Channel::builder()
        .channel_name(&channel.channel_name)
        .content_type(&channel.content_type)
        .data_source(DataSource::builder().s3_data_source(s3_source).build())
        .build()
}

impl TrainingJobs for SageMakerJobsClient {
    fn create_training_job(&self, request: &TrainingJobRequest) -> Result<String, String> {
        let algorithm = AlgorithmSpecification::builder()
            .training_image(&request.algorithm_specification.training_image)
            .training_input_mode(TrainingInputMode::from(
                request.algorithm_specification.training_input_mode.as_str(),
            ))
            .build();
        let channels = request
            .input_data_config
            .iter()
            .map(training_channel)
            .collect::<Vec<_>>();
        let output = OutputDataConfig::builder()
            .s3_output_path(&request.output_data_config.s3_output_path)
            .build();
        let resources = ResourceConfig::builder()
            .instance_type(TrainingInstanceType::from(
                request.resource_config.instance_type.as_str(),
            ))
            .instance_count(request.resource_config.instance_count as i32)
            .volume_size_in_gb(request.resource_config.volume_size_in_gb as i32)
            .build();
        let stopping = StoppingCondition::builder()
            .max_runtime_in_seconds(request.stopping_condition.max_runtime_in_seconds as i32)
            .build();
        let hyper_parameters: HashMap<String, String> = request
            .hyper_parameters
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let call = self
            .client
            .create_training_job()
            .training_job_name(&request.training_job_name)
            .algorithm_specification(algorithm)
            .role_arn(&request.role_arn)
            .set_input_data_config(Some(channels))
            .output_data_config(output)
            .resource_config(resources)
            .stopping_condition(stopping)
            .set_hyper_parameters(Some(hyper_parameters))
            .send();

        let output = block_on(call).map_err(|error| {
            format!(
                "failed to create training job: {}",
                DisplayErrorContext(&error)
            )
        })?;
        let arn: Option<&str> = output.training_job_arn().into();
        Ok(arn.unwrap_or_default().to_string())
    }
}

impl TransformJobs for SageMakerJobsClient {
    fn create_transform_job(&self, request: &TransformJobRequest) -> Result<String, String> {
        let input = &request.transform_input;
        let s3_source = TransformS3DataSource::builder()
            .s3_data_type(S3DataType::from(
                input.data_source.s3_data_source.s3_data_type.as_str(),
            ))
            .s3_uri(&input.data_source.s3_data_source.s3_uri)
            .build();
        let transform_input = TransformInput::builder()
            .data_source(
                TransformDataSource::builder()
                    .s3_data_source(s3_source)
                    .build(),
            )
            .content_type(&input.content_type)
            .split_type(SplitType::from(input.split_type.as_str()))
            .build();
        let transform_output = TransformOutput::builder()
            .s3_output_path(&request.transform_output.s3_output_path)
            .assemble_with(AssemblyType::from(
                request.transform_output.assemble_with.as_str(),
            ))
            .build();
        let resources = TransformResources::builder()
            .instance_type(TransformInstanceType::from(
                request.transform_resources.instance_type.as_str(),
            ))
            .instance_count(request.transform_resources.instance_count as i32)
            .build();

        let call = self
            .client
            .create_transform_job()
            .transform_job_name(&request.transform_job_name)
            .model_name(&request.model_name)
            .max_concurrent_transforms(request.max_concurrent_transforms as i32)
            .max_payload_in_mb(request.max_payload_in_mb as i32)
            .batch_strategy(BatchStrategy::from(request.batch_strategy.as_str()))
            .transform_input(transform_input)
            .transform_output(transform_output)
            .transform_resources(resources)
            .send();

        let output = block_on(call).map_err(|error| {
            format!(
                "failed to create transform job: {}",
                DisplayErrorContext(&error)
            )
        })?;
        let arn: Option<&str> = output.transform_job_arn().into();
        Ok(arn.unwrap_or_default().to_string())
    }
}

impl EndpointInvoker for SageMakerRuntimeClient {
    fn invoke_endpoint(&self, request: &InvokeRequest) -> Result<InvokeResponse, String> {
        let call = self
            .client
            .invoke_endpoint()
            .endpoint_name(&request.endpoint_name)
            .content_type(&request.content_type)
            .body(Blob::new(request.body.clone()))
            .send();

        let output = block_on(call).map_err(|error| {
            format!(
                "failed to invoke endpoint {}: {}",
                request.endpoint_name,
                aws_sdk_sagemakerruntime::error::DisplayErrorContext(&error)
            )
        })?;
        let body: Option<&Blob> = output.body().into();
        Ok(InvokeResponse {
            content_type: output.content_type().map(str::to_string),
            body: body.map(|blob| blob.as_ref().to_vec()).unwrap_or_default(),
        })
    }
}

impl ObjectFetcher for S3ObjectFetcher {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();

        block_on(async move {
            let object = client
                .get_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|error| {
                    format!(
                        "failed to read s3://{bucket}/{key}: {}",
                        aws_sdk_s3::error::DisplayErrorContext(&error)
                    )
                })?;
            let bytes = object
                .body
                .collect()
                .await
                .map_err(|error| format!("failed to read s3://{bucket}/{key} body: {error}"))?;
            Ok(bytes.into_bytes().to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_channel_keeps_uri_and_distribution() {
        let channel = training_channel(&jobs::Channel {
            channel_name: "train".to_string(),
            data_source: jobs::DataSource {
                s3_data_source: jobs::S3DataSource {
                    s3_data_distribution_type: Some("FullyReplicated".to_string()),
                    ..jobs::S3DataSource::prefix("s3://bucket/train")
                },
            },
            content_type: "text/csv".to_string(),
        });

        let rendered = format!("{channel:?}");
        assert!(rendered.contains("s3://bucket/train"));
        assert!(rendered.contains("FullyReplicated"));
        assert!(rendered.contains("text/csv"));
    }
}
