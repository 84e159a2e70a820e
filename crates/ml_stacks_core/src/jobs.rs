//! SageMaker request descriptors built from handler configuration.
//!
//! Field names serialize in the SageMaker API's PascalCase so a descriptor
//! can be logged exactly as it is sent.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::env::{TrainingEnv, TransformEnv};

pub const MAX_JOB_NAME_LEN: usize = 63;
pub const JOB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobNameError {
    #[error("job name '{0}' exceeds {MAX_JOB_NAME_LEN} characters")]
    TooLong(String),
    #[error("job name '{0}' must be alphanumeric with hyphens and start with a letter or digit")]
    InvalidCharacters(String),
}

pub fn job_timestamp(now: DateTime<Utc>) -> String {
    now.format(JOB_TIMESTAMP_FORMAT).to_string()
}

/// Appends the UTC timestamp to `prefix`, e.g. `batch-2026-10-17-08-30-00`.
pub fn job_name(prefix: &str, now: DateTime<Utc>) -> Result<String, JobNameError> {
    let name = format!("{prefix}{}", job_timestamp(now));
    if name.len() > MAX_JOB_NAME_LEN {
        return Err(JobNameError::TooLong(name));
    }
    let starts_alphanumeric = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric());
    if !starts_alphanumeric || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(JobNameError::InvalidCharacters(name));
    }
    Ok(name)
}

/// Checks that `prefix` yields valid job names. The timestamp is fixed-width,
/// so one instant stands for all of them.
pub fn validate_job_prefix(prefix: &str) -> Result<(), JobNameError> {
    job_name(prefix, DateTime::<Utc>::UNIX_EPOCH).map(|_| ())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct S3DataSource {
    #[serde(rename = "S3DataType")]
    pub s3_data_type: String,
    #[serde(rename = "S3Uri")]
    pub s3_uri: String,
    #[serde(rename = "S3DataDistributionType", skip_serializing_if = "Option::is_none")]
    pub s3_data_distribution_type: Option<String>,
}

impl S3DataSource {
    pub fn prefix(uri: &str) -> Self {
        Self {
            s3_data_type: "S3Prefix".to_string(),
            s3_uri: uri.to_string(),
            s3_data_distribution_type: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Channel {
    pub channel_name: String,
    pub data_source: DataSource,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataSource {
    #[serde(rename = "S3DataSource")]
    pub s3_data_source: S3DataSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AlgorithmSpecification {
    pub training_image: String,
    pub training_input_mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputDataConfig {
    #[serde(rename = "S3OutputPath")]
    pub s3_output_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceConfig {
    pub instance_type: String,
    pub instance_count: u32,
    #[serde(rename = "VolumeSizeInGB")]
    pub volume_size_in_gb: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct StoppingCondition {
    pub max_runtime_in_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TrainingJobRequest {
    pub training_job_name: String,
    pub algorithm_specification: AlgorithmSpecification,
    pub role_arn: String,
    pub input_data_config: Vec<Channel>,
    pub output_data_config: OutputDataConfig,
    pub resource_config: ResourceConfig,
    pub stopping_condition: StoppingCondition,
    pub hyper_parameters: BTreeMap<String, String>,
}

fn training_channel(name: &str, uri: &str) -> Channel {
    Channel {
        channel_name: name.to_string(),
        data_source: DataSource {
            s3_data_source: S3DataSource {
                s3_data_distribution_type: Some("FullyReplicated".to_string()),
                ..S3DataSource::prefix(uri)
            },
        },
        content_type: "text/csv".to_string(),
    }
}

fn xgboost_hyper_parameters(max_depth: u32) -> BTreeMap<String, String> {
    [
        ("max_depth", max_depth.to_string()),
        ("eta", "0.2".to_string()),
        ("gamma", "4".to_string()),
        ("min_child_weight", "6".to_string()),
        ("subsample", "0.8".to_string()),
        ("objective", "binary:logistic".to_string()),
        ("num_round", "100".to_string()),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect()
}

impl TrainingJobRequest {
    pub fn from_env(env: &TrainingEnv, now: DateTime<Utc>) -> Result<Self, JobNameError> {
        Ok(Self {
            training_job_name: job_name(&env.training_job_prefix, now)?,
            algorithm_specification: AlgorithmSpecification {
                training_image: env.container.clone(),
                training_input_mode: "File".to_string(),
            },
            role_arn: env.role_arn.clone(),
            input_data_config: vec![
                training_channel("train", &env.s3_input_train),
                training_channel("validation", &env.s3_input_validation),
            ],
            output_data_config: OutputDataConfig {
                s3_output_path: env.s3_output.clone(),
            },
            resource_config: ResourceConfig {
                instance_type: env.instance_type.clone(),
                instance_count: env.instance_count,
                volume_size_in_gb: env.volume_size_gb,
            },
            stopping_condition: StoppingCondition {
                max_runtime_in_seconds: env.max_runtime_seconds,
            },
            hyper_parameters: xgboost_hyper_parameters(env.max_depth),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TransformInput {
    pub data_source: DataSource,
    pub content_type: String,
    pub split_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TransformOutput {
    #[serde(rename = "S3OutputPath")]
    pub s3_output_path: String,
    pub assemble_with: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TransformResources {
    pub instance_type: String,
    pub instance_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TransformJobRequest {
    pub transform_job_name: String,
    pub model_name: String,
    pub max_concurrent_transforms: u32,
    #[serde(rename = "MaxPayloadInMB")]
    pub max_payload_in_mb: u32,
    pub batch_strategy: String,
    pub transform_input: TransformInput,
    pub transform_output: TransformOutput,
    pub transform_resources: TransformResources,
}

impl TransformJobRequest {
    pub fn from_env(env: &TransformEnv, now: DateTime<Utc>) -> Result<Self, JobNameError> {
        Ok(Self {
            transform_job_name: job_name(&env.transform_job_name, now)?,
            model_name: env.model_name.clone(),
            max_concurrent_transforms: env.max_concurrent,
            max_payload_in_mb: env.max_payload_size,
            batch_strategy: "MultiRecord".to_string(),
            transform_input: TransformInput {
                data_source: DataSource {
                    s3_data_source: S3DataSource::prefix(&env.s3_uri_in),
                },
                content_type: env.content_type.clone(),
                split_type: env.split_type.clone(),
            },
            transform_output: TransformOutput {
                s3_output_path: env.s3_uri_out.clone(),
                assemble_with: "Line".to_string(),
            },
            transform_resources: TransformResources {
                instance_type: env.instance_type.clone(),
                instance_count: env.instance_count,
            },
        })
    }
}

/// Body sent to a real-time inference endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeRequest {
    pub endpoint_name: String,
    pub content_type: String,
    pub body: Vec<u8>,
}
