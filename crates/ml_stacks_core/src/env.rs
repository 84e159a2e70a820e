//! Typed handler configuration read from environment variables.
//!
//! Every reader takes a lookup closure so tests can feed a map instead of
//! mutating the process environment.

use std::str::FromStr;

use thiserror::Error;

use crate::arn::parse_s3_uri;

pub const DEFAULT_CONTENT_TYPE: &str = "text/csv";
pub const DEFAULT_INSTANCE_TYPE: &str = "ml.m4.xlarge";
pub const DEFAULT_TRAINING_JOB_PREFIX: &str = "training-job-";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(String),
    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
    #[error("{0} and {1} must be configured together")]
    Incomplete(String, String),
}

/// Reads a variable from the running process.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, ConfigError> {
    optional(lookup, name).ok_or_else(|| ConfigError::Missing(name.to_string()))
}

fn s3_uri(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, ConfigError> {
    let value = required(lookup, name)?;
    if parse_s3_uri(&value).is_none() {
        return Err(ConfigError::Invalid {
            name: name.to_string(),
            value,
            reason: "expected an s3://bucket/prefix URI".to_string(),
        });
    }
    Ok(value)
}

fn parsed_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, name) {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|error| ConfigError::Invalid {
            name: name.to_string(),
            reason: error.to_string(),
            value,
        }),
    }
}

fn positive_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u32,
) -> Result<u32, ConfigError> {
    let value = parsed_or(lookup, name, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            reason: "must be a positive integer".to_string(),
        });
    }
    Ok(value)
}

/// Configuration for the endpoint-invocation handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceEnv {
    pub endpoint_name: String,
    pub content_type: String,
    /// Object used as the request body when the event carries none.
    pub sample_object: Option<S3Location>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl InferenceEnv {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bucket = optional(&lookup, "bucket");
        let key = optional(&lookup, "key");
        let sample_object = match (bucket, key) {
            (Some(bucket), Some(key)) => Some(S3Location { bucket, key }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Incomplete(
                    "bucket".to_string(),
                    "key".to_string(),
                ))
            }
        };

        Ok(Self {
            endpoint_name: required(&lookup, "endpoint_name")?,
            content_type: optional(&lookup, "content_type")
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            sample_object,
        })
    }

    pub fn from_process_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    /// Environment variables that reproduce this configuration.
    pub fn to_vars(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            ("endpoint_name".to_string(), self.endpoint_name.clone()),
            ("content_type".to_string(), self.content_type.clone()),
        ];
        if let Some(location) = &self.sample_object {
            vars.push(("bucket".to_string(), location.bucket.clone()));
            vars.push(("key".to_string(), location.key.clone()));
        }
        vars
    }
}

/// Configuration for the scheduled training handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingEnv {
    pub training_job_prefix: String,
    pub container: String,
    pub role_arn: String,
    pub s3_input_train: String,
    pub s3_input_validation: String,
    pub s3_output: String,
    pub max_depth: u32,
    pub instance_type: String,
    pub instance_count: u32,
    pub volume_size_gb: u32,
    pub max_runtime_seconds: u32,
}

impl TrainingEnv {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            training_job_prefix: optional(&lookup, "training_job_prefix")
                .unwrap_or_else(|| DEFAULT_TRAINING_JOB_PREFIX.to_string()),
            container: required(&lookup, "container")?,
            role_arn: required(&lookup, "role_arn")?,
            s3_input_train: s3_uri(&lookup, "s3_input_train")?,
            s3_input_validation: s3_uri(&lookup, "s3_input_validation")?,
            s3_output: s3_uri(&lookup, "s3_output")?,
            max_depth: positive_or(&lookup, "max_depth", 5)?,
            instance_type: optional(&lookup, "instance_type")
                .unwrap_or_else(|| DEFAULT_INSTANCE_TYPE.to_string()),
            instance_count: positive_or(&lookup, "instance_count", 1)?,
            volume_size_gb: positive_or(&lookup, "volume_size_gb", 5)?,
            max_runtime_seconds: positive_or(&lookup, "max_runtime_seconds", 3600)?,
        })
    }

    pub fn from_process_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn to_vars(&self) -> Vec<(String, String)> {
        vec![
            (
                "training_job_prefix".to_string(),
                self.training_job_prefix.clone(),
            ),
            ("container".to_string(), self.container.clone()),
            ("role_arn".to_string(), self.role_arn.clone()),
            ("s3_input_train".to_string(), self.s3_input_train.clone()),
            (
                "s3_input_validation".to_string(),
                self.s3_input_validation.clone(),
            ),
            ("s3_output".to_string(), self.s3_output.clone()),
            ("max_depth".to_string(), self.max_depth.to_string()),
            ("instance_type".to_string(), self.instance_type.clone()),
            ("instance_count".to_string(), self.instance_count.to_string()),
            ("volume_size_gb".to_string(), self.volume_size_gb.to_string()),
            (
                "max_runtime_seconds".to_string(),
                self.max_runtime_seconds.to_string(),
            ),
        ]
    }
}

/// Configuration for the batch-transform handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformEnv {
    pub transform_job_name: String,
    pub model_name: String,
    pub max_concurrent: u32,
    pub max_payload_size: u32,
    pub instance_type: String,
    pub instance_count: u32,
    pub s3_uri_in: String,
    pub s3_uri_out: String,
    pub content_type: String,
    pub split_type: String,
}

impl TransformEnv {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let split_type = optional(&lookup, "split_type").unwrap_or_else(|| "Line".to_string());
        if !matches!(split_type.as_str(), "None" | "Line" | "RecordIO" | "TFRecord") {
            return Err(ConfigError::Invalid {
                name: "split_type".to_string(),
                value: split_type,
                reason: "expected one of None, Line, RecordIO, TFRecord".to_string(),
            });
        }

        Ok(Self {
            transform_job_name: required(&lookup, "transform_job_name")?,
            model_name: required(&lookup, "model_name")?,
            max_concurrent: positive_or(&lookup, "max_concurrent", 1)?,
            max_payload_size: positive_or(&lookup, "max_payload_size", 6)?,
            instance_type: optional(&lookup, "instance_type")
                .unwrap_or_else(|| DEFAULT_INSTANCE_TYPE.to_string()),
            instance_count: positive_or(&lookup, "instance_count", 1)?,
            s3_uri_in: s3_uri(&lookup, "s3_uri_in")?,
            s3_uri_out: s3_uri(&lookup, "s3_uri_out")?,
            content_type: optional(&lookup, "content_type")
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            split_type,
        })
    }

    pub fn from_process_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn to_vars(&self) -> Vec<(String, String)> {
        vec![
            (
                "transform_job_name".to_string(),
                self.transform_job_name.clone(),
            ),
            ("model_name".to_string(), self.model_name.clone()),
            ("max_concurrent".to_string(), self.max_concurrent.to_string()),
            (
                "max_payload_size".to_string(),
                self.max_payload_size.to_string(),
            ),
            ("instance_type".to_string(), self.instance_type.clone()),
            ("instance_count".to_string(), self.instance_count.to_string()),
            ("s3_uri_in".to_string(), self.s3_uri_in.clone()),
            ("s3_uri_out".to_string(), self.s3_uri_out.clone()),
            ("content_type".to_string(), self.content_type.clone()),
            ("split_type".to_string(), self.split_type.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn inference_env_defaults_content_type() {
        let env = InferenceEnv::from_lookup(lookup(&[("endpoint_name", "xgb-endpoint")]))
            .expect("env should parse");

        assert_eq!(env.endpoint_name, "xgb-endpoint");
        assert_eq!(env.content_type, "text/csv");
        assert!(env.sample_object.is_none());
    }

    #[test]
    fn inference_env_rejects_bucket_without_key() {
        let error = InferenceEnv::from_lookup(lookup(&[
            ("endpoint_name", "xgb-endpoint"),
            ("bucket", "samples"),
        ]))
        .expect_err("half-configured object should fail");

        assert_eq!(
            error,
            ConfigError::Incomplete("bucket".to_string(), "key".to_string())
        );
    }

    #[test]
    fn blank_values_count_as_missing() {
        let error = InferenceEnv::from_lookup(lookup(&[("endpoint_name", "  ")]))
            .expect_err("blank endpoint should fail");

        assert_eq!(error.to_string(), "endpoint_name must be configured");
    }

    #[test]
    fn training_env_rejects_non_numeric_depth() {
        let error = TrainingEnv::from_lookup(lookup(&[
            ("container", "image"),
            ("role_arn", "arn:aws:iam::123456789012:role/sm"),
            ("s3_input_train", "s3://bucket/train"),
            ("s3_input_validation", "s3://bucket/validation"),
            ("s3_output", "s3://bucket/output"),
            ("max_depth", "deep"),
        ]))
        .expect_err("non-numeric depth should fail");

        assert!(matches!(error, ConfigError::Invalid { ref name, .. } if name == "max_depth"));
    }

    #[test]
    fn training_env_rejects_non_s3_locations() {
        let error = TrainingEnv::from_lookup(lookup(&[
            ("container", "image"),
            ("role_arn", "arn:aws:iam::123456789012:role/sm"),
            ("s3_input_train", "bucket/train"),
            ("s3_input_validation", "s3://bucket/validation"),
            ("s3_output", "s3://bucket/output"),
        ]))
        .expect_err("bare path should fail");

        assert_eq!(
            error,
            ConfigError::Invalid {
                name: "s3_input_train".to_string(),
                value: "bucket/train".to_string(),
                reason: "expected an s3://bucket/prefix URI".to_string(),
            }
        );
    }

    #[test]
    fn transform_env_rejects_uri_without_bucket() {
        let error = TransformEnv::from_lookup(lookup(&[
            ("transform_job_name", "batch-"),
            ("model_name", "xgb-model"),
            ("s3_uri_in", "s3://bucket/in"),
            ("s3_uri_out", "s3:///out"),
        ]))
        .expect_err("missing bucket should fail");

        assert!(matches!(error, ConfigError::Invalid { ref name, .. } if name == "s3_uri_out"));
    }

    #[test]
    fn transform_env_round_trips_through_vars() {
        let env = TransformEnv::from_lookup(lookup(&[
            ("transform_job_name", "batch-"),
            ("model_name", "xgb-model"),
            ("max_concurrent", "4"),
            ("s3_uri_in", "s3://bucket/in"),
            ("s3_uri_out", "s3://bucket/out"),
        ]))
        .expect("env should parse");

        let vars: BTreeMap<String, String> = env.to_vars().into_iter().collect();
        let reparsed =
            TransformEnv::from_lookup(|name| vars.get(name).cloned()).expect("vars should parse");

        assert_eq!(reparsed, env);
        assert_eq!(reparsed.max_payload_size, 6);
        assert_eq!(reparsed.max_concurrent, 4);
    }

    #[test]
    fn transform_env_rejects_zero_instances() {
        let error = TransformEnv::from_lookup(lookup(&[
            ("transform_job_name", "batch-"),
            ("model_name", "xgb-model"),
            ("instance_count", "0"),
            ("s3_uri_in", "s3://bucket/in"),
            ("s3_uri_out", "s3://bucket/out"),
        ]))
        .expect_err("zero instances should fail");

        assert!(error.to_string().contains("positive integer"));
    }
}
