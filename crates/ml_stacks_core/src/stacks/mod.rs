//! Stack definitions for the deployable units.
//!
//! Each unit module exposes a serde-friendly config and a `synth` function
//! returning a [`Template`]. Shared builders for Lambda functions, execution
//! roles and scheduled triggers live here.

pub mod batch_transform;
pub mod inference_api;
pub mod notebook;
pub mod scheduled_training;
pub mod template;
pub mod training_pipeline;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::arn::{Arn, ArnScope};
use crate::env::ConfigError;
use crate::jobs::JobNameError;
use template::{
    assume_role_policy, get_att, policy_document, reference, PolicyStatement, Resource, Template,
};

pub const LAMBDA_RUNTIME: &str = "provided.al2023";
pub const LAMBDA_HANDLER: &str = "bootstrap";
pub const MAX_LAMBDA_TIMEOUT_SECONDS: u32 = 900;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("account '{0}' must be a 12-digit AWS account id")]
    InvalidAccount(String),
    #[error("region '{0}' is not a valid AWS region name")]
    InvalidRegion(String),
    #[error("{0} cannot be empty")]
    EmptyField(String),
    #[error("schedule '{0}' must be a rate(...) or cron(...) expression")]
    InvalidSchedule(String),
    #[error("timeout {0}s must be between 1 and {MAX_LAMBDA_TIMEOUT_SECONDS} seconds")]
    InvalidTimeout(u32),
    #[error("logical id '{0}' is already defined")]
    DuplicateLogicalId(String),
    #[error("unknown stack '{0}'")]
    UnknownStack(String),
    #[error("failed to render template: {0}")]
    Render(String),
    #[error("handler environment rejected: {0}")]
    HandlerEnv(#[from] ConfigError),
    #[error("job prefix rejected: {0}")]
    JobPrefix(#[from] JobNameError),
}

/// Deployment target of a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEnv {
    pub account: String,
    pub region: String,
}

impl StackEnv {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Result<Self, StackError> {
        let account = account.into().trim().to_string();
        let region = region.into().trim().to_string();

        if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
            return Err(StackError::InvalidAccount(account));
        }
        let region_shaped = region.split('-').count() >= 3
            && region
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !region_shaped {
            return Err(StackError::InvalidRegion(region));
        }

        Ok(Self { account, region })
    }

    pub fn scope(&self) -> ArnScope {
        ArnScope::new(self.account.clone(), self.region.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackKind {
    InferenceApi,
    ScheduledTraining,
    BatchTransform,
    Notebook,
    TrainingPipeline,
}

impl StackKind {
    pub const ALL: [StackKind; 5] = [
        Self::InferenceApi,
        Self::ScheduledTraining,
        Self::BatchTransform,
        Self::Notebook,
        Self::TrainingPipeline,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::InferenceApi => "inference-api",
            Self::ScheduledTraining => "scheduled-training",
            Self::BatchTransform => "batch-transform",
            Self::Notebook => "notebook",
            Self::TrainingPipeline => "training-pipeline",
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StackKind {
    type Err = StackError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == value)
            .ok_or_else(|| StackError::UnknownStack(value.to_string()))
    }
}

/// Configuration for every unit, loadable from one JSON document.
///
/// Missing sections fall back to the sample values each unit ships with.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StacksConfig {
    pub inference_api: inference_api::InferenceApiConfig,
    pub scheduled_training: scheduled_training::ScheduledTrainingConfig,
    pub batch_transform: batch_transform::BatchTransformConfig,
    pub notebook: notebook::NotebookConfig,
    pub training_pipeline: training_pipeline::TrainingPipelineConfig,
}

impl StacksConfig {
    pub fn synth(&self, kind: StackKind, env: &StackEnv) -> Result<Template, StackError> {
        match kind {
            StackKind::InferenceApi => inference_api::synth(&self.inference_api, env),
            StackKind::ScheduledTraining => {
                scheduled_training::synth(&self.scheduled_training, env)
            }
            StackKind::BatchTransform => batch_transform::synth(&self.batch_transform, env),
            StackKind::Notebook => notebook::synth(&self.notebook, env),
            StackKind::TrainingPipeline => training_pipeline::synth(&self.training_pipeline, env),
        }
    }
}

/// Location of a packaged `bootstrap` zip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LambdaArtifact {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LambdaSettings {
    pub function_name: String,
    pub artifact: LambdaArtifact,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u32,
}

pub fn default_timeout_seconds() -> u32 {
    30
}

pub fn default_memory_mb() -> u32 {
    256
}

impl LambdaSettings {
    pub fn sample(function_name: &str, artifact_key: &str) -> Self {
        Self {
            function_name: function_name.to_string(),
            artifact: LambdaArtifact {
                bucket: "ml-stacks-artifacts".to_string(),
                key: artifact_key.to_string(),
            },
            timeout_seconds: default_timeout_seconds(),
            memory_mb: default_memory_mb(),
        }
    }

    pub fn validate(&self) -> Result<(), StackError> {
        require_non_empty("function_name", &self.function_name)?;
        require_non_empty("artifact.bucket", &self.artifact.bucket)?;
        require_non_empty("artifact.key", &self.artifact.key)?;
        if self.timeout_seconds == 0 || self.timeout_seconds > MAX_LAMBDA_TIMEOUT_SECONDS {
            return Err(StackError::InvalidTimeout(self.timeout_seconds));
        }
        Ok(())
    }
}

pub fn require_non_empty(field: &str, value: &str) -> Result<(), StackError> {
    if value.trim().is_empty() {
        return Err(StackError::EmptyField(field.to_string()));
    }
    Ok(())
}

/// Environment handed to a handler, keyed by variable name.
///
/// Stacks parse it with the handler's own `from_lookup` and derive policy
/// grants from the parsed config.
pub struct HandlerVars(BTreeMap<String, String>);

impl HandlerVars {
    pub fn new<'a>(pairs: impl IntoIterator<Item = (&'a str, String)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

pub fn validate_schedule(expression: &str) -> Result<(), StackError> {
    let trimmed = expression.trim();
    let inner = trimmed
        .strip_prefix("rate(")
        .or_else(|| trimmed.strip_prefix("cron("))
        .and_then(|rest| rest.strip_suffix(')'));
    match inner {
        Some(inner) if !inner.trim().is_empty() => Ok(()),
        _ => Err(StackError::InvalidSchedule(expression.to_string())),
    }
}

/// Adds an execution role carrying `statements` as one inline policy.
pub fn add_execution_role(
    template: &mut Template,
    logical_id: &str,
    service_principal: &str,
    statements: &[PolicyStatement],
    managed_policy_arns: &[String],
) -> Result<(), StackError> {
    let mut properties = json!({
        "AssumeRolePolicyDocument": assume_role_policy(service_principal),
    });
    if !statements.is_empty() {
        properties["Policies"] = json!([{
            "PolicyName": format!("{logical_id}Policy"),
            "PolicyDocument": policy_document(statements),
        }]);
    }
    if !managed_policy_arns.is_empty() {
        properties["ManagedPolicyArns"] = json!(managed_policy_arns);
    }
    template.add(logical_id, Resource::new("AWS::IAM::Role", properties))
}

pub fn basic_execution_policy_arn(scope: &ArnScope) -> String {
    format!(
        "arn:{}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole",
        scope.partition()
    )
}

/// Adds a Lambda function and its execution role, returning the function ARN.
pub fn add_lambda_function(
    template: &mut Template,
    scope: &ArnScope,
    logical_id: &str,
    settings: &LambdaSettings,
    statements: &[PolicyStatement],
    environment: Vec<(String, String)>,
) -> Result<Arn, StackError> {
    settings.validate()?;
    let role_id = format!("{logical_id}Role");
    add_execution_role(
        template,
        &role_id,
        "lambda.amazonaws.com",
        statements,
        &[basic_execution_policy_arn(scope)],
    )?;

    let variables: serde_json::Map<String, Value> = environment
        .into_iter()
        .map(|(name, value)| (name, Value::String(value)))
        .collect();

    template.add(
        logical_id,
        Resource::new(
            "AWS::Lambda::Function",
            json!({
                "FunctionName": settings.function_name,
                "Runtime": LAMBDA_RUNTIME,
                "Handler": LAMBDA_HANDLER,
                "Code": {
                    "S3Bucket": settings.artifact.bucket,
                    "S3Key": settings.artifact.key,
                },
                "Role": get_att(&role_id, "Arn"),
                "Timeout": settings.timeout_seconds,
                "MemorySize": settings.memory_mb,
                "Environment": { "Variables": variables },
            }),
        )
        .depends_on(&[&role_id]),
    )?;

    Ok(scope.lambda_function(&settings.function_name))
}

/// Adds an Events rule that invokes `function_logical_id` on a schedule.
pub fn add_schedule_trigger(
    template: &mut Template,
    function_logical_id: &str,
    schedule_expression: &str,
) -> Result<(), StackError> {
    validate_schedule(schedule_expression)?;
    let rule_id = format!("{function_logical_id}Schedule");

    template.add(
        &rule_id,
        Resource::new(
            "AWS::Events::Rule",
            json!({
                "ScheduleExpression": schedule_expression.trim(),
                "State": "ENABLED",
                "Targets": [{
                    "Arn": get_att(function_logical_id, "Arn"),
                    "Id": "Target0",
                }],
            }),
        ),
    )?;
    template.add(
        &format!("{rule_id}Permission"),
        Resource::new(
            "AWS::Lambda::Permission",
            json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": reference(function_logical_id),
                "Principal": "events.amazonaws.com",
                "SourceArn": get_att(&rule_id, "Arn"),
            }),
        ),
    )
}
