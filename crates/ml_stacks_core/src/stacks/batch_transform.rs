//! Lambda on a schedule that starts SageMaker batch-transform jobs.

use serde::{Deserialize, Serialize};

use super::template::{PolicyStatement, Template};
use super::{
    add_lambda_function, add_schedule_trigger, HandlerVars, LambdaSettings, StackEnv, StackError,
};
use crate::arn::{Arn, ArnScope};
use crate::env::{TransformEnv, DEFAULT_CONTENT_TYPE, DEFAULT_INSTANCE_TYPE};
use crate::jobs::validate_job_prefix;

pub const FUNCTION_ID: &str = "TransformFunction";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchTransformConfig {
    pub lambda: LambdaSettings,
    pub schedule_expression: String,
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

impl Default for BatchTransformConfig {
    fn default() -> Self {
        Self {
            lambda: LambdaSettings::sample("start-batch-transform", "transform_lambda.zip"),
            schedule_expression: "cron(0 3 * * ? *)".to_string(),
            transform_job_name: "batch-transform-".to_string(),
            model_name: "xgboost-model".to_string(),
            max_concurrent: 1,
            max_payload_size: 6,
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            instance_count: 1,
            s3_uri_in: "s3://ml-stacks-data/batch/input".to_string(),
            s3_uri_out: "s3://ml-stacks-data/batch/output".to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            split_type: "Line".to_string(),
        }
    }
}

impl BatchTransformConfig {
    pub fn handler_env(&self) -> Result<TransformEnv, StackError> {
        let vars = HandlerVars::new([
            ("transform_job_name", self.transform_job_name.clone()),
            ("model_name", self.model_name.clone()),
            ("max_concurrent", self.max_concurrent.to_string()),
            ("max_payload_size", self.max_payload_size.to_string()),
            ("instance_type", self.instance_type.clone()),
            ("instance_count", self.instance_count.to_string()),
            ("s3_uri_in", self.s3_uri_in.clone()),
            ("s3_uri_out", self.s3_uri_out.clone()),
            ("content_type", self.content_type.clone()),
            ("split_type", self.split_type.clone()),
        ]);
        let handler_env = TransformEnv::from_lookup(|name| vars.get(name))?;
        validate_job_prefix(&handler_env.transform_job_name)?;
        Ok(handler_env)
    }

    /// `CreateTransformJob` is authorized on the transform-job ARN only.
    pub fn statements(&self, scope: &ArnScope, handler_env: &TransformEnv) -> Vec<PolicyStatement> {
        vec![PolicyStatement::allow(
            &["sagemaker:CreateTransformJob"],
            vec![scope
                .sagemaker_transform_jobs(&handler_env.transform_job_name)
                .into()],
        )]
    }

    pub fn add_function(
        &self,
        template: &mut Template,
        scope: &ArnScope,
    ) -> Result<Arn, StackError> {
        let handler_env = self.handler_env()?;
        add_lambda_function(
            template,
            scope,
            FUNCTION_ID,
            &self.lambda,
            &self.statements(scope, &handler_env),
            handler_env.to_vars(),
        )
    }
}

pub fn synth(config: &BatchTransformConfig, env: &StackEnv) -> Result<Template, StackError> {
    let scope = env.scope();
    let mut template = Template::new(format!(
        "Scheduled SageMaker batch transform of model {}",
        config.model_name
    ));
    config.add_function(&mut template, &scope)?;
    add_schedule_trigger(&mut template, FUNCTION_ID, &config.schedule_expression)?;
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ConfigError;

    fn env() -> StackEnv {
        StackEnv::new("123456789012", "eu-west-1").expect("env")
    }

    #[test]
    fn grants_transform_jobs_matching_handler_prefix() {
        let template = synth(&BatchTransformConfig::default(), &env()).expect("synth");
        let variables = &template
            .resource(FUNCTION_ID)
            .expect("function")
            .properties["Environment"]["Variables"];
        let prefix = variables["transform_job_name"]
            .as_str()
            .expect("transform_job_name");

        let granted =
            template.granted_resources("TransformFunctionRole", "sagemaker:CreateTransformJob");
        let expected = format!("arn:aws:sagemaker:eu-west-1:123456789012:transform-job/{prefix}*");
        assert_eq!(granted, vec![expected]);
    }

    #[test]
    fn rejects_split_type_the_handler_rejects() {
        let config = BatchTransformConfig {
            split_type: "line".to_string(),
            ..BatchTransformConfig::default()
        };
        let error = synth(&config, &env()).expect_err("lowercase split type should fail");

        assert!(matches!(
            error,
            StackError::HandlerEnv(ConfigError::Invalid { ref name, .. }) if name == "split_type"
        ));
    }

    #[test]
    fn rejects_non_s3_input() {
        let config = BatchTransformConfig {
            s3_uri_in: "ml-stacks-data/batch/input".to_string(),
            ..BatchTransformConfig::default()
        };
        let error = synth(&config, &env()).expect_err("bare path should fail");

        assert!(matches!(
            error,
            StackError::HandlerEnv(ConfigError::Invalid { ref name, .. }) if name == "s3_uri_in"
        ));
    }

    #[test]
    fn exports_every_transform_variable() {
        let template = synth(&BatchTransformConfig::default(), &env()).expect("synth");
        let variables = template
            .resource(FUNCTION_ID)
            .expect("function")
            .properties["Environment"]["Variables"]
            .as_object()
            .cloned()
            .expect("variables object");

        for name in [
            "transform_job_name",
            "model_name",
            "max_concurrent",
            "max_payload_size",
            "instance_type",
            "instance_count",
            "s3_uri_in",
            "s3_uri_out",
        ] {
            assert!(variables.contains_key(name), "missing {name}");
        }
    }
}
