//! Lambda on a schedule that starts SageMaker training jobs.

use serde::{Deserialize, Serialize};

use super::template::{PolicyStatement, Template};
use super::{
    add_lambda_function, add_schedule_trigger, require_non_empty, HandlerVars, LambdaSettings,
    StackEnv, StackError,
};
use crate::arn::{Arn, ArnScope};
use crate::env::{TrainingEnv, DEFAULT_INSTANCE_TYPE, DEFAULT_TRAINING_JOB_PREFIX};
use crate::jobs::validate_job_prefix;

pub const FUNCTION_ID: &str = "TrainingFunction";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduledTrainingConfig {
    pub lambda: LambdaSettings,
    pub schedule_expression: String,
    pub training_job_prefix: String,
    pub container: String,
    /// Name of the role SageMaker assumes while training.
    pub sagemaker_role_name: String,
    pub s3_input_train: String,
    pub s3_input_validation: String,
    pub s3_output: String,
    pub max_depth: u32,
    pub instance_type: String,
    pub instance_count: u32,
    pub volume_size_gb: u32,
    pub max_runtime_seconds: u32,
}

impl Default for ScheduledTrainingConfig {
    fn default() -> Self {
        Self {
            lambda: LambdaSettings::sample("start-xgboost-training", "training_lambda.zip"),
            schedule_expression: "rate(1 day)".to_string(),
            training_job_prefix: DEFAULT_TRAINING_JOB_PREFIX.to_string(),
            container: "683313688378.dkr.ecr.us-east-1.amazonaws.com/sagemaker-xgboost:1.7-1"
                .to_string(),
            sagemaker_role_name: "sagemaker-execution".to_string(),
            s3_input_train: "s3://ml-stacks-data/xgboost/train".to_string(),
            s3_input_validation: "s3://ml-stacks-data/xgboost/validation".to_string(),
            s3_output: "s3://ml-stacks-data/xgboost/output".to_string(),
            max_depth: 5,
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            instance_count: 1,
            volume_size_gb: 5,
            max_runtime_seconds: 3600,
        }
    }
}

impl ScheduledTrainingConfig {
    pub fn handler_env(&self, scope: &ArnScope) -> Result<TrainingEnv, StackError> {
        require_non_empty("sagemaker_role_name", &self.sagemaker_role_name)?;
        let vars = HandlerVars::new([
            ("training_job_prefix", self.training_job_prefix.clone()),
            ("container", self.container.clone()),
            ("role_arn", scope.iam_role(self.sagemaker_role_name.trim()).into()),
            ("s3_input_train", self.s3_input_train.clone()),
            ("s3_input_validation", self.s3_input_validation.clone()),
            ("s3_output", self.s3_output.clone()),
            ("max_depth", self.max_depth.to_string()),
            ("instance_type", self.instance_type.clone()),
            ("instance_count", self.instance_count.to_string()),
            ("volume_size_gb", self.volume_size_gb.to_string()),
            ("max_runtime_seconds", self.max_runtime_seconds.to_string()),
        ]);
        let handler_env = TrainingEnv::from_lookup(|name| vars.get(name))?;
        validate_job_prefix(&handler_env.training_job_prefix)?;
        Ok(handler_env)
    }

    pub fn statements(&self, scope: &ArnScope, handler_env: &TrainingEnv) -> Vec<PolicyStatement> {
        vec![
            PolicyStatement::allow(
                &["sagemaker:CreateTrainingJob"],
                vec![scope
                    .sagemaker_training_jobs(&handler_env.training_job_prefix)
                    .into()],
            ),
            PolicyStatement::allow(&["iam:PassRole"], vec![handler_env.role_arn.clone()]),
        ]
    }

    /// Adds the training function to `template` without a trigger.
    pub fn add_function(
        &self,
        template: &mut Template,
        scope: &ArnScope,
    ) -> Result<Arn, StackError> {
        let handler_env = self.handler_env(scope)?;
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

pub fn synth(config: &ScheduledTrainingConfig, env: &StackEnv) -> Result<Template, StackError> {
    let scope = env.scope();
    let mut template = Template::new(format!(
        "Scheduled SageMaker training jobs prefixed '{}'",
        config.training_job_prefix
    ));
    config.add_function(&mut template, &scope)?;
    add_schedule_trigger(&mut template, FUNCTION_ID, &config.schedule_expression)?;
    Ok(template)
}
