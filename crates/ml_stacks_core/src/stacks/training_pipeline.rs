//! Step Functions state machine chaining training and batch transform.
//!
//! The machine invokes the training Lambda and stops unless it answered 200,
//! waits a fixed time, invokes the transform Lambda and fails unless the
//! transform reports `Completed`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::batch_transform::BatchTransformConfig;
use super::scheduled_training::ScheduledTrainingConfig;
use super::template::{get_att, PolicyStatement, Resource, Template};
use super::{add_execution_role, require_non_empty, StackEnv, StackError};
use crate::arn::Arn;
use crate::contract::STATUS_COMPLETED;

pub const STATE_MACHINE_ID: &str = "TrainingPipeline";
pub const ROLE_ID: &str = "TrainingPipelineRole";
/// `statusCode` the training Lambda answers with once the job is created.
pub const TRAINING_STARTED_STATUS: u16 = 200;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingPipelineConfig {
    pub state_machine_name: String,
    pub wait_seconds: u32,
    pub training: ScheduledTrainingConfig,
    pub transform: BatchTransformConfig,
}

impl Default for TrainingPipelineConfig {
    fn default() -> Self {
        Self {
            state_machine_name: "train-then-transform".to_string(),
            wait_seconds: 900,
            training: ScheduledTrainingConfig::default(),
            transform: BatchTransformConfig::default(),
        }
    }
}

/// Amazon States Language definition for the pipeline.
pub fn definition(training_arn: &Arn, transform_arn: &Arn, wait_seconds: u32) -> Value {
    json!({
        "Comment": "Train a model, then run a batch transform against it",
        "StartAt": "StartTraining",
        "States": {
            "StartTraining": {
                "Type": "Task",
                "Resource": training_arn,
                "ResultPath": "$.training",
                "Next": "CheckTraining",
            },
            "CheckTraining": {
                "Type": "Choice",
                "Choices": [{
                    "Variable": "$.training.statusCode",
                    "NumericEquals": TRAINING_STARTED_STATUS,
                    "Next": "WaitForTraining",
                }],
                "Default": "TrainingFailed",
            },
            "WaitForTraining": {
                "Type": "Wait",
                "Seconds": wait_seconds,
                "Next": "StartTransform",
            },
            "StartTransform": {
                "Type": "Task",
                "Resource": transform_arn,
                "ResultPath": "$.transform",
                "Next": "CheckTransform",
            },
            "CheckTransform": {
                "Type": "Choice",
                "Choices": [{
                    "Variable": "$.transform.status",
                    "StringEquals": STATUS_COMPLETED,
                    "Next": "Done",
                }],
                "Default": "TransformFailed",
            },
            "Done": { "Type": "Succeed" },
            "TrainingFailed": {
                "Type": "Fail",
                "Error": "TrainingFailed",
                "Cause": "Training job did not start",
            },
            "TransformFailed": {
                "Type": "Fail",
                "Error": "TransformFailed",
                "Cause": "Batch transform job did not start",
            },
        },
    })
}

pub fn synth(config: &TrainingPipelineConfig, env: &StackEnv) -> Result<Template, StackError> {
    require_non_empty("state_machine_name", &config.state_machine_name)?;
    let scope = env.scope();

    let mut template = Template::new(format!(
        "State machine {} chaining training and batch transform",
        config.state_machine_name
    ));
    let training_arn = config.training.add_function(&mut template, &scope)?;
    let transform_arn = config.transform.add_function(&mut template, &scope)?;

    add_execution_role(
        &mut template,
        ROLE_ID,
        &format!("states.{}.amazonaws.com", scope.region),
        &[PolicyStatement::allow(
            &["lambda:InvokeFunction"],
            vec![training_arn.clone().into(), transform_arn.clone().into()],
        )],
        &[],
    )?;

    let definition = definition(&training_arn, &transform_arn, config.wait_seconds);
    let definition_string = serde_json::to_string(&definition)
        .map_err(|error| StackError::Render(error.to_string()))?;
    template.add(
        STATE_MACHINE_ID,
        Resource::new(
            "AWS::StepFunctions::StateMachine",
            json!({
                "StateMachineName": config.state_machine_name,
                "DefinitionString": definition_string,
                "RoleArn": get_att(ROLE_ID, "Arn"),
            }),
        )
        .depends_on(&[ROLE_ID]),
    )?;

    template.add_output(
        "StateMachineArn",
        json!(scope.state_machine(&config.state_machine_name)),
        "ARN of the training pipeline state machine",
    );
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> StackEnv {
        StackEnv::new("123456789012", "us-east-1").expect("env")
    }

    fn task_resources(template: &Template) -> Vec<String> {
        let machine = template.resource(STATE_MACHINE_ID).expect("state machine");
        let definition: Value = serde_json::from_str(
            machine.properties["DefinitionString"]
                .as_str()
                .expect("definition string"),
        )
        .expect("definition json");

        ["StartTraining", "StartTransform"]
            .iter()
            .map(|state| {
                definition["States"][state]["Resource"]
                    .as_str()
                    .expect("task resource")
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn role_may_invoke_exactly_the_task_functions() {
        let template = synth(&TrainingPipelineConfig::default(), &env()).expect("synth");
        assert_eq!(
            template.granted_resources(ROLE_ID, "lambda:InvokeFunction"),
            task_resources(&template)
        );
    }

    #[test]
    fn definition_routes_on_transform_status() {
        let scope = env().scope();
        let definition = definition(
            &scope.lambda_function("train"),
            &scope.lambda_function("transform"),
            60,
        );

        assert_eq!(definition["States"]["WaitForTraining"]["Seconds"], 60);
        assert_eq!(
            definition["States"]["CheckTransform"]["Choices"][0]["StringEquals"],
            "Completed"
        );
    }

    #[test]
    fn failed_training_start_skips_the_transform() {
        let scope = env().scope();
        let definition = definition(
            &scope.lambda_function("train"),
            &scope.lambda_function("transform"),
            60,
        );
        let states = &definition["States"];

        assert_eq!(states["StartTraining"]["Next"], "CheckTraining");
        assert_eq!(
            states["CheckTraining"]["Choices"][0],
            json!({
                "Variable": "$.training.statusCode",
                "NumericEquals": 200,
                "Next": "WaitForTraining",
            })
        );
        assert_eq!(states["CheckTraining"]["Default"], "TrainingFailed");
        assert_eq!(states["TrainingFailed"]["Type"], "Fail");
    }

    #[test]
    fn includes_both_lambda_functions() {
        let template = synth(&TrainingPipelineConfig::default(), &env()).expect("synth");
        assert_eq!(template.resources_of_type("AWS::Lambda::Function").count(), 2);
        assert_eq!(template.resources_of_type("AWS::Events::Rule").count(), 0);
    }
}
