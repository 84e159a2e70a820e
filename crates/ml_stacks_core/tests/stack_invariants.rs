use ml_stacks_core::arn::ArnScope;
use ml_stacks_core::env::{InferenceEnv, TrainingEnv, TransformEnv};
use ml_stacks_core::jobs::validate_job_prefix;
use ml_stacks_core::stacks::template::Template;
use ml_stacks_core::stacks::{
    batch_transform, inference_api, scheduled_training, StackEnv, StackError, StackKind,
    StacksConfig,
};
use serde_json::Value;

fn stack_env() -> StackEnv {
    StackEnv::new("123456789012", "us-east-1").expect("stack env should be valid")
}

fn function_variables(template: &Template, logical_id: &str) -> serde_json::Map<String, Value> {
    template
        .resource(logical_id)
        .expect("function should exist")
        .properties["Environment"]["Variables"]
        .as_object()
        .cloned()
        .expect("environment variables should be an object")
}

#[test]
fn synthesis_is_deterministic_for_every_stack() {
    let config = StacksConfig::default();
    let env = stack_env();

    for kind in StackKind::ALL {
        let first = config.synth(kind, &env).expect("first synth");
        let second = config.synth(kind, &env).expect("second synth");

        assert_eq!(
            first.render().expect("render"),
            second.render().expect("render"),
            "{kind} rendered differently"
        );
        assert_eq!(
            first.fingerprint().expect("fingerprint"),
            second.fingerprint().expect("fingerprint")
        );
    }
}

#[test]
fn different_inputs_change_the_fingerprint() {
    let mut config = StacksConfig::default();
    let env = stack_env();
    let before = config
        .synth(StackKind::InferenceApi, &env)
        .and_then(|template| template.fingerprint())
        .expect("fingerprint");

    config.inference_api.endpoint_name = "other-endpoint".to_string();
    let after = config
        .synth(StackKind::InferenceApi, &env)
        .and_then(|template| template.fingerprint())
        .expect("fingerprint");

    assert_ne!(before, after);
}

#[test]
fn endpoint_grant_matches_handler_endpoint() {
    let env = stack_env();
    let template = StacksConfig::default()
        .synth(StackKind::InferenceApi, &env)
        .expect("synth");
    let variables = function_variables(&template, "InferenceFunction");
    let endpoint_name = variables["endpoint_name"].as_str().expect("endpoint_name");

    let expected = ArnScope::new(env.account.clone(), env.region.clone())
        .sagemaker_endpoint(endpoint_name);
    assert_eq!(
        template.granted_resources("InferenceFunctionRole", "sagemaker:InvokeEndpoint"),
        vec![expected.to_string()]
    );
}

#[test]
fn pipeline_functions_share_grants_with_standalone_stacks() {
    let config = StacksConfig::default();
    let env = stack_env();
    let pipeline = config
        .synth(StackKind::TrainingPipeline, &env)
        .expect("pipeline synth");
    let training = scheduled_training::synth(&config.training_pipeline.training, &env)
        .expect("training synth");
    let transform = batch_transform::synth(&config.training_pipeline.transform, &env)
        .expect("transform synth");

    for action in ["sagemaker:CreateTrainingJob", "iam:PassRole"] {
        assert_eq!(
            pipeline.granted_resources("TrainingFunctionRole", action),
            training.granted_resources("TrainingFunctionRole", action)
        );
    }
    assert_eq!(
        pipeline.granted_resources("TransformFunctionRole", "sagemaker:CreateTransformJob"),
        transform.granted_resources("TransformFunctionRole", "sagemaker:CreateTransformJob")
    );
}

#[test]
fn partial_json_config_keeps_defaults_for_missing_sections() {
    let config: StacksConfig = serde_json::from_str(
        r#"{
            "inference_api": { "endpoint_name": "churn-endpoint" },
            "notebook": { "instance_type": "ml.t3.large" }
        }"#,
    )
    .expect("partial config should parse");

    assert_eq!(config.inference_api.endpoint_name, "churn-endpoint");
    assert_eq!(config.inference_api.stage_name, "prod");
    assert_eq!(config.notebook.instance_type, "ml.t3.large");
    assert_eq!(config.batch_transform, StacksConfig::default().batch_transform);

    for kind in StackKind::ALL {
        config.synth(kind, &stack_env()).expect("every stack should synth");
    }
}

fn variable_lookup(variables: serde_json::Map<String, Value>) -> impl Fn(&str) -> Option<String> {
    move |name| variables.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Reads each deployed function's environment the way its handler does at
/// cold start and checks the role grants against what the handler will call.
fn assert_grants_match_handler_env(template: &Template, scope: &ArnScope) {
    let function_ids: Vec<String> = template
        .resources_of_type("AWS::Lambda::Function")
        .map(|(logical_id, _)| logical_id.clone())
        .collect();
    assert!(!function_ids.is_empty());

    for logical_id in function_ids {
        let lookup = variable_lookup(function_variables(template, &logical_id));
        let role_id = format!("{logical_id}Role");

        match logical_id.as_str() {
            inference_api::FUNCTION_ID => {
                let env = InferenceEnv::from_lookup(lookup).expect("env");
                assert_eq!(
                    template.granted_resources(&role_id, "sagemaker:InvokeEndpoint"),
                    vec![scope.sagemaker_endpoint(&env.endpoint_name).to_string()]
                );
                let expected_reads: Vec<String> = env
                    .sample_object
                    .iter()
                    .map(|location| scope.s3_object(&location.bucket, &location.key).to_string())
                    .collect();
                assert_eq!(template.granted_resources(&role_id, "s3:GetObject"), expected_reads);
            }
            scheduled_training::FUNCTION_ID => {
                let env = TrainingEnv::from_lookup(lookup).expect("env");
                validate_job_prefix(&env.training_job_prefix).expect("prefix");
                assert_eq!(
                    template.granted_resources(&role_id, "sagemaker:CreateTrainingJob"),
                    vec![scope
                        .sagemaker_training_jobs(&env.training_job_prefix)
                        .to_string()]
                );
                assert_eq!(
                    template.granted_resources(&role_id, "iam:PassRole"),
                    vec![env.role_arn]
                );
            }
            batch_transform::FUNCTION_ID => {
                let env = TransformEnv::from_lookup(lookup).expect("env");
                validate_job_prefix(&env.transform_job_name).expect("prefix");
                assert_eq!(
                    template.granted_resources(&role_id, "sagemaker:CreateTransformJob"),
                    vec![scope
                        .sagemaker_transform_jobs(&env.transform_job_name)
                        .to_string()]
                );
            }
            other => panic!("unexpected function {other}"),
        }
    }
}

#[test]
fn every_function_environment_parses_and_matches_its_grants() {
    let env = stack_env();
    let scope = env.scope();
    let mut config = StacksConfig::default();
    config.inference_api.sample_bucket = Some("samples".to_string());
    config.inference_api.sample_key = Some("rows/test.csv".to_string());

    for kind in StackKind::ALL {
        let template = config.synth(kind, &env).expect("synth");
        if kind != StackKind::Notebook {
            assert_grants_match_handler_env(&template, &scope);
        }
    }
}

#[test]
fn padded_config_values_are_granted_as_the_handler_reads_them() {
    let env = stack_env();
    let mut config = StacksConfig::default();
    config.inference_api.endpoint_name = "  Churn-Endpoint\t".to_string();
    config.scheduled_training.training_job_prefix = " Xgb-".to_string();
    config.scheduled_training.sagemaker_role_name = " sagemaker-execution ".to_string();
    config.batch_transform.transform_job_name = "nightly- ".to_string();

    for kind in [
        StackKind::InferenceApi,
        StackKind::ScheduledTraining,
        StackKind::BatchTransform,
    ] {
        let template = config.synth(kind, &env).expect("synth");
        assert_grants_match_handler_env(&template, &env.scope());
    }
}

#[test]
fn configs_the_handlers_would_reject_do_not_synthesize() {
    let env = stack_env();

    let mut config = StacksConfig::default();
    config.batch_transform.split_type = "line".to_string();
    assert!(matches!(
        config.synth(StackKind::BatchTransform, &env),
        Err(StackError::HandlerEnv(_))
    ));

    let mut config = StacksConfig::default();
    config.scheduled_training.max_depth = 0;
    assert!(matches!(
        config.synth(StackKind::ScheduledTraining, &env),
        Err(StackError::HandlerEnv(_))
    ));

    let mut config = StacksConfig::default();
    config.scheduled_training.training_job_prefix = "xgb_".to_string();
    assert!(matches!(
        config.synth(StackKind::ScheduledTraining, &env),
        Err(StackError::JobPrefix(_))
    ));

    let mut config = StacksConfig::default();
    config.training_pipeline.transform.s3_uri_out = "batch/output".to_string();
    assert!(matches!(
        config.synth(StackKind::TrainingPipeline, &env),
        Err(StackError::HandlerEnv(_))
    ));
}
