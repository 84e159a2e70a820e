//! REST API in front of a Lambda that invokes a SageMaker endpoint.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::template::{get_att, reference, sub, PolicyStatement, Resource, Template};
use super::{
    add_lambda_function, require_non_empty, HandlerVars, LambdaSettings, StackEnv, StackError,
};
use crate::env::{InferenceEnv, DEFAULT_CONTENT_TYPE};

pub const FUNCTION_ID: &str = "InferenceFunction";
pub const API_ID: &str = "InferenceApi";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InferenceApiConfig {
    pub lambda: LambdaSettings,
    pub endpoint_name: String,
    pub content_type: String,
    pub sample_bucket: Option<String>,
    pub sample_key: Option<String>,
    pub api_name: String,
    pub stage_name: String,
}

impl Default for InferenceApiConfig {
    fn default() -> Self {
        Self {
            lambda: LambdaSettings::sample("invoke-xgboost-endpoint", "inference_lambda.zip"),
            endpoint_name: "xgboost-endpoint".to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            sample_bucket: None,
            sample_key: None,
            api_name: "xgboost-inference".to_string(),
            stage_name: "prod".to_string(),
        }
    }
}

impl InferenceApiConfig {
    pub fn handler_env(&self) -> Result<InferenceEnv, StackError> {
        let vars = HandlerVars::new([
            ("endpoint_name", self.endpoint_name.clone()),
            ("content_type", self.content_type.clone()),
            ("bucket", self.sample_bucket.clone().unwrap_or_default()),
            ("key", self.sample_key.clone().unwrap_or_default()),
        ]);
        Ok(InferenceEnv::from_lookup(|name| vars.get(name))?)
    }
}

pub fn synth(config: &InferenceApiConfig, env: &StackEnv) -> Result<Template, StackError> {
    require_non_empty("api_name", &config.api_name)?;
    require_non_empty("stage_name", &config.stage_name)?;
    let handler_env = config.handler_env()?;
    let scope = env.scope();

    let mut statements = vec![PolicyStatement::allow(
        &["sagemaker:InvokeEndpoint"],
        vec![scope.sagemaker_endpoint(&handler_env.endpoint_name).into()],
    )];
    if let Some(location) = &handler_env.sample_object {
        statements.push(PolicyStatement::allow(
            &["s3:GetObject"],
            vec![scope.s3_object(&location.bucket, &location.key).into()],
        ));
    }

    let mut template = Template::new(format!(
        "REST API invoking SageMaker endpoint {}",
        handler_env.endpoint_name
    ));
    let function_arn = add_lambda_function(
        &mut template,
        &scope,
        FUNCTION_ID,
        &config.lambda,
        &statements,
        handler_env.to_vars(),
    )?;

    let integration_uri = format!(
        "arn:{}:apigateway:{}:lambda:path/2015-03-31/functions/{function_arn}/invocations",
        scope.partition(),
        scope.region,
    );
    let integration = json!({
        "Type": "AWS_PROXY",
        "IntegrationHttpMethod": "POST",
        "Uri": integration_uri,
    });

    template.add(
        API_ID,
        Resource::new(
            "AWS::ApiGateway::RestApi",
            json!({
                "Name": config.api_name,
                "EndpointConfiguration": { "Types": ["REGIONAL"] },
            }),
        ),
    )?;
    template.add(
        "InferenceApiProxy",
        Resource::new(
            "AWS::ApiGateway::Resource",
            json!({
                "RestApiId": reference(API_ID),
                "ParentId": get_att(API_ID, "RootResourceId"),
                "PathPart": "{proxy+}",
            }),
        ),
    )?;
    template.add(
        "InferenceApiRootMethod",
        Resource::new(
            "AWS::ApiGateway::Method",
            json!({
                "RestApiId": reference(API_ID),
                "ResourceId": get_att(API_ID, "RootResourceId"),
                "HttpMethod": "ANY",
                "AuthorizationType": "NONE",
                "Integration": integration,
            }),
        ),
    )?;
    template.add(
        "InferenceApiProxyMethod",
        Resource::new(
            "AWS::ApiGateway::Method",
            json!({
                "RestApiId": reference(API_ID),
                "ResourceId": reference("InferenceApiProxy"),
                "HttpMethod": "ANY",
                "AuthorizationType": "NONE",
                "Integration": integration,
            }),
        ),
    )?;
    template.add(
        "InferenceApiDeployment",
        Resource::new(
            "AWS::ApiGateway::Deployment",
            json!({
                "RestApiId": reference(API_ID),
                "StageName": config.stage_name,
            }),
        )
        .depends_on(&["InferenceApiRootMethod", "InferenceApiProxyMethod"]),
    )?;
    template.add(
        "InferenceApiPermission",
        Resource::new(
            "AWS::Lambda::Permission",
            json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": reference(FUNCTION_ID),
                "Principal": "apigateway.amazonaws.com",
                "SourceArn": sub(&format!(
                    "arn:{}:execute-api:{}:{}:${{{API_ID}}}/*",
                    scope.partition(),
                    scope.region,
                    scope.account,
                )),
            }),
        ),
    )?;

    template.add_output(
        "InferenceApiUrl",
        sub(&format!(
            "https://${{{API_ID}}}.execute-api.{}.amazonaws.com/{}/",
            scope.region, config.stage_name
        )),
        "Invoke URL of the inference API",
    );

    Ok(template)
}
