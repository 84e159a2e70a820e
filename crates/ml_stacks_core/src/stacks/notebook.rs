//! SageMaker notebook instance with its execution role.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::template::{get_att, PolicyStatement, Resource, Template};
use super::{add_execution_role, require_non_empty, StackEnv, StackError};

pub const ROLE_ID: &str = "NotebookRole";
pub const NOTEBOOK_ID: &str = "NotebookInstance";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotebookConfig {
    pub notebook_name: String,
    pub instance_type: String,
    pub volume_size_gb: u32,
    pub lifecycle_config_name: Option<String>,
    /// Bucket the notebook reads datasets from and writes artifacts to.
    pub data_bucket: Option<String>,
    pub direct_internet_access: bool,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            notebook_name: "ml-stacks-notebook".to_string(),
            instance_type: "ml.t3.medium".to_string(),
            volume_size_gb: 5,
            lifecycle_config_name: None,
            data_bucket: Some("ml-stacks-data".to_string()),
            direct_internet_access: true,
        }
    }
}

pub fn synth(config: &NotebookConfig, env: &StackEnv) -> Result<Template, StackError> {
    require_non_empty("notebook_name", &config.notebook_name)?;
    require_non_empty("instance_type", &config.instance_type)?;
    let scope = env.scope();

    let statements = match &config.data_bucket {
        Some(bucket) => {
            require_non_empty("data_bucket", bucket)?;
            vec![
                PolicyStatement::allow(&["s3:ListBucket"], vec![scope.s3_bucket(bucket).into()]),
                PolicyStatement::allow(
                    &["s3:GetObject", "s3:PutObject"],
                    vec![scope.s3_object(bucket, "*").into()],
                ),
            ]
        }
        None => Vec::new(),
    };

    let mut template = Template::new(format!(
        "SageMaker notebook instance {}",
        config.notebook_name
    ));
    add_execution_role(
        &mut template,
        ROLE_ID,
        "sagemaker.amazonaws.com",
        &statements,
        &[format!(
            "arn:{}:iam::aws:policy/AmazonSageMakerFullAccess",
            scope.partition()
        )],
    )?;

    let internet_access = if config.direct_internet_access {
        "Enabled"
    } else {
        "Disabled"
    };
    let mut properties = json!({
        "NotebookInstanceName": config.notebook_name,
        "InstanceType": config.instance_type,
        "RoleArn": get_att(ROLE_ID, "Arn"),
        "VolumeSizeInGB": config.volume_size_gb,
        "DirectInternetAccess": internet_access,
    });
    if let Some(lifecycle) = &config.lifecycle_config_name {
        properties["LifecycleConfigName"] = json!(lifecycle);
    }
    template.add(
        NOTEBOOK_ID,
        Resource::new("AWS::SageMaker::NotebookInstance", properties),
    )?;

    template.add_output(
        "NotebookInstanceArn",
        json!(scope.sagemaker_notebook_instance(&config.notebook_name)),
        "ARN of the notebook instance",
    );
    Ok(template)
}
