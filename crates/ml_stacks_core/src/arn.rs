//! Amazon Resource Name construction.
//!
//! Stacks build every ARN they grant through this module so a policy
//! statement and the resource it targets cannot drift apart.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Arn(String);

impl Arn {
    pub fn new(
        partition: &str,
        service: &str,
        region: &str,
        account: &str,
        resource: &str,
    ) -> Self {
        Self(format!("arn:{partition}:{service}:{region}:{account}:{resource}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Arn> for String {
    fn from(value: Arn) -> Self {
        value.0
    }
}

pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else {
        "aws"
    }
}

/// Account and region scope shared by all ARNs of one stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArnScope {
    pub account: String,
    pub region: String,
}

impl ArnScope {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    pub fn partition(&self) -> &'static str {
        partition_for_region(&self.region)
    }

    fn regional(&self, service: &str, resource: &str) -> Arn {
        Arn::new(self.partition(), service, &self.region, &self.account, resource)
    }

    pub fn sagemaker_endpoint(&self, endpoint_name: &str) -> Arn {
        self.regional("sagemaker", &format!("endpoint/{}", endpoint_name.to_lowercase()))
    }

    pub fn sagemaker_model(&self, model_name: &str) -> Arn {
        self.regional("sagemaker", &format!("model/{}", model_name.to_lowercase()))
    }

    /// Matches every training job whose name starts with `prefix`.
    pub fn sagemaker_training_jobs(&self, prefix: &str) -> Arn {
        self.regional("sagemaker", &format!("training-job/{}*", prefix.to_lowercase()))
    }

    /// Matches every transform job whose name starts with `prefix`.
    pub fn sagemaker_transform_jobs(&self, prefix: &str) -> Arn {
        self.regional("sagemaker", &format!("transform-job/{}*", prefix.to_lowercase()))
    }

    pub fn sagemaker_notebook_instance(&self, name: &str) -> Arn {
        self.regional("sagemaker", &format!("notebook-instance/{}", name.to_lowercase()))
    }

    pub fn lambda_function(&self, function_name: &str) -> Arn {
        self.regional("lambda", &format!("function:{function_name}"))
    }

    pub fn state_machine(&self, name: &str) -> Arn {
        self.regional("states", &format!("stateMachine:{name}"))
    }

    /// IAM is global, so the region segment is empty.
    pub fn iam_role(&self, role_name: &str) -> Arn {
        Arn::new(self.partition(), "iam", "", &self.account, &format!("role/{role_name}"))
    }

    /// S3 ARNs carry neither region nor account.
    pub fn s3_object(&self, bucket: &str, key: &str) -> Arn {
        Arn::new(self.partition(), "s3", "", "", &format!("{bucket}/{key}"))
    }

    pub fn s3_bucket(&self, bucket: &str) -> Arn {
        Arn::new(self.partition(), "s3", "", "", bucket)
    }
}

/// Splits `s3://bucket/key` into its bucket and key.
pub fn parse_s3_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("s3://")?;
    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return None;
    }
    Some((bucket, key))
}
