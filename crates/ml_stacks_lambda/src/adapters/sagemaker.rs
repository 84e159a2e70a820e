use ml_stacks_core::jobs::{InvokeRequest, TrainingJobRequest, TransformJobRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeResponse {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

pub trait EndpointInvoker {
    fn invoke_endpoint(&self, request: &InvokeRequest) -> Result<InvokeResponse, String>;
}

/// Returns the ARN of the created job.
pub trait TrainingJobs {
    fn create_training_job(&self, request: &TrainingJobRequest) -> Result<String, String>;
}

/// Returns the ARN of the created job.
pub trait TransformJobs {
    fn create_transform_job(&self, request: &TransformJobRequest) -> Result<String, String>;
}
