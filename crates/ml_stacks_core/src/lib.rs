//! Shared SageMaker stack domain primitives.
//!
//! This crate owns handler configuration, SageMaker request descriptors,
//! response contracts and stack synthesis. It intentionally excludes AWS SDK
//! and Lambda runtime concerns, which live in `ml_stacks_lambda`.

pub mod arn;
pub mod contract;
pub mod env;
pub mod jobs;
pub mod stacks;
