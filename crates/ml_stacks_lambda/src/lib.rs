//! AWS-oriented adapters and handlers for the SageMaker Lambda functions.
//!
//! Handlers are plain functions over the adapter traits so they can be tested
//! without the Lambda runtime. The binaries under `src/bin` wire them to the
//! AWS SDK clients.

pub mod adapters;
pub mod handlers;
pub mod telemetry;
