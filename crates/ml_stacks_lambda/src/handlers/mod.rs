pub mod inference;
pub mod training;
pub mod transform;
