//! P5 project assessment: class-owned projects, their targets, and the
//! per-student notes and grades recorded against them.
//!
//! Every request is authorized by walking from the addressed entity up to its
//! class and comparing the class coordinator with the caller. Writes are then
//! gated on the report status of the students involved.

pub mod batch;
pub mod error;
pub mod guard;
pub mod hierarchy;
pub mod lock;
pub mod service;
pub mod types;

#[cfg(test)]
mod fixture;

pub use error::{P5Error, P5Result};
pub use service::AssessmentService;
