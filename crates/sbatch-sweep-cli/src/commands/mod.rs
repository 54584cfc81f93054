//! CLI command implementations.

pub mod common;
pub mod launch;
pub mod render;
pub mod task_env;
