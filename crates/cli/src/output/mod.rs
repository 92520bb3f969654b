//! Structured output envelope and payload models.

#[cfg(test)]
mod tests;

mod data;
mod format;
mod model;
mod result_builder;

pub use data::*;
pub use format::OutputFormat;
pub use model::*;
pub use result_builder::{ResultBuilder, command_error, print_failure, print_result, render_result};
