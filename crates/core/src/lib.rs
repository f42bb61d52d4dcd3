//! Core business logic for yatube-rs.

pub mod forms;
pub mod services;

pub use forms::{FormErrors, Submission};
pub use services::*;
