//! Output utilities for CLI commands
//!
//! This module provides terminal output helpers including spinners with
//! elapsed time display for long-running operations, color utilities for
//! consistent state styling, and centralized Docker error formatting.

pub mod colors;
pub mod errors;
pub mod spinner;

pub use colors::{check_style, state_style};
pub use errors::{format_docker_error_anyhow, show_docker_error};
pub use spinner::CommandSpinner;
