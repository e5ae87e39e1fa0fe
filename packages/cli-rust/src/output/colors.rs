//! Color utilities for CLI output
//!
//! Provides consistent color styling for container states and check results.

use console::{Style, StyledObject};
use eps_deploy_core::docker::ContainerState;

/// Style a container state with appropriate colors
///
/// - running -> green bold
/// - stopped -> red
/// - created -> yellow
/// - removed -> dim
pub fn state_style(state: ContainerState) -> StyledObject<&'static str> {
    let style = match state {
        ContainerState::Running => Style::new().green().bold(),
        ContainerState::Stopped => Style::new().red(),
        ContainerState::Created => Style::new().yellow(),
        ContainerState::Removed => Style::new().dim(),
    };
    style.apply_to(state.as_str())
}

/// "PASS" in green or "FAIL" in red
pub fn check_style(passed: bool) -> StyledObject<&'static str> {
    if passed {
        Style::new().green().bold().apply_to("PASS")
    } else {
        Style::new().red().bold().apply_to("FAIL")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_style_keeps_text() {
        console::set_colors_enabled(false);
        assert_eq!(state_style(ContainerState::Running).to_string(), "running");
        assert_eq!(state_style(ContainerState::Stopped).to_string(), "stopped");
        assert_eq!(state_style(ContainerState::Removed).to_string(), "removed");
    }

    #[test]
    fn check_style_text() {
        console::set_colors_enabled(false);
        assert_eq!(check_style(true).to_string(), "PASS");
        assert_eq!(check_style(false).to_string(), "FAIL");
    }
}
