//! Mapping of web control requests onto panel commands
use log::warn;
use url::Url;

use crate::control::Command;

/// Path the control page submits its buttons to.
pub const CONTROL_PATH: &str = "/control";

/// Turn a request target like `/control?action=up` into a command.
///
/// Only the first `action` parameter counts. Web commands skip debouncing: there is
/// no contact bounce on a network request. `reset` is a short press on the reset
/// button.
///
/// # Returns
/// None for other paths, missing or unknown actions
pub fn parse_control_target(target: &str) -> Option<Command> {
    let base = Url::parse("http://panel.local/").ok()?;
    let url = match base.join(target) {
        Ok(url) => url,
        Err(e) => {
            warn!("Unparseable request target '{}': {}", target, e);
            return None;
        }
    };

    if url.path() != CONTROL_PATH {
        return None;
    }

    let action = url
        .query_pairs()
        .find(|(key, _)| key == "action")
        .map(|(_, value)| value.into_owned())?;

    match action.as_str() {
        "up" => Some(Command::Up),
        "down" => Some(Command::Down),
        "reset" => Some(Command::Resync),
        other => {
            warn!("Unknown web action '{}'", other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_actions() {
        assert_eq!(parse_control_target("/control?action=up"), Some(Command::Up));
        assert_eq!(parse_control_target("/control?action=down"), Some(Command::Down));
        assert_eq!(parse_control_target("/control?action=reset"), Some(Command::Resync));
    }

    #[test]
    fn first_action_wins() {
        assert_eq!(
            parse_control_target("/control?x=1&action=down&action=up"),
            Some(Command::Down)
        );
    }

    #[test]
    fn rejects_other_requests() {
        assert_eq!(parse_control_target("/"), None);
        assert_eq!(parse_control_target("/control"), None);
        assert_eq!(parse_control_target("/control?action=boil"), None);
        assert_eq!(parse_control_target("/status?action=up"), None);
    }
}
