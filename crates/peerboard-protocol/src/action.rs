//! Action names and the limits the Framed Link puts on them.

use crate::ProtocolError;

/// Longest action name, in bytes, that fits the short-range link's framing.
pub const MAX_ACTION_NAME_LEN: usize = 12;

pub const HEARTBEAT: &str = "heartbeat";
pub const CHALLENGE: &str = "challenge";
/// Challenge responses. Shortened to fit [`MAX_ACTION_NAME_LEN`].
pub const CHALLENGE_RESPONSE: &str = "challResp";
pub const MOVE_APPEND: &str = "moveAppend";
pub const LOG_SYNC: &str = "logSync";
pub const POSITION_SYNC: &str = "positionSync";
pub const ROLE_ANNOUNCE: &str = "roleAnnounce";
pub const CHAT: &str = "chat";
pub const LEGACY_MOVE: &str = "move";

/// Checks that `name` can travel on every carrier.
///
/// # Errors
/// [`ProtocolError::BadActionName`] if the name is empty, longer than
/// [`MAX_ACTION_NAME_LEN`] bytes, or contains the frame separator.
pub fn validate_action_name(name: &str) -> Result<(), ProtocolError> {
    let reason = if name.is_empty() {
        "empty"
    } else if name.len() > MAX_ACTION_NAME_LEN {
        "longer than 12 bytes"
    } else if name.contains('\n') {
        "contains a newline"
    } else {
        return Ok(());
    };
    Err(ProtocolError::BadActionName {
        name: name.to_owned(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_action_names_fit_the_link() {
        for name in [
            HEARTBEAT,
            CHALLENGE,
            CHALLENGE_RESPONSE,
            MOVE_APPEND,
            LOG_SYNC,
            POSITION_SYNC,
            ROLE_ANNOUNCE,
            CHAT,
            LEGACY_MOVE,
        ] {
            assert!(validate_action_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_overlong_action_name_is_rejected() {
        assert!(validate_action_name("challengeResponse").is_err());
        assert!(validate_action_name("").is_err());
        assert!(validate_action_name("a\nb").is_err());
    }
}
