//! PGN export.

use crate::MatchResult;

/// PGN header values. Missing values are written the way the PGN
/// standard spells "unknown".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgnHeaders {
    pub event: String,
    pub site: String,
    /// `YYYY.MM.DD`.
    pub date: Option<String>,
    pub white: String,
    pub black: String,
}

impl Default for PgnHeaders {
    fn default() -> Self {
        Self {
            event: "Peerboard Game".to_owned(),
            site: "Peerboard".to_owned(),
            date: None,
            white: "White".to_owned(),
            black: "Black".to_owned(),
        }
    }
}

/// Renders a game: the seven-tag-style header block, a blank line, then
/// numbered movetext ending in the result token.
pub fn build_pgn(headers: &PgnHeaders, moves: &[String], result: &MatchResult) -> String {
    let token = result.pgn_token();
    let date = headers.date.as_deref().unwrap_or("????.??.??");
    let mut out = String::new();
    for (tag, value) in [
        ("Event", headers.event.as_str()),
        ("Site", headers.site.as_str()),
        ("Date", date),
        ("White", headers.white.as_str()),
        ("Black", headers.black.as_str()),
        ("Result", token),
    ] {
        out.push_str(&format!("[{tag} \"{}\"]\n", escape(value)));
    }
    out.push('\n');

    let movetext: Vec<String> = moves
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| match pair {
            [w, b] => format!("{}. {w} {b}", i + 1),
            [w] => format!("{}. {w}", i + 1),
            _ => String::new(),
        })
        .collect();
    if !movetext.is_empty() {
        out.push_str(&movetext.join(" "));
        out.push(' ');
    }
    out.push_str(token);
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    use peerboard_protocol::Color;

    use crate::EndReason;

    fn moves(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_numbered_movetext_with_result() {
        let result = MatchResult::Won {
            winner: Color::White,
            reason: EndReason::Resignation,
        };
        let pgn = build_pgn(&PgnHeaders::default(), &moves(&["e4", "e5", "Qh5"]), &result);
        assert!(pgn.ends_with("\n\n1. e4 e5 2. Qh5 1-0"), "{pgn}");
        assert!(pgn.contains("[Result \"1-0\"]"));
        assert!(pgn.contains("[Date \"????.??.??\"]"));
    }

    #[test]
    fn test_ongoing_empty_game() {
        let pgn = build_pgn(&PgnHeaders::default(), &[], &MatchResult::Ongoing);
        assert!(pgn.ends_with("\n\n*"));
    }

    #[test]
    fn test_names_are_escaped() {
        let headers = PgnHeaders {
            white: "Al \"the\" Bot".into(),
            ..PgnHeaders::default()
        };
        let pgn = build_pgn(&headers, &[], &MatchResult::Ongoing);
        assert!(pgn.contains(r#"[White "Al \"the\" Bot"]"#));
    }
}
