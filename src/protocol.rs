//! The text-framed wire protocol (spec §4.6).
//!
//! Strict on the leading token, permissive on trailing whitespace. Unknown
//! inbound frames are a [`NuggetsError::ProtocolError`] and cause no state
//! change — the caller turns that into an `ERROR` reply.

use crate::error::NuggetsError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Play(String),
    Spectate,
    Key(char),
}

pub fn parse_inbound(raw: &str) -> Result<Inbound, NuggetsError> {
    let trimmed = raw.trim_end();
    let mut parts = trimmed.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("");

    match cmd {
        "PLAY" => Ok(Inbound::Play(rest.to_string())),
        "SPECTATE" => Ok(Inbound::Spectate),
        "KEY" => {
            let rest = rest.trim();
            let mut chars = rest.chars();
            let c = chars
                .next()
                .ok_or_else(|| NuggetsError::ProtocolError("KEY missing character".to_string()))?;
            if chars.next().is_some() {
                return Err(NuggetsError::ProtocolError(
                    "KEY expects exactly one character".to_string(),
                ));
            }
            Ok(Inbound::Key(c))
        }
        _ => Err(NuggetsError::ProtocolError(format!(
            "unknown frame {cmd:?}"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Ok(char),
    Grid(usize, usize),
    Gold { recent: u32, purse: u32, remaining: u32 },
    Display(String),
    Error(String),
    Quit(String),
}

impl Outbound {
    pub fn to_wire(&self) -> String {
        match self {
            Outbound::Ok(letter) => format!("OK {letter}"),
            Outbound::Grid(rows, cols) => format!("GRID {rows} {cols}"),
            Outbound::Gold { recent, purse, remaining } => {
                format!("GOLD {recent} {purse} {remaining}")
            }
            Outbound::Display(framebuffer) => format!("DISPLAY\n{framebuffer}"),
            Outbound::Error(text) => format!("ERROR {text}"),
            Outbound::Quit(text) => format!("QUIT {text}"),
        }
    }
}

/// Parse a frame the server itself produced. Used by the round-trip tests
/// of spec §8; the client uses it too to interpret what it receives.
pub fn parse_outbound(raw: &str) -> Result<Outbound, NuggetsError> {
    if let Some(rest) = raw.strip_prefix("DISPLAY\n") {
        return Ok(Outbound::Display(rest.to_string()));
    }

    let trimmed = raw.trim_end();
    let mut parts = trimmed.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("");

    match cmd {
        "OK" => {
            let letter = rest
                .chars()
                .next()
                .ok_or_else(|| NuggetsError::ProtocolError("OK missing letter".to_string()))?;
            Ok(Outbound::Ok(letter))
        }
        "GRID" => {
            let mut nums = rest.split_whitespace();
            let rows = parse_usize(nums.next())?;
            let cols = parse_usize(nums.next())?;
            Ok(Outbound::Grid(rows, cols))
        }
        "GOLD" => {
            let mut nums = rest.split_whitespace();
            let recent = parse_u32(nums.next())?;
            let purse = parse_u32(nums.next())?;
            let remaining = parse_u32(nums.next())?;
            Ok(Outbound::Gold { recent, purse, remaining })
        }
        "ERROR" => Ok(Outbound::Error(rest.to_string())),
        "QUIT" => Ok(Outbound::Quit(rest.to_string())),
        _ => Err(NuggetsError::ProtocolError(format!(
            "unrecognised outbound frame {cmd:?}"
        ))),
    }
}

fn parse_usize(tok: Option<&str>) -> Result<usize, NuggetsError> {
    tok.and_then(|s| s.parse().ok())
        .ok_or_else(|| NuggetsError::ProtocolError("expected an integer".to_string()))
}

fn parse_u32(tok: Option<&str>) -> Result<u32, NuggetsError> {
    tok.and_then(|s| s.parse().ok())
        .ok_or_else(|| NuggetsError::ProtocolError("expected an integer".to_string()))
}

/// Recognised single-keystroke movement commands (spec §4.5): lowercase
/// steps one cell, uppercase runs until blocked, `Q` quits.
pub fn direction_for_key(key: char) -> Option<(i32, i32)> {
    match key.to_ascii_lowercase() {
        'h' => Some((0, -1)),
        'l' => Some((0, 1)),
        'k' => Some((-1, 0)),
        'j' => Some((1, 0)),
        'y' => Some((-1, -1)),
        'u' => Some((-1, 1)),
        'b' => Some((1, -1)),
        'n' => Some((1, 1)),
        _ => None,
    }
}

pub fn is_quit_key(key: char) -> bool {
    key == 'Q'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_play_with_name() {
        assert_eq!(
            parse_inbound("PLAY Alice").unwrap(),
            Inbound::Play("Alice".to_string())
        );
    }

    #[test]
    fn parses_spectate() {
        assert_eq!(parse_inbound("SPECTATE").unwrap(), Inbound::Spectate);
    }

    #[test]
    fn parses_key() {
        assert_eq!(parse_inbound("KEY l").unwrap(), Inbound::Key('l'));
    }

    #[test]
    fn rejects_multi_char_key() {
        assert!(parse_inbound("KEY ll").is_err());
    }

    #[test]
    fn permissive_on_trailing_whitespace() {
        assert_eq!(
            parse_inbound("SPECTATE   \r\n").unwrap(),
            Inbound::Spectate
        );
    }

    #[test]
    fn rejects_unknown_frame() {
        assert!(parse_inbound("DANCE").is_err());
    }

    #[test]
    fn outbound_round_trips() {
        let frames = vec![
            Outbound::Ok('A'),
            Outbound::Grid(21, 80),
            Outbound::Gold { recent: 5, purse: 5, remaining: 245 },
            Outbound::Display("row one\nrow two".to_string()),
            Outbound::Error("bad frame".to_string()),
            Outbound::Quit("GAME OVER:\nA 7    Alice".to_string()),
        ];
        for frame in frames {
            let wire = frame.to_wire();
            let parsed = parse_outbound(&wire).unwrap();
            assert_eq!(parsed, frame);
        }
    }

    #[test]
    fn directions_cover_eight_keys() {
        for key in ['h', 'j', 'k', 'l', 'y', 'u', 'b', 'n'] {
            assert!(direction_for_key(key).is_some());
            assert!(direction_for_key(key.to_ascii_uppercase()).is_some());
        }
        assert!(direction_for_key('q').is_none());
        assert!(is_quit_key('Q'));
        assert!(!is_quit_key('q'));
    }
}
