//! SAN helpers: pulling a move out of free text, numbering a move list and
//! writing PGN.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static SAN_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=?[QRBN])?[+#]?|[O0]-[O0]-[O0][+#]?|[O0]-[O0][+#]?)")
        .expect("SAN token regex is valid")
});

/// First SAN-shaped token in a free-text reply, e.g. "I'll play Nf3!" -> "Nf3".
pub fn extract_san(reply: &str) -> Option<String> {
    let found = SAN_TOKEN.find(reply)?.as_str();
    let normalized = match found.trim_end_matches(['+', '#']) {
        "0-0" => found.replacen("0-0", "O-O", 1),
        "0-0-0" => found.replacen("0-0-0", "O-O-O", 1),
        _ => found.to_string(),
    };
    Some(add_promotion_equals(&normalized))
}

/// "e8Q" -> "e8=Q"; notation that already has '=' passes through.
fn add_promotion_equals(san: &str) -> String {
    let bytes = san.as_bytes();
    for (i, window) in bytes.windows(2).enumerate() {
        if matches!(window[0], b'1' | b'8') && matches!(window[1], b'Q' | b'R' | b'B' | b'N') {
            return format!("{}={}", &san[..=i], &san[i + 1..]);
        }
    }
    san.to_string()
}

/// One numbered row of a move list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovePair {
    pub number: usize,
    pub white: String,
    pub black: Option<String>,
}

pub fn move_pairs(history: &[String]) -> Vec<MovePair> {
    history
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| MovePair {
            number: i + 1,
            white: pair[0].clone(),
            black: pair.get(1).cloned(),
        })
        .collect()
}

/// Movetext like "1. e4 e5 2. Nf3".
pub fn movetext(history: &[String]) -> String {
    let mut formatted = String::new();
    for pair in move_pairs(history) {
        if !formatted.is_empty() {
            formatted.push(' ');
        }
        formatted.push_str(&format!("{}. {}", pair.number, pair.white));
        if let Some(black) = pair.black {
            formatted.push_str(&format!(" {}", black));
        }
    }
    formatted
}

/// PGN with the seven tag roster. `result` is "1-0", "0-1", "1/2-1/2" or "*".
pub fn to_pgn(history: &[String], result: &str, date: &str) -> String {
    let tags = [
        ("Event", "Grandmaster Kids Chess"),
        ("Site", "?"),
        ("Date", date),
        ("Round", "-"),
        ("White", "Player"),
        ("Black", "Coach"),
        ("Result", result),
    ];
    let mut pgn = String::new();
    for (key, value) in tags {
        pgn.push_str(&format!("[{} \"{}\"]\n", key, value));
    }
    pgn.push('\n');
    let moves = movetext(history);
    if moves.is_empty() {
        pgn.push_str(result);
    } else {
        pgn.push_str(&format!("{} {}", moves, result));
    }
    pgn.push('\n');
    pgn
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(moves: &[&str]) -> Vec<String> {
        moves.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_san_plain() {
        assert_eq!(extract_san("e5"), Some("e5".into()));
        assert_eq!(extract_san("  Nf3\n"), Some("Nf3".into()));
    }

    #[test]
    fn test_extract_san_from_chatty_reply() {
        assert_eq!(extract_san("I will play Nxe5+ here."), Some("Nxe5+".into()));
        assert_eq!(extract_san("**Bb5**"), Some("Bb5".into()));
        assert_eq!(extract_san("Let's castle: O-O-O"), Some("O-O-O".into()));
    }

    #[test]
    fn test_extract_san_variants() {
        assert_eq!(extract_san("0-0"), Some("O-O".into()));
        assert_eq!(extract_san("e8Q"), Some("e8=Q".into()));
        assert_eq!(extract_san("exd8=N#"), Some("exd8=N#".into()));
    }

    #[test]
    fn test_extract_san_nothing_usable() {
        assert_eq!(extract_san(""), None);
        assert_eq!(extract_san("I resign, good game!"), None);
    }

    #[test]
    fn test_move_pairs() {
        let pairs = move_pairs(&strings(&["e4", "e5", "Nf3"]));
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].number, 1);
        assert_eq!(pairs[0].black.as_deref(), Some("e5"));
        assert_eq!(pairs[1].white, "Nf3");
        assert_eq!(pairs[1].black, None);
        assert!(move_pairs(&[]).is_empty());
    }

    #[test]
    fn test_movetext() {
        assert_eq!(movetext(&strings(&["e4", "e5", "Nf3", "Nc6"])), "1. e4 e5 2. Nf3 Nc6");
        assert_eq!(movetext(&strings(&["d4"])), "1. d4");
    }

    #[test]
    fn test_to_pgn() {
        let pgn = to_pgn(&strings(&["f3", "e5", "g4", "Qh4#"]), "0-1", "2026.10.14");
        assert!(pgn.starts_with("[Event \"Grandmaster Kids Chess\"]\n"));
        assert!(pgn.contains("[Result \"0-1\"]\n"));
        assert!(pgn.contains("[Date \"2026.10.14\"]\n"));
        assert!(pgn.ends_with("\n1. f3 e5 2. g4 Qh4# 0-1\n"));

        let empty = to_pgn(&[], "*", "2026.10.14");
        assert!(empty.ends_with("\n\n*\n"));
    }
}
