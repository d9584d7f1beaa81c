//! Difficulty levels and the oracle prompt each one uses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Intermediate,
    Hard,
}

/// Strategy hint handed to the oracle with every move request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    pub level: Difficulty,
    pub prompt: &'static str,
    pub temperature: f32,
}

const EASY: DifficultyProfile = DifficultyProfile {
    level: Difficulty::Easy,
    prompt: "You are playing Black against a young beginner. Play a legal but gentle move: \
             prefer simple developing moves and do not punish every mistake. \
             Reply with only the move in standard algebraic notation (e.g. e5 or Nf6).",
    temperature: 1.0,
};

const MEDIUM: DifficultyProfile = DifficultyProfile {
    level: Difficulty::Medium,
    prompt: "You are playing Black against a child who knows the basics. Play a sensible, \
             legal move and take free pieces when you see them. \
             Reply with only the move in standard algebraic notation (e.g. e5 or Nf6).",
    temperature: 0.8,
};

const INTERMEDIATE: DifficultyProfile = DifficultyProfile {
    level: Difficulty::Intermediate,
    prompt: "You are playing Black against a club-level junior. Play a solid, legal move \
             that follows opening principles and looks for simple tactics. \
             Reply with only the move in standard algebraic notation (e.g. e5 or Nf6).",
    temperature: 0.7,
};

const HARD: DifficultyProfile = DifficultyProfile {
    level: Difficulty::Hard,
    prompt: "You are playing Black as a strong player. Play the best legal move you can find \
             in this position. \
             Reply with only the move in standard algebraic notation (e.g. e5 or Nf6).",
    temperature: 0.4,
};

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Intermediate,
        Difficulty::Hard,
    ];

    pub fn profile(self) -> &'static DifficultyProfile {
        match self {
            Difficulty::Easy => &EASY,
            Difficulty::Medium => &MEDIUM,
            Difficulty::Intermediate => &INTERMEDIATE,
            Difficulty::Hard => &HARD,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown difficulty '{0}'")]
pub struct UnknownDifficulty(pub String);

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownDifficulty(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("easy".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert_eq!(" HARD ".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!("Intermediate".parse::<Difficulty>(), Ok(Difficulty::Intermediate));
        assert!("grandmaster".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_every_level_has_its_own_profile() {
        for level in Difficulty::ALL {
            let profile = level.profile();
            assert_eq!(profile.level, level);
            assert!(profile.prompt.contains("algebraic notation"));
        }
    }

    #[test]
    fn test_serde_uses_labels() {
        assert_eq!(serde_json::to_string(&Difficulty::Medium).unwrap(), "\"Medium\"");
        let parsed: Difficulty = serde_json::from_str("\"Hard\"").unwrap();
        assert_eq!(parsed, Difficulty::Hard);
    }
}
