//! Screen positions within a triptych

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three display positions of an asset group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Left,
    Center,
    Right,
}

impl Screen {
    /// All screens in display order
    pub const ALL: [Screen; 3] = [Screen::Left, Screen::Center, Screen::Right];

    /// Position of this screen in `ALL`
    pub fn index(self) -> usize {
        match self {
            Screen::Left => 0,
            Screen::Center => 1,
            Screen::Right => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Screen::Left => "left",
            Screen::Center => "center",
            Screen::Right => "right",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Screen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(Screen::Left),
            "center" => Ok(Screen::Center),
            "right" => Ok(Screen::Right),
            other => Err(format!("Unknown screen: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for screen in Screen::ALL {
            assert_eq!(screen.to_string().parse::<Screen>().unwrap(), screen);
        }
        assert_eq!(" Center ".parse::<Screen>().unwrap(), Screen::Center);
        assert!("top".parse::<Screen>().is_err());
    }

    #[test]
    fn test_index_matches_order() {
        for (i, screen) in Screen::ALL.iter().enumerate() {
            assert_eq!(screen.index(), i);
        }
    }
}
