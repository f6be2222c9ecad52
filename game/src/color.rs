use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the six game symbols. The discriminant is the id used in saved
/// mappings and on the digit keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Color {
    Red = 1,
    White = 2,
    Amber = 3,
    Blue = 4,
    Yellow = 5,
    Green = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("color id {0} is outside 1..=6")]
pub struct InvalidColor(pub u8);

impl Color {
    pub const ALL: [Color; 6] = [
        Color::Red,
        Color::White,
        Color::Amber,
        Color::Blue,
        Color::Yellow,
        Color::Green,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Zero-based position, as used by the board buttons and outbound events.
    pub fn index(self) -> usize {
        self.id() as usize - 1
    }

    pub fn from_id(id: u8) -> Option<Color> {
        Self::ALL.get((id as usize).checked_sub(1)?).copied()
    }

    /// Digit keys '1'..='6'.
    pub fn from_key(key: char) -> Option<Color> {
        let digit = key.to_digit(10)?;
        u8::try_from(digit).ok().and_then(Self::from_id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "Red",
            Color::White => "White",
            Color::Amber => "Amber",
            Color::Blue => "Blue",
            Color::Yellow => "Yellow",
            Color::Green => "Green",
        }
    }
}

impl TryFrom<u8> for Color {
    type Error = InvalidColor;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Color::from_id(id).ok_or(InvalidColor(id))
    }
}

impl From<Color> for u8 {
    fn from(color: Color) -> u8 {
        color.id()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_one_based_and_indices_zero_based() {
        for (i, color) in Color::ALL.into_iter().enumerate() {
            assert_eq!(color.index(), i);
            assert_eq!(color.id() as usize, i + 1);
            assert_eq!(Color::from_id(color.id()), Some(color));
        }
        assert_eq!(Color::from_id(0), None);
        assert_eq!(Color::from_id(7), None);
    }

    #[test]
    fn digit_keys_map_to_colors() {
        assert_eq!(Color::from_key('1'), Some(Color::Red));
        assert_eq!(Color::from_key('6'), Some(Color::Green));
        assert_eq!(Color::from_key('0'), None);
        assert_eq!(Color::from_key('7'), None);
        assert_eq!(Color::from_key('a'), None);
    }

    #[test]
    fn serializes_as_its_id() {
        let json = serde_json::to_string(&vec![Color::Amber, Color::Green]).unwrap();
        assert_eq!(json, "[3,6]");
        assert!(serde_json::from_str::<Color>("9").is_err());
    }
}
