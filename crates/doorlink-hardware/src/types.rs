//! Line identifiers shared by the decoder, feedback, and input modules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two Wiegand data lines of a reader.
///
/// A falling edge on `D0` carries a 0 bit, on `D1` a 1 bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataLine {
    D0,
    D1,
}

impl DataLine {
    /// Bit value carried by an edge on this line.
    #[inline]
    #[must_use]
    pub fn bit(self) -> u64 {
        match self {
            DataLine::D0 => 0,
            DataLine::D1 => 1,
        }
    }

    /// Line that carries `bit` (any non-zero value is a 1).
    #[inline]
    #[must_use]
    pub fn for_bit(bit: u64) -> Self {
        if bit == 0 { DataLine::D0 } else { DataLine::D1 }
    }
}

/// Feedback output attached to a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLine {
    GreenLed,
    RedLed,
    Buzzer,
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputLine::GreenLed => write!(f, "green LED"),
            OutputLine::RedLed => write!(f, "red LED"),
            OutputLine::Buzzer => write!(f, "buzzer"),
        }
    }
}

/// Door input attached to a reader.
///
/// Both inputs are pulled up: REX reads low while pressed, the contact reads
/// high while the door is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputLine {
    Rex,
    Contact,
}

impl fmt::Display for InputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputLine::Rex => write!(f, "REX"),
            InputLine::Contact => write!(f, "contact"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_line_bits() {
        assert_eq!(DataLine::D0.bit(), 0);
        assert_eq!(DataLine::D1.bit(), 1);
        assert_eq!(DataLine::for_bit(0), DataLine::D0);
        assert_eq!(DataLine::for_bit(1), DataLine::D1);
    }

    #[test]
    fn test_line_display() {
        assert_eq!(OutputLine::Buzzer.to_string(), "buzzer");
        assert_eq!(InputLine::Rex.to_string(), "REX");
    }
}
