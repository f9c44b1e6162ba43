use std::fmt;

use serde::{Deserialize, Serialize};

/// Color shown by the signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalColor {
    Red,
    Yellow,
    Green,
}

impl SignalColor {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalColor::Red => "red",
            SignalColor::Yellow => "yellow",
            SignalColor::Green => "green",
        }
    }

    /// Stable numeric code used for gauges (red = 0, yellow = 1, green = 2).
    pub fn code(self) -> u8 {
        match self {
            SignalColor::Red => 0,
            SignalColor::Yellow => 1,
            SignalColor::Green => 2,
        }
    }
}

impl fmt::Display for SignalColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
