use std::fmt;

use clap::ValueEnum;

pub const MAP_4X4: [&str; 4] = ["SFFF", "FHFH", "FFFH", "HFFG"];

pub const MAP_8X8: [&str; 8] = [
    "SFFFFFFF",
    "FFFFFFFF",
    "FFFHFFFF",
    "FFFFFHFF",
    "FFFHFFFF",
    "FHHFFFHF",
    "FHFFHFHF",
    "FFFHFFFG",
];

/// Built-in maps selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MapName {
    #[value(name = "4x4")]
    Small,
    #[value(name = "8x8")]
    Large,
}

impl MapName {
    pub fn rows(self) -> &'static [&'static str] {
        match self {
            MapName::Small => &MAP_4X4,
            MapName::Large => &MAP_8X8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MapName::Small => "4x4",
            MapName::Large => "8x8",
        }
    }
}

impl fmt::Display for MapName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
