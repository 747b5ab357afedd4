//! Domain vocabularies for the story graph
//!
//! Every enum here is stored as its string form in a TEXT column and
//! travels as that same string over the JSON API. Parsing an unknown
//! string is a validation failure, which the API layer maps to 400.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a string does not name a known variant.
///
/// Carries the offending input and the vocabulary it failed against so
/// callers can produce a useful message without extra context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub value: String,
    pub expected: &'static str,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.expected, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

macro_rules! string_enum {
    (
        $(#[$doc:meta])*
        $name:ident, $expected:literal, {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &[$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseEnumError {
                        value: s.to_string(),
                        expected: $expected,
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// What a canvas node represents.
    NodeType, "node type", {
        StoryElement => "story_element",
        Character => "character",
        Location => "location",
        Lore => "lore",
        PlotThread => "plot_thread",
    }
);

string_enum!(
    /// Structural granularity of a story-element node.
    ///
    /// Only valid as the subtype of a [`NodeType::StoryElement`] node.
    StoryElementKind, "story element kind", {
        Act => "act",
        Chapter => "chapter",
        Scene => "scene",
        Beat => "beat",
        PlotPoint => "plot_point",
    }
);

string_enum!(
    /// The relationship a connection expresses between two nodes.
    ConnectionType, "connection type", {
        StoryFlow => "story_flow",
        CharacterArc => "character_arc",
        Setting => "setting",
        PlotThread => "plot_thread",
        Thematic => "thematic",
        Reference => "reference",
    }
);

string_enum!(
    WorkStatus, "work status", {
        Draft => "draft",
        Revising => "revising",
        Complete => "complete",
    }
);

string_enum!(
    PlotPointStatus, "plot point status", {
        Open => "open",
        Resolved => "resolved",
        Abandoned => "abandoned",
    }
);

string_enum!(
    CharacterRole, "character role", {
        Protagonist => "protagonist",
        Antagonist => "antagonist",
        Supporting => "supporting",
        Minor => "minor",
    }
);

string_enum!(
    ProviderKind, "provider kind", {
        Openrouter => "openrouter",
        Openai => "openai",
        Anthropic => "anthropic",
        Custom => "custom",
    }
);

/// Connection strength bounds (inclusive).
pub const MIN_STRENGTH: i32 = 1;
pub const MAX_STRENGTH: i32 = 5;
