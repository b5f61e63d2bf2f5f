//! Text round-tripping for registered classes.

use crate::value::Value;

/// Where a piece of text is being parsed from.
///
/// Some classes (free-form text, for instance) only make sense as literals
/// in specific places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseContext {
    /// A literal inside a script statement.
    Default,
    /// A command argument typed by a player.
    Command,
    /// A value in a configuration file.
    Config,
    /// An event's header, e.g. `on break of stone:`.
    Event,
    /// Script options and other top-level text.
    Script,
}

/// Parses a class from text and renders it back.
pub trait Parser: Send + Sync {
    /// Parse `input` in the given context, returning `None` if it does not
    /// describe a value of this class.
    fn parse(&self, input: &str, context: ParseContext) -> Option<Value>;

    /// Whether literals of this class may appear in `context` at all.
    fn can_parse(&self, _context: ParseContext) -> bool {
        true
    }

    /// Human readable representation.
    fn to_string(&self, value: &Value) -> String;

    /// Representation used inside variable names (`{home::%player%}`).
    fn to_variable_name_string(&self, value: &Value) -> String {
        self.to_string(value)
    }
}
