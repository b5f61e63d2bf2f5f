//! Builtin classes every registry starts with.

use crate::class::{ClassId, ClassInfo};
use crate::comparator::Relation;
use crate::error::SerializeError;
use crate::parser::{ParseContext, Parser};
use crate::serializer::{Fields, Serializer};
use crate::timespan::Timespan;
use crate::value::{Value, format_number};

/// Builtin classes in [`ClassId`] order.
pub(crate) fn builtin_classes() -> [ClassInfo; 7] {
    [
        ClassInfo::new("object").name("object", "objects"),
        ClassInfo::new("boolean")
            .name("boolean", "booleans")
            .supertype(ClassId::OBJECT)
            .parser(BooleanParser)
            .serializer(BooleanSerializer)
            .comparator(|a, b| Relation::from_bool(a.as_boolean() == b.as_boolean()), false),
        ClassInfo::new("number")
            .name("number", "numbers")
            .supertype(ClassId::OBJECT)
            .parser(NumberParser)
            .serializer(NumberSerializer)
            .comparator(compare_numbers, true),
        ClassInfo::new("string")
            .name("text", "texts")
            .supertype(ClassId::OBJECT)
            .parser(TextParser)
            .serializer(TextSerializer)
            .comparator(compare_texts, false),
        ClassInfo::new("timespan")
            .name("time span", "time spans")
            .supertype(ClassId::OBJECT)
            .parser(TimespanParser)
            .serializer(TimespanSerializer)
            .comparator(compare_timespans, true),
        ClassInfo::new("event")
            .event()
            .name("event", "events")
            .supertype(ClassId::OBJECT),
        ClassInfo::new("functionevent")
            .event()
            .name("function event", "function events")
            .supertype(ClassId::EVENT),
    ]
}

fn compare_numbers(a: &Value, b: &Value) -> Relation {
    a.as_number()
        .partial_cmp(&b.as_number())
        .map_or(Relation::NotEqual, Relation::from_ordering)
}

fn compare_texts(a: &Value, b: &Value) -> Relation {
    Relation::from_bool(a.as_text().to_lowercase() == b.as_text().to_lowercase())
}

fn compare_timespans(a: &Value, b: &Value) -> Relation {
    match (a.as_timespan(), b.as_timespan()) {
        (Some(a), Some(b)) => Relation::from_ordering(a.cmp(&b)),
        _ => Relation::NotEqual,
    }
}

struct BooleanParser;

impl Parser for BooleanParser {
    fn parse(&self, input: &str, _context: ParseContext) -> Option<Value> {
        match input.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" => Some(Value::Boolean(true)),
            "false" | "no" | "off" => Some(Value::Boolean(false)),
            _ => None,
        }
    }

    fn to_string(&self, value: &Value) -> String {
        value.as_boolean().to_string()
    }
}

struct NumberParser;

impl Parser for NumberParser {
    fn parse(&self, input: &str, _context: ParseContext) -> Option<Value> {
        input
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::Number)
    }

    fn to_string(&self, value: &Value) -> String {
        format_number(value.as_number())
    }
}

/// Text literals in scripts are quoted and handled by the statement parser,
/// so bare text only parses from commands and config values.
struct TextParser;

impl Parser for TextParser {
    fn parse(&self, input: &str, _context: ParseContext) -> Option<Value> {
        Some(Value::Text(input.to_string()))
    }

    fn can_parse(&self, context: ParseContext) -> bool {
        matches!(context, ParseContext::Command | ParseContext::Config)
    }

    fn to_string(&self, value: &Value) -> String {
        value.as_text()
    }
}

struct TimespanParser;

impl Parser for TimespanParser {
    fn parse(&self, input: &str, _context: ParseContext) -> Option<Value> {
        Timespan::parse(input).map(Value::Timespan)
    }

    fn to_string(&self, value: &Value) -> String {
        value.as_text()
    }

    fn to_variable_name_string(&self, value: &Value) -> String {
        value
            .as_timespan()
            .map_or_else(String::new, |t| format!("timespan:{}", t.millis()))
    }
}

struct BooleanSerializer;

impl Serializer for BooleanSerializer {
    fn serialize(&self, value: &Value) -> Result<Fields, SerializeError> {
        let Value::Boolean(b) = value else {
            return Err(SerializeError::UnexpectedValue(value.class()));
        };
        let mut fields = Fields::new();
        fields.put_boolean("value", *b);
        Ok(fields)
    }

    fn deserialize(&self, fields: &Fields) -> Result<Value, SerializeError> {
        fields.get_boolean("value").map(Value::Boolean)
    }

    fn must_sync_deserialization(&self) -> bool {
        false
    }
}

struct NumberSerializer;

impl Serializer for NumberSerializer {
    fn serialize(&self, value: &Value) -> Result<Fields, SerializeError> {
        let Value::Number(n) = value else {
            return Err(SerializeError::UnexpectedValue(value.class()));
        };
        let mut fields = Fields::new();
        fields.put_number("value", *n);
        Ok(fields)
    }

    fn deserialize(&self, fields: &Fields) -> Result<Value, SerializeError> {
        fields.get_number("value").map(Value::Number)
    }

    fn must_sync_deserialization(&self) -> bool {
        false
    }
}

struct TextSerializer;

impl Serializer for TextSerializer {
    fn serialize(&self, value: &Value) -> Result<Fields, SerializeError> {
        let Value::Text(s) = value else {
            return Err(SerializeError::UnexpectedValue(value.class()));
        };
        let mut fields = Fields::new();
        fields.put_text("value", s.as_str());
        Ok(fields)
    }

    fn deserialize(&self, fields: &Fields) -> Result<Value, SerializeError> {
        fields.get_text("value").map(Value::from)
    }

    fn must_sync_deserialization(&self) -> bool {
        false
    }
}

struct TimespanSerializer;

impl Serializer for TimespanSerializer {
    fn serialize(&self, value: &Value) -> Result<Fields, SerializeError> {
        let Some(t) = value.as_timespan() else {
            return Err(SerializeError::UnexpectedValue(value.class()));
        };
        let mut fields = Fields::new();
        fields.put_number("millis", t.millis() as f64);
        Ok(fields)
    }

    fn deserialize(&self, fields: &Fields) -> Result<Value, SerializeError> {
        let millis = fields.get_number("millis")?;
        if !millis.is_finite() || millis < 0.0 {
            return Err(SerializeError::Invalid(format!("negative timespan: {millis}")));
        }
        Ok(Value::Timespan(Timespan::from_millis(millis as u64)))
    }

    fn must_sync_deserialization(&self) -> bool {
        false
    }
}
