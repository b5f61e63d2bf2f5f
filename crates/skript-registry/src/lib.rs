#![allow(missing_docs)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::float_cmp)]

//! Skript type registries.
//!
//! Loosely typed script values are coerced, compared and pulled out of
//! events through the registries in this crate.
//!
//! # Key Concepts
//!
//! - **Class**: a registered type, with parser, serializer, changer and
//!   comparator bindings ([`ClassInfo`])
//! - **Converter**: a function from one class to another; chains are
//!   synthesized when the registry is frozen
//! - **Comparator**: a [`Relation`] between values of two classes
//! - **Event value**: "the player" in an event, keyed by event class, value
//!   class and [`Time`]
//!
//! # Lifecycle
//!
//! ```ignore
//! let mut builder = RegistryBuilder::new();
//! let player = builder.register_class(ClassInfo::new("player"))?;
//! let join = builder.register_event("join", &[])?;
//! builder.register_event_value(join, player, |e| get_player(e), Time::Now)?;
//!
//! // Frozen from here on; share it freely.
//! let registry = Arc::new(builder.build());
//! ```

mod changer;
mod class;
mod comparator;
mod converter;
mod defaults;
mod error;
mod event_value;
mod kleenean;
mod parser;
mod registry;
mod serializer;
mod timespan;
mod value;

pub use changer::{ChangeMode, ChangeModes, Changer, supported_modes};
pub use class::{ClassId, ClassInfo, ClassKind, ClassRegistry, DefaultValueFn};
pub use comparator::{CompareFn, ComparatorInfo, Comparators, Relation};
pub use converter::{ConvertFn, ConverterInfo, ConverterOptions, Converters};
pub use error::{
    ConversionError, EventValueError, RegistryError, RegistryResult, SerializeError,
};
pub use event_value::{Event, EventValueInfo, EventValues, Getter, Resolution, Time};
pub use kleenean::Kleenean;
pub use parser::{ParseContext, Parser};
pub use registry::{Registry, RegistryBuilder};
pub use serializer::{FieldValue, Fields, Serializer};
pub use timespan::Timespan;
pub use value::{Object, Value};
