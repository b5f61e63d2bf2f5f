//! Two-phase registration.
//!
//! Everything is registered on a [`RegistryBuilder`] during startup.
//! [`RegistryBuilder::build`] closes the converter graph and hands out an
//! immutable [`Registry`] that can be shared between threads without
//! locking. There is no way back to the builder.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::class::{ClassId, ClassInfo, ClassRegistry};
use crate::comparator::{ComparatorInfo, Comparators, Relation};
use crate::converter::{self, ConverterInfo, ConverterOptions, Converters};
use crate::defaults;
use crate::error::{ConversionError, EventValueError, RegistryError, RegistryResult};
use crate::event_value::{self, Event, EventValueInfo, EventValues, Resolution, Time};
use crate::value::Value;

/// Collects registrations until [`RegistryBuilder::build`].
pub struct RegistryBuilder {
    classes: ClassRegistry,
    converters: Vec<ConverterInfo>,
    comparators: Vec<ComparatorInfo>,
    event_values: [Vec<EventValueInfo>; 3],
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    /// A builder with the builtin classes (object, boolean, number, text,
    /// timespan, event, function event) already registered.
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Self {
            classes: ClassRegistry::empty(),
            converters: Vec::new(),
            comparators: Vec::new(),
            event_values: [Vec::new(), Vec::new(), Vec::new()],
        };
        for info in defaults::builtin_classes() {
            builder.add_class(info);
        }
        builder
    }

    fn add_class(&mut self, info: ClassInfo) -> ClassId {
        let binding = info.comparator_binding();
        let id = self.classes.insert(info);
        if let Some((f, ordered)) = binding {
            self.comparators.push(ComparatorInfo::from_fn(id, id, f, ordered));
        }
        id
    }

    fn check(&self, id: ClassId) -> RegistryResult<()> {
        if self.classes.contains(id) {
            Ok(())
        } else {
            Err(RegistryError::UnknownClass(id))
        }
    }

    /// Classes registered so far.
    #[must_use]
    pub const fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn register_class(&mut self, info: ClassInfo) -> RegistryResult<ClassId> {
        let binding = info.comparator_binding();
        let id = self.classes.register(info)?;
        if let Some((f, ordered)) = binding {
            self.comparators.push(ComparatorInfo::from_fn(id, id, f, ordered));
        }
        Ok(id)
    }

    /// Register an event class. With no supertypes it extends `event`.
    pub fn register_event(&mut self, name: &str, supertypes: &[ClassId]) -> RegistryResult<ClassId> {
        for &sup in supertypes {
            self.check(sup)?;
            if !self.classes.is_event(sup) {
                return Err(RegistryError::NotAnEvent(
                    self.classes.code_name(sup).to_string(),
                ));
            }
        }
        let mut info = ClassInfo::new(name).event();
        if supertypes.is_empty() {
            info = info.supertype(ClassId::EVENT);
        }
        for &sup in supertypes {
            info = info.supertype(sup);
        }
        self.register_class(info)
    }

    pub fn register_converter(
        &mut self,
        from: ClassId,
        to: ClassId,
        f: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
        options: ConverterOptions,
    ) -> RegistryResult<()> {
        self.check(from)?;
        self.check(to)?;
        converter::insert_ordered(
            &self.classes,
            &mut self.converters,
            ConverterInfo::new(from, to, f, options),
        );
        Ok(())
    }

    pub fn register_comparator(
        &mut self,
        first: ClassId,
        second: ClassId,
        f: impl Fn(&Value, &Value) -> Relation + Send + Sync + 'static,
        supports_ordering: bool,
    ) -> RegistryResult<()> {
        self.check(first)?;
        self.check(second)?;
        if first == ClassId::OBJECT && second == ClassId::OBJECT {
            return Err(RegistryError::ObjectComparator);
        }
        self.comparators
            .push(ComparatorInfo::new(first, second, f, supports_ordering));
        Ok(())
    }

    pub fn register_event_value(
        &mut self,
        event: ClassId,
        value: ClassId,
        getter: impl Fn(&dyn Event) -> Option<Value> + Send + Sync + 'static,
        time: Time,
    ) -> RegistryResult<()> {
        self.add_event_value(EventValueInfo::new(event, value, getter), time)
    }

    /// Like [`Self::register_event_value`], but resolving it for any of
    /// `excludes` fails with `message`.
    pub fn register_event_value_excluding(
        &mut self,
        event: ClassId,
        value: ClassId,
        getter: impl Fn(&dyn Event) -> Option<Value> + Send + Sync + 'static,
        time: Time,
        message: Option<&str>,
        excludes: &[ClassId],
    ) -> RegistryResult<()> {
        for &ex in excludes {
            self.check(ex)?;
        }
        let info = EventValueInfo::new(event, value, getter).excluding(message, excludes);
        self.add_event_value(info, time)
    }

    fn add_event_value(&mut self, mut info: EventValueInfo, time: Time) -> RegistryResult<()> {
        self.check(info.event())?;
        self.check(info.value())?;
        if !self.classes.is_event(info.event()) {
            return Err(RegistryError::NotAnEvent(
                self.classes.code_name(info.event()).to_string(),
            ));
        }
        info.fill_exclude_message(&self.classes);
        event_value::insert_ordered(&self.classes, &mut self.event_values[time.index()], info);
        Ok(())
    }

    /// Freeze everything. Chained converters are synthesized here.
    #[must_use]
    pub fn build(self) -> Registry {
        let direct = self.converters.len();
        let classes = Arc::new(self.classes);
        let converters = Arc::new(Converters::new(classes.clone(), self.converters));
        let comparators = Arc::new(Comparators::new(
            classes.clone(),
            converters.clone(),
            self.comparators,
        ));
        let event_values = Arc::new(EventValues::new(
            classes.clone(),
            converters.clone(),
            self.event_values,
        ));

        debug!(
            classes = classes.len(),
            converters = direct,
            chained = converters.len() - direct,
            comparators = comparators.infos().len(),
            event_values = Time::ALL
                .iter()
                .map(|t| event_values.event_values_for_time(*t).len())
                .sum::<usize>(),
            "registry frozen"
        );

        Registry {
            classes,
            converters,
            comparators,
            event_values,
        }
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("classes", &self.classes.len())
            .field("converters", &self.converters.len())
            .field("comparators", &self.comparators.len())
            .finish_non_exhaustive()
    }
}

/// The frozen registries.
#[derive(Debug, Clone)]
pub struct Registry {
    classes: Arc<ClassRegistry>,
    converters: Arc<Converters>,
    comparators: Arc<Comparators>,
    event_values: Arc<EventValues>,
}

impl Registry {
    #[must_use]
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    #[must_use]
    pub fn converters(&self) -> &Converters {
        &self.converters
    }

    #[must_use]
    pub fn comparators(&self) -> &Comparators {
        &self.comparators
    }

    #[must_use]
    pub fn event_values(&self) -> &EventValues {
        &self.event_values
    }

    #[must_use]
    pub fn convert(&self, value: &Value, to: ClassId) -> Option<Value> {
        self.converters.convert(value, to)
    }

    pub fn convert_strictly(
        &self,
        values: &[Value],
        to: ClassId,
    ) -> Result<Vec<Value>, ConversionError> {
        self.converters.convert_strictly(values, to)
    }

    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value) -> Relation {
        self.comparators.compare(a, b)
    }

    pub fn event_value_getter(&self, event: ClassId, value: ClassId, time: Time) -> Resolution {
        self.event_values.get_event_value_getter(event, value, time)
    }

    pub fn event_value(
        &self,
        event: &dyn Event,
        value: ClassId,
        time: Time,
    ) -> Result<Option<Value>, EventValueError> {
        self.event_values.get_event_value(event, value, time)
    }

    #[must_use]
    pub fn to_string(&self, value: &Value) -> String {
        self.classes.to_string(value)
    }
}
