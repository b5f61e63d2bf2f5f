//! Typed facts about events.
//!
//! An event value answers "given an event of class `E`, what is its `T`?"
//! at one of three [`Time`]s. Lists are kept most-specific-first, so
//! resolution is a series of linear scans that trust the first hit.
//!
//! # Resolution
//!
//! 1. value class matches exactly and the event is assignable
//! 2. requested value class is a supertype of a registered one; guard the
//!    event class when the registration is for a narrower event
//! 3. registered value class is a supertype of the requested one; filter
//!    the returned value
//! 4. convert the value of a registration for the exact event class, then
//!    for any related event class
//! 5. retry at [`Time::Now`]
//!
//! Every tier checks exclusions first and stops with the registered
//! message when the requested event is excluded.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::class::{ClassId, ClassRegistry};
use crate::converter::Converters;
use crate::error::{EventValueError, RegistryError};
use crate::value::Value;

/// An occurrence a trigger runs for.
pub trait Event: Any + Send + Sync {
    /// The registered event class of this event.
    fn class(&self) -> ClassId;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Event {
    #[must_use]
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

impl fmt::Debug for dyn Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("class", &self.class())
            .finish_non_exhaustive()
    }
}

/// Reads one value out of an event.
pub type Getter = Arc<dyn Fn(&dyn Event) -> Option<Value> + Send + Sync>;

/// Which state of the event a value describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i8)]
pub enum Time {
    /// Before the event changed anything.
    Past = -1,
    #[default]
    Now = 0,
    /// After the event has been applied.
    Future = 1,
}

impl Time {
    pub const ALL: [Self; 3] = [Self::Past, Self::Now, Self::Future];

    #[must_use]
    pub const fn index(self) -> usize {
        (self as i8 + 1) as usize
    }
}

impl TryFrom<i8> for Time {
    type Error = RegistryError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Past),
            0 => Ok(Self::Now),
            1 => Ok(Self::Future),
            other => Err(RegistryError::InvalidTime(other)),
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Past => "past",
            Self::Now => "now",
            Self::Future => "future",
        })
    }
}

/// One registered event value.
#[derive(Clone)]
pub struct EventValueInfo {
    event: ClassId,
    value: ClassId,
    getter: Getter,
    exclude_message: Option<String>,
    excludes: SmallVec<[ClassId; 2]>,
}

impl EventValueInfo {
    pub fn new(
        event: ClassId,
        value: ClassId,
        getter: impl Fn(&dyn Event) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            event,
            value,
            getter: Arc::new(getter),
            exclude_message: None,
            excludes: SmallVec::new(),
        }
    }

    /// Refuse to resolve for these event subclasses, failing with `message`
    /// or a generic one naming the value and event classes.
    #[must_use]
    pub fn excluding(mut self, message: Option<&str>, excludes: &[ClassId]) -> Self {
        self.exclude_message = message.map(str::to_string);
        self.excludes.extend_from_slice(excludes);
        self
    }

    #[must_use]
    pub const fn event(&self) -> ClassId {
        self.event
    }

    #[must_use]
    pub const fn value(&self) -> ClassId {
        self.value
    }

    #[must_use]
    pub fn excludes(&self) -> &[ClassId] {
        &self.excludes
    }

    #[must_use]
    pub fn getter(&self) -> &Getter {
        &self.getter
    }

    pub(crate) fn fill_exclude_message(&mut self, classes: &ClassRegistry) {
        if !self.excludes.is_empty() && self.exclude_message.is_none() {
            self.exclude_message = Some(format!(
                "{} can't be used in {} events",
                classes.code_name(self.value),
                classes.code_name(self.event)
            ));
        }
    }
}

impl fmt::Debug for EventValueInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventValueInfo")
            .field("event", &self.event)
            .field("value", &self.value)
            .field("excludes", &self.excludes)
            .finish_non_exhaustive()
    }
}

/// Insert before the first registration `info` is more specific than.
pub(crate) fn insert_ordered(
    classes: &ClassRegistry,
    infos: &mut Vec<EventValueInfo>,
    info: EventValueInfo,
) {
    let position = infos.iter().position(|existing| {
        if existing.event == info.event {
            classes.is_assignable(existing.value, info.value)
        } else {
            classes.is_assignable(existing.event, info.event)
        }
    });
    match position {
        Some(i) => infos.insert(i, info),
        None => infos.push(info),
    }
}

/// Resolution outcome: a getter, nothing, or an exclusion error.
pub type Resolution = Result<Option<Getter>, EventValueError>;

/// The frozen event value registry.
pub struct EventValues {
    classes: Arc<ClassRegistry>,
    converters: Arc<Converters>,
    lists: [Vec<Arc<EventValueInfo>>; 3],
}

impl EventValues {
    #[must_use]
    pub fn new(
        classes: Arc<ClassRegistry>,
        converters: Arc<Converters>,
        lists: [Vec<EventValueInfo>; 3],
    ) -> Self {
        Self {
            classes,
            converters,
            lists: lists.map(|list| list.into_iter().map(Arc::new).collect()),
        }
    }

    /// All registrations for `time`, most specific first.
    #[must_use]
    pub fn event_values_for_time(&self, time: Time) -> &[Arc<EventValueInfo>] {
        &self.lists[time.index()]
    }

    /// Resolve a getter for `value` in events of class `event`.
    ///
    /// Falls back to [`Time::Now`] when nothing is registered for `time`.
    pub fn get_event_value_getter(&self, event: ClassId, value: ClassId, time: Time) -> Resolution {
        self.resolve(event, value, time, true)
    }

    /// Resolve and invoke in one go.
    pub fn get_event_value(
        &self,
        event: &dyn Event,
        value: ClassId,
        time: Time,
    ) -> Result<Option<Value>, EventValueError> {
        Ok(self
            .get_event_value_getter(event.class(), value, time)?
            .and_then(|getter| getter(event)))
    }

    /// Whether a past or future state is registered, i.e. whether
    /// `past X`/`future X` make sense for this event.
    #[must_use]
    pub fn does_event_value_have_time_states(&self, event: ClassId, value: ClassId) -> bool {
        [Time::Past, Time::Future]
            .into_iter()
            .any(|time| matches!(self.resolve(event, value, time, false), Ok(Some(_))))
    }

    fn check_excludes(&self, info: &EventValueInfo, event: ClassId) -> Result<(), EventValueError> {
        if info
            .excludes
            .iter()
            .any(|ex| self.classes.is_assignable(*ex, event))
        {
            return Err(EventValueError::Excluded {
                message: info.exclude_message.clone().unwrap_or_default(),
            });
        }
        Ok(())
    }

    fn resolve(&self, event: ClassId, value: ClassId, time: Time, allow_default: bool) -> Resolution {
        let classes = &self.classes;
        let sup = |a: ClassId, b: ClassId| classes.is_assignable(a, b);
        let infos = &self.lists[time.index()];

        for info in infos.iter().filter(|i| i.value == value) {
            self.check_excludes(info, event)?;
            if sup(info.event, event) {
                return Ok(Some(info.getter.clone()));
            }
        }

        for info in infos.iter().filter(|i| sup(value, i.value)) {
            self.check_excludes(info, event)?;
            if sup(info.event, event) {
                return Ok(Some(info.getter.clone()));
            }
            if !sup(event, info.event) {
                continue;
            }
            return Ok(Some(self.guard_event(info)));
        }

        for info in infos.iter().filter(|i| sup(i.value, value)) {
            let narrower = !sup(info.event, event);
            if narrower && !sup(event, info.event) {
                continue;
            }
            self.check_excludes(info, event)?;
            let guarded = if narrower {
                self.guard_event(info)
            } else {
                info.getter.clone()
            };
            let classes = self.classes.clone();
            let getter: Getter = Arc::new(move |e: &dyn Event| {
                guarded(e).filter(|out| classes.is_instance(value, out))
            });
            return Ok(Some(getter));
        }

        for info in infos.iter().filter(|i| i.event == event) {
            self.check_excludes(info, event)?;
            if let Some(getter) = self.converted(info, value, false) {
                return Ok(Some(getter));
            }
        }
        for info in infos.iter().filter(|i| i.event != event) {
            let narrower = !sup(info.event, event);
            if narrower && !sup(event, info.event) {
                continue;
            }
            self.check_excludes(info, event)?;
            if let Some(getter) = self.converted(info, value, narrower) {
                return Ok(Some(getter));
            }
        }

        if allow_default && time != Time::Now {
            return self.resolve(event, value, Time::Now, false);
        }
        Ok(None)
    }

    /// Only call the getter for events of the registered class.
    fn guard_event(&self, info: &EventValueInfo) -> Getter {
        let classes = self.classes.clone();
        let inner = info.getter.clone();
        let registered = info.event;
        Arc::new(move |e: &dyn Event| {
            if classes.is_assignable(registered, e.class()) {
                inner(e)
            } else {
                None
            }
        })
    }

    fn converted(&self, info: &EventValueInfo, to: ClassId, check_event: bool) -> Option<Getter> {
        let converter = self.converters.get_converter(info.value, to)?;
        let inner = if check_event {
            self.guard_event(info)
        } else {
            info.getter.clone()
        };
        Some(Arc::new(move |e: &dyn Event| {
            inner(e).and_then(|v| converter.convert(&v))
        }))
    }
}

impl fmt::Debug for EventValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventValues")
            .field("past", &self.lists[0].len())
            .field("now", &self.lists[1].len())
            .field("future", &self.lists[2].len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_from_int() {
        assert_eq!(Time::try_from(-1).unwrap(), Time::Past);
        assert_eq!(Time::try_from(1).unwrap(), Time::Future);
        assert!(matches!(
            Time::try_from(2),
            Err(RegistryError::InvalidTime(2))
        ));
        assert_eq!(Time::Past.index(), 0);
        assert_eq!(Time::Future.index(), 2);
    }
}
