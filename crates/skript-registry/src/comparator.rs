//! Pairwise comparison between classes.
//!
//! Lookup for a `(first, second)` pair tries, in order: a comparator
//! registered for that pair, one registered the other way round (arguments
//! and result switched), one side converted to fit a comparator, and both
//! sides converted. Results are memoized like converters.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::class::{ClassId, ClassRegistry};
use crate::converter::Converters;
use crate::value::Value;

/// Outcome of comparing two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Smaller,
    SmallerOrEqual,
}

impl Relation {
    #[must_use]
    pub const fn from_bool(equal: bool) -> Self {
        if equal { Self::Equal } else { Self::NotEqual }
    }

    #[must_use]
    pub const fn from_ordering(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => Self::Smaller,
            Ordering::Equal => Self::Equal,
            Ordering::Greater => Self::Greater,
        }
    }

    /// Whether a comparison that produced `other` satisfies `self`.
    ///
    /// `Greater.is(GreaterOrEqual)` is false while
    /// `GreaterOrEqual.is(Greater)` is true.
    #[must_use]
    pub const fn is(self, other: Self) -> bool {
        match self {
            Self::Equal => matches!(other, Self::Equal),
            Self::NotEqual => !matches!(other, Self::Equal),
            Self::Greater => matches!(other, Self::Greater),
            Self::GreaterOrEqual => matches!(other, Self::Greater | Self::Equal),
            Self::Smaller => matches!(other, Self::Smaller),
            Self::SmallerOrEqual => matches!(other, Self::Smaller | Self::Equal),
        }
    }

    /// The relation with its operands swapped (`a > b` ⇔ `b < a`).
    #[must_use]
    pub const fn switched(self) -> Self {
        match self {
            Self::Greater => Self::Smaller,
            Self::GreaterOrEqual => Self::SmallerOrEqual,
            Self::Smaller => Self::Greater,
            Self::SmallerOrEqual => Self::GreaterOrEqual,
            other => other,
        }
    }

    /// The negation (`a > b` ⇔ `!(a <= b)`).
    #[must_use]
    pub const fn inverse(self) -> Self {
        match self {
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::Greater => Self::SmallerOrEqual,
            Self::GreaterOrEqual => Self::Smaller,
            Self::Smaller => Self::GreaterOrEqual,
            Self::SmallerOrEqual => Self::Greater,
        }
    }

    /// Whether this relation needs an ordered comparator.
    #[must_use]
    pub const fn is_ordering(self) -> bool {
        !matches!(self, Self::Equal | Self::NotEqual)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Equal => "equal to",
            Self::NotEqual => "not equal to",
            Self::Greater => "greater than",
            Self::GreaterOrEqual => "greater than or equal to",
            Self::Smaller => "smaller than",
            Self::SmallerOrEqual => "smaller than or equal to",
        })
    }
}

pub type CompareFn = Arc<dyn Fn(&Value, &Value) -> Relation + Send + Sync>;

/// A registered comparator.
#[derive(Clone)]
pub struct ComparatorInfo {
    first: ClassId,
    second: ClassId,
    comparator: CompareFn,
    supports_ordering: bool,
}

impl ComparatorInfo {
    pub fn new(
        first: ClassId,
        second: ClassId,
        comparator: impl Fn(&Value, &Value) -> Relation + Send + Sync + 'static,
        supports_ordering: bool,
    ) -> Self {
        Self::from_fn(first, second, Arc::new(comparator), supports_ordering)
    }

    pub(crate) fn from_fn(
        first: ClassId,
        second: ClassId,
        comparator: CompareFn,
        supports_ordering: bool,
    ) -> Self {
        Self {
            first,
            second,
            comparator,
            supports_ordering,
        }
    }

    #[must_use]
    pub const fn first(&self) -> ClassId {
        self.first
    }

    #[must_use]
    pub const fn second(&self) -> ClassId {
        self.second
    }

    #[must_use]
    pub const fn supports_ordering(&self) -> bool {
        self.supports_ordering
    }

    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value) -> Relation {
        (self.comparator)(a, b)
    }
}

impl fmt::Debug for ComparatorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparatorInfo")
            .field("first", &self.first)
            .field("second", &self.second)
            .field("supports_ordering", &self.supports_ordering)
            .finish_non_exhaustive()
    }
}

type ComparatorCache = FxHashMap<(ClassId, ClassId), Option<Arc<ComparatorInfo>>>;

/// The frozen comparator registry.
pub struct Comparators {
    classes: Arc<ClassRegistry>,
    converters: Arc<Converters>,
    infos: Vec<Arc<ComparatorInfo>>,
    cache: RwLock<ComparatorCache>,
}

impl Comparators {
    #[must_use]
    pub fn new(
        classes: Arc<ClassRegistry>,
        converters: Arc<Converters>,
        infos: Vec<ComparatorInfo>,
    ) -> Self {
        Self {
            classes,
            converters,
            infos: infos.into_iter().map(Arc::new).collect(),
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    #[must_use]
    pub fn infos(&self) -> &[Arc<ComparatorInfo>] {
        &self.infos
    }

    /// A comparator accepting `(first, second)` values, possibly wrapping a
    /// registered one with argument switching or conversion.
    #[must_use]
    pub fn get_comparator(&self, first: ClassId, second: ClassId) -> Option<Arc<ComparatorInfo>> {
        if let Some(cached) = self.cache.read().get(&(first, second)) {
            return cached.clone();
        }
        let found = self.scan(first, second);
        self.cache.write().insert((first, second), found.clone());
        found
    }

    fn scan(&self, first: ClassId, second: ClassId) -> Option<Arc<ComparatorInfo>> {
        let sup = |a: ClassId, b: ClassId| self.classes.is_assignable(a, b);

        if let Some(info) = self
            .infos
            .iter()
            .find(|c| sup(c.first, first) && sup(c.second, second))
        {
            return Some(info.clone());
        }

        if let Some(info) = self
            .infos
            .iter()
            .find(|c| sup(c.first, second) && sup(c.second, first))
        {
            let inner = info.comparator.clone();
            return Some(Arc::new(ComparatorInfo::from_fn(
                first,
                second,
                Arc::new(move |a, b| inner(b, a).switched()),
                info.supports_ordering,
            )));
        }

        // One side converted, either orientation.
        for info in &self.infos {
            if sup(info.first, first) && self.converters.converter_exists(second, info.second) {
                return Some(self.converted(info, first, second, false, false, true));
            }
            if sup(info.second, second) && self.converters.converter_exists(first, info.first) {
                return Some(self.converted(info, first, second, false, true, false));
            }
            if sup(info.first, second) && self.converters.converter_exists(first, info.second) {
                return Some(self.converted(info, first, second, true, false, true));
            }
            if sup(info.second, first) && self.converters.converter_exists(second, info.first) {
                return Some(self.converted(info, first, second, true, true, false));
            }
        }

        for info in &self.infos {
            if self.converters.converter_exists(first, info.first)
                && self.converters.converter_exists(second, info.second)
            {
                return Some(self.converted(info, first, second, false, true, true));
            }
            if self.converters.converter_exists(first, info.second)
                && self.converters.converter_exists(second, info.first)
            {
                return Some(self.converted(info, first, second, true, true, true));
            }
        }

        None
    }

    /// Wrap `info` so it accepts `(first, second)`.
    ///
    /// With `switched` the arguments are passed as `(second, first)` and the
    /// result switched back. `convert_a`/`convert_b` convert the argument
    /// that ends up in the comparator's first/second slot.
    fn converted(
        &self,
        info: &ComparatorInfo,
        first: ClassId,
        second: ClassId,
        switched: bool,
        convert_a: bool,
        convert_b: bool,
    ) -> Arc<ComparatorInfo> {
        let converters = self.converters.clone();
        let inner = info.comparator.clone();
        let (slot_a, slot_b) = (info.first, info.second);
        let compare: CompareFn = Arc::new(move |x: &Value, y: &Value| {
            let (a, b) = if switched { (y, x) } else { (x, y) };
            let a = if convert_a { converters.convert(a, slot_a) } else { Some(a.clone()) };
            let b = if convert_b { converters.convert(b, slot_b) } else { Some(b.clone()) };
            let (Some(a), Some(b)) = (a, b) else {
                return Relation::NotEqual;
            };
            let relation = inner(&a, &b);
            if switched { relation.switched() } else { relation }
        });
        Arc::new(ComparatorInfo::from_fn(
            first,
            second,
            compare,
            info.supports_ordering,
        ))
    }

    /// Compare two values. Without a comparator for their classes, values
    /// are compared for plain equality.
    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value) -> Relation {
        match self.get_comparator(a.class(), b.class()) {
            Some(info) => info.compare(a, b),
            None => Relation::from_bool(a == b),
        }
    }

    #[must_use]
    pub fn comparator_exists(&self, first: ClassId, second: ClassId) -> bool {
        self.get_comparator(first, second).is_some()
    }
}

impl fmt::Debug for Comparators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparators")
            .field("infos", &self.infos.len())
            .field("cached", &self.cache.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_algebra() {
        assert!(Relation::GreaterOrEqual.is(Relation::Greater));
        assert!(Relation::GreaterOrEqual.is(Relation::Equal));
        assert!(!Relation::Greater.is(Relation::Equal));
        assert!(Relation::NotEqual.is(Relation::Smaller));
        assert_eq!(Relation::Smaller.switched(), Relation::Greater);
        assert_eq!(Relation::Equal.switched(), Relation::Equal);
        assert_eq!(Relation::Greater.inverse(), Relation::SmallerOrEqual);
        assert_eq!(Relation::from_ordering(Ordering::Less), Relation::Smaller);
        assert_eq!(Relation::SmallerOrEqual.to_string(), "smaller than or equal to");
    }

    #[test]
    fn test_inverse_round_trips() {
        for r in [
            Relation::Equal,
            Relation::NotEqual,
            Relation::Greater,
            Relation::GreaterOrEqual,
            Relation::Smaller,
            Relation::SmallerOrEqual,
        ] {
            assert_eq!(r.inverse().inverse(), r);
            assert_eq!(r.switched().switched(), r);
        }
    }
}
