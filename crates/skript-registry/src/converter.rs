//! Type conversion graph.
//!
//! Converters are directed edges between classes. After registration the
//! graph is closed under composition once ([`Converters::new`]), so a
//! runtime lookup is a linear scan over direct and synthesized edges that
//! is memoized per `(from, to)` pair, misses included.
//!
//! # Lookup
//!
//! ```text
//! cache hit? ──yes──▶ done
//!     │no
//!     ▼
//! 1. edge.from ⊒ from  &&  to ⊒ edge.to        direct
//! 2. edge.from ⊒ from  &&  edge.to ⊒ to        filter output by `to`
//!    from ⊒ edge.from  &&  to ⊒ edge.to        filter input by `edge.from`
//! 3. from ⊒ edge.from  &&  edge.to ⊒ to        filter both
//!     │
//!     ▼
//! store result (or miss) in cache
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bitflags::bitflags;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::{SmallVec, smallvec};
use tracing::trace;

use crate::class::{ClassId, ClassRegistry};
use crate::error::ConversionError;
use crate::value::Value;

bitflags! {
    /// Restrictions on how a converter may be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ConverterOptions: u8 {
        /// May not be the second half of a chained converter.
        const NO_LEFT_CHAINING = 1;
        /// May not be the first half of a chained converter.
        const NO_RIGHT_CHAINING = 1 << 1;
        const NO_CHAINING = Self::NO_LEFT_CHAINING.bits() | Self::NO_RIGHT_CHAINING.bits();
        /// Not applied to command arguments.
        const NO_COMMAND_ARGUMENTS = 1 << 2;
    }
}

/// A conversion function. `None` means "this value does not convert".
pub type ConvertFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// One edge of the conversion graph.
#[derive(Clone)]
pub struct ConverterInfo {
    from: ClassId,
    to: ClassId,
    converter: ConvertFn,
    options: ConverterOptions,
    /// Classes visited, `from` first and `to` last.
    chain: SmallVec<[ClassId; 4]>,
}

impl ConverterInfo {
    pub fn new(
        from: ClassId,
        to: ClassId,
        converter: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
        options: ConverterOptions,
    ) -> Self {
        Self {
            from,
            to,
            converter: Arc::new(converter),
            options,
            chain: smallvec![from, to],
        }
    }

    fn chained(first: &Self, second: &Self) -> Self {
        let (a, b) = (first.converter.clone(), second.converter.clone());
        let mut chain = first.chain.clone();
        chain.extend(second.chain.iter().skip(1).copied());
        Self {
            from: first.from,
            to: second.to,
            converter: Arc::new(move |value| a(value).and_then(|mid| b(&mid))),
            options: first.options | second.options,
            chain,
        }
    }

    /// Same edge, answering for another `(from, to)` pair.
    fn filtered(&self, from: ClassId, to: ClassId, converter: ConvertFn) -> Self {
        Self {
            from,
            to,
            converter,
            options: self.options,
            chain: self.chain.clone(),
        }
    }

    #[must_use]
    pub const fn from(&self) -> ClassId {
        self.from
    }

    #[must_use]
    pub const fn to(&self) -> ClassId {
        self.to
    }

    #[must_use]
    pub const fn options(&self) -> ConverterOptions {
        self.options
    }

    #[must_use]
    pub fn chain(&self) -> &[ClassId] {
        &self.chain
    }

    #[must_use]
    pub fn is_chained(&self) -> bool {
        self.chain.len() > 2
    }

    #[must_use]
    pub fn convert(&self, value: &Value) -> Option<Value> {
        (self.converter)(value)
    }

    /// `"from -> to"`, or the full chain when `debug` is set.
    #[must_use]
    pub fn describe(&self, classes: &ClassRegistry, debug: bool) -> String {
        if debug {
            self.chain
                .iter()
                .map(|c| classes.code_name(*c))
                .collect::<Vec<_>>()
                .join(" -> ")
        } else {
            format!(
                "{} -> {}",
                classes.code_name(self.from),
                classes.code_name(self.to)
            )
        }
    }
}

impl fmt::Debug for ConverterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterInfo")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("options", &self.options)
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

/// Insert `info` before the first edge it is more specific than.
pub(crate) fn insert_ordered(
    classes: &ClassRegistry,
    infos: &mut Vec<ConverterInfo>,
    info: ConverterInfo,
) {
    let position = infos.iter().position(|existing| {
        classes.is_assignable(existing.from, info.from) && classes.is_assignable(info.to, existing.to)
    });
    match position {
        Some(i) => infos.insert(i, info),
        None => infos.push(info),
    }
}

type ConverterCache = FxHashMap<(ClassId, ClassId), Option<Arc<ConverterInfo>>>;

/// The frozen conversion graph.
pub struct Converters {
    classes: Arc<ClassRegistry>,
    infos: Vec<Arc<ConverterInfo>>,
    cache: RwLock<ConverterCache>,
    scans: AtomicUsize,
}

impl Converters {
    /// Freeze the registered edges and synthesize every missing chain.
    #[must_use]
    pub fn new(classes: Arc<ClassRegistry>, mut infos: Vec<ConverterInfo>) -> Self {
        create_missing_converters(&classes, &mut infos);
        Self {
            classes,
            infos: infos.into_iter().map(Arc::new).collect(),
            cache: RwLock::new(FxHashMap::default()),
            scans: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn infos(&self) -> &[Arc<ConverterInfo>] {
        &self.infos
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// How many times the edge list has been scanned. A cached pair never
    /// adds to this.
    #[must_use]
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    /// The converter for `from -> to`, if any.
    #[must_use]
    pub fn get_converter(&self, from: ClassId, to: ClassId) -> Option<Arc<ConverterInfo>> {
        if let Some(cached) = self.cache.read().get(&(from, to)) {
            return cached.clone();
        }
        let found = self.scan(from, to);
        self.cache.write().insert((from, to), found.clone());
        found
    }

    fn scan(&self, from: ClassId, to: ClassId) -> Option<Arc<ConverterInfo>> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let classes = &self.classes;
        let sup = |a: ClassId, b: ClassId| classes.is_assignable(a, b);

        if let Some(info) = self
            .infos
            .iter()
            .find(|c| sup(c.from, from) && sup(to, c.to))
        {
            trace!(?from, ?to, "direct converter");
            return Some(info.clone());
        }

        for info in &self.infos {
            if sup(info.from, from) && sup(info.to, to) {
                trace!(?from, ?to, "converter with output filter");
                return Some(Arc::new(info.filtered(from, to, self.output_filter(info, to))));
            }
            if sup(from, info.from) && sup(to, info.to) {
                trace!(?from, ?to, "converter with input filter");
                return Some(Arc::new(info.filtered(from, to, self.input_filter(info))));
            }
        }

        for info in &self.infos {
            if sup(from, info.from) && sup(info.to, to) {
                trace!(?from, ?to, "converter with input and output filter");
                let inner = self.input_filter(info);
                let classes = self.classes.clone();
                let both: ConvertFn = Arc::new(move |value| {
                    inner(value).filter(|out| classes.is_instance(to, out))
                });
                return Some(Arc::new(info.filtered(from, to, both)));
            }
        }

        None
    }

    fn output_filter(&self, info: &ConverterInfo, to: ClassId) -> ConvertFn {
        let classes = self.classes.clone();
        let converter = info.converter.clone();
        Arc::new(move |value| converter(value).filter(|out| classes.is_instance(to, out)))
    }

    fn input_filter(&self, info: &ConverterInfo) -> ConvertFn {
        let classes = self.classes.clone();
        let converter = info.converter.clone();
        let accepts = info.from;
        Arc::new(move |value| {
            if classes.is_instance(accepts, value) {
                converter(value)
            } else {
                None
            }
        })
    }

    /// Convert a single value. Values already of class `to` are returned
    /// as-is without consulting any converter.
    #[must_use]
    pub fn convert(&self, value: &Value, to: ClassId) -> Option<Value> {
        if self.classes.is_instance(to, value) {
            return Some(value.clone());
        }
        self.get_converter(value.class(), to)?.convert(value)
    }

    /// Convert to the first of `to` that works.
    #[must_use]
    pub fn convert_any(&self, value: &Value, to: &[ClassId]) -> Option<Value> {
        if to.iter().any(|c| self.classes.is_instance(*c, value)) {
            return Some(value.clone());
        }
        to.iter().find_map(|c| {
            self.get_converter(value.class(), *c)
                .and_then(|info| info.convert(value))
        })
    }

    /// Convert every value, dropping the ones that don't convert.
    #[must_use]
    pub fn convert_array(&self, values: &[Value], to: ClassId) -> Vec<Value> {
        values.iter().filter_map(|v| self.convert(v, to)).collect()
    }

    #[must_use]
    pub fn convert_array_any(&self, values: &[Value], to: &[ClassId]) -> Vec<Value> {
        values
            .iter()
            .filter_map(|v| self.convert_any(v, to))
            .collect()
    }

    /// Convert every value or fail on the first one that doesn't convert.
    pub fn convert_strictly(
        &self,
        values: &[Value],
        to: ClassId,
    ) -> Result<Vec<Value>, ConversionError> {
        values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                self.convert(value, to).ok_or(ConversionError {
                    index,
                    from: value.class(),
                    to,
                })
            })
            .collect()
    }

    pub fn convert_strictly_single(
        &self,
        value: &Value,
        to: ClassId,
    ) -> Result<Value, ConversionError> {
        self.convert(value, to).ok_or(ConversionError {
            index: 0,
            from: value.class(),
            to,
        })
    }

    /// Bulk conversion with an already resolved converter.
    #[must_use]
    pub fn convert_with(values: &[Value], info: &ConverterInfo) -> Vec<Value> {
        values.iter().filter_map(|v| info.convert(v)).collect()
    }

    /// Whether a `from` value may end up as a `to`. A supertype counts,
    /// since the value can still turn out to be an instance of `to`.
    #[must_use]
    pub fn converter_exists(&self, from: ClassId, to: ClassId) -> bool {
        self.classes.is_assignable(to, from)
            || self.classes.is_assignable(from, to)
            || self.get_converter(from, to).is_some()
    }

    #[must_use]
    pub fn converter_exists_any(&self, from: ClassId, to: &[ClassId]) -> bool {
        to.iter().any(|c| self.converter_exists(from, *c))
    }
}

impl fmt::Debug for Converters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converters")
            .field("infos", &self.infos.len())
            .field("cached", &self.cache.read().len())
            .finish_non_exhaustive()
    }
}

/// Any edge whose ends are related to `from`/`to` in either direction.
fn converter_exists_slow(
    classes: &ClassRegistry,
    infos: &[ConverterInfo],
    from: ClassId,
    to: ClassId,
) -> bool {
    let related = |a: ClassId, b: ClassId| classes.is_assignable(a, b) || classes.is_assignable(b, a);
    infos
        .iter()
        .any(|info| related(info.from, from) && related(info.to, to))
}

/// Close the graph under composition.
///
/// The list grows while it is walked, so chains of any length are found
/// in one pass.
fn create_missing_converters(classes: &ClassRegistry, infos: &mut Vec<ConverterInfo>) {
    let chainable = |first: &ConverterInfo, second: &ConverterInfo| {
        !first.options.contains(ConverterOptions::NO_RIGHT_CHAINING)
            && !second.options.contains(ConverterOptions::NO_LEFT_CHAINING)
            && classes.is_assignable(second.from, first.to)
            && !classes.is_assignable(second.to, first.from)
    };

    let mut i = 0;
    while i < infos.len() {
        let mut j = 0;
        while j < infos.len() {
            let (info, info2) = (&infos[i], &infos[j]);
            let chained = if chainable(info, info2)
                && !converter_exists_slow(classes, infos, info.from, info2.to)
            {
                Some(ConverterInfo::chained(info, info2))
            } else if chainable(info2, info)
                && !converter_exists_slow(classes, infos, info2.from, info.to)
            {
                Some(ConverterInfo::chained(info2, info))
            } else {
                None
            };
            if let Some(chained) = chained {
                infos.push(chained);
            }
            j += 1;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassInfo;

    fn classes() -> (ClassRegistry, ClassId, ClassId, ClassId) {
        let mut classes = ClassRegistry::empty();
        classes.insert(ClassInfo::new("object"));
        let a = classes.register(ClassInfo::new("a")).unwrap();
        let b = classes.register(ClassInfo::new("b")).unwrap();
        let c = classes.register(ClassInfo::new("c")).unwrap();
        (classes, a, b, c)
    }

    fn edge(from: ClassId, to: ClassId, options: ConverterOptions) -> ConverterInfo {
        ConverterInfo::new(
            from,
            to,
            move |v| Some(Value::object(to, v.as_text() + "'")),
            options,
        )
    }

    #[test]
    fn test_chain_is_synthesized() {
        let (classes, a, b, c) = classes();
        let converters = Converters::new(
            Arc::new(classes),
            vec![
                edge(a, b, ConverterOptions::empty()),
                edge(b, c, ConverterOptions::empty()),
            ],
        );

        let info = converters.get_converter(a, c).unwrap();
        assert!(info.is_chained());
        assert_eq!(info.chain(), &[a, b, c]);
        assert_eq!(converters.len(), 3);
    }

    #[test]
    fn test_no_chaining_is_respected() {
        let (classes, a, b, c) = classes();
        let converters = Converters::new(
            Arc::new(classes),
            vec![
                edge(a, b, ConverterOptions::NO_RIGHT_CHAINING),
                edge(b, c, ConverterOptions::empty()),
            ],
        );

        assert!(converters.get_converter(a, c).is_none());
        assert!(!converters.converter_exists(a, c));
    }

    #[test]
    fn test_converter_exists_for_subtypes_and_supertypes() {
        let mut classes = ClassRegistry::empty();
        classes.insert(ClassInfo::new("object"));
        let entity = classes.register(ClassInfo::new("entity")).unwrap();
        let player = classes
            .register(ClassInfo::new("player").supertype(entity))
            .unwrap();
        let other = classes.register(ClassInfo::new("other")).unwrap();
        let converters = Converters::new(Arc::new(classes), Vec::new());

        assert!(converters.converter_exists(player, entity));
        assert!(converters.converter_exists(entity, player));
        assert!(!converters.converter_exists(entity, other));
        assert!(converters.get_converter(entity, player).is_none());
    }

    #[test]
    fn test_round_trip_edges_do_not_chain_to_self() {
        let (classes, a, b, _) = classes();
        let converters = Converters::new(
            Arc::new(classes),
            vec![
                edge(a, b, ConverterOptions::empty()),
                edge(b, a, ConverterOptions::empty()),
            ],
        );

        assert_eq!(converters.len(), 2);
    }

    #[test]
    fn test_describe() {
        let (classes, a, b, c) = classes();
        let classes = Arc::new(classes);
        let converters = Converters::new(
            classes.clone(),
            vec![
                edge(a, b, ConverterOptions::empty()),
                edge(b, c, ConverterOptions::empty()),
            ],
        );

        let info = converters.get_converter(a, c).unwrap();
        assert_eq!(info.describe(&classes, false), "a -> c");
        assert_eq!(info.describe(&classes, true), "a -> b -> c");
    }

    #[test]
    fn test_insertion_puts_specific_edges_first() {
        let mut classes = ClassRegistry::empty();
        classes.insert(ClassInfo::new("object"));
        let entity = classes.register(ClassInfo::new("entity")).unwrap();
        let player = classes
            .register(ClassInfo::new("player").supertype(entity))
            .unwrap();
        let text = classes.register(ClassInfo::new("text")).unwrap();

        let mut infos = Vec::new();
        insert_ordered(&classes, &mut infos, edge(entity, text, ConverterOptions::empty()));
        insert_ordered(&classes, &mut infos, edge(player, text, ConverterOptions::empty()));

        assert_eq!(infos[0].from(), player);
        assert_eq!(infos[1].from(), entity);
    }
}
