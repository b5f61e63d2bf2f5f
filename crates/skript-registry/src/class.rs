//! Class registration and the type hierarchy.
//!
//! Every type a script can talk about (numbers, players, events, ...) is a
//! class identified by a [`ClassId`]. Classes form a single lattice rooted at
//! [`ClassId::OBJECT`]; a class may have several supertypes, so "is `a` a
//! subtype of `b`" is answered from an ancestor set computed once when the
//! class is registered.
//!
//! # Architecture
//!
//! ```text
//!                  object
//!          ┌─────┬───┴───┬────────┬──────────┐
//!       boolean number  text  timespan     event
//!                                            │
//!                                      function event
//! ```
//!
//! Host classes hang off this tree. Event classes are ordinary classes
//! with [`ClassKind::Event`]; the event value registry only accepts those.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::changer::{ChangeMode, Changer};
use crate::comparator::CompareFn;
use crate::error::{RegistryError, RegistryResult};
use crate::parser::{ParseContext, Parser};
use crate::serializer::Serializer;
use crate::value::Value;

/// Unique identifier for a registered class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    pub const OBJECT: Self = Self(0);
    pub const BOOLEAN: Self = Self(1);
    pub const NUMBER: Self = Self(2);
    pub const TEXT: Self = Self(3);
    pub const TIMESPAN: Self = Self(4);
    pub const EVENT: Self = Self(5);
    pub const FUNCTION_EVENT: Self = Self(6);

    /// Create a class ID from a raw value.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

/// Whether a class describes values or events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClassKind {
    #[default]
    Value,
    Event,
}

/// Produces the value used when a script omits one, e.g. "the player".
pub type DefaultValueFn = Arc<dyn Fn() -> Option<Value> + Send + Sync>;

/// Everything registered about one class.
///
/// Built with a small builder:
///
/// ```ignore
/// let player = ClassInfo::new("player")
///     .name("player", "players")
///     .supertype(entity)
///     .parser(PlayerParser)
///     .changer(PlayerChanger);
/// ```
#[derive(Clone)]
pub struct ClassInfo {
    code_name: String,
    kind: ClassKind,
    singular: String,
    plural: String,
    supertypes: SmallVec<[ClassId; 2]>,
    default_value: Option<DefaultValueFn>,
    parser: Option<Arc<dyn Parser>>,
    serializer: Option<Arc<dyn Serializer>>,
    changer: Option<Arc<dyn Changer>>,
    comparator: Option<(CompareFn, bool)>,
}

impl ClassInfo {
    #[must_use]
    pub fn new(code_name: impl Into<String>) -> Self {
        let code_name = code_name.into();
        Self {
            singular: code_name.clone(),
            plural: format!("{code_name}s"),
            code_name,
            kind: ClassKind::Value,
            supertypes: SmallVec::new(),
            default_value: None,
            parser: None,
            serializer: None,
            changer: None,
            comparator: None,
        }
    }

    /// Mark this class as an event class.
    #[must_use]
    pub const fn event(mut self) -> Self {
        self.kind = ClassKind::Event;
        self
    }

    #[must_use]
    pub fn name(mut self, singular: impl Into<String>, plural: impl Into<String>) -> Self {
        self.singular = singular.into();
        self.plural = plural.into();
        self
    }

    #[must_use]
    pub fn supertype(mut self, supertype: ClassId) -> Self {
        if !self.supertypes.contains(&supertype) {
            self.supertypes.push(supertype);
        }
        self
    }

    #[must_use]
    pub fn default_value(mut self, f: impl Fn() -> Option<Value> + Send + Sync + 'static) -> Self {
        self.default_value = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn parser(mut self, parser: impl Parser + 'static) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    #[must_use]
    pub fn serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Some(Arc::new(serializer));
        self
    }

    #[must_use]
    pub fn changer(mut self, changer: impl Changer + 'static) -> Self {
        self.changer = Some(Arc::new(changer));
        self
    }

    /// Compare two values of this class. `supports_ordering` allows
    /// `<`/`>` in conditions.
    #[must_use]
    pub fn comparator(
        mut self,
        f: impl Fn(&Value, &Value) -> crate::Relation + Send + Sync + 'static,
        supports_ordering: bool,
    ) -> Self {
        self.comparator = Some((Arc::new(f), supports_ordering));
        self
    }

    #[must_use]
    pub fn code_name(&self) -> &str {
        &self.code_name
    }

    #[must_use]
    pub const fn kind(&self) -> ClassKind {
        self.kind
    }

    #[must_use]
    pub fn singular(&self) -> &str {
        &self.singular
    }

    #[must_use]
    pub fn plural(&self) -> &str {
        &self.plural
    }

    #[must_use]
    pub fn supertypes(&self) -> &[ClassId] {
        &self.supertypes
    }

    #[must_use]
    pub fn get_parser(&self) -> Option<&dyn Parser> {
        self.parser.as_deref()
    }

    #[must_use]
    pub fn get_serializer(&self) -> Option<&dyn Serializer> {
        self.serializer.as_deref()
    }

    #[must_use]
    pub fn get_changer(&self) -> Option<&dyn Changer> {
        self.changer.as_deref()
    }

    pub(crate) fn comparator_binding(&self) -> Option<(CompareFn, bool)> {
        self.comparator.clone()
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("code_name", &self.code_name)
            .field("kind", &self.kind)
            .field("supertypes", &self.supertypes)
            .field("parser", &self.parser.is_some())
            .field("serializer", &self.serializer.is_some())
            .field("changer", &self.changer.is_some())
            .finish_non_exhaustive()
    }
}

struct ClassEntry {
    info: ClassInfo,
    /// Every class this one is assignable to, itself and `object` included.
    ancestors: FxHashSet<ClassId>,
}

/// All registered classes.
///
/// Mutable only while a [`crate::RegistryBuilder`] owns it.
pub struct ClassRegistry {
    classes: Vec<ClassEntry>,
    by_name: FxHashMap<String, ClassId>,
}

impl ClassRegistry {
    /// An empty registry. [`crate::RegistryBuilder::new`] fills in the
    /// builtin classes.
    pub(crate) fn empty() -> Self {
        Self {
            classes: Vec::new(),
            by_name: FxHashMap::default(),
        }
    }

    /// Register a class after validating its name and supertypes.
    pub fn register(&mut self, info: ClassInfo) -> RegistryResult<ClassId> {
        let key = info.code_name.to_lowercase();
        if self
            .by_name
            .get(&key)
            .is_some_and(|id| self.classes[id.index()].info.code_name.eq_ignore_ascii_case(&key))
        {
            return Err(RegistryError::DuplicateClass(info.code_name));
        }
        for &sup in &info.supertypes {
            if self.get(sup).is_none() {
                return Err(RegistryError::UnknownSupertype {
                    class: info.code_name,
                    supertype: sup,
                });
            }
        }
        Ok(self.insert(info))
    }

    /// Register without validation. Only used for the builtin classes.
    pub(crate) fn insert(&mut self, info: ClassInfo) -> ClassId {
        let id = ClassId(self.classes.len() as u32);

        let mut ancestors = FxHashSet::default();
        ancestors.insert(id);
        ancestors.insert(ClassId::OBJECT);
        for sup in &info.supertypes {
            if let Some(entry) = self.classes.get(sup.index()) {
                ancestors.extend(entry.ancestors.iter().copied());
            }
        }

        self.by_name.insert(info.code_name.to_lowercase(), id);
        self.by_name.entry(info.singular.to_lowercase()).or_insert(id);
        self.by_name.entry(info.plural.to_lowercase()).or_insert(id);

        self.classes.push(ClassEntry { info, ancestors });
        id
    }

    #[must_use]
    pub fn get(&self, id: ClassId) -> Option<&ClassInfo> {
        self.classes.get(id.index()).map(|e| &e.info)
    }

    #[must_use]
    pub fn contains(&self, id: ClassId) -> bool {
        id.index() < self.classes.len()
    }

    /// Look up a class by code name or by its singular/plural name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    /// Code name for diagnostics, `"?"` for unknown ids.
    #[must_use]
    pub fn code_name(&self, id: ClassId) -> &str {
        self.get(id).map_or("?", ClassInfo::code_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len()).map(|i| ClassId(i as u32))
    }

    /// Whether a value of class `sub` may be used where `sup` is expected.
    #[must_use]
    pub fn is_assignable(&self, sup: ClassId, sub: ClassId) -> bool {
        sup == sub
            || sup == ClassId::OBJECT
            || self
                .classes
                .get(sub.index())
                .is_some_and(|e| e.ancestors.contains(&sup))
    }

    #[must_use]
    pub fn is_instance(&self, class: ClassId, value: &Value) -> bool {
        self.is_assignable(class, value.class())
    }

    #[must_use]
    pub fn is_event(&self, id: ClassId) -> bool {
        self.get(id).is_some_and(|i| i.kind == ClassKind::Event)
    }

    /// The most specific class both arguments are assignable to.
    #[must_use]
    pub fn common_supertype(&self, a: ClassId, b: ClassId) -> ClassId {
        if self.is_assignable(a, b) {
            return a;
        }
        if self.is_assignable(b, a) {
            return b;
        }
        let (Some(ea), Some(eb)) = (self.classes.get(a.index()), self.classes.get(b.index()))
        else {
            return ClassId::OBJECT;
        };
        ea.ancestors
            .intersection(&eb.ancestors)
            .copied()
            .max_by_key(|c| (self.depth(*c), std::cmp::Reverse(*c)))
            .unwrap_or(ClassId::OBJECT)
    }

    fn depth(&self, id: ClassId) -> usize {
        self.classes.get(id.index()).map_or(0, |e| e.ancestors.len())
    }

    /// Breadth-first search from `class` up through its supertypes.
    fn nearest<'a, T>(
        &'a self,
        class: ClassId,
        mut f: impl FnMut(&'a ClassInfo) -> Option<T>,
    ) -> Option<T> {
        let mut queue = VecDeque::from([class]);
        let mut seen = FxHashSet::default();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let Some(info) = self.get(id) else {
                continue;
            };
            if let Some(found) = f(info) {
                return Some(found);
            }
            queue.extend(info.supertypes.iter().copied());
        }
        None
    }

    #[must_use]
    pub fn parser_for(&self, class: ClassId) -> Option<&dyn Parser> {
        self.nearest(class, ClassInfo::get_parser)
    }

    #[must_use]
    pub fn serializer_for(&self, class: ClassId) -> Option<&dyn Serializer> {
        self.nearest(class, ClassInfo::get_serializer)
    }

    /// The changer of the class or of its nearest supertype that has one.
    #[must_use]
    pub fn changer_for(&self, class: ClassId) -> Option<&dyn Changer> {
        self.nearest(class, ClassInfo::get_changer)
    }

    /// Delta classes accepted when changing a value of `class` with `mode`.
    #[must_use]
    pub fn accepts_change(&self, class: ClassId, mode: ChangeMode) -> Option<Vec<ClassId>> {
        self.changer_for(class)?.accept_change(mode)
    }

    #[must_use]
    pub fn default_value(&self, class: ClassId) -> Option<Value> {
        self.get(class)?.default_value.as_ref().and_then(|f| f())
    }

    /// Parse `input` as a value of `class`.
    #[must_use]
    pub fn parse(&self, class: ClassId, input: &str, context: ParseContext) -> Option<Value> {
        let parser = self.get(class)?.get_parser()?;
        if !parser.can_parse(context) {
            return None;
        }
        parser.parse(input, context)
    }

    /// Render a value with the parser of its class.
    #[must_use]
    pub fn to_string(&self, value: &Value) -> String {
        self.parser_for(value.class())
            .map_or_else(|| value.as_text(), |p| p.to_string(value))
    }

    #[must_use]
    pub fn to_variable_name_string(&self, value: &Value) -> String {
        self.parser_for(value.class())
            .map_or_else(|| value.as_text(), |p| p.to_variable_name_string(value))
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.classes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice() -> (ClassRegistry, ClassId, ClassId, ClassId) {
        let mut classes = ClassRegistry::empty();
        classes.insert(ClassInfo::new("object"));
        let entity = classes
            .register(ClassInfo::new("entity").name("entity", "entities"))
            .unwrap();
        let living = classes
            .register(ClassInfo::new("livingentity").supertype(entity))
            .unwrap();
        let player = classes
            .register(ClassInfo::new("player").supertype(living))
            .unwrap();
        (classes, entity, living, player)
    }

    #[test]
    fn test_ancestors_are_transitive() {
        let (classes, entity, living, player) = lattice();

        assert!(classes.is_assignable(entity, player));
        assert!(classes.is_assignable(living, player));
        assert!(classes.is_assignable(ClassId::OBJECT, player));
        assert!(!classes.is_assignable(player, entity));
        assert_eq!(classes.common_supertype(player, living), living);
    }

    #[test]
    fn test_common_supertype_of_siblings() {
        let (mut classes, entity, living, _) = lattice();
        let item = classes
            .register(ClassInfo::new("item").supertype(entity))
            .unwrap();

        assert_eq!(classes.common_supertype(item, living), entity);
    }

    #[test]
    fn test_names() {
        let (classes, entity, ..) = lattice();

        assert_eq!(classes.by_name("Entities"), Some(entity));
        assert_eq!(classes.by_name("entity"), Some(entity));
        assert_eq!(classes.code_name(entity), "entity");
        assert_eq!(classes.by_name("zombie"), None);
    }

    #[test]
    fn test_registration_errors() {
        let (mut classes, ..) = lattice();

        assert!(matches!(
            classes.register(ClassInfo::new("Player")),
            Err(RegistryError::DuplicateClass(_))
        ));
        assert!(matches!(
            classes.register(ClassInfo::new("ghost").supertype(ClassId::from_raw(99))),
            Err(RegistryError::UnknownSupertype { .. })
        ));
    }
}
