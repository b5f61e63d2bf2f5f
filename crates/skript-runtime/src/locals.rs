//! Local variables scoped to one trigger execution.
//!
//! Names are case-insensitive. A name ending in `::*` addresses a list:
//! every variable one level below the prefix, ordered by index.

use std::collections::BTreeMap;
use std::fmt;

use skript_registry::Value;

const LIST_SUFFIX: &str = "::*";
const SEPARATOR: &str = "::";

/// Local variable storage of a context.
#[derive(Default, Clone, PartialEq)]
pub struct Locals {
    vars: BTreeMap<String, Value>,
}

/// Locals detached from their context while it is suspended.
///
/// Only [`Locals::restore`] can put them back.
#[derive(Default, PartialEq)]
pub struct LocalsSnapshot(Locals);

impl LocalsSnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for LocalsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalsSnapshot").field(&self.0.len()).finish()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn list_prefix(name: &str) -> Option<&str> {
    name.strip_suffix(LIST_SUFFIX)
}

/// Numeric indices sort numerically, then everything else by name.
fn index_key(index: &str) -> (u64, &str) {
    (index.parse().unwrap_or(u64::MAX), index)
}

impl Locals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    /// Detach everything, leaving this storage empty.
    pub fn take(&mut self) -> LocalsSnapshot {
        LocalsSnapshot(std::mem::take(self))
    }

    /// Reattach a snapshot, replacing whatever is stored now.
    pub fn restore(&mut self, snapshot: LocalsSnapshot) {
        *self = snapshot.0;
    }

    /// Keys directly below a list prefix, in index order.
    fn children(&self, prefix: &str) -> Vec<String> {
        let start = format!("{prefix}{SEPARATOR}");
        let mut keys: Vec<(&str, &str)> = self
            .vars
            .range(start.clone()..)
            .map(|(k, _)| k.as_str())
            .map_while(|k| k.strip_prefix(start.as_str()).map(|index| (k, index)))
            .filter(|(_, index)| !index.contains(SEPARATOR))
            .collect();
        keys.sort_by(|a, b| index_key(a.1).cmp(&index_key(b.1)));
        keys.into_iter().map(|(k, _)| k.to_string()).collect()
    }

    fn next_index(&self, prefix: &str) -> u64 {
        let start = format!("{prefix}{SEPARATOR}");
        let mut index = 1;
        while self.vars.contains_key(&format!("{start}{index}")) {
            index += 1;
        }
        index
    }

    /// Everything stored under `name`; for a list, its elements in order.
    #[must_use]
    pub fn get(&self, name: &str) -> Vec<Value> {
        let name = normalize(name);
        match list_prefix(&name) {
            Some(prefix) => self
                .children(prefix)
                .iter()
                .filter_map(|k| self.vars.get(k).cloned())
                .collect(),
            None => self.vars.get(&name).cloned().into_iter().collect(),
        }
    }

    #[must_use]
    pub fn get_single(&self, name: &str) -> Option<&Value> {
        self.vars.get(&normalize(name))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        !self.get(name).is_empty()
    }

    /// Replace the value(s) of `name`. An empty slice deletes.
    pub fn set(&mut self, name: &str, values: &[Value]) {
        let name = normalize(name);
        match list_prefix(&name) {
            Some(prefix) => {
                for key in self.children(prefix) {
                    self.vars.remove(&key);
                }
                for (i, value) in values.iter().enumerate() {
                    self.vars
                        .insert(format!("{prefix}{SEPARATOR}{}", i + 1), value.clone());
                }
            }
            None => match values.first() {
                Some(value) => {
                    self.vars.insert(name, value.clone());
                }
                None => {
                    self.vars.remove(&name);
                }
            },
        }
    }

    /// Append to a list, or add numerically to a single variable.
    pub fn add(&mut self, name: &str, values: &[Value]) {
        let name = normalize(name);
        match list_prefix(&name) {
            Some(prefix) => {
                for value in values {
                    let index = self.next_index(prefix);
                    self.vars
                        .insert(format!("{prefix}{SEPARATOR}{index}"), value.clone());
                }
            }
            None => self.offset_number(name, values, 1.0),
        }
    }

    /// Remove the first matching element per value from a list, or
    /// subtract numerically from a single variable.
    pub fn remove(&mut self, name: &str, values: &[Value]) {
        let name = normalize(name);
        match list_prefix(&name) {
            Some(prefix) => {
                for value in values {
                    let hit = self
                        .children(prefix)
                        .into_iter()
                        .find(|k| self.vars.get(k) == Some(value));
                    if let Some(key) = hit {
                        self.vars.remove(&key);
                    }
                }
            }
            None => self.offset_number(name, values, -1.0),
        }
    }

    /// Remove every element equal to any of `values`.
    pub fn remove_all(&mut self, name: &str, values: &[Value]) {
        let name = normalize(name);
        match list_prefix(&name) {
            Some(prefix) => {
                for key in self.children(prefix) {
                    if self.vars.get(&key).is_some_and(|v| values.contains(v)) {
                        self.vars.remove(&key);
                    }
                }
            }
            None => {
                if self.vars.get(&name).is_some_and(|v| values.contains(v)) {
                    self.vars.remove(&name);
                }
            }
        }
    }

    pub fn delete(&mut self, name: &str) {
        self.set(name, &[]);
    }

    fn offset_number(&mut self, name: String, values: &[Value], sign: f64) {
        if !values.iter().all(|v| matches!(v, Value::Number(_))) {
            return;
        }
        let current = match self.vars.get(&name) {
            Some(Value::Number(n)) => *n,
            Some(_) => return,
            None => 0.0,
        };
        let total = values.iter().map(Value::as_number).sum::<f64>();
        self.vars.insert(name, Value::Number(current + sign * total));
    }
}

impl fmt::Debug for Locals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.vars.iter()).finish()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Locals {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut locals = Self::new();
        for (name, value) in iter {
            locals.set(name.as_ref(), &[value.into()]);
        }
        locals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_variables() {
        let mut locals = Locals::new();
        locals.set("Score", &[Value::from(3)]);
        assert_eq!(locals.get("score"), vec![Value::from(3)]);

        locals.add("score", &[Value::from(2)]);
        assert_eq!(locals.get_single("score"), Some(&Value::from(5)));

        locals.remove("score", &[Value::from(1)]);
        assert_eq!(locals.get_single("score"), Some(&Value::from(4)));

        locals.delete("score");
        assert!(!locals.contains("score"));
    }

    #[test]
    fn test_list_order_is_numeric() {
        let mut locals = Locals::new();
        let values: Vec<Value> = (1..=12).map(Value::from).collect();
        locals.set("xs::*", &values);
        assert_eq!(locals.get("xs::*"), values);

        locals.remove("xs::*", &[Value::from(1)]);
        locals.add("xs::*", &[Value::from(99)]);
        // The freed index is reused, so 99 comes first.
        assert_eq!(locals.get("xs::*").first(), Some(&Value::from(99)));
        assert_eq!(locals.get("xs::*").len(), 12);
    }

    #[test]
    fn test_nested_lists_are_not_children() {
        let mut locals = Locals::new();
        locals.set("xs::1", &[Value::from("a")]);
        locals.set("xs::1::inner", &[Value::from("b")]);
        assert_eq!(locals.get("xs::*"), vec![Value::from("a")]);

        locals.remove_all("xs::*", &[Value::from("a")]);
        assert!(locals.get("xs::*").is_empty());
        assert_eq!(locals.len(), 1);
    }

    #[test]
    fn test_take_and_restore() {
        let mut locals: Locals = [("a", 1), ("b", 2)].into_iter().collect();
        let before = locals.clone();

        let snapshot = locals.take();
        assert!(locals.is_empty());
        assert_eq!(snapshot.len(), 2);

        locals.restore(snapshot);
        assert_eq!(locals, before);
    }
}
