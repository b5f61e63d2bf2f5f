//! Mutation capability of registered classes.

use std::fmt;

use bitflags::bitflags;

use crate::class::ClassId;
use crate::value::Value;

/// How a `change` statement wants to modify its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeMode {
    Set,
    Add,
    Remove,
    RemoveAll,
    Delete,
    Reset,
}

impl ChangeMode {
    pub const ALL: [Self; 6] = [
        Self::Set,
        Self::Add,
        Self::Remove,
        Self::RemoveAll,
        Self::Delete,
        Self::Reset,
    ];

    /// `delete` and `reset` take no right-hand side.
    #[must_use]
    pub const fn takes_delta(self) -> bool {
        !matches!(self, Self::Delete | Self::Reset)
    }

    #[must_use]
    pub const fn flag(self) -> ChangeModes {
        match self {
            Self::Set => ChangeModes::SET,
            Self::Add => ChangeModes::ADD,
            Self::Remove => ChangeModes::REMOVE,
            Self::RemoveAll => ChangeModes::REMOVE_ALL,
            Self::Delete => ChangeModes::DELETE,
            Self::Reset => ChangeModes::RESET,
        }
    }
}

impl fmt::Display for ChangeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Set => "set",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::RemoveAll => "remove all",
            Self::Delete => "delete",
            Self::Reset => "reset",
        })
    }
}

bitflags! {
    /// A set of [`ChangeMode`]s.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeModes: u8 {
        const SET = 1;
        const ADD = 1 << 1;
        const REMOVE = 1 << 2;
        const REMOVE_ALL = 1 << 3;
        const DELETE = 1 << 4;
        const RESET = 1 << 5;
    }
}

/// Applies `set`/`add`/`remove`/... to values of a class.
pub trait Changer: Send + Sync {
    /// Classes accepted as the right-hand side for `mode`, or `None` if the
    /// mode is not supported. Modes without a delta return an empty list.
    fn accept_change(&self, mode: ChangeMode) -> Option<Vec<ClassId>>;

    /// Apply the change. `delta` is `None` exactly when the mode takes none.
    fn change(&self, targets: &[Value], delta: Option<&[Value]>, mode: ChangeMode);
}

/// All modes a changer supports.
#[must_use]
pub fn supported_modes(changer: &dyn Changer) -> ChangeModes {
    ChangeMode::ALL
        .into_iter()
        .filter(|mode| changer.accept_change(*mode).is_some())
        .fold(ChangeModes::empty(), |acc, mode| acc | mode.flag())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DeleteOnly;

    impl Changer for DeleteOnly {
        fn accept_change(&self, mode: ChangeMode) -> Option<Vec<ClassId>> {
            (mode == ChangeMode::Delete).then(Vec::new)
        }

        fn change(&self, _targets: &[Value], _delta: Option<&[Value]>, _mode: ChangeMode) {}
    }

    #[test]
    fn test_supported_modes() {
        assert_eq!(supported_modes(&DeleteOnly), ChangeModes::DELETE);
        assert!(!ChangeMode::Reset.takes_delta());
        assert_eq!(ChangeMode::RemoveAll.to_string(), "remove all");
    }
}
