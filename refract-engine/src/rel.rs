// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relativity: whether a graph segment's effect is being added, removed or
//! left unchanged between the old and new focus state.

use refract_core::{Condition, FocusObject};

/// Relativity mode of a segment or of a whole path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Relativity {
    Added,
    Removed,
    Unchanged,
}

impl Relativity {
    /// Pointwise composition along a path. `Unchanged` is the identity;
    /// an addition meeting a removal cancels out; once removed, nothing
    /// further down the path can promote the result back to `Added`.
    pub fn compose(self, other: Relativity) -> Relativity {
        match (self, other) {
            (Relativity::Unchanged, other) => other,
            (this, Relativity::Unchanged) => this,
            (Relativity::Added, Relativity::Added) => Relativity::Added,
            (Relativity::Added, Relativity::Removed) => Relativity::Unchanged,
            (Relativity::Removed, Relativity::Added) => Relativity::Unchanged,
            (Relativity::Removed, Relativity::Removed) => Relativity::Removed,
        }
    }

    pub fn is_non_negative(self) -> bool {
        !matches!(self, Relativity::Removed)
    }
}

/// Truth of a condition (or of a conjunction of conditions) in the old and
/// new focus state, tracked independently so that a condition flipping
/// mid-change is visible as "will become active" or "will become inactive".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConditionState {
    pub old: bool,
    pub new: bool,
}

impl ConditionState {
    pub const BOTH: ConditionState = ConditionState {
        old: true,
        new: true,
    };

    /// Presence state of something being added: absent before, present
    /// after.
    pub const ADDED: ConditionState = ConditionState {
        old: false,
        new: true,
    };

    /// Presence state of something being removed.
    pub const REMOVED: ConditionState = ConditionState {
        old: true,
        new: false,
    };

    /// Evaluate an optional condition against both focus states. A missing
    /// condition holds in both.
    pub fn evaluate(
        condition: Option<&Condition>,
        focus_old: Option<&FocusObject>,
        focus_new: Option<&FocusObject>,
    ) -> Self {
        match condition {
            Some(condition) => Self {
                old: condition.evaluate(focus_old),
                new: condition.evaluate(focus_new),
            },
            None => Self::BOTH,
        }
    }

    /// Pointwise conjunction.
    pub fn and(self, other: ConditionState) -> ConditionState {
        ConditionState {
            old: self.old && other.old,
            new: self.new && other.new,
        }
    }

    pub fn is_not_all_false(self) -> bool {
        self.old || self.new
    }

    /// The relativity this state expresses, `None` when false in both
    /// states (nothing contributed at all).
    pub fn relativity(self) -> Option<Relativity> {
        match (self.old, self.new) {
            (false, true) => Some(Relativity::Added),
            (true, false) => Some(Relativity::Removed),
            (true, true) => Some(Relativity::Unchanged),
            (false, false) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_is_identity() {
        for mode in [Relativity::Added, Relativity::Removed, Relativity::Unchanged] {
            assert_eq!(Relativity::Unchanged.compose(mode), mode);
            assert_eq!(mode.compose(Relativity::Unchanged), mode);
        }
    }

    #[test]
    fn addition_meeting_removal_cancels() {
        assert_eq!(
            Relativity::Added.compose(Relativity::Removed),
            Relativity::Unchanged
        );
        assert_eq!(
            Relativity::Removed.compose(Relativity::Added),
            Relativity::Unchanged
        );
    }

    #[test]
    fn removal_is_never_promoted_to_addition() {
        // Once a path prefix is removed, no composition with any further
        // mode may yield an addition.
        for mode in [Relativity::Added, Relativity::Removed, Relativity::Unchanged] {
            assert_ne!(Relativity::Removed.compose(mode), Relativity::Added);
        }
    }

    #[test]
    fn condition_state_relativity() {
        assert_eq!(ConditionState::ADDED.relativity(), Some(Relativity::Added));
        assert_eq!(
            ConditionState::REMOVED.relativity(),
            Some(Relativity::Removed)
        );
        assert_eq!(ConditionState::BOTH.relativity(), Some(Relativity::Unchanged));
        let none = ConditionState {
            old: false,
            new: false,
        };
        assert_eq!(none.relativity(), None);
        assert!(!none.is_not_all_false());
    }
}
