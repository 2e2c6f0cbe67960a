// SPDX-License-Identifier: MIT OR Apache-2.0

//! Immutable assignment paths.
//!
//! A path is a persistent cons list: extending it returns a new value and
//! leaves the original untouched, so sibling branches of the graph walk
//! never observe each other's extensions. Cloning is cheap (one `Rc`
//! bump).

use std::rc::Rc;

use refract_core::{AssignmentId, Oid};

/// Distance of a segment from the root of the walk, tracked separately for
/// object-scoped and target-scoped policy. An assignment edge increases
/// both by one; an inducement of order `n` increases both by `1 - n`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EvaluationOrder {
    pub object: i32,
    pub target: i32,
}

impl EvaluationOrder {
    /// Order of a segment created by a direct assignment on the focus.
    pub const DIRECT: EvaluationOrder = EvaluationOrder {
        object: 1,
        target: 0,
    };

    pub fn for_assignment_edge(self) -> EvaluationOrder {
        EvaluationOrder {
            object: self.object + 1,
            target: self.target + 1,
        }
    }

    pub fn for_inducement(self, inducement_order: u32) -> EvaluationOrder {
        let shift = 1 - inducement_order as i32;
        EvaluationOrder {
            object: self.object + shift,
            target: self.target + shift,
        }
    }

    /// Object-scoped payload is collected at order one: the payload applies
    /// to the focus itself.
    pub fn is_matching(self) -> bool {
        self.object == 1
    }

    /// Target-scoped policy applies at target order zero.
    pub fn is_matching_for_target(self) -> bool {
        self.target == 0
    }
}

/// One element of an assignment path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathStep {
    /// The object holding the assignment.
    pub source: Oid,
    pub assignment_id: AssignmentId,
    pub target: Option<Oid>,
    pub order: EvaluationOrder,
}

#[derive(Clone, Debug, Default)]
pub struct AssignmentPath {
    head: Option<Rc<PathNode>>,
}

#[derive(Debug)]
struct PathNode {
    step: PathStep,
    parent: Option<Rc<PathNode>>,
    len: usize,
}

impl AssignmentPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Extended copy; `self` is untouched.
    pub fn push(&self, step: PathStep) -> Self {
        let len = self.len() + 1;
        Self {
            head: Some(Rc::new(PathNode {
                step,
                parent: self.head.clone(),
                len,
            })),
        }
    }

    pub fn len(&self) -> usize {
        self.head.as_ref().map_or(0, |node| node.len)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.head.as_deref().map(|node| &node.step)
    }

    /// Steps in root-to-tip order.
    pub fn steps(&self) -> Vec<&PathStep> {
        let mut steps = Vec::with_capacity(self.len());
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            steps.push(&current.step);
            node = current.parent.as_deref();
        }
        steps.reverse();
        steps
    }

    /// Whether the object was already descended from on this path. The
    /// walker rejects descending into such an object again.
    pub fn contains_source(&self, oid: &Oid) -> bool {
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            if current.step.source == *oid {
                return true;
            }
            node = current.parent.as_deref();
        }
        false
    }

    /// How many segments on this path have target order zero. A policy rule
    /// applies directly to the assignment's target exactly when this count
    /// is one.
    pub fn zero_target_order_count(&self) -> usize {
        let mut count = 0;
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            if current.step.order.target == 0 {
                count += 1;
            }
            node = current.parent.as_deref();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(source: &str, target: Option<&str>, order: EvaluationOrder) -> PathStep {
        PathStep {
            source: Oid::new(source),
            assignment_id: 1,
            target: target.map(Oid::new),
            order,
        }
    }

    #[test]
    fn push_leaves_original_untouched() {
        let root = AssignmentPath::root();
        let one = root.push(step("focus", Some("r1"), EvaluationOrder::DIRECT));
        let two = one.push(step(
            "r1",
            Some("r2"),
            EvaluationOrder::DIRECT.for_inducement(1),
        ));

        assert!(root.is_empty());
        assert_eq!(one.len(), 1);
        assert_eq!(two.len(), 2);
        assert_eq!(one.last().map(|s| s.source.clone()), Some(Oid::new("focus")));
    }

    #[test]
    fn sibling_branches_are_independent() {
        let root = AssignmentPath::root();
        let trunk = root.push(step("focus", Some("r1"), EvaluationOrder::DIRECT));
        let left = trunk.push(step(
            "r1",
            Some("a"),
            EvaluationOrder::DIRECT.for_inducement(1),
        ));
        let right = trunk.push(step(
            "r1",
            Some("b"),
            EvaluationOrder::DIRECT.for_inducement(1),
        ));

        assert_eq!(left.last().and_then(|s| s.target.clone()), Some(Oid::new("a")));
        assert_eq!(right.last().and_then(|s| s.target.clone()), Some(Oid::new("b")));
        assert_eq!(trunk.len(), 1);
    }

    #[test]
    fn cycle_detection_sees_every_visited_source() {
        let path = AssignmentPath::root()
            .push(step("focus", Some("r1"), EvaluationOrder::DIRECT))
            .push(step("r1", Some("r2"), EvaluationOrder::DIRECT.for_inducement(1)));
        assert!(path.contains_source(&Oid::new("focus")));
        assert!(path.contains_source(&Oid::new("r1")));
        assert!(!path.contains_source(&Oid::new("r2")));
    }

    #[test]
    fn inducement_order_arithmetic() {
        let direct = EvaluationOrder::DIRECT;
        assert!(direct.is_matching());
        assert!(direct.is_matching_for_target());

        // Plain inducement of order one: payload behaves as if assigned
        // directly.
        let induced = direct.for_inducement(1);
        assert!(induced.is_matching());
        assert!(induced.is_matching_for_target());

        // Metarole: an assignment edge away, then an inducement of order
        // two lands back at the focus level.
        let meta = direct.for_assignment_edge();
        assert!(!meta.is_matching());
        assert!(!meta.is_matching_for_target());
        let meta_payload = meta.for_inducement(2);
        assert!(meta_payload.is_matching());
        assert!(meta_payload.is_matching_for_target());

        // An inducement of order two directly on an assigned role applies
        // one level above the focus, not to the focus.
        assert!(!direct.for_inducement(2).is_matching());
    }

    #[test]
    fn zero_target_order_counting() {
        // focus -> captain (target order 0) -> sailor via inducement of
        // order one (target order 0 again): two zero-order segments.
        let captain = AssignmentPath::root().push(step(
            "focus",
            Some("captain"),
            EvaluationOrder::DIRECT,
        ));
        let sailor = captain.push(step(
            "captain",
            Some("sailor"),
            EvaluationOrder::DIRECT.for_inducement(1),
        ));
        assert_eq!(captain.zero_target_order_count(), 1);
        assert_eq!(sailor.zero_target_order_count(), 2);

        // focus -> captain -> metarole via assignment (target order 1):
        // still exactly one zero-order segment.
        let meta = captain.push(step(
            "captain",
            Some("meta"),
            EvaluationOrder::DIRECT.for_assignment_edge(),
        ));
        assert_eq!(meta.zero_target_order_count(), 1);
    }
}
