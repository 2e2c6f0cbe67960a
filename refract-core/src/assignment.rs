// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assignments and the payload they carry: constructions, focus mappings
//! and policy rules.
//!
//! These types describe already-parsed policy. Authoring, schema handling
//! and expression languages are out of scope; the only expressions known
//! here are literals and item references, which is all the engine needs to
//! evaluate mappings deterministically.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::object::{FocusObject, Oid};
use crate::traits::Timestamp;

pub type AssignmentId = u64;

/// One policy edge: grants the holder a target (role, org) and/or carries
/// payload (a construction, focus mappings, a policy rule).
///
/// The same type serves as a direct assignment on a focus object and as an
/// inducement on a policy object; for inducements the `order` field says
/// how many levels up the payload applies (1 = to the direct holder).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub target: Option<Oid>,
    pub construction: Option<Construction>,
    pub focus_mappings: Vec<MappingSpec>,
    pub policy_rule: Option<PolicyRuleSpec>,
    pub condition: Option<Condition>,
    pub validity: Option<ValidityWindow>,
    /// Administratively disabled assignments are never active, regardless
    /// of validity.
    pub disabled: bool,
    /// Inducement order; meaningful only when this assignment appears in a
    /// policy object's inducement list.
    pub order: u32,
}

impl Assignment {
    pub fn new(id: AssignmentId) -> Self {
        Self {
            id,
            target: None,
            construction: None,
            focus_mappings: Vec::new(),
            policy_rule: None,
            condition: None,
            validity: None,
            disabled: false,
            order: 1,
        }
    }

    pub fn with_target(mut self, target: impl Into<Oid>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_construction(mut self, construction: Construction) -> Self {
        self.construction = Some(construction);
        self
    }

    pub fn with_policy_rule(mut self, rule: PolicyRuleSpec) -> Self {
        self.policy_rule = Some(rule);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    /// Whether the assignment is active at the given instant: not disabled
    /// and inside its validity window (if any).
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        if self.disabled {
            return false;
        }
        match &self.validity {
            Some(window) => window.contains(now),
            None => true,
        }
    }
}

/// Validity window of an assignment, in milliseconds since the epoch.
/// Either bound may be open.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
}

impl ValidityWindow {
    pub fn contains(&self, now: Timestamp) -> bool {
        self.from.is_none_or(|from| from <= now) && self.to.is_none_or(|to| now < to)
    }
}

/// Assignment or policy-object condition, evaluated against a focus state.
///
/// Conditions arrive here already parsed. They are evaluated twice per
/// segment, once against the old and once against the new focus state, so
/// that a condition becoming true (or false) mid-change is visible as
/// "will become active" (or inactive).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Always,
    Never,
    /// True when the focus item holds the given value.
    ItemHasValue { item: String, value: String },
    /// True when the focus item holds at least one value.
    ItemPresent { item: String },
}

impl Condition {
    pub fn evaluate(&self, focus: Option<&FocusObject>) -> bool {
        let Some(focus) = focus else {
            // No focus state at all (object being added or deleted): only
            // the constant conditions can hold.
            return matches!(self, Condition::Always);
        };
        match self {
            Condition::Always => true,
            Condition::Never => false,
            Condition::ItemHasValue { item, value } => focus
                .item_values(item)
                .is_some_and(|values| values.contains(value)),
            Condition::ItemPresent { item } => {
                focus.item_values(item).is_some_and(|values| !values.is_empty())
            }
        }
    }
}

/// Specification of how to build or modify a projection, or how to derive
/// a persona focus object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Construction {
    Resource(ResourceConstruction),
    Persona(PersonaConstruction),
}

/// Resource object construction: which resource, which object flavour on
/// it, and how to populate its attributes from the focus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceConstruction {
    pub resource: Oid,
    /// Distinguishes several object flavours on the same resource, e.g.
    /// "default" accounts from "admin" accounts.
    pub tag: Option<String>,
    /// Zero for the primary object, higher for secondary aspects derived
    /// after it (e.g. entitlements).
    pub order: u32,
    pub attributes: Vec<AttributeMapping>,
    pub description: Option<String>,
}

impl ResourceConstruction {
    pub fn new(resource: impl Into<Oid>) -> Self {
        Self {
            resource: resource.into(),
            tag: None,
            order: 0,
            attributes: Vec::new(),
            description: None,
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>, expr: MappingExpr) -> Self {
        self.attributes.push(AttributeMapping {
            attribute: attribute.into(),
            expr,
        });
        self
    }
}

/// Persona construction: requests a secondary focus object of the given
/// archetype linked to the primary focus. Personas are collected by the
/// engine and reported to the caller; their materialization is a focus
/// operation of its own, outside a single change cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonaConstruction {
    pub archetype: Oid,
    pub description: Option<String>,
}

/// One outbound attribute mapping inside a resource construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeMapping {
    pub attribute: String,
    pub expr: MappingExpr,
}

/// Focus-level mapping carried by an assignment: produces values for one
/// focus item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MappingSpec {
    pub name: String,
    pub target_item: String,
    pub expr: MappingExpr,
}

/// The expression of a mapping, already parsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MappingExpr {
    /// Constant values.
    Literal(BTreeSet<String>),
    /// Copy the values of a focus item.
    SourceItem(String),
    /// Copy the focus name.
    FocusName,
}

impl MappingExpr {
    /// Evaluate against a focus state. A missing focus or missing source
    /// item yields no values, not an error.
    pub fn evaluate(&self, focus: Option<&FocusObject>) -> BTreeSet<String> {
        match self {
            MappingExpr::Literal(values) => values.clone(),
            MappingExpr::SourceItem(item) => focus
                .and_then(|focus| focus.item_values(item))
                .cloned()
                .unwrap_or_default(),
            MappingExpr::FocusName => focus
                .map(|focus| BTreeSet::from([focus.name.clone()]))
                .unwrap_or_default(),
        }
    }

    pub fn literal<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        MappingExpr::Literal(values.into_iter().map(Into::into).collect())
    }
}

/// A policy rule specification attached to an assignment. The rule content
/// is opaque to the engine; the engine only decides whether and with which
/// scope a rule is collected, and hands it to the policy-rule sink for
/// downstream approval and SoD processing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyRuleSpec {
    pub name: String,
    pub documentation: Option<String>,
}

impl PolicyRuleSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documentation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::object::FocusKind;

    #[test]
    fn validity_window_bounds() {
        let window = ValidityWindow {
            from: Some(100),
            to: Some(200),
        };
        assert!(!window.contains(99));
        assert!(window.contains(100));
        assert!(window.contains(199));
        assert!(!window.contains(200));

        let open = ValidityWindow {
            from: None,
            to: None,
        };
        assert!(open.contains(0));
    }

    #[test]
    fn disabled_assignment_is_never_active() {
        let mut assignment = Assignment::new(1);
        assert!(assignment.is_active_at(0));
        assignment.disabled = true;
        assert!(!assignment.is_active_at(0));
    }

    #[test]
    fn condition_against_missing_focus() {
        assert!(Condition::Always.evaluate(None));
        assert!(!Condition::Never.evaluate(None));
        let condition = Condition::ItemPresent {
            item: "department".into(),
        };
        assert!(!condition.evaluate(None));
    }

    #[test]
    fn condition_on_item_value() {
        let mut focus = FocusObject::new("u-1", FocusKind::User, "ada");
        focus.items = BTreeMap::from([(
            "department".to_string(),
            BTreeSet::from(["engineering".to_string()]),
        )]);
        let condition = Condition::ItemHasValue {
            item: "department".into(),
            value: "engineering".into(),
        };
        assert!(condition.evaluate(Some(&focus)));
        let other = Condition::ItemHasValue {
            item: "department".into(),
            value: "sales".into(),
        };
        assert!(!other.evaluate(Some(&focus)));
    }
}
