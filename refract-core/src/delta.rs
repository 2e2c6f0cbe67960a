// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deltas over focus items and resource objects, and the structural
//! equivalence checks used to detect repeated conflicting executions.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::object::{Oid, ResourceObject};

/// Prefix of item paths addressing resource object attributes inside a
/// modify delta. Everything else (activation, metadata) is not considered
/// by the equivalence checks.
pub const ATTRIBUTE_PREFIX: &str = "attributes/";

/// A change to one multi-valued item. `replace` wins over `add`/`delete`
/// when present.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ItemDelta {
    pub item: String,
    pub add: BTreeSet<String>,
    pub delete: BTreeSet<String>,
    pub replace: Option<BTreeSet<String>>,
}

impl ItemDelta {
    pub fn add_values(item: impl Into<String>, values: impl IntoIterator<Item = String>) -> Self {
        Self {
            item: item.into(),
            add: values.into_iter().collect(),
            delete: BTreeSet::new(),
            replace: None,
        }
    }

    pub fn delete_values(
        item: impl Into<String>,
        values: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            item: item.into(),
            add: BTreeSet::new(),
            delete: values.into_iter().collect(),
            replace: None,
        }
    }

    pub fn replace_values(
        item: impl Into<String>,
        values: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            item: item.into(),
            add: BTreeSet::new(),
            delete: BTreeSet::new(),
            replace: Some(values.into_iter().collect()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.delete.is_empty() && self.replace.is_none()
    }

    /// Whether this delta addresses a resource object attribute.
    pub fn is_attribute(&self) -> bool {
        self.item.starts_with(ATTRIBUTE_PREFIX)
    }

    /// Apply onto an item map.
    pub fn apply_to(&self, items: &mut BTreeMap<String, BTreeSet<String>>) {
        if let Some(replace) = &self.replace {
            if replace.is_empty() {
                items.remove(&self.item);
            } else {
                items.insert(self.item.clone(), replace.clone());
            }
            return;
        }
        let values = items.entry(self.item.clone()).or_default();
        for value in &self.delete {
            values.remove(value);
        }
        values.extend(self.add.iter().cloned());
        if values.is_empty() {
            items.remove(&self.item);
        }
    }
}

/// A change to one object: creation, modification or deletion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObjectDelta {
    Add { object: ResourceObject },
    Modify { oid: Oid, modifications: Vec<ItemDelta> },
    Delete { oid: Oid },
}

impl ObjectDelta {
    pub fn is_add(&self) -> bool {
        matches!(self, ObjectDelta::Add { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, ObjectDelta::Delete { .. })
    }

    /// A modify delta without modifications changes nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            ObjectDelta::Modify { modifications, .. } => {
                modifications.iter().all(ItemDelta::is_empty)
            }
            _ => false,
        }
    }
}

/// Structural equivalence of two add deltas: both objects carry a non-empty
/// attribute set and the sets are pointwise equal. Objects without any
/// attributes are a suspicious case and never considered equivalent.
pub fn equivalent_add_deltas(first: &ResourceObject, second: &ResourceObject) -> bool {
    if first.attributes.is_empty() || second.attributes.is_empty() {
        return false;
    }
    first.attributes == second.attributes
}

/// Structural equivalence of two modify deltas: unordered equality of their
/// attribute-scoped item deltas. Differences outside the attribute space
/// (metadata, activation) do not make two attempts distinct.
pub fn equivalent_modify_deltas(first: &[ItemDelta], second: &[ItemDelta]) -> bool {
    let attrs = |deltas: &[ItemDelta]| -> Vec<ItemDelta> {
        let mut attrs: Vec<ItemDelta> = deltas
            .iter()
            .filter(|delta| delta.is_attribute())
            .cloned()
            .collect();
        attrs.sort();
        attrs
    };
    attrs(first) == attrs(second)
}

/// Structural equivalence of two object deltas, used to detect a repeated
/// "already exists" conflict. Deltas of different kinds are never
/// equivalent.
pub fn equivalent_deltas(first: &ObjectDelta, second: &ObjectDelta) -> bool {
    match (first, second) {
        (ObjectDelta::Add { object: a }, ObjectDelta::Add { object: b }) => {
            equivalent_add_deltas(a, b)
        }
        (
            ObjectDelta::Modify {
                modifications: a, ..
            },
            ObjectDelta::Modify {
                modifications: b, ..
            },
        ) => equivalent_modify_deltas(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_with(attribute: &str, value: &str) -> ResourceObject {
        let mut object = ResourceObject::new("r-1");
        object
            .attributes
            .insert(attribute.to_string(), BTreeSet::from([value.to_string()]));
        object
    }

    #[test]
    fn item_delta_apply() {
        let mut items = BTreeMap::new();
        ItemDelta::add_values("mail", ["ada@example.org".to_string()]).apply_to(&mut items);
        assert_eq!(
            items.get("mail"),
            Some(&BTreeSet::from(["ada@example.org".to_string()]))
        );

        ItemDelta::delete_values("mail", ["ada@example.org".to_string()]).apply_to(&mut items);
        assert!(items.get("mail").is_none());

        ItemDelta::replace_values("mail", ["new@example.org".to_string()]).apply_to(&mut items);
        assert_eq!(
            items.get("mail"),
            Some(&BTreeSet::from(["new@example.org".to_string()]))
        );
    }

    #[test]
    fn empty_modify_delta() {
        let delta = ObjectDelta::Modify {
            oid: Oid::new("s-1"),
            modifications: vec![],
        };
        assert!(delta.is_empty());
        assert!(!ObjectDelta::Delete { oid: Oid::new("s-1") }.is_empty());
    }

    #[test]
    fn add_equivalence_requires_attributes() {
        let with = object_with("uid", "ada");
        let without = ResourceObject::new("r-1");
        assert!(equivalent_add_deltas(&with, &with.clone()));
        assert!(!equivalent_add_deltas(&with, &without));
        assert!(!equivalent_add_deltas(&without, &without.clone()));
    }

    #[test]
    fn add_equivalence_pointwise() {
        let a = object_with("uid", "ada");
        let b = object_with("uid", "grace");
        assert!(!equivalent_add_deltas(&a, &b));
    }

    #[test]
    fn modify_equivalence_ignores_metadata() {
        let attr = ItemDelta::add_values("attributes/uid", ["ada".to_string()]);
        let meta = ItemDelta::replace_values("metadata/sync_token", ["t-1".to_string()]);
        let a = vec![attr.clone(), meta];
        let b = vec![attr];
        assert!(equivalent_modify_deltas(&a, &b));
    }

    #[test]
    fn modify_equivalence_is_unordered() {
        let one = ItemDelta::add_values("attributes/uid", ["ada".to_string()]);
        let two = ItemDelta::add_values("attributes/mail", ["ada@example.org".to_string()]);
        let a = vec![one.clone(), two.clone()];
        let b = vec![two, one];
        assert!(equivalent_modify_deltas(&a, &b));
    }

    #[test]
    fn object_delta_serde() {
        let delta = ObjectDelta::Modify {
            oid: Oid::new("s-1"),
            modifications: vec![ItemDelta::add_values("attributes/uid", ["ada".to_string()])],
        };
        let json = serde_json::to_string(&delta).expect("serialization failed");
        let back: ObjectDelta = serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(delta, back);
    }

    #[test]
    fn different_delta_kinds_not_equivalent() {
        let add = ObjectDelta::Add {
            object: object_with("uid", "ada"),
        };
        let delete = ObjectDelta::Delete { oid: Oid::new("s-1") };
        assert!(!equivalent_deltas(&add, &delete));
    }
}
