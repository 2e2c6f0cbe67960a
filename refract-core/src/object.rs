// SPDX-License-Identifier: MIT OR Apache-2.0

//! Focus objects, policy objects and resource objects.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assignment::{Assignment, Condition};

/// Object identifier, unique across all object kinds.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Oid(pub String);

impl Oid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Oid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Kind of a focus object.
///
/// Not every focus kind has a linkage concept. Roles and orgs are focus
/// objects in their own right (they can carry assignments) but they do not
/// own focus-to-projection links.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FocusKind {
    User,
    Service,
    Role,
    Org,
}

impl FocusKind {
    /// Whether objects of this kind maintain references to their
    /// projections.
    pub fn has_linkage(&self) -> bool {
        matches!(self, FocusKind::User | FocusKind::Service)
    }
}

/// The canonical identity record driving a change cycle.
///
/// Item values are multi-valued and unordered; single-valued items are
/// simply items holding at most one value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FocusObject {
    pub oid: Oid,
    pub kind: FocusKind,
    pub name: String,
    pub items: BTreeMap<String, BTreeSet<String>>,
    pub assignments: Vec<Assignment>,
    /// References to linked projections, maintained by the link updater.
    pub links: BTreeSet<Oid>,
    /// Identity data derived from inbound processing, current values and
    /// previously recorded history.
    pub identities: Vec<IdentityRecord>,
}

impl FocusObject {
    pub fn new(oid: impl Into<Oid>, kind: FocusKind, name: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            kind,
            name: name.into(),
            items: Default::default(),
            assignments: Default::default(),
            links: Default::default(),
            identities: Default::default(),
        }
    }

    pub fn item_values(&self, item: &str) -> Option<&BTreeSet<String>> {
        self.items.get(item)
    }
}

impl From<String> for Oid {
    fn from(value: String) -> Self {
        Oid(value)
    }
}

/// One recorded identity value for a focus item, together with the
/// projection it came from. `current` distinguishes the present value from
/// history kept for correlation purposes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub item: String,
    pub values: BTreeSet<String>,
    pub source: Oid,
    pub current: bool,
}

/// Kind of an assignment target.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PolicyObjectKind {
    Role,
    Org,
    Archetype,
}

/// An assignable object: a role, org or archetype.
///
/// Policy objects carry their own assignments (typically to metaroles) and
/// inducements (payload handed down to whoever is assigned this object).
/// An optional condition gates the whole object: when it evaluates to false
/// the object contributes nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyObject {
    pub oid: Oid,
    pub kind: PolicyObjectKind,
    pub name: String,
    pub condition: Option<Condition>,
    /// Assignments of this object itself, e.g. to a metarole.
    pub assignments: Vec<Assignment>,
    /// Inducements: assignments handed down to holders of this object. The
    /// inducement order on each entry says how many levels up the payload
    /// applies.
    pub inducements: Vec<Assignment>,
}

impl PolicyObject {
    pub fn new(oid: impl Into<Oid>, kind: PolicyObjectKind, name: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            kind,
            name: name.into(),
            condition: None,
            assignments: Default::default(),
            inducements: Default::default(),
        }
    }
}

/// State of a projection's object on the target system, as far as it is
/// known locally.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    pub oid: Option<Oid>,
    pub resource: Oid,
    pub attributes: BTreeMap<String, BTreeSet<String>>,
    /// Tombstone flag: the object is known to have been deleted on the
    /// target but its local record is still around.
    pub dead: bool,
}

impl ResourceObject {
    pub fn new(resource: impl Into<Oid>) -> Self {
        Self {
            oid: None,
            resource: resource.into(),
            attributes: Default::default(),
            dead: false,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.attributes.get(name)
    }
}

/// Liveness of a projection's object, snapshotted before and updated after
/// delta execution.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Liveness {
    /// The object exists on the target.
    Live,
    /// The object was deleted on the target; a dead local record remains.
    Tombstone,
    /// No local record of the object at all.
    Absent,
}

impl Liveness {
    pub fn of(object: Option<&ResourceObject>) -> Self {
        match object {
            Some(object) if object.dead => Liveness::Tombstone,
            Some(_) => Liveness::Live,
            None => Liveness::Absent,
        }
    }
}
