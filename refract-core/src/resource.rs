// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resource definitions: the locally known shape of a target system.

use serde::{Deserialize, Serialize};

use crate::object::Oid;

/// Definition of a target system, as far as the engine needs to know it:
/// inbound mappings feeding the focus, and identifier dependencies on other
/// resources which force wave ordering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub oid: Oid,
    pub name: String,
    /// Resources whose projections must be provisioned first, e.g. because
    /// this resource's identifier is derived from them.
    pub dependencies: Vec<Oid>,
    pub inbound: Vec<InboundMappingSpec>,
}

impl ResourceDef {
    pub fn new(oid: impl Into<Oid>, name: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            name: name.into(),
            dependencies: Vec::new(),
            inbound: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, resource: impl Into<Oid>) -> Self {
        self.dependencies.push(resource.into());
        self
    }

    pub fn with_inbound(mut self, mapping: InboundMappingSpec) -> Self {
        self.inbound.push(mapping);
        self
    }
}

/// Identifies one projection of a focus object: the target system, the
/// object flavour on it, and the order (zero for the primary object,
/// higher for secondary aspects derived after it).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Discriminator {
    pub resource: Oid,
    pub tag: Option<String>,
    pub order: u32,
}

impl Discriminator {
    pub fn new(resource: impl Into<Oid>) -> Self {
        Self {
            resource: resource.into(),
            tag: None,
            order: 0,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }
}

impl std::fmt::Display for Discriminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.resource)?;
        if let Some(tag) = &self.tag {
            write!(f, "/{tag}")?;
        }
        if self.order > 0 {
            write!(f, "#{}", self.order)?;
        }
        Ok(())
    }
}

/// An inbound mapping: values of one projection attribute flow into one
/// focus item. Several resources may feed the same item; the combiner says
/// how their outputs are merged, which is why inbound evaluation is grouped
/// by target item rather than done per projection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundMappingSpec {
    pub source_attribute: String,
    pub target_item: String,
    pub combiner: InboundCombiner,
}

/// How outputs from several projections feeding the same focus item are
/// combined.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum InboundCombiner {
    /// The first projection (in context order) producing any value wins.
    FirstNonEmpty,
    /// Union of all produced values.
    Union,
}
