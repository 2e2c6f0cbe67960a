// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory doubles for the boundary traits, used by the engine tests.

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};

use crate::assignment::PolicyRuleSpec;
use crate::delta::{ItemDelta, ObjectDelta};
use crate::error::EngineError;
use crate::object::{Oid, PolicyObject, ResourceObject};
use crate::resource::{Discriminator, ResourceDef};
use crate::traits::{
    Clock, DeltaExecutor, FocusRepository, HookPhase, LinkChange, ObjectResolver, PolicyRuleSink,
    ReconciliationHook, RuleScope, Timestamp,
};

/// A clock whose "now" is set by the test.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Timestamp>,
}

impl ManualClock {
    pub fn at(now: Timestamp) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Timestamp) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}

/// Map-backed object resolver.
#[derive(Debug, Default)]
pub struct InMemoryResolver {
    policy_objects: HashMap<Oid, PolicyObject>,
    resources: HashMap<Oid, ResourceDef>,
}

impl InMemoryResolver {
    pub fn with_policy_object(mut self, object: PolicyObject) -> Self {
        self.policy_objects.insert(object.oid.clone(), object);
        self
    }

    pub fn with_resource(mut self, resource: ResourceDef) -> Self {
        self.resources.insert(resource.oid.clone(), resource);
        self
    }
}

impl ObjectResolver for InMemoryResolver {
    fn resolve_policy_object(&self, oid: &Oid) -> Result<PolicyObject, EngineError> {
        self.policy_objects
            .get(oid)
            .cloned()
            .ok_or_else(|| EngineError::ObjectNotFound(oid.clone()))
    }

    fn resolve_resource(&self, oid: &Oid) -> Result<ResourceDef, EngineError> {
        self.resources
            .get(oid)
            .cloned()
            .ok_or_else(|| EngineError::ObjectNotFound(oid.clone()))
    }
}

/// One scripted connector response.
#[derive(Clone, Debug)]
pub enum ConnectorStep {
    /// Apply the delta against the in-memory store and succeed.
    Succeed,
    /// Fail with the given error without touching the store.
    Fail(EngineError),
}

/// Connector double: applies deltas against an in-memory object store,
/// optionally failing according to a script. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    script: VecDeque<ConnectorStep>,
    objects: HashMap<Discriminator, ResourceObject>,
    next_oid: u64,
    pub calls: Vec<(Discriminator, ObjectDelta)>,
}

impl ScriptedConnector {
    /// Without a script every call succeeds.
    pub fn scripted(steps: impl IntoIterator<Item = ConnectorStep>) -> Self {
        Self {
            script: steps.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Pre-populate the in-memory store, for tests starting from an
    /// already-provisioned state.
    pub fn with_object(mut self, discriminator: Discriminator, object: ResourceObject) -> Self {
        self.objects.insert(discriminator, object);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    pub fn object(&self, discriminator: &Discriminator) -> Option<&ResourceObject> {
        self.objects.get(discriminator)
    }
}

impl DeltaExecutor for ScriptedConnector {
    fn execute(
        &mut self,
        discriminator: &Discriminator,
        delta: &ObjectDelta,
    ) -> Result<Option<ResourceObject>, EngineError> {
        self.calls.push((discriminator.clone(), delta.clone()));

        if let Some(ConnectorStep::Fail(error)) = self.script.front() {
            let error = error.clone();
            self.script.pop_front();
            return Err(error);
        }
        self.script.pop_front();

        match delta {
            ObjectDelta::Add { object } => {
                let mut created = object.clone();
                if created.oid.is_none() {
                    self.next_oid += 1;
                    created.oid = Some(Oid::new(format!("shadow-{}", self.next_oid)));
                }
                self.objects.insert(discriminator.clone(), created.clone());
                Ok(Some(created))
            }
            ObjectDelta::Modify { modifications, .. } => {
                let object = self.objects.get_mut(discriminator).ok_or_else(|| {
                    EngineError::ObjectNotFound(discriminator.resource.clone())
                })?;
                for modification in modifications {
                    if let Some(attribute) =
                        modification.item.strip_prefix(crate::delta::ATTRIBUTE_PREFIX)
                    {
                        let mut scoped = modification.clone();
                        scoped.item = attribute.to_string();
                        scoped.apply_to(&mut object.attributes);
                    }
                }
                Ok(Some(object.clone()))
            }
            ObjectDelta::Delete { .. } => {
                self.objects.remove(discriminator);
                Ok(None)
            }
        }
    }
}

/// Records every collected policy rule.
#[derive(Debug, Default)]
pub struct RecordingRuleSink {
    pub collected: Vec<(PolicyRuleSpec, RuleScope, Oid)>,
}

impl RecordingRuleSink {
    pub fn rules_with_scope(&self, scope: RuleScope) -> Vec<&PolicyRuleSpec> {
        self.collected
            .iter()
            .filter(|(_, s, _)| *s == scope)
            .map(|(rule, _, _)| rule)
            .collect()
    }
}

impl PolicyRuleSink for RecordingRuleSink {
    fn collect(&mut self, rule: &PolicyRuleSpec, scope: RuleScope, source: &Oid) {
        self.collected.push((rule.clone(), scope, source.clone()));
    }
}

/// Records focus writes and link changes.
#[derive(Debug, Default)]
pub struct RecordingRepository {
    pub focus_deltas: Vec<(Oid, Vec<ItemDelta>)>,
    pub link_changes: Vec<(Oid, LinkChange)>,
}

impl FocusRepository for RecordingRepository {
    fn apply_focus_deltas(
        &mut self,
        focus: &Oid,
        deltas: &[ItemDelta],
    ) -> Result<(), EngineError> {
        self.focus_deltas.push((focus.clone(), deltas.to_vec()));
        Ok(())
    }

    fn update_link(&mut self, focus: &Oid, change: LinkChange) -> Result<(), EngineError> {
        self.link_changes.push((focus.clone(), change));
        Ok(())
    }
}

/// Records hook invocations.
#[derive(Debug, Default)]
pub struct RecordingHook {
    pub runs: Vec<(HookPhase, Discriminator)>,
}

impl ReconciliationHook for RecordingHook {
    fn run(
        &mut self,
        phase: HookPhase,
        discriminator: &Discriminator,
        _delta: Option<&ObjectDelta>,
    ) -> Result<(), EngineError> {
        self.runs.push((phase, discriminator.clone()));
        Ok(())
    }
}
