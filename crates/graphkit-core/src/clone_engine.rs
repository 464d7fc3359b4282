//! Recursive Clone Engine
//!
//! Deep-copies the graph reachable from a root node. The [`IdentityMap`]
//! guarantees at most one clone per original instance: shared references
//! stay shared in the copy and cycles terminate. A shell is registered
//! before any of its attributes is populated, so a back-reference observes
//! the in-progress clone.
//!
//! Failures on a single attribute are logged and recorded in the
//! [`CloneReport`]; the attribute is left at its default and cloning goes on.

use std::collections::HashMap;
use std::time::Instant;

use crate::descriptor::{AttributeDescriptor, ContainerKind, Registry};
use crate::errors::{ExError, ExErrorKind, GraphError, Result};
use crate::node::{node_addr, NodeKey, NodeRef};
use crate::types::schema::{EVENT_CLONE_ATTRIBUTE_FAILED, EVENT_CLONE_FALLBACK_USED};
use crate::value::{MapKey, OpaqueRef, Value};
use crate::{log_op_end, log_op_error, log_op_start};

/// Original-to-clone table keyed by instance identity
///
/// Lives for one top-level clone call and must not be shared between
/// concurrent calls.
#[derive(Default)]
pub struct IdentityMap {
    // The original is held so its address cannot be reused while mapped
    entries: HashMap<usize, (NodeRef, NodeRef)>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The clone registered for `original`, if any
    pub fn get(&self, original: &NodeRef) -> Option<NodeRef> {
        self.entries
            .get(&node_addr(original))
            .map(|(_, clone)| clone.clone())
    }

    pub fn contains(&self, original: &NodeRef) -> bool {
        self.entries.contains_key(&node_addr(original))
    }

    fn register(&mut self, original: &NodeRef, clone: &NodeRef) {
        self.entries
            .insert(node_addr(original), (original.clone(), clone.clone()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An attribute left at its default because reading or writing it failed
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeFailure {
    pub type_name: String,
    pub attribute: String,
    pub error: GraphError,
}

/// An opaque value copied through the marshal/unmarshal round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackUse {
    pub owner_type: String,
    pub attribute: String,
    pub value_type: String,
}

/// Outcome of one clone call besides the clone itself
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloneReport {
    /// Shells created, i.e. distinct originals visited
    pub cloned_nodes: usize,
    pub attribute_failures: Vec<AttributeFailure>,
    pub fallbacks: Vec<FallbackUse>,
}

impl CloneReport {
    /// No attribute failed and no fallback was needed
    pub fn is_clean(&self) -> bool {
        self.attribute_failures.is_empty() && self.fallbacks.is_empty()
    }

    /// Each fallback use as a `CloneFallbackUsed` diagnostic
    pub fn diagnostics(&self) -> Vec<ExError> {
        self.fallbacks
            .iter()
            .map(|f| {
                ExError::new(ExErrorKind::CloneFallbackUsed)
                    .with_op("clone")
                    .with_type_name(&f.owner_type)
                    .with_segment(&f.attribute)
                    .with_message(format!(
                        "{} copied through marshal/unmarshal; identity not preserved",
                        f.value_type
                    ))
            })
            .collect()
    }
}

/// Deep clone over a shared descriptor registry
pub struct CloneEngine<'r> {
    registry: &'r Registry,
}

impl<'r> CloneEngine<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Clone the graph reachable from `root`
    ///
    /// # Errors
    ///
    /// Returns `NotCloneable` if `root` itself has neither a constructor nor
    /// a shallow-copy contract. Failures below the root are absorbed.
    pub fn clone_node(&self, root: &NodeRef) -> Result<NodeRef> {
        self.clone_with_report(root).map(|(clone, _)| clone)
    }

    /// Clone the graph reachable from `root`, reporting absorbed failures
    ///
    /// # Errors
    ///
    /// See [`CloneEngine::clone_node`].
    pub fn clone_with_report(&self, root: &NodeRef) -> Result<(NodeRef, CloneReport)> {
        let key = node_key(root)?;
        log_op_start!("clone", type_name = key.name());
        let start = Instant::now();

        let mut identity = IdentityMap::new();
        let mut report = CloneReport::default();
        let clone = self
            .clone_recursive(root, &mut identity, &mut report)
            .map_err(|e| {
                log_op_error!(
                    "clone",
                    e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    type_name = key.name()
                );
                e
            })?;

        log_op_end!(
            "clone",
            duration_ms = start.elapsed().as_millis() as u64,
            type_name = key.name(),
            cloned_nodes = report.cloned_nodes,
            failed_attributes = report.attribute_failures.len(),
            fallbacks = report.fallbacks.len()
        );
        Ok((clone, report))
    }

    /// Clone `root` against a caller-owned identity map
    ///
    /// Originals already in `identity` are not cloned again.
    ///
    /// # Errors
    ///
    /// See [`CloneEngine::clone_node`].
    pub fn clone_into(&self, root: &NodeRef, identity: &mut IdentityMap) -> Result<NodeRef> {
        let mut report = CloneReport::default();
        self.clone_recursive(root, identity, &mut report)
    }

    fn clone_recursive(
        &self,
        original: &NodeRef,
        identity: &mut IdentityMap,
        report: &mut CloneReport,
    ) -> Result<NodeRef> {
        if let Some(existing) = identity.get(original) {
            return Ok(existing);
        }

        let key = node_key(original)?;
        let (shell, shallow) = self.shell(original, &key)?;
        identity.register(original, &shell);
        report.cloned_nodes += 1;

        for desc in self
            .registry
            .attributes(&key)
            .into_iter()
            .filter(|d| d.writable())
        {
            if let Err(error) = self.clone_attribute(original, &shell, &desc, identity, report) {
                let ex: ExError = (&error).into();
                tracing::warn!(
                    component = module_path!(),
                    op = "clone",
                    event = EVENT_CLONE_ATTRIBUTE_FAILED,
                    type_name = key.name(),
                    attribute = desc.name(),
                    err.code = ex.code(),
                    message = %error,
                );
                // A shallow copy still holds the original's value
                if shallow {
                    if let Err(reset) = desc.set(&shell, Value::Null) {
                        tracing::warn!(
                            component = module_path!(),
                            op = "clone",
                            type_name = key.name(),
                            attribute = desc.name(),
                            message = %reset,
                            "shallow-copied attribute could not be reset",
                        );
                    }
                }
                report.attribute_failures.push(AttributeFailure {
                    type_name: key.name().to_string(),
                    attribute: desc.name().to_string(),
                    error,
                });
            }
        }

        Ok(shell)
    }

    // Constructor first, then the type's shallow-copy contract; the flag
    // marks a shallow copy
    fn shell(&self, original: &NodeRef, key: &NodeKey) -> Result<(NodeRef, bool)> {
        if let Some(shell) = self.registry.node_type(key).instantiate() {
            return Ok((shell, false));
        }
        let copy = original.try_borrow().ok().and_then(|node| node.shallow_copy());
        copy.map(|shell| (shell, true))
            .ok_or_else(|| GraphError::NotCloneable {
                type_name: key.name().to_string(),
            })
    }

    fn clone_attribute(
        &self,
        original: &NodeRef,
        shell: &NodeRef,
        desc: &AttributeDescriptor,
        identity: &mut IdentityMap,
        report: &mut CloneReport,
    ) -> Result<()> {
        let value = desc.get(original)?;
        if value.is_null() {
            return Ok(());
        }
        let cloned = self.clone_value(&value, desc, identity, report)?;
        desc.set(shell, cloned)
    }

    fn clone_value(
        &self,
        value: &Value,
        desc: &AttributeDescriptor,
        identity: &mut IdentityMap,
        report: &mut CloneReport,
    ) -> Result<Value> {
        match (value.container_kind(), value) {
            (ContainerKind::Node, Value::Node(node)) => {
                Ok(Value::Node(self.clone_recursive(node, identity, report)?))
            }
            (ContainerKind::List, Value::List(list)) => {
                let (mut copy, items) = {
                    let list = list.borrow();
                    (list.empty_like(), list.to_vec())
                };
                for item in &items {
                    copy.push(self.clone_element(item, identity, report)?);
                }
                Ok(Value::List(copy.into_ref()))
            }
            (ContainerKind::Map, Value::Map(map)) => {
                let (mut copy, entries) = {
                    let map = map.borrow();
                    (map.empty_like(), map.entries())
                };
                for (key, item) in entries {
                    let key = match key {
                        MapKey::Node(node) => MapKey::Node(self.clone_recursive(&node, identity, report)?),
                        other => other,
                    };
                    copy.insert(key, self.clone_element(&item, identity, report)?);
                }
                Ok(Value::Map(copy.into_ref()))
            }
            (ContainerKind::Array, Value::Array(array)) => Ok(Value::Array(array.duplicate())),
            (_, Value::Opaque(opaque)) => self.marshal_copy(opaque, desc, report),
            // Immutable scalars keep the reference
            _ => Ok(value.clone()),
        }
    }

    // List elements and map values: nodes are cloned, anything else is shared
    fn clone_element(
        &self,
        item: &Value,
        identity: &mut IdentityMap,
        report: &mut CloneReport,
    ) -> Result<Value> {
        match item {
            Value::Node(node) => Ok(Value::Node(self.clone_recursive(node, identity, report)?)),
            other => Ok(other.clone()),
        }
    }

    // The copy is not registered in the identity map
    fn marshal_copy(
        &self,
        opaque: &OpaqueRef,
        desc: &AttributeDescriptor,
        report: &mut CloneReport,
    ) -> Result<Value> {
        let bytes = opaque.marshal()?;
        let copy = opaque.unmarshal(&bytes)?;

        let owner = desc.owner().name();
        tracing::warn!(
            component = module_path!(),
            op = "clone",
            event = EVENT_CLONE_FALLBACK_USED,
            type_name = owner,
            attribute = desc.name(),
            value_type = opaque.type_name(),
            err.code = ExErrorKind::CloneFallbackUsed.code(),
        );
        report.fallbacks.push(FallbackUse {
            owner_type: owner.to_string(),
            attribute: desc.name().to_string(),
            value_type: opaque.type_name().to_string(),
        });
        Ok(Value::Opaque(copy))
    }
}

fn node_key(node: &NodeRef) -> Result<NodeKey> {
    node.try_borrow()
        .map(|n| n.node_key())
        .map_err(|e| GraphError::AccessFailed {
            type_name: "<borrowed>".to_string(),
            attribute: String::new(),
            reason: e.to_string(),
        })
}
