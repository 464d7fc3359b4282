//! Attribute Descriptor Resolver
//!
//! `Registry::describe` pairs a type's declared accessors into an
//! [`AttributeDescriptor`] and memoizes it per `(type, attribute)`. The
//! registry is shared across threads; descriptor computation is idempotent,
//! so concurrent callers may race on the cache and the last writer wins.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::errors::{GraphError, Result};
use crate::node::{
    attribute_name, capitalize, AccessorFn, GetterFn, NodeKey, NodeRef, NodeSchema, NodeType,
    SetterFn, TypeRef,
};
use crate::relationship::{NoRelationshipMetadata, RelationshipKind, RelationshipMetadata};
use crate::value::Value;

/// Getter prefixes, in resolution order
const GETTER_PREFIXES: [&str; 3] = ["get", "is", "are"];

/// Shape classification of an attribute's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Scalar,
    List,
    Map,
    Array,
    Node,
}

impl ContainerKind {
    /// Classification rule shared by declared types and runtime values
    ///
    /// Priority: sequence, mapping, primitive array, node, scalar.
    pub fn classify(
        is_sequence: bool,
        is_mapping: bool,
        is_primitive_array: bool,
        is_node: bool,
    ) -> Self {
        if is_sequence {
            ContainerKind::List
        } else if is_mapping {
            ContainerKind::Map
        } else if is_primitive_array {
            ContainerKind::Array
        } else if is_node {
            ContainerKind::Node
        } else {
            ContainerKind::Scalar
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, ContainerKind::List | ContainerKind::Map)
    }
}

/// Metadata for one attribute of one node type
#[derive(Clone)]
pub struct AttributeDescriptor {
    name: String,
    owner: NodeKey,
    owner_name: &'static str,
    getter_name: String,
    declared_type: TypeRef,
    container_kind: ContainerKind,
    key_type: Option<TypeRef>,
    element_type: Option<TypeRef>,
    relationship: Option<RelationshipKind>,
    getter: GetterFn,
    setter: Option<SetterFn>,
}

impl AttributeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> NodeKey {
        self.owner
    }

    /// Name of the getter that matched, e.g. `isActive`
    pub fn getter_name(&self) -> &str {
        &self.getter_name
    }

    pub fn declared_type(&self) -> &TypeRef {
        &self.declared_type
    }

    pub fn container_kind(&self) -> ContainerKind {
        self.container_kind
    }

    /// Key type of a MAP attribute
    pub fn key_type(&self) -> Option<&TypeRef> {
        self.key_type.as_ref()
    }

    /// Element type of a LIST attribute, value type of a MAP attribute
    pub fn element_type(&self) -> Option<&TypeRef> {
        self.element_type.as_ref()
    }

    pub fn relationship(&self) -> Option<RelationshipKind> {
        self.relationship
    }

    /// Always true: a descriptor only exists when a getter does
    pub fn readable(&self) -> bool {
        true
    }

    pub fn writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Invoke the getter on `node`
    ///
    /// # Errors
    ///
    /// Returns `AccessFailed` if the node is mutably borrowed or the getter faults.
    pub fn get(&self, node: &NodeRef) -> Result<Value> {
        let guard = node.try_borrow().map_err(|e| self.access_failed(e.to_string()))?;
        (self.getter)(&*guard).map_err(|e| self.wrap_fault(e))
    }

    /// Invoke the setter on `node`
    ///
    /// # Errors
    ///
    /// Returns `AttributeReadOnly` without a matching setter, `AccessFailed`
    /// if the node is borrowed, or the setter's own error.
    pub fn set(&self, node: &NodeRef, value: Value) -> Result<()> {
        let setter = self.setter.as_ref().ok_or_else(|| GraphError::AttributeReadOnly {
            type_name: self.owner_name.to_string(),
            attribute: self.name.clone(),
            path: String::new(),
        })?;
        let mut guard = node
            .try_borrow_mut()
            .map_err(|e| self.access_failed(e.to_string()))?;
        setter(&mut *guard, value).map_err(|e| self.wrap_fault(e))
    }

    fn access_failed(&self, reason: String) -> GraphError {
        GraphError::AccessFailed {
            type_name: self.owner_name.to_string(),
            attribute: self.name.clone(),
            reason,
        }
    }

    // Type mismatches keep their kind; other faults become AccessFailed
    fn wrap_fault(&self, err: GraphError) -> GraphError {
        match err {
            GraphError::TypeMismatch { .. } | GraphError::AccessFailed { .. } => err,
            other => self.access_failed(other.to_string()),
        }
    }
}

impl fmt::Debug for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("name", &self.name)
            .field("owner", &self.owner_name)
            .field("declared_type", &self.declared_type)
            .field("container_kind", &self.container_kind)
            .field("element_type", &self.element_type)
            .field("writable", &self.writable())
            .finish()
    }
}

type DescriptorCache = HashMap<(TypeId, String), Arc<AttributeDescriptor>>;

/// Process-wide, thread-safe cache of node types and attribute descriptors
///
/// Pass it explicitly to the path resolver and the clone engine.
pub struct Registry {
    types: RwLock<HashMap<TypeId, Arc<NodeType>>>,
    descriptors: RwLock<DescriptorCache>,
    metadata: Arc<dyn RelationshipMetadata>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_metadata(Arc::new(NoRelationshipMetadata))
    }

    pub fn with_metadata(metadata: Arc<dyn RelationshipMetadata>) -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
            descriptors: RwLock::new(HashMap::new()),
            metadata,
        }
    }

    /// Eagerly register `T`; types are otherwise registered on first use
    pub fn register<T: NodeSchema>(&self) -> Arc<NodeType> {
        self.node_type(&NodeKey::of::<T>())
    }

    /// The declared node type behind `key`, computing it on first use
    pub fn node_type(&self, key: &NodeKey) -> Arc<NodeType> {
        {
            let types = self.types.read().unwrap_or_else(|e| e.into_inner());
            if let Some(ty) = types.get(&key.type_id()) {
                return ty.clone();
            }
        }
        let ty = Arc::new(key.build_schema());
        let mut types = self.types.write().unwrap_or_else(|e| e.into_inner());
        types.entry(key.type_id()).or_insert(ty).clone()
    }

    /// Describe `attribute` of the runtime type of `node`
    ///
    /// # Errors
    ///
    /// See [`Registry::describe`]; `AccessFailed` if the node is mutably borrowed.
    pub fn describe_node(&self, node: &NodeRef, attribute: &str) -> Result<Arc<AttributeDescriptor>> {
        let key = node
            .try_borrow()
            .map_err(|e| GraphError::AccessFailed {
                type_name: "<borrowed>".to_string(),
                attribute: attribute.to_string(),
                reason: e.to_string(),
            })?
            .node_key();
        self.describe(&key, attribute)
    }

    /// Describe `attribute` of the node type `key`
    ///
    /// # Errors
    ///
    /// Returns `AttributeNotFound` when no `get`/`is`/`are` getter exists.
    pub fn describe(&self, key: &NodeKey, attribute: &str) -> Result<Arc<AttributeDescriptor>> {
        let cache_key = (key.type_id(), attribute.to_string());
        {
            let cache = self.descriptors.read().unwrap_or_else(|e| e.into_inner());
            if let Some(desc) = cache.get(&cache_key) {
                return Ok(desc.clone());
            }
        }

        let desc = Arc::new(self.compute_descriptor(key, attribute)?);
        let mut cache = self.descriptors.write().unwrap_or_else(|e| e.into_inner());
        cache.insert(cache_key, desc.clone());
        Ok(desc)
    }

    /// Every readable attribute of `key`, in getter declaration order
    pub fn attributes(&self, key: &NodeKey) -> Vec<Arc<AttributeDescriptor>> {
        let ty = self.node_type(key);
        let mut seen: Vec<String> = Vec::new();
        let mut out = Vec::new();
        for accessor in ty.accessors().iter().filter(|a| a.is_getter()) {
            let Some(name) = attribute_name(&accessor.name) else {
                continue;
            };
            if seen.contains(&name) {
                continue;
            }
            if let Ok(desc) = self.describe(key, &name) {
                out.push(desc);
            }
            seen.push(name);
        }
        out
    }

    fn compute_descriptor(&self, key: &NodeKey, attribute: &str) -> Result<AttributeDescriptor> {
        let ty = self.node_type(key);
        let cap = capitalize(attribute);

        let (getter_name, declared_type, getter) = GETTER_PREFIXES
            .iter()
            .find_map(|prefix| {
                let accessor = ty.accessor(&format!("{prefix}{cap}"))?;
                match &accessor.func {
                    AccessorFn::Getter(get) => Some((
                        accessor.name.to_string(),
                        accessor.value_type.clone(),
                        get.clone(),
                    )),
                    AccessorFn::Setter(_) => None,
                }
            })
            .ok_or_else(|| GraphError::AttributeNotFound {
                type_name: ty.name().to_string(),
                attribute: attribute.to_string(),
                path: String::new(),
            })?;

        // A setter with a different declared type only makes the attribute read-only
        let setter = ty.accessor(&format!("set{cap}")).and_then(|accessor| {
            match &accessor.func {
                AccessorFn::Setter(set) if accessor.value_type == declared_type => Some(set.clone()),
                AccessorFn::Setter(_) => {
                    tracing::debug!(
                        type_name = ty.name(),
                        attribute,
                        "setter signature does not match getter; attribute is read-only"
                    );
                    None
                }
                AccessorFn::Getter(_) => None,
            }
        });

        let (key_type, element_type) = match &declared_type {
            TypeRef::List(_, element) => (None, Some(self.refine(key, attribute, element))),
            TypeRef::Map(_, k, v) => (
                Some(self.refine(key, attribute, k)),
                Some(self.refine(key, attribute, v)),
            ),
            _ => (None, None),
        };

        Ok(AttributeDescriptor {
            name: attribute.to_string(),
            owner: *key,
            owner_name: ty.name(),
            getter_name,
            container_kind: declared_type.container_kind(),
            declared_type,
            key_type,
            element_type,
            relationship: self.metadata.relationship_kind(key, attribute),
            getter,
            setter,
        })
    }

    // The base node type is replaced by a registered concrete target, if any
    fn refine(&self, owner: &NodeKey, attribute: &str, declared: &TypeRef) -> TypeRef {
        match declared {
            TypeRef::AnyNode => self
                .metadata
                .target_type(owner, attribute)
                .map(TypeRef::Node)
                .unwrap_or(TypeRef::AnyNode),
            other => other.clone(),
        }
    }
}
