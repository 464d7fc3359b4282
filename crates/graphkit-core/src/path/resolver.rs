//! Path Resolver
//!
//! Reads and writes nested attributes of a live graph by path expression,
//! and resolves the declared type a path leads to when no instance exists.
//!
//! Both `resolve` and `mutate` are all-or-nothing: a failing read returns no
//! partial value, and a failing write reverts every intermediate object it
//! created before reporting the error.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{ListIndexWrite, NavigatorConfig};
use crate::descriptor::{AttributeDescriptor, ContainerKind, Registry};
use crate::errors::{GraphError, Result};
use crate::node::{NodeKey, NodeRef, TypeRef};
use crate::path::expr::{PathExpr, Segment, Selector};
use crate::value::{ListRef, ListValue, MapKey, MapRef, MapValue, Value};
use crate::{log_op_end, log_op_error, log_op_start};

/// Path navigation over a shared descriptor registry
pub struct PathResolver<'r> {
    registry: &'r Registry,
    config: NavigatorConfig,
}

impl<'r> PathResolver<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_config(registry, NavigatorConfig::default())
    }

    pub fn with_config(registry: &'r Registry, config: NavigatorConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Read the value `path` leads to from `root`
    ///
    /// A null value reached on the last segment yields `Value::Null`; an
    /// absent map key yields `Value::Null`.
    ///
    /// # Errors
    ///
    /// - `InvalidPathSegment`: malformed path, or selector/container mismatch
    /// - `AttributeNotFound`: no getter for a segment on the runtime type
    /// - `BrokenPath`: a null intermediate value
    /// - `IndexOutOfRange`: list index outside `[0, len)`
    /// - `AccessFailed`: a getter faulted
    pub fn resolve(&self, root: &Value, path: &str) -> Result<Value> {
        log_op_start!("resolve", path = path);
        let start = Instant::now();

        let value = self.resolve_impl(root, path).map_err(|e| {
            log_op_error!(
                "resolve",
                e,
                duration_ms = start.elapsed().as_millis() as u64,
                path = path
            );
            e
        })?;

        log_op_end!(
            "resolve",
            duration_ms = start.elapsed().as_millis() as u64,
            path = path
        );
        Ok(value)
    }

    fn resolve_impl(&self, root: &Value, path: &str) -> Result<Value> {
        let expr = PathExpr::parse(path)?;
        let last = expr.len() - 1;
        let mut current = root.clone();

        for (i, segment) in expr.segments().iter().enumerate() {
            if current.is_null() {
                if i == last {
                    return Ok(Value::Null);
                }
                return Err(broken(path, segment));
            }
            let node = node_of(&current, segment, path)?.clone();
            let (_, value) = self.read(&node, segment, path)?;
            current = match segment.selector() {
                None => value,
                Some(selector) => select(&value, selector, segment, path)?,
            };
        }

        Ok(current)
    }

    /// Write `value` at `path` below `root`
    ///
    /// With `auto_vivify`, null intermediate nodes are instantiated through
    /// their declared type's constructor and written back. A selector on the
    /// last segment appends to a list (or replaces, per
    /// [`ListIndexWrite`]) and puts into a map.
    ///
    /// # Errors
    ///
    /// Everything [`PathResolver::resolve`] reports, plus:
    /// - `AttributeReadOnly`: the leaf, or a vivified intermediate, has no matching setter
    /// - `NotInstantiable`: vivification needed a constructor that does not exist
    /// - `TypeMismatch`: the setter rejected the value
    pub fn mutate(&self, root: &NodeRef, path: &str, value: Value, auto_vivify: bool) -> Result<()> {
        log_op_start!("mutate", path = path, auto_vivify = auto_vivify);
        let start = Instant::now();

        let mut undo = UndoLog::default();
        if let Err(e) = self.mutate_impl(root, path, value, auto_vivify, &mut undo) {
            undo.rollback();
            log_op_error!(
                "mutate",
                e,
                duration_ms = start.elapsed().as_millis() as u64,
                path = path
            );
            return Err(e);
        }

        log_op_end!(
            "mutate",
            duration_ms = start.elapsed().as_millis() as u64,
            path = path
        );
        Ok(())
    }

    fn mutate_impl(
        &self,
        root: &NodeRef,
        path: &str,
        value: Value,
        auto_vivify: bool,
        undo: &mut UndoLog,
    ) -> Result<()> {
        let expr = PathExpr::parse(path)?;
        let (leaf, walk) = expr
            .segments()
            .split_last()
            .ok_or_else(|| invalid(path, "", "empty path"))?;

        let mut current = Value::Node(root.clone());
        for segment in walk {
            if current.is_null() {
                return Err(broken(path, segment));
            }
            let node = node_of(&current, segment, path)?.clone();
            current = self.step_for_write(&node, segment, path, auto_vivify, undo)?;
        }

        if current.is_null() {
            return Err(broken(path, leaf));
        }
        let node = node_of(&current, leaf, path)?.clone();
        self.write_leaf(&node, leaf, path, value, auto_vivify, undo)
    }

    fn step_for_write(
        &self,
        node: &NodeRef,
        segment: &Segment,
        path: &str,
        auto_vivify: bool,
        undo: &mut UndoLog,
    ) -> Result<Value> {
        let (desc, attr_value) = self.read(node, segment, path)?;

        match segment.selector() {
            None if attr_value.is_null() && auto_vivify => {
                let created = Value::Node(self.instantiate(desc.declared_type(), path)?);
                desc.set(node, created.clone()).map_err(|e| e.at_path(path))?;
                undo.push(Undo::Attribute {
                    node: node.clone(),
                    descriptor: desc,
                });
                Ok(created)
            }
            None => Ok(attr_value),
            Some(selector) => {
                let container =
                    self.container_for_write(node, &desc, attr_value, segment, path, auto_vivify, undo)?;
                self.element_for_write(&container, &desc, selector, segment, path, auto_vivify, undo)
            }
        }
    }

    // The attribute's container, created empty when null and allowed
    #[allow(clippy::too_many_arguments)]
    fn container_for_write(
        &self,
        node: &NodeRef,
        desc: &Arc<AttributeDescriptor>,
        attr_value: Value,
        segment: &Segment,
        path: &str,
        auto_vivify: bool,
        undo: &mut UndoLog,
    ) -> Result<Value> {
        if !attr_value.is_null() {
            return Ok(attr_value);
        }
        if !(auto_vivify && self.config.auto_vivify_containers) {
            return Err(broken(path, segment));
        }

        let container = empty_container(desc.declared_type()).ok_or_else(|| {
            invalid(
                path,
                &segment.to_string(),
                "selector applied to a non-container attribute",
            )
        })?;
        desc.set(node, container.clone()).map_err(|e| e.at_path(path))?;
        undo.push(Undo::Attribute {
            node: node.clone(),
            descriptor: desc.clone(),
        });
        Ok(container)
    }

    // The selected element of an intermediate container, vivified when null
    #[allow(clippy::too_many_arguments)]
    fn element_for_write(
        &self,
        container: &Value,
        desc: &AttributeDescriptor,
        selector: &Selector,
        segment: &Segment,
        path: &str,
        auto_vivify: bool,
        undo: &mut UndoLog,
    ) -> Result<Value> {
        match container {
            Value::List(list) => {
                let index = list_index(selector, segment, path)?;
                let (slot, existing) = {
                    let items = list.borrow();
                    element_at(&items, index)
                        .ok_or_else(|| out_of_range(path, segment, index, items.len()))?
                };
                if !(existing.is_null() && auto_vivify) {
                    return Ok(existing);
                }
                let created = Value::Node(self.instantiate_element(desc, path)?);
                list.borrow_mut().set(slot, created.clone());
                undo.push(Undo::ListSlot {
                    list: list.clone(),
                    index: slot,
                    previous: existing,
                });
                Ok(created)
            }
            Value::Map(map) => {
                let key = selector.map_key();
                let existing = map.borrow().get(&key).cloned();
                match existing {
                    Some(value) if !value.is_null() => Ok(value),
                    previous if auto_vivify => {
                        let created = Value::Node(self.instantiate_element(desc, path)?);
                        map.borrow_mut().insert(key.clone(), created.clone());
                        undo.push(Undo::MapEntry {
                            map: map.clone(),
                            key,
                            previous,
                        });
                        Ok(created)
                    }
                    _ => Ok(Value::Null),
                }
            }
            other => Err(selector_mismatch(other, segment, path)),
        }
    }

    fn write_leaf(
        &self,
        node: &NodeRef,
        leaf: &Segment,
        path: &str,
        value: Value,
        auto_vivify: bool,
        undo: &mut UndoLog,
    ) -> Result<()> {
        let Some(selector) = leaf.selector() else {
            let desc = self
                .registry
                .describe_node(node, leaf.attribute())
                .map_err(|e| e.at_path(path))?;
            return desc.set(node, value).map_err(|e| e.at_path(path));
        };

        let (desc, attr_value) = self.read(node, leaf, path)?;
        let container = self.container_for_write(node, &desc, attr_value, leaf, path, auto_vivify, undo)?;

        match container {
            Value::List(list) => {
                let index = list_index(selector, leaf, path)?;
                let mut items = list.borrow_mut();
                match self.config.list_index_write {
                    ListIndexWrite::Append => {
                        items.push(value);
                        Ok(())
                    }
                    ListIndexWrite::Replace => {
                        let len = items.len();
                        usize::try_from(index)
                            .ok()
                            .and_then(|slot| items.set(slot, value))
                            .map(|_| ())
                            .ok_or_else(|| out_of_range(path, leaf, index, len))
                    }
                }
            }
            Value::Map(map) => {
                map.borrow_mut().insert(selector.map_key(), value);
                Ok(())
            }
            other => Err(selector_mismatch(&other, leaf, path)),
        }
    }

    /// Declared type `path` leads to from `root_type`, without an instance
    ///
    /// LIST and MAP attributes resolve transparently to their element or
    /// value type, with or without a selector.
    ///
    /// # Errors
    ///
    /// - `InvalidPathSegment`: malformed path, or a selector on a non-container
    /// - `AttributeNotFound`: no getter for a segment on the declared type
    pub fn resolve_static_type(&self, root_type: &NodeKey, path: &str) -> Result<TypeRef> {
        log_op_start!("resolve_static_type", path = path, type_name = root_type.name());
        let start = Instant::now();

        let ty = self.resolve_static_type_impl(root_type, path).map_err(|e| {
            log_op_error!(
                "resolve_static_type",
                e,
                duration_ms = start.elapsed().as_millis() as u64,
                path = path
            );
            e
        })?;

        log_op_end!(
            "resolve_static_type",
            duration_ms = start.elapsed().as_millis() as u64,
            path = path
        );
        Ok(ty)
    }

    fn resolve_static_type_impl(&self, root_type: &NodeKey, path: &str) -> Result<TypeRef> {
        let expr = PathExpr::parse(path)?;
        let mut current = TypeRef::Node(*root_type);

        for segment in expr.segments() {
            let key = match &current {
                TypeRef::Node(key) => *key,
                other => {
                    return Err(GraphError::AttributeNotFound {
                        type_name: other.label(),
                        attribute: segment.attribute().to_string(),
                        path: path.to_string(),
                    })
                }
            };
            let desc = self
                .registry
                .describe(&key, segment.attribute())
                .map_err(|e| e.at_path(path))?;

            if let Some(selector) = segment.selector() {
                if desc.container_kind() == ContainerKind::List {
                    list_index(selector, segment, path)?;
                }
            }
            current = match (desc.container_kind(), desc.element_type()) {
                (ContainerKind::List | ContainerKind::Map, Some(element)) => element.clone(),
                _ if segment.selector().is_some() => {
                    return Err(invalid(
                        path,
                        &segment.to_string(),
                        "selector applied to a non-container attribute",
                    ))
                }
                _ => desc.declared_type().clone(),
            };
        }

        Ok(current)
    }

    /// Prefix of `path` up to the first segment whose unselected value is a
    /// LIST or MAP, ending in that segment's attribute name
    ///
    /// Returns `None` when a null value is met first or no container lies on
    /// the path.
    ///
    /// # Errors
    ///
    /// Same as [`PathResolver::resolve`] for the segments walked.
    pub fn find_first_container_path(&self, root: &Value, path: &str) -> Result<Option<String>> {
        log_op_start!("find_first_container_path", path = path);
        let start = Instant::now();

        let found = self.find_first_container_path_impl(root, path).map_err(|e| {
            log_op_error!(
                "find_first_container_path",
                e,
                duration_ms = start.elapsed().as_millis() as u64,
                path = path
            );
            e
        })?;

        log_op_end!(
            "find_first_container_path",
            duration_ms = start.elapsed().as_millis() as u64,
            path = path
        );
        Ok(found)
    }

    fn find_first_container_path_impl(&self, root: &Value, path: &str) -> Result<Option<String>> {
        let expr = PathExpr::parse(path)?;
        let mut walked: Vec<String> = Vec::new();
        let mut current = root.clone();

        for segment in expr.segments() {
            if current.is_null() {
                return Ok(None);
            }
            let node = node_of(&current, segment, path)?.clone();
            let (_, value) = self.read(&node, segment, path)?;

            if value.container_kind().is_container() {
                walked.push(segment.attribute().to_string());
                return Ok(Some(walked.join(".")));
            }

            current = match segment.selector() {
                None => value,
                Some(selector) => select(&value, selector, segment, path)?,
            };
            walked.push(segment.to_string());
        }

        Ok(None)
    }

    fn read(
        &self,
        node: &NodeRef,
        segment: &Segment,
        path: &str,
    ) -> Result<(Arc<AttributeDescriptor>, Value)> {
        let desc = self
            .registry
            .describe_node(node, segment.attribute())
            .map_err(|e| e.at_path(path))?;
        let value = desc.get(node)?;
        Ok((desc, value))
    }

    fn instantiate(&self, ty: &TypeRef, path: &str) -> Result<NodeRef> {
        match ty {
            TypeRef::Node(key) => self
                .registry
                .node_type(key)
                .instantiate()
                .ok_or_else(|| GraphError::NotInstantiable {
                    type_name: key.name().to_string(),
                    path: path.to_string(),
                }),
            other => Err(GraphError::NotInstantiable {
                type_name: other.label(),
                path: path.to_string(),
            }),
        }
    }

    fn instantiate_element(&self, desc: &AttributeDescriptor, path: &str) -> Result<NodeRef> {
        match desc.element_type() {
            Some(element) => self.instantiate(element, path),
            None => Err(GraphError::NotInstantiable {
                type_name: desc.declared_type().label(),
                path: path.to_string(),
            }),
        }
    }
}

/// Reversible effects of one `mutate` call
enum Undo {
    /// A null attribute was given a new value
    Attribute {
        node: NodeRef,
        descriptor: Arc<AttributeDescriptor>,
    },
    ListSlot {
        list: ListRef,
        index: usize,
        previous: Value,
    },
    MapEntry {
        map: MapRef,
        key: MapKey,
        previous: Option<Value>,
    },
}

#[derive(Default)]
struct UndoLog {
    entries: Vec<Undo>,
}

impl UndoLog {
    fn push(&mut self, entry: Undo) {
        self.entries.push(entry);
    }

    // Best effort, newest first
    fn rollback(self) {
        for entry in self.entries.into_iter().rev() {
            match entry {
                Undo::Attribute { node, descriptor } => {
                    if let Err(e) = descriptor.set(&node, Value::Null) {
                        tracing::debug!(attribute = descriptor.name(), error = %e, "rollback step failed");
                    }
                }
                Undo::ListSlot {
                    list,
                    index,
                    previous,
                } => {
                    if let Ok(mut items) = list.try_borrow_mut() {
                        items.set(index, previous);
                    }
                }
                Undo::MapEntry { map, key, previous } => {
                    if let Ok(mut entries) = map.try_borrow_mut() {
                        match previous {
                            Some(value) => entries.insert(key, value),
                            None => entries.remove(&key),
                        };
                    }
                }
            }
        }
    }
}

fn node_of<'v>(current: &'v Value, segment: &Segment, path: &str) -> Result<&'v NodeRef> {
    current.as_node().ok_or_else(|| GraphError::AttributeNotFound {
        type_name: current.type_label().to_string(),
        attribute: segment.attribute().to_string(),
        path: path.to_string(),
    })
}

fn select(container: &Value, selector: &Selector, segment: &Segment, path: &str) -> Result<Value> {
    match container {
        Value::Null => Err(broken(path, segment)),
        Value::List(list) => {
            let index = list_index(selector, segment, path)?;
            let items = list.borrow();
            element_at(&items, index)
                .map(|(_, value)| value)
                .ok_or_else(|| out_of_range(path, segment, index, items.len()))
        }
        Value::Map(map) => Ok(map.borrow().get(&selector.map_key()).cloned().unwrap_or_default()),
        other => Err(selector_mismatch(other, segment, path)),
    }
}

fn list_index(selector: &Selector, segment: &Segment, path: &str) -> Result<i64> {
    selector.index().ok_or_else(|| {
        invalid(
            path,
            &segment.to_string(),
            "list selector must be a numeric index",
        )
    })
}

// Slot and element at `index`; `None` outside `[0, len)`
fn element_at(items: &ListValue, index: i64) -> Option<(usize, Value)> {
    let slot = usize::try_from(index).ok()?;
    items.get(slot).cloned().map(|value| (slot, value))
}

fn empty_container(ty: &TypeRef) -> Option<Value> {
    match ty {
        TypeRef::List(kind, _) => Some(Value::List(ListValue::empty(*kind).into_ref())),
        TypeRef::Map(kind, _, _) => Some(Value::Map(MapValue::empty(*kind).into_ref())),
        _ => None,
    }
}

fn broken(path: &str, segment: &Segment) -> GraphError {
    GraphError::BrokenPath {
        path: path.to_string(),
        segment: segment.to_string(),
    }
}

fn out_of_range(path: &str, segment: &Segment, index: i64, len: usize) -> GraphError {
    GraphError::IndexOutOfRange {
        path: path.to_string(),
        segment: segment.to_string(),
        index,
        len,
    }
}

fn selector_mismatch(value: &Value, segment: &Segment, path: &str) -> GraphError {
    invalid(
        path,
        &segment.to_string(),
        &format!("selector applied to a {} value", value.type_label()),
    )
}

fn invalid(path: &str, segment: &str, reason: &str) -> GraphError {
    GraphError::InvalidPathSegment {
        path: path.to_string(),
        segment: segment.to_string(),
        reason: reason.to_string(),
    }
}
