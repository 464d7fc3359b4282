//! Graph Node capability and node type declarations
//!
//! Rust has no runtime method lookup, so each node type declares its
//! accessors once through [`NodeSchema::schema`]. Accessor names keep the
//! `getX`/`isX`/`areX`/`setX` convention; the descriptor resolver pairs them
//! into attributes.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use crate::descriptor::ContainerKind;
use crate::errors::{GraphError, Result};
use crate::value::{ListKind, MapKind, ScalarType, Value};

/// Shared, mutable handle to a graph node
pub type NodeRef = Rc<RefCell<dyn GraphNode>>;

pub type GetterFn = Arc<dyn Fn(&dyn GraphNode) -> Result<Value> + Send + Sync>;
pub type SetterFn = Arc<dyn Fn(&mut dyn GraphNode, Value) -> Result<()> + Send + Sync>;
pub type ConstructorFn = Arc<dyn Fn() -> NodeRef + Send + Sync>;

/// Object-safe node capability
///
/// Implemented for every [`NodeSchema`] type; not meant to be implemented by hand.
pub trait GraphNode: Any {
    fn node_key(&self) -> NodeKey;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// The type's own copy contract, used when it has no constructor
    fn shallow_copy(&self) -> Option<NodeRef>;
}

/// Static capability of a concrete node type
pub trait NodeSchema: Any + Sized {
    /// Declare the type's name, constructor and accessors
    fn schema() -> NodeType;

    /// Shallow copy used as a clone shell when no constructor is declared
    fn clone_shallow(&self) -> Option<Self> {
        None
    }
}

impl<T: NodeSchema> GraphNode for T {
    fn node_key(&self) -> NodeKey {
        NodeKey::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn shallow_copy(&self) -> Option<NodeRef> {
        NodeSchema::clone_shallow(self).map(new_node)
    }
}

/// Wrap a node value into a shared handle
pub fn new_node<T: GraphNode>(node: T) -> NodeRef {
    Rc::new(RefCell::new(node))
}

/// Borrow a node as its concrete type
///
/// Returns `None` when the node is of another type or mutably borrowed.
pub fn with_node<T: 'static, R>(node: &NodeRef, f: impl FnOnce(&T) -> R) -> Option<R> {
    let guard = node.try_borrow().ok()?;
    guard.as_any().downcast_ref::<T>().map(f)
}

/// Mutably borrow a node as its concrete type
pub fn with_node_mut<T: 'static, R>(node: &NodeRef, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    let mut guard = node.try_borrow_mut().ok()?;
    guard.as_any_mut().downcast_mut::<T>().map(f)
}

/// Identity of a node instance, stable while the handle is alive
pub(crate) fn node_addr(node: &NodeRef) -> usize {
    Rc::as_ptr(node) as *const () as usize
}

pub(crate) fn node_type_name(node: &NodeRef) -> &'static str {
    node.try_borrow()
        .map(|n| n.node_key().name())
        .unwrap_or("<borrowed>")
}

/// Handle to a node type; lets the registry compute its schema lazily
#[derive(Clone, Copy)]
pub struct NodeKey {
    type_id: TypeId,
    name: &'static str,
    schema: fn() -> NodeType,
}

impl NodeKey {
    pub fn of<T: NodeSchema>() -> Self {
        let full = std::any::type_name::<T>();
        Self {
            type_id: TypeId::of::<T>(),
            name: short_type_name(full),
            schema: T::schema,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Unqualified Rust type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn build_schema(&self) -> NodeType {
        (self.schema)()
    }
}

impl PartialEq for NodeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for NodeKey {}

impl Hash for NodeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey({})", self.name)
    }
}

/// Declared type of an accessor
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Bool,
    Int,
    Float,
    Text,
    Temporal,
    Enumerant(&'static str),
    /// Fixed array of primitives
    Array(ScalarType),
    List(ListKind, Box<TypeRef>),
    Map(MapKind, Box<TypeRef>, Box<TypeRef>),
    Node(NodeKey),
    /// The graph-node base type; a concrete target may be registered for it
    AnyNode,
    Opaque(&'static str),
}

impl TypeRef {
    pub fn node<T: NodeSchema>() -> Self {
        TypeRef::Node(NodeKey::of::<T>())
    }

    pub fn list_of(element: TypeRef) -> Self {
        TypeRef::List(ListKind::Vec, Box::new(element))
    }

    pub fn map_of(key: TypeRef, value: TypeRef) -> Self {
        TypeRef::Map(MapKind::Hash, Box::new(key), Box::new(value))
    }

    pub fn container_kind(&self) -> ContainerKind {
        ContainerKind::classify(
            matches!(self, TypeRef::List(..)),
            matches!(self, TypeRef::Map(..)),
            matches!(self, TypeRef::Array(_)),
            matches!(self, TypeRef::Node(_) | TypeRef::AnyNode),
        )
    }

    pub fn label(&self) -> String {
        match self {
            TypeRef::Bool => "bool".to_string(),
            TypeRef::Int => "int".to_string(),
            TypeRef::Float => "float".to_string(),
            TypeRef::Text => "text".to_string(),
            TypeRef::Temporal => "temporal".to_string(),
            TypeRef::Enumerant(name) | TypeRef::Opaque(name) => name.to_string(),
            TypeRef::Array(elem) => format!("[{elem:?}]"),
            TypeRef::List(_, elem) => format!("List<{}>", elem.label()),
            TypeRef::Map(_, key, value) => format!("Map<{}, {}>", key.label(), value.label()),
            TypeRef::Node(key) => key.name().to_string(),
            TypeRef::AnyNode => "GraphNode".to_string(),
        }
    }
}

pub enum AccessorFn {
    Getter(GetterFn),
    Setter(SetterFn),
}

/// One declared accessor method
pub struct Accessor {
    pub name: Cow<'static, str>,
    pub value_type: TypeRef,
    pub func: AccessorFn,
}

impl Accessor {
    pub fn is_getter(&self) -> bool {
        matches!(self.func, AccessorFn::Getter(_))
    }
}

/// Declared shape of a node type
pub struct NodeType {
    name: &'static str,
    constructor: Option<ConstructorFn>,
    accessors: Vec<Accessor>,
}

impl NodeType {
    pub fn builder<T: NodeSchema>(name: &'static str) -> NodeTypeBuilder<T> {
        NodeTypeBuilder {
            name,
            constructor: None,
            accessors: Vec::new(),
            _node: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn accessors(&self) -> &[Accessor] {
        &self.accessors
    }

    pub fn accessor(&self, name: &str) -> Option<&Accessor> {
        self.accessors.iter().find(|a| a.name == name)
    }

    pub fn is_instantiable(&self) -> bool {
        self.constructor.is_some()
    }

    /// New default instance through the no-argument constructor, if declared
    pub fn instantiate(&self) -> Option<NodeRef> {
        self.constructor.as_ref().map(|ctor| ctor())
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("name", &self.name)
            .field("instantiable", &self.is_instantiable())
            .field(
                "accessors",
                &self.accessors.iter().map(|a| a.name.as_ref()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn downcast<T: 'static>(node: &dyn GraphNode) -> Result<&T> {
    node.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| GraphError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            found: node.node_key().name().to_string(),
        })
}

fn downcast_mut<T: 'static>(node: &mut dyn GraphNode) -> Result<&mut T> {
    let found = node.node_key().name();
    node.as_any_mut()
        .downcast_mut::<T>()
        .ok_or_else(|| GraphError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            found: found.to_string(),
        })
}

/// Typed builder for a [`NodeType`]
pub struct NodeTypeBuilder<T> {
    name: &'static str,
    constructor: Option<ConstructorFn>,
    accessors: Vec<Accessor>,
    _node: PhantomData<fn() -> T>,
}

impl<T: NodeSchema> NodeTypeBuilder<T> {
    /// Declare the no-argument constructor
    pub fn constructor(mut self, ctor: fn() -> T) -> Self {
        self.constructor = Some(Arc::new(move || new_node(ctor())));
        self
    }

    /// Declare an infallible getter, e.g. `getName`, `isActive`, `areVisible`
    pub fn getter(self, name: impl Into<Cow<'static, str>>, ty: TypeRef, get: fn(&T) -> Value) -> Self {
        self.try_getter(name, ty, move |node| Ok(get(node)))
    }

    /// Declare a getter that may fault
    pub fn try_getter<F>(mut self, name: impl Into<Cow<'static, str>>, ty: TypeRef, get: F) -> Self
    where
        F: Fn(&T) -> Result<Value> + Send + Sync + 'static,
    {
        let func: GetterFn =
            Arc::new(move |node: &dyn GraphNode| -> Result<Value> { get(downcast::<T>(node)?) });
        self.accessors.push(Accessor {
            name: name.into(),
            value_type: ty,
            func: AccessorFn::Getter(func),
        });
        self
    }

    /// Declare a setter, e.g. `setName`
    pub fn setter(
        mut self,
        name: impl Into<Cow<'static, str>>,
        ty: TypeRef,
        set: fn(&mut T, Value) -> Result<()>,
    ) -> Self {
        let func: SetterFn =
            Arc::new(move |node: &mut dyn GraphNode, value: Value| -> Result<()> {
                set(downcast_mut::<T>(node)?, value)
            });
        self.accessors.push(Accessor {
            name: name.into(),
            value_type: ty,
            func: AccessorFn::Setter(func),
        });
        self
    }

    /// Declare a `get<Name>`/`set<Name>` pair for attribute `name`
    pub fn attribute(
        self,
        name: &'static str,
        ty: TypeRef,
        get: fn(&T) -> Value,
        set: fn(&mut T, Value) -> Result<()>,
    ) -> Self {
        let cap = capitalize(name);
        self.getter(format!("get{cap}"), ty.clone(), get)
            .setter(format!("set{cap}"), ty, set)
    }

    pub fn build(self) -> NodeType {
        NodeType {
            name: self.name,
            constructor: self.constructor,
            accessors: self.accessors,
        }
    }
}

/// `a::Wrapper<b::Leaf>` -> `Wrapper`
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// `name` -> `Name`
pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `getName` / `isName` / `areName` -> `name`
pub(crate) fn attribute_name(getter: &str) -> Option<String> {
    ["get", "is", "are"].iter().find_map(|prefix| {
        let rest = getter.strip_prefix(prefix)?;
        let mut chars = rest.chars();
        let first = chars.next()?;
        if !first.is_uppercase() {
            return None;
        }
        Some(first.to_lowercase().chain(chars).collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        label: Option<String>,
        visible: bool,
    }

    impl NodeSchema for Probe {
        fn schema() -> NodeType {
            NodeType::builder::<Self>("Probe")
                .constructor(|| Probe {
                    label: None,
                    visible: false,
                })
                .attribute(
                    "label",
                    TypeRef::Text,
                    |p| p.label.clone().into(),
                    |p, v| {
                        p.label = v.extract()?;
                        Ok(())
                    },
                )
                .getter("isVisible", TypeRef::Bool, |p| p.visible.into())
                .build()
        }
    }

    #[test]
    fn test_attribute_declares_getter_and_setter() {
        let ty = Probe::schema();
        assert!(ty.accessor("getLabel").is_some());
        assert!(ty.accessor("setLabel").is_some());
        assert!(ty.accessor("isVisible").is_some_and(Accessor::is_getter));
        assert!(ty.is_instantiable());
    }

    #[test]
    fn test_instantiate_and_typed_access() {
        let node = Probe::schema().instantiate().unwrap();
        with_node_mut::<Probe, _>(&node, |p| p.label = Some("x".to_string())).unwrap();
        assert_eq!(
            with_node::<Probe, _>(&node, |p| p.label.clone()).flatten(),
            Some("x".to_string())
        );
        assert_eq!(node.borrow().node_key(), NodeKey::of::<Probe>());
        assert_eq!(NodeKey::of::<Probe>().name(), "Probe");
    }

    #[test]
    fn test_attribute_name_from_getter() {
        assert_eq!(attribute_name("getName").as_deref(), Some("name"));
        assert_eq!(attribute_name("isActive").as_deref(), Some("active"));
        assert_eq!(attribute_name("areVisible").as_deref(), Some("visible"));
        assert_eq!(attribute_name("issue"), None);
        assert_eq!(attribute_name("get"), None);
    }

    #[test]
    fn test_generic_node_name_drops_type_arguments() {
        struct Wrapper<T>(PhantomData<T>);

        impl<T: 'static> NodeSchema for Wrapper<T> {
            fn schema() -> NodeType {
                NodeType::builder::<Self>("Wrapper").build()
            }
        }

        assert_eq!(NodeKey::of::<Wrapper<Probe>>().name(), "Wrapper");
        assert_eq!(NodeKey::of::<Wrapper<Vec<Probe>>>().name(), "Wrapper");
        assert_ne!(NodeKey::of::<Wrapper<Probe>>(), NodeKey::of::<Wrapper<i64>>());
        assert_eq!(short_type_name("a::b::Leaf"), "Leaf");
        assert_eq!(short_type_name("Leaf"), "Leaf");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("name"), "Name");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_type_ref_kinds() {
        assert_eq!(TypeRef::Int.container_kind(), ContainerKind::Scalar);
        assert_eq!(TypeRef::list_of(TypeRef::Int).container_kind(), ContainerKind::List);
        assert_eq!(
            TypeRef::map_of(TypeRef::Text, TypeRef::Int).container_kind(),
            ContainerKind::Map
        );
        assert_eq!(TypeRef::Array(ScalarType::Byte).container_kind(), ContainerKind::Array);
        assert_eq!(TypeRef::node::<Probe>().container_kind(), ContainerKind::Node);
        assert_eq!(TypeRef::Opaque("Blob").container_kind(), ContainerKind::Scalar);
    }
}
