//! Dynamic value model
//!
//! `Value` is what getters return and setters accept. Handles (text, arrays,
//! lists, maps, nodes, opaque values) are reference counted, so copying a
//! `Value` copies the reference and [`Value::same_ref`] observes identity.

use std::any::Any;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::descriptor::ContainerKind;
use crate::errors::{GraphError, Result};
use crate::node::{node_addr, node_type_name, NodeRef};

pub type ListRef = Rc<RefCell<ListValue>>;
pub type MapRef = Rc<RefCell<MapValue>>;
pub type OpaqueRef = Rc<dyn OpaqueValue>;

/// A named enum constant; immutable and copied by value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Enumerant {
    pub type_name: &'static str,
    pub variant: &'static str,
}

/// Element type of a fixed primitive array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int,
    Float,
    Byte,
}

/// Fixed-size array of primitives
#[derive(Debug, Clone)]
pub enum PrimitiveArray {
    Bool(Rc<[bool]>),
    Int(Rc<[i64]>),
    Float(Rc<[f64]>),
    Byte(Rc<[u8]>),
}

impl PrimitiveArray {
    pub fn len(&self) -> usize {
        match self {
            PrimitiveArray::Bool(a) => a.len(),
            PrimitiveArray::Int(a) => a.len(),
            PrimitiveArray::Float(a) => a.len(),
            PrimitiveArray::Byte(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ScalarType {
        match self {
            PrimitiveArray::Bool(_) => ScalarType::Bool,
            PrimitiveArray::Int(_) => ScalarType::Int,
            PrimitiveArray::Float(_) => ScalarType::Float,
            PrimitiveArray::Byte(_) => ScalarType::Byte,
        }
    }

    /// Allocate a new array of the same length and element type holding the same elements
    pub fn duplicate(&self) -> Self {
        match self {
            PrimitiveArray::Bool(a) => PrimitiveArray::Bool(Rc::from(&a[..])),
            PrimitiveArray::Int(a) => PrimitiveArray::Int(Rc::from(&a[..])),
            PrimitiveArray::Float(a) => PrimitiveArray::Float(Rc::from(&a[..])),
            PrimitiveArray::Byte(a) => PrimitiveArray::Byte(Rc::from(&a[..])),
        }
    }

    /// Whether both handles point at the same allocation
    pub fn same_ref(&self, other: &PrimitiveArray) -> bool {
        match (self, other) {
            (PrimitiveArray::Bool(a), PrimitiveArray::Bool(b)) => Rc::ptr_eq(a, b),
            (PrimitiveArray::Int(a), PrimitiveArray::Int(b)) => Rc::ptr_eq(a, b),
            (PrimitiveArray::Float(a), PrimitiveArray::Float(b)) => Rc::ptr_eq(a, b),
            (PrimitiveArray::Byte(a), PrimitiveArray::Byte(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Concrete kind of an ordered sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ListKind {
    #[default]
    Vec,
    Deque,
}

/// Ordered sequence of values
#[derive(Clone)]
pub enum ListValue {
    Vec(Vec<Value>),
    Deque(VecDeque<Value>),
}

impl ListValue {
    pub fn empty(kind: ListKind) -> Self {
        match kind {
            ListKind::Vec => ListValue::Vec(Vec::new()),
            ListKind::Deque => ListValue::Deque(VecDeque::new()),
        }
    }

    /// New empty list of the same concrete kind
    pub fn empty_like(&self) -> Self {
        Self::empty(self.kind())
    }

    pub fn kind(&self) -> ListKind {
        match self {
            ListValue::Vec(_) => ListKind::Vec,
            ListValue::Deque(_) => ListKind::Deque,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ListValue::Vec(v) => v.len(),
            ListValue::Deque(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        match self {
            ListValue::Vec(v) => v.get(index),
            ListValue::Deque(v) => v.get(index),
        }
    }

    /// Replace the element at `index`, returning the previous one
    pub fn set(&mut self, index: usize, value: Value) -> Option<Value> {
        let slot = match self {
            ListValue::Vec(v) => v.get_mut(index),
            ListValue::Deque(v) => v.get_mut(index),
        }?;
        Some(std::mem::replace(slot, value))
    }

    pub fn push(&mut self, value: Value) {
        match self {
            ListValue::Vec(v) => v.push(value),
            ListValue::Deque(v) => v.push_back(value),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            ListValue::Vec(v) => Box::new(v.iter()),
            ListValue::Deque(v) => Box::new(v.iter()),
        }
    }

    /// Snapshot of the element handles, so no borrow is held while visiting them
    pub fn to_vec(&self) -> Vec<Value> {
        self.iter().cloned().collect()
    }

    pub fn into_ref(self) -> ListRef {
        Rc::new(RefCell::new(self))
    }
}

impl FromIterator<Value> for ListValue {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        ListValue::Vec(iter.into_iter().collect())
    }
}

/// Key of a key-value mapping
///
/// Node keys hash and compare by identity, never by content.
#[derive(Clone)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Text(Rc<str>),
    Node(NodeRef),
}

impl MapKey {
    fn rank(&self) -> u8 {
        match self {
            MapKey::Bool(_) => 0,
            MapKey::Int(_) => 1,
            MapKey::Text(_) => 2,
            MapKey::Node(_) => 3,
        }
    }

    /// Convert a value into a key, if its shape can be a key
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for values that are not keyable.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(MapKey::Bool(*b)),
            Value::Int(i) => Ok(MapKey::Int(*i)),
            Value::Text(t) => Ok(MapKey::Text(t.clone())),
            Value::Node(n) => Ok(MapKey::Node(n.clone())),
            other => Err(GraphError::TypeMismatch {
                expected: "map key (bool, int, text or node)".to_string(),
                found: other.type_label().to_string(),
            }),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(i) => Value::Int(*i),
            MapKey::Text(t) => Value::Text(t.clone()),
            MapKey::Node(n) => Value::Node(n.clone()),
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::Text(Rc::from(s))
    }
}

impl From<i64> for MapKey {
    fn from(i: i64) -> Self {
        MapKey::Int(i)
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MapKey {}

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            MapKey::Bool(b) => b.hash(state),
            MapKey::Int(i) => i.hash(state),
            MapKey::Text(t) => t.hash(state),
            MapKey::Node(n) => node_addr(n).hash(state),
        }
    }
}

impl PartialOrd for MapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (MapKey::Bool(a), MapKey::Bool(b)) => a.cmp(b),
            (MapKey::Int(a), MapKey::Int(b)) => a.cmp(b),
            (MapKey::Text(a), MapKey::Text(b)) => a.cmp(b),
            (MapKey::Node(a), MapKey::Node(b)) => node_addr(a).cmp(&node_addr(b)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Debug for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_value(), f)
    }
}

/// Concrete kind of a key-value mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MapKind {
    #[default]
    Hash,
    Sorted,
}

/// Key-value mapping
#[derive(Clone)]
pub enum MapValue {
    Hash(HashMap<MapKey, Value>),
    Sorted(BTreeMap<MapKey, Value>),
}

impl MapValue {
    pub fn empty(kind: MapKind) -> Self {
        match kind {
            MapKind::Hash => MapValue::Hash(HashMap::new()),
            MapKind::Sorted => MapValue::Sorted(BTreeMap::new()),
        }
    }

    /// New empty map of the same concrete kind
    pub fn empty_like(&self) -> Self {
        Self::empty(self.kind())
    }

    pub fn kind(&self) -> MapKind {
        match self {
            MapValue::Hash(_) => MapKind::Hash,
            MapValue::Sorted(_) => MapKind::Sorted,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MapValue::Hash(m) => m.len(),
            MapValue::Sorted(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &MapKey) -> Option<&Value> {
        match self {
            MapValue::Hash(m) => m.get(key),
            MapValue::Sorted(m) => m.get(key),
        }
    }

    pub fn insert(&mut self, key: MapKey, value: Value) -> Option<Value> {
        match self {
            MapValue::Hash(m) => m.insert(key, value),
            MapValue::Sorted(m) => m.insert(key, value),
        }
    }

    pub fn remove(&mut self, key: &MapKey) -> Option<Value> {
        match self {
            MapValue::Hash(m) => m.remove(key),
            MapValue::Sorted(m) => m.remove(key),
        }
    }

    /// Snapshot of the entries, so no borrow is held while visiting them
    pub fn entries(&self) -> Vec<(MapKey, Value)> {
        match self {
            MapValue::Hash(m) => m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            MapValue::Sorted(m) => m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    pub fn into_ref(self) -> MapRef {
        Rc::new(RefCell::new(self))
    }
}

/// Capability of an arbitrary type the clone engine knows nothing about
///
/// Copying one goes through a marshal/unmarshal round trip.
pub trait OpaqueValue: Any {
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    /// # Errors
    ///
    /// Returns `Marshal` if the value cannot be encoded.
    fn marshal(&self) -> Result<Vec<u8>>;

    /// Reconstruct a value of this type from `bytes`
    ///
    /// # Errors
    ///
    /// Returns `Marshal` if the bytes do not decode.
    fn unmarshal(&self, bytes: &[u8]) -> Result<OpaqueRef>;
}

/// Opaque wrapper for any serde type, marshalled as JSON bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Marshalled<T>(pub T);

impl<T> Marshalled<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    pub fn new_ref(value: T) -> OpaqueRef {
        Rc::new(Marshalled(value))
    }
}

impl<T> OpaqueValue for Marshalled<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0).map_err(|e| GraphError::Marshal {
            type_name: self.type_name().to_string(),
            reason: e.to_string(),
        })
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<OpaqueRef> {
        let value: T = serde_json::from_slice(bytes).map_err(|e| GraphError::Marshal {
            type_name: self.type_name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Rc::new(Marshalled(value)))
    }
}

/// A dynamically typed attribute value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Rc<str>),
    Temporal(DateTime<Utc>),
    Enumerant(Enumerant),
    Array(PrimitiveArray),
    List(ListRef),
    Map(MapRef),
    Node(NodeRef),
    Opaque(OpaqueRef),
}

impl Value {
    pub fn text(s: &str) -> Self {
        Value::Text(Rc::from(s))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect::<ListValue>().into_ref())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short label of the value's shape, used in error messages
    pub fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Temporal(_) => "temporal",
            Value::Enumerant(_) => "enumerant",
            Value::Array(_) => "array",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Node(_) => "node",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Runtime container kind, by the same rule used for declared types
    pub fn container_kind(&self) -> ContainerKind {
        ContainerKind::classify(
            matches!(self, Value::List(_)),
            matches!(self, Value::Map(_)),
            matches!(self, Value::Array(_)),
            matches!(self, Value::Node(_)),
        )
    }

    /// Immutable scalars are shared, never duplicated
    pub fn is_immutable_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_)
                | Value::Int(_)
                | Value::Float(_)
                | Value::Text(_)
                | Value::Temporal(_)
                | Value::Enumerant(_)
        )
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Extract a typed value
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` when the value has another shape.
    pub fn extract<T: FromValue>(&self) -> Result<T> {
        T::from_value(self)
    }

    /// Reference equality for handles, value equality for copied scalars
    pub fn same_ref(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => Rc::ptr_eq(a, b),
            (Value::Temporal(a), Value::Temporal(b)) => a == b,
            (Value::Enumerant(a), Value::Enumerant(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.same_ref(b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Node(a), Value::Node(b)) => Rc::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => false,
        }
    }
}

/// Structural equality for scalars; handles compare by identity
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => match (a, b) {
                (PrimitiveArray::Bool(x), PrimitiveArray::Bool(y)) => x == y,
                (PrimitiveArray::Int(x), PrimitiveArray::Int(y)) => x == y,
                (PrimitiveArray::Float(x), PrimitiveArray::Float(y)) => x == y,
                (PrimitiveArray::Byte(x), PrimitiveArray::Byte(y)) => x == y,
                _ => false,
            },
            _ => self.same_ref(other),
        }
    }
}

// Nodes print as `Type@addr`, so cyclic graphs can be debug-printed
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Text(t) => write!(f, "Text({t:?})"),
            Value::Temporal(t) => write!(f, "Temporal({t})"),
            Value::Enumerant(e) => write!(f, "Enumerant({}::{})", e.type_name, e.variant),
            Value::Array(a) => write!(f, "Array({:?}; {})", a.element_type(), a.len()),
            Value::List(l) => match l.try_borrow() {
                Ok(l) => write!(f, "List({:?}; {})", l.kind(), l.len()),
                Err(_) => write!(f, "List(<borrowed>)"),
            },
            Value::Map(m) => match m.try_borrow() {
                Ok(m) => write!(f, "Map({:?}; {})", m.kind(), m.len()),
                Err(_) => write!(f, "Map(<borrowed>)"),
            },
            Value::Node(n) => write!(f, "Node({}@{:#x})", node_type_name(n), node_addr(n)),
            Value::Opaque(o) => write!(f, "Opaque({})", o.type_name()),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        })*
    };
}

impl_from_scalar! {
    bool => Bool,
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Float,
    Rc<str> => Text,
    DateTime<Utc> => Temporal,
    Enumerant => Enumerant,
    PrimitiveArray => Array,
    ListRef => List,
    MapRef => Map,
    NodeRef => Node,
    OpaqueRef => Opaque,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(Rc::from(s))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Typed extraction out of a [`Value`], used by typed setters
pub trait FromValue: Sized {
    /// # Errors
    ///
    /// Returns `TypeMismatch` when the value has another shape.
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &str, found: &Value) -> GraphError {
    GraphError::TypeMismatch {
        expected: expected.to_string(),
        found: found.type_label().to_string(),
    }
}

macro_rules! impl_from_value {
    ($($ty:ty, $label:literal, $pat:pat => $out:expr);* $(;)?) => {
        $(impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    $pat => Ok($out),
                    other => Err(mismatch($label, other)),
                }
            }
        })*
    };
}

impl_from_value! {
    bool, "bool", Value::Bool(b) => *b;
    i64, "int", Value::Int(i) => *i;
    f64, "float", Value::Float(x) => *x;
    Rc<str>, "text", Value::Text(t) => t.clone();
    String, "text", Value::Text(t) => t.to_string();
    DateTime<Utc>, "temporal", Value::Temporal(t) => *t;
    Enumerant, "enumerant", Value::Enumerant(e) => *e;
    PrimitiveArray, "array", Value::Array(a) => a.clone();
    ListRef, "list", Value::List(l) => l.clone();
    MapRef, "map", Value::Map(m) => m.clone();
    NodeRef, "node", Value::Node(n) => n.clone();
    OpaqueRef, "opaque", Value::Opaque(o) => o.clone();
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| GraphError::TypeMismatch {
            expected: "int within i32 range".to_string(),
            found: wide.to_string(),
        })
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
