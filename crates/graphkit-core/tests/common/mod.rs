//! Shared fixture model for integration tests
//!
//! - `Order` / `Customer` / `Line`: the sample order graph
//! - `Person`: cyclic graphs, node-keyed maps, base-typed lists
//! - `Flaky`: a getter that faults
//! - `Document`: opaque attributes copied by marshal/unmarshal
//! - `Snapshot`: no constructor, shallow-copy contract
//! - `Sealed` / `Holder`: a type that cannot be cloned, held by one that can

#![allow(dead_code)]

use std::any::Any;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use graphkit_core::errors::{GraphError, Result};
use graphkit_core::node::{new_node, with_node, NodeRef, NodeSchema, NodeType, TypeRef};
use graphkit_core::value::{
    ListKind, ListRef, ListValue, MapKind, MapRef, Marshalled, OpaqueRef, OpaqueValue,
    PrimitiveArray, ScalarType, Value,
};
use serde::{Deserialize, Serialize};

// ========== Order model ==========

#[derive(Default)]
pub struct Order {
    pub id: Option<i64>,
    pub customer: Option<NodeRef>,
    pub lines: Option<ListRef>,
    pub labels: Option<MapRef>,
    pub notes: Option<MapRef>,
    pub checksum: Option<PrimitiveArray>,
    pub placed_at: Option<DateTime<Utc>>,
}

impl NodeSchema for Order {
    fn schema() -> NodeType {
        NodeType::builder::<Self>("Order")
            .constructor(Order::default)
            .attribute(
                "id",
                TypeRef::Int,
                |o| o.id.into(),
                |o, v| {
                    o.id = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "customer",
                TypeRef::node::<Customer>(),
                |o| o.customer.clone().into(),
                |o, v| {
                    o.customer = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "lines",
                TypeRef::list_of(TypeRef::node::<Line>()),
                |o| o.lines.clone().into(),
                |o, v| {
                    o.lines = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "labels",
                TypeRef::map_of(TypeRef::Text, TypeRef::node::<Customer>()),
                |o| o.labels.clone().into(),
                |o, v| {
                    o.labels = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "notes",
                TypeRef::Map(MapKind::Sorted, Box::new(TypeRef::Int), Box::new(TypeRef::Text)),
                |o| o.notes.clone().into(),
                |o, v| {
                    o.notes = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "checksum",
                TypeRef::Array(ScalarType::Byte),
                |o| o.checksum.clone().into(),
                |o, v| {
                    o.checksum = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "placedAt",
                TypeRef::Temporal,
                |o| o.placed_at.into(),
                |o, v| {
                    o.placed_at = v.extract()?;
                    Ok(())
                },
            )
            // Derived, read-only
            .getter("getTotal", TypeRef::Int, |o| {
                let total: i64 = o
                    .lines
                    .as_ref()
                    .map(|lines| {
                        lines
                            .borrow()
                            .iter()
                            .filter_map(|v| v.as_node().and_then(|n| with_node::<Line, _>(n, |l| l.qty)))
                            .sum()
                    })
                    .unwrap_or(0);
                total.into()
            })
            .build()
    }
}

#[derive(Default)]
pub struct Customer {
    pub name: Option<Rc<str>>,
    pub active: bool,
}

impl NodeSchema for Customer {
    fn schema() -> NodeType {
        NodeType::builder::<Self>("Customer")
            .constructor(Customer::default)
            .attribute(
                "name",
                TypeRef::Text,
                |c| c.name.clone().into(),
                |c, v| {
                    c.name = v.extract()?;
                    Ok(())
                },
            )
            .getter("isActive", TypeRef::Bool, |c| c.active.into())
            .setter("setActive", TypeRef::Bool, |c, v| {
                c.active = v.extract()?;
                Ok(())
            })
            .build()
    }
}

#[derive(Default)]
pub struct Line {
    pub qty: i64,
    pub sku: Option<Rc<str>>,
}

impl NodeSchema for Line {
    fn schema() -> NodeType {
        NodeType::builder::<Self>("Line")
            .constructor(Line::default)
            .attribute(
                "qty",
                TypeRef::Int,
                |l| l.qty.into(),
                |l, v| {
                    l.qty = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "sku",
                TypeRef::Text,
                |l| l.sku.clone().into(),
                |l, v| {
                    l.sku = v.extract()?;
                    Ok(())
                },
            )
            .build()
    }
}

pub fn customer(name: &str) -> NodeRef {
    new_node(Customer {
        name: Some(Rc::from(name)),
        active: true,
    })
}

pub fn line(qty: i64) -> NodeRef {
    new_node(Line { qty, sku: None })
}

/// `Order{id:null, customer:Customer{name:"Ana"}, lines:[Line{qty:2}, Line{qty:5}]}`
pub fn sample_order() -> NodeRef {
    new_node(Order {
        customer: Some(customer("Ana")),
        lines: Some(
            [line(2), line(5)]
                .into_iter()
                .map(Value::Node)
                .collect::<ListValue>()
                .into_ref(),
        ),
        ..Order::default()
    })
}

pub fn order_field<R>(order: &NodeRef, f: impl FnOnce(&Order) -> R) -> R {
    with_node::<Order, _>(order, f).expect("not an Order")
}

// ========== Person model ==========

#[derive(Default)]
pub struct Person {
    pub name: Option<Rc<str>>,
    pub friend: Option<NodeRef>,
    pub friends: Option<ListRef>,
    pub contacts: Option<MapRef>,
}

impl NodeSchema for Person {
    fn schema() -> NodeType {
        NodeType::builder::<Self>("Person")
            .constructor(Person::default)
            .attribute(
                "name",
                TypeRef::Text,
                |p| p.name.clone().into(),
                |p, v| {
                    p.name = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "friend",
                TypeRef::node::<Person>(),
                |p| p.friend.clone().into(),
                |p, v| {
                    p.friend = v.extract()?;
                    Ok(())
                },
            )
            // Declared over the base node type; metadata may refine it
            .attribute(
                "friends",
                TypeRef::List(ListKind::Deque, Box::new(TypeRef::AnyNode)),
                |p| p.friends.clone().into(),
                |p, v| {
                    p.friends = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "contacts",
                TypeRef::map_of(TypeRef::node::<Person>(), TypeRef::Text),
                |p| p.contacts.clone().into(),
                |p, v| {
                    p.contacts = v.extract()?;
                    Ok(())
                },
            )
            .build()
    }
}

pub fn person(name: &str) -> NodeRef {
    new_node(Person {
        name: Some(Rc::from(name)),
        ..Person::default()
    })
}

pub fn set_friend(from: &NodeRef, to: &NodeRef) {
    with_node_mut_person(from, |p| p.friend = Some(to.clone()));
}

pub fn with_node_mut_person<R>(node: &NodeRef, f: impl FnOnce(&mut Person) -> R) -> R {
    graphkit_core::node::with_node_mut::<Person, _>(node, f).expect("not a Person")
}

pub fn friend_of(node: &NodeRef) -> Option<NodeRef> {
    with_node::<Person, _>(node, |p| p.friend.clone()).flatten()
}

pub fn name_of(node: &NodeRef) -> Option<Rc<str>> {
    with_node::<Person, _>(node, |p| p.name.clone()).flatten()
}

/// `n` persons where each one's friend is the next, the last pointing back at the first
pub fn ring(n: usize) -> Vec<NodeRef> {
    let people: Vec<NodeRef> = (0..n).map(|i| person(&format!("p{i}"))).collect();
    for (i, p) in people.iter().enumerate() {
        set_friend(p, &people[(i + 1) % n]);
    }
    people
}

// ========== Failing accessors ==========

#[derive(Default)]
pub struct Flaky {
    pub stable: i64,
    pub fragile: i64,
}

impl NodeSchema for Flaky {
    fn schema() -> NodeType {
        NodeType::builder::<Self>("Flaky")
            .constructor(Flaky::default)
            .attribute(
                "stable",
                TypeRef::Int,
                |f| f.stable.into(),
                |f, v| {
                    f.stable = v.extract()?;
                    Ok(())
                },
            )
            .try_getter("getFragile", TypeRef::Int, |_: &Flaky| -> Result<Value> {
                Err(GraphError::AccessFailed {
                    type_name: "Flaky".to_string(),
                    attribute: "fragile".to_string(),
                    reason: "sensor offline".to_string(),
                })
            })
            .setter("setFragile", TypeRef::Int, |f, v| {
                f.fragile = v.extract()?;
                Ok(())
            })
            .build()
    }
}

// ========== Opaque attributes ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub words: Vec<String>,
}

/// Opaque value whose marshal step always fails
pub struct Unmarshallable;

impl OpaqueValue for Unmarshallable {
    fn type_name(&self) -> &'static str {
        "Unmarshallable"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        Err(GraphError::Marshal {
            type_name: "Unmarshallable".to_string(),
            reason: "handle is not serializable".to_string(),
        })
    }

    fn unmarshal(&self, _bytes: &[u8]) -> Result<OpaqueRef> {
        Ok(Rc::new(Unmarshallable))
    }
}

#[derive(Default)]
pub struct Document {
    pub title: Option<Rc<str>>,
    pub body: Option<OpaqueRef>,
    pub handle: Option<OpaqueRef>,
}

impl NodeSchema for Document {
    fn schema() -> NodeType {
        NodeType::builder::<Self>("Document")
            .constructor(Document::default)
            .attribute(
                "title",
                TypeRef::Text,
                |d| d.title.clone().into(),
                |d, v| {
                    d.title = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "body",
                TypeRef::Opaque("Payload"),
                |d| d.body.clone().into(),
                |d, v| {
                    d.body = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "handle",
                TypeRef::Opaque("Unmarshallable"),
                |d| d.handle.clone().into(),
                |d, v| {
                    d.handle = v.extract()?;
                    Ok(())
                },
            )
            .build()
    }
}

pub fn document(title: &str, words: &[&str]) -> NodeRef {
    new_node(Document {
        title: Some(Rc::from(title)),
        body: Some(Marshalled::new_ref(Payload {
            words: words.iter().map(|w| w.to_string()).collect(),
        })),
        handle: None,
    })
}

pub fn payload_of(doc: &NodeRef) -> Option<OpaqueRef> {
    with_node::<Document, _>(doc, |d| d.body.clone()).flatten()
}

// ========== Shell strategies ==========

/// No constructor; cloned through its shallow-copy contract
pub struct Snapshot {
    pub label: Option<Rc<str>>,
    pub version: i64,
}

impl NodeSchema for Snapshot {
    fn schema() -> NodeType {
        NodeType::builder::<Self>("Snapshot")
            .attribute(
                "label",
                TypeRef::Text,
                |s| s.label.clone().into(),
                |s, v| {
                    s.label = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "version",
                TypeRef::Int,
                |s| s.version.into(),
                |s, v| {
                    s.version = v.extract()?;
                    Ok(())
                },
            )
            .build()
    }

    fn clone_shallow(&self) -> Option<Self> {
        Some(Snapshot {
            label: self.label.clone(),
            version: self.version,
        })
    }
}

/// Shallow-copy shell whose child cannot be cloned
pub struct Archive {
    pub sealed: Option<NodeRef>,
    pub shelf: i64,
}

impl NodeSchema for Archive {
    fn schema() -> NodeType {
        NodeType::builder::<Self>("Archive")
            .attribute(
                "sealed",
                TypeRef::node::<Sealed>(),
                |a| a.sealed.clone().into(),
                |a, v| {
                    a.sealed = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "shelf",
                TypeRef::Int,
                |a| a.shelf.into(),
                |a, v| {
                    a.shelf = v.extract()?;
                    Ok(())
                },
            )
            .build()
    }

    fn clone_shallow(&self) -> Option<Self> {
        Some(Archive {
            sealed: self.sealed.clone(),
            shelf: self.shelf,
        })
    }
}

/// Neither a constructor nor a shallow copy
pub struct Sealed {
    pub secret: i64,
}

impl NodeSchema for Sealed {
    fn schema() -> NodeType {
        NodeType::builder::<Self>("Sealed")
            .getter("getSecret", TypeRef::Int, |s| s.secret.into())
            .build()
    }
}

#[derive(Default)]
pub struct Holder {
    pub sealed: Option<NodeRef>,
    pub marker: i64,
}

impl NodeSchema for Holder {
    fn schema() -> NodeType {
        NodeType::builder::<Self>("Holder")
            .constructor(Holder::default)
            .attribute(
                "sealed",
                TypeRef::node::<Sealed>(),
                |h| h.sealed.clone().into(),
                |h, v| {
                    h.sealed = v.extract()?;
                    Ok(())
                },
            )
            .attribute(
                "marker",
                TypeRef::Int,
                |h| h.marker.into(),
                |h, v| {
                    h.marker = v.extract()?;
                    Ok(())
                },
            )
            .build()
    }
}
