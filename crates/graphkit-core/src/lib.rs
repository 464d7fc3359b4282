//! graphkit core - object-graph navigation and deep cloning
//!
//! This crate provides:
//! - A node capability (`NodeSchema`/`GraphNode`) through which node types
//!   declare named `get`/`is`/`are`/`set` accessors
//! - The attribute descriptor resolver and its thread-safe `Registry`
//! - A path resolver reading and writing nested attributes by expressions
//!   such as `lines[1].qty` or `labels[7{int}]`
//! - A recursive clone engine preserving shared references and cycles
//!
//! # Example
//!
//! ```
//! use graphkit_core::node::{new_node, NodeSchema, NodeType, TypeRef};
//! use graphkit_core::{PathResolver, Registry, Value};
//!
//! struct Customer {
//!     name: Option<String>,
//! }
//!
//! impl NodeSchema for Customer {
//!     fn schema() -> NodeType {
//!         NodeType::builder::<Self>("Customer")
//!             .constructor(|| Customer { name: None })
//!             .attribute(
//!                 "name",
//!                 TypeRef::Text,
//!                 |c| c.name.clone().into(),
//!                 |c, v| {
//!                     c.name = v.extract()?;
//!                     Ok(())
//!                 },
//!             )
//!             .build()
//!     }
//! }
//!
//! let registry = Registry::new();
//! let resolver = PathResolver::new(&registry);
//! let ana = new_node(Customer { name: Some("Ana".to_string()) });
//!
//! let name = resolver.resolve(&Value::Node(ana), "name").unwrap();
//! assert_eq!(name, Value::text("Ana"));
//! ```

pub use graphkit_core_types as types;

pub mod clone_engine;
pub mod config;
pub mod descriptor;
pub mod errors;
pub mod logging_facility;
pub mod node;
pub mod path;
pub mod relationship;
pub mod value;

// Re-export commonly used types
pub use clone_engine::{CloneEngine, CloneReport, IdentityMap};
pub use config::{ListIndexWrite, NavigatorConfig};
pub use descriptor::{AttributeDescriptor, ContainerKind, Registry};
pub use errors::{ExError, ExErrorKind, GraphError, Result};
pub use node::{GraphNode, NodeKey, NodeRef, NodeSchema, NodeType, TypeRef};
pub use path::{PathExpr, PathResolver};
pub use relationship::{RelationshipKind, RelationshipMetadata, StaticRelationshipMetadata};
pub use value::{MapKey, Value};
