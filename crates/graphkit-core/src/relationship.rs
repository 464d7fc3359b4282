//! Relationship metadata collaborator
//!
//! Supplies, per `(owner type, attribute)`, the concrete target type stored
//! in a LIST/MAP declared over the graph-node base type, and whether the
//! attribute is a composition or an association.

use std::any::TypeId;
use std::collections::HashMap;

use crate::node::{NodeKey, NodeSchema};

/// How an attribute relates its owner to the referenced nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// The owner owns the referenced nodes
    Composition,
    /// The owner only refers to nodes owned elsewhere
    Association,
}

/// Relationship metadata lookup consumed by the descriptor resolver
pub trait RelationshipMetadata: Send + Sync {
    /// Concrete element type stored under `attribute`, if registered
    fn target_type(&self, owner: &NodeKey, attribute: &str) -> Option<NodeKey>;

    /// Relationship classification of `attribute`, if registered
    fn relationship_kind(&self, owner: &NodeKey, attribute: &str) -> Option<RelationshipKind>;
}

/// Metadata source that knows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRelationshipMetadata;

impl RelationshipMetadata for NoRelationshipMetadata {
    fn target_type(&self, _owner: &NodeKey, _attribute: &str) -> Option<NodeKey> {
        None
    }

    fn relationship_kind(&self, _owner: &NodeKey, _attribute: &str) -> Option<RelationshipKind> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct Relationship {
    target: Option<NodeKey>,
    kind: RelationshipKind,
}

/// Metadata declared up front, keyed by owner type and attribute name
///
/// # Example
/// ```
/// use graphkit_core::node::{NodeKey, NodeSchema, NodeType};
/// use graphkit_core::relationship::{
///     RelationshipKind, RelationshipMetadata, StaticRelationshipMetadata,
/// };
///
/// struct Folder;
/// impl NodeSchema for Folder {
///     fn schema() -> NodeType {
///         NodeType::builder::<Self>("Folder").build()
///     }
/// }
///
/// let meta = StaticRelationshipMetadata::new()
///     .with_target::<Folder, Folder>("children", RelationshipKind::Composition);
///
/// let owner = NodeKey::of::<Folder>();
/// assert_eq!(meta.target_type(&owner, "children"), Some(owner));
/// assert_eq!(
///     meta.relationship_kind(&owner, "children"),
///     Some(RelationshipKind::Composition)
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticRelationshipMetadata {
    entries: HashMap<(TypeId, String), Relationship>,
}

impl StaticRelationshipMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the concrete target type held by `attribute` of `Owner`
    pub fn with_target<Owner: NodeSchema, Target: NodeSchema>(
        mut self,
        attribute: &str,
        kind: RelationshipKind,
    ) -> Self {
        self.entries.insert(
            (TypeId::of::<Owner>(), attribute.to_string()),
            Relationship {
                target: Some(NodeKey::of::<Target>()),
                kind,
            },
        );
        self
    }

    /// Register only the relationship kind of `attribute` of `Owner`
    pub fn with_kind<Owner: NodeSchema>(mut self, attribute: &str, kind: RelationshipKind) -> Self {
        self.entries.insert(
            (TypeId::of::<Owner>(), attribute.to_string()),
            Relationship { target: None, kind },
        );
        self
    }

    fn lookup(&self, owner: &NodeKey, attribute: &str) -> Option<&Relationship> {
        self.entries.get(&(owner.type_id(), attribute.to_string()))
    }
}

impl RelationshipMetadata for StaticRelationshipMetadata {
    fn target_type(&self, owner: &NodeKey, attribute: &str) -> Option<NodeKey> {
        self.lookup(owner, attribute).and_then(|r| r.target)
    }

    fn relationship_kind(&self, owner: &NodeKey, attribute: &str) -> Option<RelationshipKind> {
        self.lookup(owner, attribute).map(|r| r.kind)
    }
}
