//! Path expressions and the path resolver

pub mod expr;
pub mod resolver;

pub use expr::{KeyType, PathExpr, Segment, Selector};
pub use resolver::PathResolver;
