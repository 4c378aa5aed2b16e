//! Feature parsers built on top of the [`parser`](crate::parser) framework.
//!
//! Each module owns the registry of its annotations and a parser
//! implementing [`IngressAnnotation`](crate::parser::IngressAnnotation).

pub mod upstream_hash_by;
pub mod use_node_port;

/// The group of annotations configuring how backends are selected.
const BACKEND_GROUP: &str = "backend";
