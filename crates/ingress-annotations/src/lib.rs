//! Typed extraction, validation and risk gating of annotations attached to
//! Kubernetes [`Ingress`](k8s_openapi::api::networking::v1::Ingress) objects.
//!
//! Every feature owns an [`AnnotationGroup`](parser::AnnotationGroup), a
//! registry describing the annotations it reads together with their
//! validators, scopes and declared risk levels. Feature parsers implement
//! [`IngressAnnotation`](parser::IngressAnnotation), which provides parsing,
//! risk validation and documentation from that single registry.
//!
//! ```
//! # use std::{collections::BTreeMap, sync::Arc};
//! # use ingress_annotations::{
//! #     annotations::use_node_port::UseNodePort,
//! #     k8s_openapi::api::networking::v1::Ingress,
//! #     parser::IngressAnnotation,
//! #     resolver::StaticResolver,
//! # };
//! let mut ingress = Ingress::default();
//! ingress.metadata.annotations = Some(BTreeMap::from([(
//!     "nginx.ingress.kubernetes.io/use-node-port".to_owned(),
//!     "true".to_owned(),
//! )]));
//!
//! let parser = UseNodePort::new(Arc::new(StaticResolver::default()));
//! assert!(parser.parse(&ingress).unwrap());
//! ```

pub mod annotations;
pub mod docs;
pub mod extractor;
pub mod parser;
pub mod resolver;

// External re-exports
pub use k8s_openapi;
