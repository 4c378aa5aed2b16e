//! Selects whether the node port of a Service is used as backend instead of
//! its endpoints.
use std::{
    collections::BTreeMap,
    sync::{Arc, LazyLock},
};

use k8s_openapi::api::networking::v1::Ingress;

use crate::{
    annotations::BACKEND_GROUP,
    parser::{
        AnnotationError, AnnotationField, AnnotationGroup, AnnotationResultExt, AnnotationRisk,
        AnnotationScope, AnnotationValidator, IngressAnnotation, get_bool_annotation,
    },
    resolver::Resolver,
};

pub const USE_NODE_PORT_ANNOTATION: &str = "use-node-port";

static USE_NODE_PORT_ANNOTATIONS: LazyLock<AnnotationGroup> = LazyLock::new(|| AnnotationGroup {
    group: BACKEND_GROUP,
    annotations: BTreeMap::from([(
        USE_NODE_PORT_ANNOTATION,
        AnnotationField {
            validator: AnnotationValidator::Bool,
            scope: AnnotationScope::Location,
            risk: AnnotationRisk::Low,
            documentation: "This annotation enables using node port of a service in the backend",
        },
    )]),
});

#[derive(Debug)]
pub struct UseNodePort {
    resolver: Arc<dyn Resolver>,
}

impl UseNodePort {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }
}

impl IngressAnnotation for UseNodePort {
    type Config = bool;

    /// Returns `false` if the annotation is absent. Invalid booleans are
    /// returned as error.
    fn parse(&self, ingress: &Ingress) -> Result<bool, AnnotationError> {
        let use_node_port =
            get_bool_annotation(USE_NODE_PORT_ANNOTATION, ingress, self.documentation())
                .optional()?
                .unwrap_or_default();

        Ok(use_node_port)
    }

    fn group(&self) -> &AnnotationGroup {
        &USE_NODE_PORT_ANNOTATIONS
    }

    fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }
}
