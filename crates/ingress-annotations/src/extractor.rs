//! Runs every feature parser over a single Ingress.
//!
//! Failures are tracked per feature. A denied or invalid annotation only
//! disables the feature it belongs to, parsing of all other features
//! continues. Whether a failed feature invalidates the whole Ingress is up to
//! the caller.
use std::{collections::BTreeMap, sync::Arc};

use k8s_openapi::api::networking::v1::Ingress;
use serde::Serialize;
use snafu::{ResultExt, Snafu};

use crate::{
    annotations::{
        upstream_hash_by::{self, UpstreamHashBy},
        use_node_port::UseNodePort,
    },
    parser::{AnnotationError, AnnotationGroup, IngressAnnotation, RiskErrors},
    resolver::Resolver,
};

pub const UPSTREAM_HASH_BY_FEATURE: &str = "upstream-hash-by";
pub const USE_NODE_PORT_FEATURE: &str = "use-node-port";

/// The reason a single feature could not be configured.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum FeatureError {
    #[snafu(display("annotations exceed the allowed risk level"))]
    RiskDenied { source: RiskErrors },

    #[snafu(display("failed to parse annotations"))]
    Parse { source: AnnotationError },
}

/// The configuration of every feature. A feature is [`None`] if it failed,
/// see [`Extracted::errors`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressAnnotations {
    pub upstream_hash_by: Option<upstream_hash_by::Config>,
    pub use_node_port: Option<bool>,
}

#[derive(Debug, PartialEq)]
pub struct Extracted {
    pub annotations: IngressAnnotations,

    /// The errors of failed features, keyed by feature name.
    pub errors: BTreeMap<&'static str, FeatureError>,
}

impl Extracted {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug)]
pub struct Extractor {
    upstream_hash_by: UpstreamHashBy,
    use_node_port: UseNodePort,
}

impl Extractor {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self {
            upstream_hash_by: UpstreamHashBy::new(resolver.clone()),
            use_node_port: UseNodePort::new(resolver),
        }
    }

    pub fn extract(&self, ingress: &Ingress) -> Extracted {
        let mut errors = BTreeMap::new();

        let annotations = IngressAnnotations {
            upstream_hash_by: run_feature(
                UPSTREAM_HASH_BY_FEATURE,
                &self.upstream_hash_by,
                ingress,
                &mut errors,
            ),
            use_node_port: run_feature(
                USE_NODE_PORT_FEATURE,
                &self.use_node_port,
                ingress,
                &mut errors,
            ),
        };

        Extracted {
            annotations,
            errors,
        }
    }

    /// Returns the registries of all features, for example to render
    /// documentation.
    pub fn groups(&self) -> [(&'static str, &AnnotationGroup); 2] {
        [
            (UPSTREAM_HASH_BY_FEATURE, self.upstream_hash_by.group()),
            (USE_NODE_PORT_FEATURE, self.use_node_port.group()),
        ]
    }
}

fn run_feature<P: IngressAnnotation>(
    feature: &'static str,
    parser: &P,
    ingress: &Ingress,
    errors: &mut BTreeMap<&'static str, FeatureError>,
) -> Option<P::Config> {
    let no_annotations = BTreeMap::new();
    let annotations = ingress
        .metadata
        .annotations
        .as_ref()
        .unwrap_or(&no_annotations);

    let result = parser
        .validate(annotations)
        .context(RiskDeniedSnafu)
        .and_then(|()| parser.parse(ingress).context(ParseSnafu));

    match result {
        Ok(config) => Some(config),
        Err(err) => {
            tracing::warn!(
                feature,
                ingress.name = ?ingress.metadata.name,
                ingress.namespace = ?ingress.metadata.namespace,
                error = &err as &dyn std::error::Error,
                "ignoring annotations of feature"
            );
            errors.insert(feature, err);
            None
        }
    }
}
