//! Consistent hashing of requests onto upstream backends.
//!
//! The hash key is an expression made of text and nginx variables, e.g.
//! `$request_uri` or `${request_uri}-text-value`. Without the
//! `upstream-hash-by` annotation consistent hashing is disabled.
use std::{
    collections::BTreeMap,
    sync::{Arc, LazyLock},
};

use k8s_openapi::api::networking::v1::Ingress;
use regex::Regex;
use serde::Serialize;

use crate::{
    annotations::BACKEND_GROUP,
    parser::{
        AnnotationError, AnnotationField, AnnotationGroup, AnnotationResultExt, AnnotationRisk,
        AnnotationScope, AnnotationValidator, IngressAnnotation, get_bool_annotation,
        get_float_annotation, get_int_annotation, get_string_annotation,
    },
    resolver::Resolver,
};

pub const UPSTREAM_HASH_BY_ANNOTATION: &str = "upstream-hash-by";
pub const UPSTREAM_HASH_BY_SUBSET_ANNOTATION: &str = "upstream-hash-by-subset";
pub const UPSTREAM_HASH_BY_SUBSET_SIZE_ANNOTATION: &str = "upstream-hash-by-subset-size";
pub const UPSTREAM_HASH_BY_BALANCE_FACTOR_ANNOTATION: &str = "upstream-hash-by-balance-factor";
pub const UPSTREAM_HASH_BY_ENABLE_SEED_BY_HOST_ANNOTATION: &str =
    "upstream-hash-by-enable-seed-by-host";

/// The subset size used when none (or zero) is configured.
pub const DEFAULT_SUBSET_SIZE: i64 = 3;

// Alphanumerics, '-' and the characters needed to reference nginx variables
static HASH_BY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\-_\$\{\}]*$").expect("failed to compile upstream hash by regex")
});

static UPSTREAM_HASH_BY_ANNOTATIONS: LazyLock<AnnotationGroup> = LazyLock::new(|| {
    AnnotationGroup {
        group: BACKEND_GROUP,
        annotations: BTreeMap::from([
            (
                UPSTREAM_HASH_BY_ANNOTATION,
                AnnotationField {
                    validator: AnnotationValidator::Regex {
                        regex: &HASH_BY_REGEX,
                        allow_empty: true,
                    },
                    scope: AnnotationScope::Location,
                    // Grants access to nginx variables
                    risk: AnnotationRisk::High,
                    documentation: "This annotation defines the nginx variable, text value or \
                        any combination thereof to use for consistent hashing. For example: \
                        \"$request_uri\", \"$request_uri$host\" or \"${request_uri}-text-value\" \
                        to consistently hash upstream requests by the current request URI.",
                },
            ),
            (
                UPSTREAM_HASH_BY_SUBSET_ANNOTATION,
                AnnotationField {
                    validator: AnnotationValidator::Bool,
                    scope: AnnotationScope::Location,
                    risk: AnnotationRisk::Low,
                    documentation: "This annotation maps requests to subset of nodes instead of \
                        a single one.",
                },
            ),
            (
                UPSTREAM_HASH_BY_SUBSET_SIZE_ANNOTATION,
                AnnotationField {
                    validator: AnnotationValidator::Int,
                    scope: AnnotationScope::Location,
                    risk: AnnotationRisk::Low,
                    documentation: "This annotation determines the size of each subset \
                        (default 3)",
                },
            ),
            (
                UPSTREAM_HASH_BY_BALANCE_FACTOR_ANNOTATION,
                AnnotationField {
                    validator: AnnotationValidator::Float,
                    scope: AnnotationScope::Location,
                    risk: AnnotationRisk::Low,
                    documentation: "This annotation determines the balance factor",
                },
            ),
            (
                UPSTREAM_HASH_BY_ENABLE_SEED_BY_HOST_ANNOTATION,
                AnnotationField {
                    validator: AnnotationValidator::Bool,
                    scope: AnnotationScope::Location,
                    risk: AnnotationRisk::Low,
                    documentation: "This annotation determines whether to enable seed by host",
                },
            ),
        ]),
    }
});

/// The consistent hash configuration of an Ingress.
///
/// Field names match the annotation names.
#[allow(clippy::struct_field_names)]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// The hash key expression. Empty if consistent hashing is disabled.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub upstream_hash_by: String,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub upstream_hash_by_subset: bool,

    pub upstream_hash_by_subset_size: i64,

    #[serde(skip_serializing_if = "is_zero")]
    pub upstream_hash_by_balance_factor: f32,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub upstream_hash_by_enable_seed_by_host: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_hash_by: String::new(),
            upstream_hash_by_subset: false,
            upstream_hash_by_subset_size: DEFAULT_SUBSET_SIZE,
            upstream_hash_by_balance_factor: 0.0,
            upstream_hash_by_enable_seed_by_host: false,
        }
    }
}

impl Config {
    /// Returns whether requests are consistently hashed at all.
    pub fn is_enabled(&self) -> bool {
        !self.upstream_hash_by.is_empty()
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &f32) -> bool {
    *value == 0.0
}

#[derive(Debug)]
pub struct UpstreamHashBy {
    resolver: Arc<dyn Resolver>,
}

impl UpstreamHashBy {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }
}

impl IngressAnnotation for UpstreamHashBy {
    type Config = Config;

    fn parse(&self, ingress: &Ingress) -> Result<Config, AnnotationError> {
        let fields = self.documentation();

        let upstream_hash_by = get_string_annotation(UPSTREAM_HASH_BY_ANNOTATION, ingress, fields)
            .optional()?
            .unwrap_or_default();

        let upstream_hash_by_subset =
            get_bool_annotation(UPSTREAM_HASH_BY_SUBSET_ANNOTATION, ingress, fields)
                .optional()?
                .unwrap_or_default();

        // Zero is never a meaningful subset size
        let upstream_hash_by_subset_size =
            match get_int_annotation(UPSTREAM_HASH_BY_SUBSET_SIZE_ANNOTATION, ingress, fields)
                .optional()?
            {
                None | Some(0) => DEFAULT_SUBSET_SIZE,
                Some(size) => size,
            };

        let upstream_hash_by_balance_factor =
            get_float_annotation(UPSTREAM_HASH_BY_BALANCE_FACTOR_ANNOTATION, ingress, fields)
                .optional()?
                .unwrap_or_default();

        let upstream_hash_by_enable_seed_by_host =
            get_bool_annotation(UPSTREAM_HASH_BY_ENABLE_SEED_BY_HOST_ANNOTATION, ingress, fields)
                .optional()?
                .unwrap_or_default();

        Ok(Config {
            upstream_hash_by,
            upstream_hash_by_subset,
            upstream_hash_by_subset_size,
            upstream_hash_by_balance_factor,
            upstream_hash_by_enable_seed_by_host,
        })
    }

    fn group(&self) -> &AnnotationGroup {
        &UPSTREAM_HASH_BY_ANNOTATIONS
    }

    fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }
}
