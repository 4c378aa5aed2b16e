//! The annotation field registry, typed extraction functions and the uniform
//! [`IngressAnnotation`] contract every feature parser implements.
//!
//! Annotations are looked up by name. The fully qualified key is always
//! [`ANNOTATIONS_PREFIX`] followed by a slash and the name, e.g.
//! `nginx.ingress.kubernetes.io/use-node-port`.
use std::collections::BTreeMap;

use const_format::concatcp;
use k8s_openapi::api::networking::v1::Ingress;
use serde::Serialize;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::resolver::Resolver;

mod risk;
mod validator;

pub use risk::*;
pub use validator::*;

/// The prefix shared by all annotations read by this crate.
pub const ANNOTATIONS_PREFIX: &str = "nginx.ingress.kubernetes.io";

const ANNOTATIONS_KEY_PREFIX: &str = concatcp!(ANNOTATIONS_PREFIX, "/");

/// The error type for typed annotation extraction.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum AnnotationError {
    /// Indicates that the resource doesn't carry the annotation. Parsers may
    /// treat this as "use the default", see [`AnnotationResultExt::optional`].
    #[snafu(display("annotation {annotation:?} is missing"))]
    MissingAnnotation { annotation: String },

    /// Indicates that the annotation name has no entry in the registry, which
    /// means there is no validator to apply.
    #[snafu(display("annotation {name:?} is not registered"))]
    InvalidAnnotationName { name: String },

    /// Indicates that the annotation is present but its value was rejected.
    #[snafu(display("annotation {annotation:?} contains invalid value {value:?}"))]
    InvalidContent {
        source: ValidationError,
        annotation: String,
        value: String,
    },
}

impl AnnotationError {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::MissingAnnotation { .. })
    }
}

/// Helpers for results of the `get_*_annotation` functions.
pub trait AnnotationResultExt<T> {
    /// Turns a [`AnnotationError::MissingAnnotation`] into [`None`]. Every
    /// other error is kept.
    fn optional(self) -> Result<Option<T>, AnnotationError>;
}

impl<T> AnnotationResultExt<T> for Result<T, AnnotationError> {
    fn optional(self) -> Result<Option<T>, AnnotationError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_missing() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// The structural level at which an annotation is interpreted.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnnotationScope {
    /// The annotation applies to every path (location) of the Ingress.
    Location,

    /// The annotation applies to the Ingress as a whole.
    Ingress,

    /// The annotation affects global controller behaviour.
    Global,
}

/// Describes a single annotation: how its value is validated, where it
/// applies, how risky it is and what it does.
#[derive(Clone, Debug)]
pub struct AnnotationField {
    pub validator: AnnotationValidator,
    pub scope: AnnotationScope,
    pub risk: AnnotationRisk,
    pub documentation: &'static str,
}

/// The registry of a feature, mapping annotation names (without prefix) to
/// their [`AnnotationField`].
pub type AnnotationFields = BTreeMap<&'static str, AnnotationField>;

/// All annotations of a feature, grouped under a name like `backend`.
#[derive(Clone, Debug)]
pub struct AnnotationGroup {
    pub group: &'static str,
    pub annotations: AnnotationFields,
}

/// The uniform contract of feature parsers.
///
/// Parsing and risk validation are independent. A resource can carry a
/// syntactically valid but denied annotation, or vice versa. Callers run
/// both and decide what a failure means for the resource.
pub trait IngressAnnotation {
    /// The typed configuration produced by [`IngressAnnotation::parse`].
    type Config;

    /// Extracts the feature configuration from the annotations of `ingress`.
    fn parse(&self, ingress: &Ingress) -> Result<Self::Config, AnnotationError>;

    /// The registry of this feature.
    fn group(&self) -> &AnnotationGroup;

    /// The resolver supplying the security configuration.
    fn resolver(&self) -> &dyn Resolver;

    /// Denies annotations of this feature exceeding the risk level configured
    /// by the [`Resolver`].
    fn validate(&self, annotations: &BTreeMap<String, String>) -> Result<(), RiskErrors> {
        let security_configuration = self.resolver().security_configuration();
        let max_risk = AnnotationRisk::from_config_str(&security_configuration.annotations_risk_level);

        check_annotation_risk(annotations, max_risk, self.documentation())
    }

    /// The fields of this feature, exactly as used by `parse` and `validate`.
    fn documentation(&self) -> &AnnotationFields {
        &self.group().annotations
    }
}

/// Returns the fully qualified key of the annotation `name`.
pub fn annotation_with_prefix(name: &str) -> String {
    format!("{ANNOTATIONS_KEY_PREFIX}{name}")
}

/// Strips [`ANNOTATIONS_PREFIX`] from a fully qualified key. Returns [`None`]
/// for keys using another prefix.
pub fn trim_annotation_prefix(key: &str) -> Option<&str> {
    key.strip_prefix(ANNOTATIONS_KEY_PREFIX)
}

/// Looks up the raw value of `name` and runs the registered validator on it.
fn checked_annotation<'a>(
    name: &str,
    ingress: &'a Ingress,
    fields: &AnnotationFields,
) -> Result<&'a str, AnnotationError> {
    let field = fields
        .get(name)
        .context(InvalidAnnotationNameSnafu { name })?;

    let annotation = annotation_with_prefix(name);
    let value = ingress
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(&annotation))
        .context(MissingAnnotationSnafu {
            annotation: &annotation,
        })?;

    field
        .validator
        .validate(value)
        .context(InvalidContentSnafu { annotation, value })?;

    tracing::trace!(annotation = name, value, "validated annotation");
    Ok(value)
}

fn converted_annotation<T>(
    name: &str,
    ingress: &Ingress,
    fields: &AnnotationFields,
    convert: impl FnOnce(&str) -> Result<T, ValidationError>,
) -> Result<T, AnnotationError> {
    let value = checked_annotation(name, ingress, fields)?;

    convert(value).context(InvalidContentSnafu {
        annotation: annotation_with_prefix(name),
        value,
    })
}

pub fn get_string_annotation(
    name: &str,
    ingress: &Ingress,
    fields: &AnnotationFields,
) -> Result<String, AnnotationError> {
    checked_annotation(name, ingress, fields).map(str::to_owned)
}

pub fn get_bool_annotation(
    name: &str,
    ingress: &Ingress,
    fields: &AnnotationFields,
) -> Result<bool, AnnotationError> {
    converted_annotation(name, ingress, fields, parse_bool)
}

pub fn get_int_annotation(
    name: &str,
    ingress: &Ingress,
    fields: &AnnotationFields,
) -> Result<i64, AnnotationError> {
    converted_annotation(name, ingress, fields, parse_int)
}

pub fn get_float_annotation(
    name: &str,
    ingress: &Ingress,
    fields: &AnnotationFields,
) -> Result<f32, AnnotationError> {
    converted_annotation(name, ingress, fields, parse_float)
}

#[cfg(test)]
mod test {
    use std::sync::LazyLock;

    use regex::Regex;
    use rstest::rstest;

    use super::*;

    static WORD_REGEX: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\w*$").expect("failed to compile test regex"));

    fn field(validator: AnnotationValidator) -> AnnotationField {
        AnnotationField {
            validator,
            scope: AnnotationScope::Location,
            risk: AnnotationRisk::Low,
            documentation: "test",
        }
    }

    fn fields() -> AnnotationFields {
        BTreeMap::from([
            (
                "word",
                field(AnnotationValidator::Regex {
                    regex: &WORD_REGEX,
                    allow_empty: false,
                }),
            ),
            ("flag", field(AnnotationValidator::Bool)),
            ("count", field(AnnotationValidator::Int)),
            ("factor", field(AnnotationValidator::Float)),
        ])
    }

    fn ingress(annotations: &[(&str, &str)]) -> Ingress {
        let mut ingress = Ingress::default();
        ingress.metadata.annotations = Some(
            annotations
                .iter()
                .map(|(name, value)| (annotation_with_prefix(name), (*value).to_owned()))
                .collect(),
        );
        ingress
    }

    #[test]
    fn prefix_round_trip() {
        let key = annotation_with_prefix("use-node-port");

        assert_eq!(key, "nginx.ingress.kubernetes.io/use-node-port");
        assert_eq!(trim_annotation_prefix(&key), Some("use-node-port"));
        assert_eq!(trim_annotation_prefix("example.com/use-node-port"), None);
    }

    #[test]
    fn missing_without_annotations() {
        let err = get_bool_annotation("flag", &Ingress::default(), &fields()).unwrap_err();

        assert!(err.is_missing());
        assert_eq!(
            err,
            AnnotationError::MissingAnnotation {
                annotation: "nginx.ingress.kubernetes.io/flag".to_owned()
            }
        );
    }

    #[test]
    fn missing_with_other_annotations() {
        let err = get_int_annotation("count", &ingress(&[("flag", "true")]), &fields())
            .unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn unregistered_name() {
        let err = get_string_annotation("unknown", &ingress(&[("unknown", "x")]), &fields())
            .unwrap_err();

        assert_eq!(
            err,
            AnnotationError::InvalidAnnotationName {
                name: "unknown".to_owned()
            }
        );
    }

    #[test]
    fn typed_values() {
        let ingress = ingress(&[
            ("word", "hello"),
            ("flag", "TRUE"),
            ("count", "42"),
            ("factor", "1.5"),
        ]);
        let fields = fields();

        assert_eq!(
            get_string_annotation("word", &ingress, &fields).unwrap(),
            "hello"
        );
        assert!(get_bool_annotation("flag", &ingress, &fields).unwrap());
        assert_eq!(get_int_annotation("count", &ingress, &fields).unwrap(), 42);
        assert_eq!(get_float_annotation("factor", &ingress, &fields).unwrap(), 1.5);
    }

    #[rstest]
    #[case("word", "two words")]
    #[case("word", "")]
    #[case("flag", "abc")]
    #[case("count", "1.5")]
    #[case("factor", "fast")]
    fn invalid_values(#[case] name: &str, #[case] value: &str) {
        let ingress = ingress(&[(name, value)]);

        let err = get_string_annotation(name, &ingress, &fields()).unwrap_err();
        assert!(
            matches!(err, AnnotationError::InvalidContent { .. }),
            "unexpected error {err:?}"
        );
        assert!(!err.is_missing());
    }

    #[test]
    fn conversion_is_checked() {
        // The regex accepts the value, the boolean conversion does not.
        let ingress = ingress(&[("word", "yes")]);

        let err = get_bool_annotation("word", &ingress, &fields()).unwrap_err();
        assert_eq!(
            err,
            AnnotationError::InvalidContent {
                source: ValidationError::InvalidBool {
                    value: "yes".to_owned()
                },
                annotation: "nginx.ingress.kubernetes.io/word".to_owned(),
                value: "yes".to_owned(),
            }
        );
    }

    #[rstest]
    #[case(Ok(1), Ok(Some(1)))]
    #[case(
        Err(AnnotationError::MissingAnnotation { annotation: "a".to_owned() }),
        Ok(None)
    )]
    #[case(
        Err(AnnotationError::InvalidAnnotationName { name: "a".to_owned() }),
        Err(AnnotationError::InvalidAnnotationName { name: "a".to_owned() })
    )]
    fn optional(
        #[case] input: Result<i64, AnnotationError>,
        #[case] expected: Result<Option<i64>, AnnotationError>,
    ) {
        assert_eq!(input.optional(), expected);
    }
}
