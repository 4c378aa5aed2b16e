use std::{collections::BTreeMap, fmt::Display};

use serde::Serialize;
use snafu::Snafu;

use crate::parser::{AnnotationFields, trim_annotation_prefix};

/// The declared sensitivity of an annotation.
///
/// Risk levels are totally ordered from [`AnnotationRisk::Low`] to
/// [`AnnotationRisk::Critical`]. Operators configure the highest level they
/// accept and every annotation declaring a higher risk is denied, see
/// [`check_annotation_risk`].
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
    strum::EnumIter,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum AnnotationRisk {
    Low,
    Medium,
    High,
    Critical,
}

impl AnnotationRisk {
    /// Resolves the risk level configured by an operator.
    ///
    /// The names are matched case-insensitively. Unknown names resolve to
    /// [`AnnotationRisk::Low`], the most restrictive level.
    pub fn from_config_str(input: &str) -> Self {
        input.parse().unwrap_or_else(|_| {
            tracing::warn!(
                risk_level = input,
                "unknown annotations risk level, falling back to Low"
            );
            Self::Low
        })
    }
}

/// A collection of annotations denied by [`check_annotation_risk`].
#[derive(Debug, PartialEq, Eq)]
pub struct RiskErrors(Vec<RiskError>);

impl RiskErrors {
    pub fn iter(&self) -> std::slice::Iter<'_, RiskError> {
        self.0.iter()
    }

    /// Returns the fully qualified names of all denied annotations.
    pub fn annotations(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|RiskError::TooRisky { annotation, .. }| annotation.as_str())
    }
}

impl<'a> IntoIterator for &'a RiskErrors {
    type IntoIter = std::slice::Iter<'a, RiskError>;
    type Item = &'a RiskError;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Display for RiskErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RiskErrors {}

/// A single annotation denied by the risk gate.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum RiskError {
    #[snafu(display(
        "annotation {annotation:?} with risk {risk} is too risky for the maximum risk {max_risk}"
    ))]
    TooRisky {
        annotation: String,
        risk: AnnotationRisk,
        max_risk: AnnotationRisk,
    },
}

/// Denies every annotation in `annotations` which is registered in `fields`
/// and declares a risk strictly greater than `max_risk`.
///
/// Annotations without the controller prefix or without an entry in
/// `fields` are not evaluated. All denied annotations are reported, ordered
/// by key.
pub fn check_annotation_risk(
    annotations: &BTreeMap<String, String>,
    max_risk: AnnotationRisk,
    fields: &AnnotationFields,
) -> Result<(), RiskErrors> {
    let errors = annotations
        .keys()
        .filter_map(|annotation| {
            let field = fields.get(trim_annotation_prefix(annotation)?)?;

            (field.risk > max_risk).then(|| {
                TooRiskySnafu {
                    annotation,
                    risk: field.risk,
                    max_risk,
                }
                .build()
            })
        })
        .collect::<Vec<_>>();

    if errors.is_empty() {
        return Ok(());
    }

    tracing::debug!(
        denied = errors.len(),
        %max_risk,
        "annotations exceed the configured risk level"
    );
    Err(RiskErrors(errors))
}

#[cfg(test)]
mod test {
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::parser::{AnnotationField, AnnotationScope, AnnotationValidator};

    fn fields(risk: AnnotationRisk) -> AnnotationFields {
        BTreeMap::from([(
            "test-annotation",
            AnnotationField {
                validator: AnnotationValidator::Bool,
                scope: AnnotationScope::Location,
                risk,
                documentation: "test",
            },
        )])
    }

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[rstest]
    #[case("Low", AnnotationRisk::Low)]
    #[case("medium", AnnotationRisk::Medium)]
    #[case("HIGH", AnnotationRisk::High)]
    #[case("Critical", AnnotationRisk::Critical)]
    #[case("", AnnotationRisk::Low)]
    #[case("extreme", AnnotationRisk::Low)]
    fn risk_from_config_str(#[case] input: &str, #[case] expected: AnnotationRisk) {
        assert_eq!(AnnotationRisk::from_config_str(input), expected);
    }

    #[test]
    fn risk_is_totally_ordered() {
        let risks = AnnotationRisk::iter().collect::<Vec<_>>();
        assert!(risks.is_sorted());
        assert_eq!(risks.len(), 4);
    }

    #[test]
    fn risk_display_round_trips() {
        for risk in AnnotationRisk::iter() {
            assert_eq!(risk.to_string().parse::<AnnotationRisk>().unwrap(), risk);
        }
    }

    #[test]
    fn gate_denies_iff_risk_exceeds_ceiling() {
        let anns = annotations(&[("nginx.ingress.kubernetes.io/test-annotation", "true")]);

        for declared in AnnotationRisk::iter() {
            for max_risk in AnnotationRisk::iter() {
                let result = check_annotation_risk(&anns, max_risk, &fields(declared));
                assert_eq!(
                    result.is_err(),
                    declared > max_risk,
                    "declared {declared}, maximum {max_risk}"
                );
            }
        }
    }

    #[test]
    fn gate_names_denied_annotation() {
        let anns = annotations(&[("nginx.ingress.kubernetes.io/test-annotation", "true")]);

        let err =
            check_annotation_risk(&anns, AnnotationRisk::Low, &fields(AnnotationRisk::High))
                .unwrap_err();

        assert_eq!(
            err.annotations().collect::<Vec<_>>(),
            ["nginx.ingress.kubernetes.io/test-annotation"]
        );
        assert_eq!(
            err.iter().next(),
            Some(&RiskError::TooRisky {
                annotation: "nginx.ingress.kubernetes.io/test-annotation".to_owned(),
                risk: AnnotationRisk::High,
                max_risk: AnnotationRisk::Low,
            })
        );
    }

    #[test]
    fn gate_reports_all_denied_annotations() {
        let mut fields = fields(AnnotationRisk::Critical);
        fields.insert(
            "other-annotation",
            AnnotationField {
                validator: AnnotationValidator::Int,
                scope: AnnotationScope::Ingress,
                risk: AnnotationRisk::High,
                documentation: "other",
            },
        );
        let anns = annotations(&[
            ("nginx.ingress.kubernetes.io/test-annotation", "true"),
            ("nginx.ingress.kubernetes.io/other-annotation", "1"),
        ]);

        let err = check_annotation_risk(&anns, AnnotationRisk::Medium, &fields).unwrap_err();
        assert_eq!(
            err.annotations().collect::<Vec<_>>(),
            [
                "nginx.ingress.kubernetes.io/other-annotation",
                "nginx.ingress.kubernetes.io/test-annotation"
            ]
        );
    }

    #[rstest]
    #[case("test-annotation")]
    #[case("example.com/test-annotation")]
    #[case("nginx.ingress.kubernetes.io/unknown")]
    fn gate_ignores_unregistered_annotations(#[case] key: &str) {
        let anns = annotations(&[(key, "true")]);

        check_annotation_risk(&anns, AnnotationRisk::Low, &fields(AnnotationRisk::Critical))
            .unwrap();
    }

    #[test]
    fn gate_passes_without_annotations() {
        check_annotation_risk(
            &BTreeMap::new(),
            AnnotationRisk::Low,
            &fields(AnnotationRisk::Critical),
        )
        .unwrap();
    }
}
