//! Access to cluster-wide configuration needed while processing annotations.
use std::fmt::Debug;

/// The default maximum risk level of accepted annotations.
pub const DEFAULT_ANNOTATIONS_RISK_LEVEL: &str = "High";

/// Security related settings configured by the operator of the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityConfiguration {
    /// The name of the highest accepted annotation risk level, one of `Low`,
    /// `Medium`, `High` or `Critical`. See
    /// [`AnnotationRisk::from_config_str`](crate::parser::AnnotationRisk::from_config_str).
    pub annotations_risk_level: String,
}

impl Default for SecurityConfiguration {
    fn default() -> Self {
        Self {
            annotations_risk_level: DEFAULT_ANNOTATIONS_RISK_LEVEL.to_owned(),
        }
    }
}

/// Supplies configuration which is owned outside of the annotation parsers.
///
/// The configuration is resolved again on every call, so implementations can
/// hand out updated values without the parsers being rebuilt.
pub trait Resolver: Debug + Send + Sync {
    fn security_configuration(&self) -> SecurityConfiguration;
}

/// A [`Resolver`] returning a fixed [`SecurityConfiguration`].
#[derive(Clone, Debug, Default)]
pub struct StaticResolver {
    security_configuration: SecurityConfiguration,
}

impl StaticResolver {
    pub fn with_risk_level(annotations_risk_level: impl Into<String>) -> Self {
        Self {
            security_configuration: SecurityConfiguration {
                annotations_risk_level: annotations_risk_level.into(),
            },
        }
    }
}

impl From<SecurityConfiguration> for StaticResolver {
    fn from(security_configuration: SecurityConfiguration) -> Self {
        Self {
            security_configuration,
        }
    }
}

impl Resolver for StaticResolver {
    fn security_configuration(&self) -> SecurityConfiguration {
        self.security_configuration.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_risk_level_is_high() {
        assert_eq!(
            StaticResolver::default().security_configuration().annotations_risk_level,
            "High"
        );
    }

    #[test]
    fn static_with_risk_level() {
        let resolver = StaticResolver::with_risk_level("Critical");
        assert_eq!(
            resolver.security_configuration(),
            SecurityConfiguration {
                annotations_risk_level: "Critical".to_owned()
            }
        );
    }
}
