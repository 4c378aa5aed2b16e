use std::{
    num::{ParseFloatError, ParseIntError},
    sync::LazyLock,
};

use regex::Regex;
use snafu::{ResultExt, Snafu, ensure};

/// The error type for annotation value validation.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ValidationError {
    /// Indicates that the value is empty although the validator requires
    /// content.
    #[snafu(display("value cannot be empty"))]
    EmptyValue,

    /// Indicates that the value doesn't match the regular expression of the
    /// validator.
    #[snafu(display("value {value:?} does not match the regex {regex:?}"))]
    RegexMismatch { value: String, regex: String },

    #[snafu(display("value {value:?} is not a valid boolean"))]
    InvalidBool { value: String },

    #[snafu(display("value {value:?} is not a valid integer"))]
    InvalidInt {
        source: ParseIntError,
        value: String,
    },

    #[snafu(display("value {value:?} is not a valid float"))]
    InvalidFloat {
        source: ParseFloatError,
        value: String,
    },
}

/// Checks a raw annotation value before it is converted into a typed value.
#[derive(Clone, Copy, Debug)]
pub enum AnnotationValidator {
    /// The value must match `regex`. An empty value is only accepted if
    /// `allow_empty` is set.
    Regex {
        regex: &'static LazyLock<Regex>,
        allow_empty: bool,
    },

    /// The value must be a boolean literal, see [`parse_bool`].
    Bool,

    /// The value must be a base-10 integer literal.
    Int,

    /// The value must be a decimal literal.
    Float,
}

impl AnnotationValidator {
    pub fn validate(&self, value: &str) -> Result<(), ValidationError> {
        match self {
            Self::Regex { regex, allow_empty } => validate_regex(value, regex, *allow_empty),
            Self::Bool => parse_bool(value).map(|_| ()),
            Self::Int => parse_int(value).map(|_| ()),
            Self::Float => parse_float(value).map(|_| ()),
        }
    }
}

fn validate_regex(value: &str, regex: &Regex, allow_empty: bool) -> Result<(), ValidationError> {
    if value.is_empty() {
        ensure!(allow_empty, EmptyValueSnafu);
        return Ok(());
    }

    ensure!(
        regex.is_match(value),
        RegexMismatchSnafu {
            value,
            regex: regex.as_str()
        }
    );

    Ok(())
}

/// Parses a boolean literal.
///
/// Accepts `1`, `t`, `T`, `0`, `f` and `F` as well as `true` and `false` in
/// any letter case.
pub fn parse_bool(value: &str) -> Result<bool, ValidationError> {
    match value {
        "1" | "t" | "T" => Ok(true),
        "0" | "f" | "F" => Ok(false),
        value if value.eq_ignore_ascii_case("true") => Ok(true),
        value if value.eq_ignore_ascii_case("false") => Ok(false),
        value => InvalidBoolSnafu { value }.fail(),
    }
}

pub fn parse_int(value: &str) -> Result<i64, ValidationError> {
    value.parse().context(InvalidIntSnafu { value })
}

pub fn parse_float(value: &str) -> Result<f32, ValidationError> {
    value.parse().context(InvalidFloatSnafu { value })
}
