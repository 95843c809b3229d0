//! Contract type definitions for C library API modeling.
//!
//! This module defines the value types a specification is made of: function
//! contracts with per-argument predicates, resource pairing rules, constant
//! defines and plain-old-data types. Every type checks its own structural
//! invariants when constructed, and the serde `Deserialize` impls route
//! through the same constructors, so no invalid value can be observed.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroU32;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SchemaError;

/// Version of the contract document format (semver).
///
/// Written into every serialized [`SpecDocument`](crate::SpecDocument).
pub const SPEC_FORMAT_VERSION: &str = "1.0.0";

/// A 1-based function parameter position.
///
/// # Examples
///
/// ```
/// use contract_schema_core::ArgPosition;
///
/// assert_eq!(ArgPosition::new(2).unwrap().get(), 2);
/// assert!(ArgPosition::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ArgPosition(NonZeroU32);

impl ArgPosition {
    /// Creates a position, rejecting zero.
    pub fn new(position: u32) -> Result<Self, SchemaError> {
        NonZeroU32::new(position)
            .map(Self)
            .ok_or(SchemaError::InvalidPosition(i64::from(position)))
    }

    /// Returns the raw 1-based position.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for ArgPosition {
    type Error = SchemaError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArgPosition> for u32 {
    fn from(value: ArgPosition) -> Self {
        value.get()
    }
}

impl fmt::Display for ArgPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One end of a [`ValueRange`]: an integer or decimal literal such as `-1`,
/// `0.0` or `1.5`.
///
/// The literal text is kept as written, so `0.0` and `0` are different
/// bounds; ordering checks use the numeric value.
///
/// # Examples
///
/// ```
/// use contract_schema_core::RangeBound;
///
/// let bound: RangeBound = "-1.5".parse().unwrap();
/// assert_eq!(bound.value(), -1.5);
/// assert_eq!(bound.to_string(), "-1.5");
/// assert!("1e3".parse::<RangeBound>().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RangeBound {
    text: String,
    value: f64,
}

impl RangeBound {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl PartialEq for RangeBound {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for RangeBound {}

impl Hash for RangeBound {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl From<i64> for RangeBound {
    fn from(value: i64) -> Self {
        Self {
            text: value.to_string(),
            value: value as f64,
        }
    }
}

impl fmt::Display for RangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for RangeBound {
    type Err = SchemaError;

    /// Accepts an optional sign followed by digits with at most one decimal
    /// point.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty())
            || !digits_only(whole)
            || !digits_only(fraction)
        {
            return Err(SchemaError::MalformedRange(text.to_string()));
        }
        let value = text
            .parse::<f64>()
            .map_err(|_| SchemaError::MalformedRange(text.to_string()))?;
        Ok(Self {
            text: text.to_string(),
            value,
        })
    }
}

/// One inclusive range of accepted argument values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueRange {
    /// Exactly one value (`15`).
    Exact(RangeBound),
    /// `min:max`, where one side may be open (`:10`, `10:`).
    Between {
        min: Option<RangeBound>,
        max: Option<RangeBound>,
    },
}

impl ValueRange {
    /// Creates a bounded range, rejecting `min > max` and a range with
    /// neither bound.
    ///
    /// # Examples
    ///
    /// ```
    /// use contract_schema_core::ValueRange;
    ///
    /// assert!(ValueRange::between(Some(0.into()), Some(10.into())).is_ok());
    /// assert!(ValueRange::between(Some(0.into()), None).is_ok());
    /// assert!(ValueRange::between(Some(5.into()), Some(1.into())).is_err());
    /// assert!(ValueRange::between(None, None).is_err());
    /// ```
    pub fn between(
        min: Option<RangeBound>,
        max: Option<RangeBound>,
    ) -> Result<Self, SchemaError> {
        match (min, max) {
            (None, None) => Err(SchemaError::EmptyRange),
            (Some(min), Some(max)) if min.value() > max.value() => {
                Err(SchemaError::InvertedRange {
                    min: min.text,
                    max: max.text,
                })
            }
            (min, max) => Ok(Self::Between { min, max }),
        }
    }

    /// Returns `true` if `value` falls inside the range.
    pub fn contains(&self, value: impl Into<f64>) -> bool {
        let value = value.into();
        match self {
            Self::Exact(exact) => exact.value() == value,
            Self::Between { min, max } => {
                min.as_ref().is_none_or(|min| value >= min.value())
                    && max.as_ref().is_none_or(|max| value <= max.value())
            }
        }
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(value) => write!(f, "{value}"),
            Self::Between { min, max } => {
                if let Some(min) = min {
                    write!(f, "{min}")?;
                }
                f.write_str(":")?;
                if let Some(max) = max {
                    write!(f, "{max}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for ValueRange {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let parse = |part: &str| -> Result<Option<RangeBound>, SchemaError> {
            let part = part.trim();
            if part.is_empty() {
                return Ok(None);
            }
            part.parse::<RangeBound>()
                .map(Some)
                .map_err(|_| SchemaError::MalformedRange(text.to_string()))
        };

        match text.split_once(':') {
            Some((min, max)) => {
                if max.contains(':') {
                    return Err(SchemaError::MalformedRange(text.to_string()));
                }
                Self::between(parse(min)?, parse(max)?)
            }
            None => parse(text)?.map(Self::Exact).ok_or(SchemaError::EmptyRange),
        }
    }
}

/// A non-empty list of accepted value ranges; a value is valid when any
/// range contains it.
///
/// Serialized as the comma-separated range text, e.g. `"0:10,15,50:"`.
///
/// # Examples
///
/// ```
/// use contract_schema_core::ValidRanges;
///
/// let ranges: ValidRanges = "0:10,15".parse().unwrap();
/// assert!(ranges.contains(7));
/// assert!(ranges.contains(15));
/// assert!(!ranges.contains(12));
/// assert_eq!(ranges.to_string(), "0:10,15");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ValidRanges(Vec<ValueRange>);

impl ValidRanges {
    /// Creates a range list, rejecting an empty one.
    pub fn new(ranges: Vec<ValueRange>) -> Result<Self, SchemaError> {
        if ranges.is_empty() {
            return Err(SchemaError::EmptyRange);
        }
        Ok(Self(ranges))
    }

    /// Convenience for the common single `min:max` case.
    pub fn single(min: Option<RangeBound>, max: Option<RangeBound>) -> Result<Self, SchemaError> {
        Ok(Self(vec![ValueRange::between(min, max)?]))
    }

    /// Returns the individual ranges.
    pub fn ranges(&self) -> &[ValueRange] {
        &self.0
    }

    /// Returns `true` if any range contains `value`.
    pub fn contains(&self, value: impl Into<f64>) -> bool {
        let value = value.into();
        self.0.iter().any(|range| range.contains(value))
    }
}

impl fmt::Display for ValidRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}

impl FromStr for ValidRanges {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(SchemaError::EmptyRange);
        }
        let ranges = s
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<ValueRange>, _>>()?;
        Self::new(ranges)
    }
}

impl TryFrom<String> for ValidRanges {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValidRanges> for String {
    fn from(value: ValidRanges) -> Self {
        value.to_string()
    }
}

/// How a minimum buffer size is derived from other arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinSizeKind {
    /// The value of the linked argument.
    ArgValue,
    /// The product of two linked arguments.
    Mul,
    /// `sizeof` the linked argument.
    Sizeof,
    /// `strlen` of the linked argument.
    Strlen,
}

impl MinSizeKind {
    /// Returns the keyword used in source documents and Cppcheck XML.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ArgValue => "argvalue",
            Self::Mul => "mul",
            Self::Sizeof => "sizeof",
            Self::Strlen => "strlen",
        }
    }

    /// Parses a keyword case-insensitively.
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "argvalue" => Some(Self::ArgValue),
            "mul" => Some(Self::Mul),
            "sizeof" => Some(Self::Sizeof),
            "strlen" => Some(Self::Strlen),
            _ => None,
        }
    }
}

/// Minimum buffer size requirement linked to other argument positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MinSize {
    ArgValue { arg: ArgPosition },
    Mul { arg: ArgPosition, arg2: ArgPosition },
    Sizeof { arg: ArgPosition },
    Strlen { arg: ArgPosition },
}

impl MinSize {
    /// Builds a requirement from its kind and linked positions, checking that
    /// `mul` gets two positions and every other kind exactly one.
    ///
    /// # Examples
    ///
    /// ```
    /// use contract_schema_core::{ArgPosition, MinSize, MinSizeKind};
    ///
    /// let one = ArgPosition::new(1).unwrap();
    /// let two = ArgPosition::new(2).unwrap();
    /// assert!(MinSize::from_parts(MinSizeKind::Mul, &[one, two]).is_ok());
    /// assert!(MinSize::from_parts(MinSizeKind::Mul, &[one]).is_err());
    /// assert!(MinSize::from_parts(MinSizeKind::Strlen, &[one, two]).is_err());
    /// ```
    pub fn from_parts(kind: MinSizeKind, positions: &[ArgPosition]) -> Result<Self, SchemaError> {
        let arity = |detail| SchemaError::MinSizeArity {
            kind: kind.as_str(),
            detail,
        };
        match (kind, positions) {
            (MinSizeKind::Mul, [arg, arg2]) => Ok(Self::Mul {
                arg: *arg,
                arg2: *arg2,
            }),
            (MinSizeKind::Mul, _) => Err(arity("needs exactly two linked arguments")),
            (_, [arg]) => Ok(match kind {
                MinSizeKind::ArgValue => Self::ArgValue { arg: *arg },
                MinSizeKind::Sizeof => Self::Sizeof { arg: *arg },
                _ => Self::Strlen { arg: *arg },
            }),
            _ => Err(arity("needs exactly one linked argument")),
        }
    }

    pub fn kind(&self) -> MinSizeKind {
        match self {
            Self::ArgValue { .. } => MinSizeKind::ArgValue,
            Self::Mul { .. } => MinSizeKind::Mul,
            Self::Sizeof { .. } => MinSizeKind::Sizeof,
            Self::Strlen { .. } => MinSizeKind::Strlen,
        }
    }

    /// Returns the argument positions this requirement refers back to.
    pub fn linked(&self) -> Vec<ArgPosition> {
        match *self {
            Self::Mul { arg, arg2 } => vec![arg, arg2],
            Self::ArgValue { arg } | Self::Sizeof { arg } | Self::Strlen { arg } => vec![arg],
        }
    }
}

/// Format-string family for a format argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatStyle {
    Printf,
    Scanf,
}

impl FormatStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Printf => "printf",
            Self::Scanf => "scanf",
        }
    }
}

/// A single constraint on a function argument.
///
/// The set is closed: anything a source document names outside it is a load
/// error rather than a silently ignored annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Pointer must not be null.
    NotNull,
    /// Value must be initialized before the call.
    NotUninit,
    /// Value must not be a boolean expression.
    NotBool,
    /// Buffer must hold a NUL-terminated string.
    StringTerminated,
    /// Argument is a format string; `None` leaves the family unspecified.
    FormatString(Option<FormatStyle>),
    /// Buffer must be at least as large as the linked size expression.
    MinSize(MinSize),
    /// Numeric value must fall within one of the listed ranges.
    ValidRange(ValidRanges),
}

impl Predicate {
    /// Returns the Cppcheck tag name, which doubles as the predicate's kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotNull => "not-null",
            Self::NotUninit => "not-uninit",
            Self::NotBool => "not-bool",
            Self::StringTerminated => "strz",
            Self::FormatString(_) => "formatstr",
            Self::MinSize(_) => "minsize",
            Self::ValidRange(_) => "valid",
        }
    }

    fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Constraints on one argument position.
///
/// Predicates are conjunctive and at most one of each kind may be attached.
/// Equality treats the predicates as a set.
///
/// # Examples
///
/// ```
/// use contract_schema_core::{ArgumentConstraint, Predicate};
///
/// let arg = ArgumentConstraint::new(1)
///     .unwrap()
///     .with(Predicate::NotNull)
///     .unwrap()
///     .with(Predicate::StringTerminated)
///     .unwrap();
/// assert_eq!(arg.position().get(), 1);
/// assert!(arg.has(&Predicate::NotNull));
/// assert!(arg.clone().with(Predicate::NotNull).is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ArgumentRepr")]
pub struct ArgumentConstraint {
    position: ArgPosition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    predicates: Vec<Predicate>,
}

#[derive(Deserialize)]
struct ArgumentRepr {
    position: ArgPosition,
    #[serde(default)]
    predicates: Vec<Predicate>,
}

impl TryFrom<ArgumentRepr> for ArgumentConstraint {
    type Error = SchemaError;

    fn try_from(repr: ArgumentRepr) -> Result<Self, Self::Error> {
        repr.predicates
            .into_iter()
            .try_fold(Self::at(repr.position), Self::with)
    }
}

impl ArgumentConstraint {
    /// Creates an unconstrained argument at a raw position.
    pub fn new(position: u32) -> Result<Self, SchemaError> {
        Ok(Self::at(ArgPosition::new(position)?))
    }

    /// Creates an unconstrained argument at a checked position.
    pub fn at(position: ArgPosition) -> Self {
        Self {
            position,
            predicates: Vec::new(),
        }
    }

    /// Adds a predicate, rejecting a second predicate of the same kind.
    pub fn with(mut self, predicate: Predicate) -> Result<Self, SchemaError> {
        if self.predicates.iter().any(|p| p.same_kind(&predicate)) {
            return Err(SchemaError::DuplicatePredicate {
                position: self.position.get(),
                predicate: predicate.name(),
            });
        }
        self.predicates.push(predicate);
        Ok(self)
    }

    pub fn position(&self) -> ArgPosition {
        self.position
    }

    /// Returns the predicates in the order they were attached.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn has(&self, predicate: &Predicate) -> bool {
        self.predicates.contains(predicate)
    }

    /// Returns the minimum size requirement, if any.
    pub fn min_size(&self) -> Option<&MinSize> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::MinSize(size) => Some(size),
            _ => None,
        })
    }

    /// Returns the accepted value ranges, if any.
    pub fn valid_range(&self) -> Option<&ValidRanges> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::ValidRange(ranges) => Some(ranges),
            _ => None,
        })
    }
}

impl PartialEq for ArgumentConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
            && self.predicates.len() == other.predicates.len()
            && self.predicates.iter().all(|p| other.predicates.contains(p))
    }
}

impl Eq for ArgumentConstraint {}

/// Whether a returned pointer may be null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nullability {
    #[default]
    Unspecified,
    NotNull,
    MaybeNull,
}

impl Nullability {
    pub fn is_unspecified(&self) -> bool {
        *self == Self::Unspecified
    }
}

/// Declared return value of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReturnContract {
    /// C type, copied verbatim (e.g. `"FILE *"`).
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Nullability::is_unspecified")]
    pub nullability: Nullability,
}

impl ReturnContract {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            nullability: Nullability::Unspecified,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullability = Nullability::NotNull;
        self
    }

    pub fn maybe_null(mut self) -> Self {
        self.nullability = Nullability::MaybeNull;
        self
    }

    /// Returns `true` for a plain `void` return (not `void *`).
    pub fn is_void(&self) -> bool {
        self.type_name.trim() == "void"
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Trims `name`, rejecting an empty name or one with inner whitespace.
fn checked_name(name: &str, what: &'static str) -> Result<String, SchemaError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SchemaError::EmptyName(what));
    }
    if name.contains(char::is_whitespace) {
        return Err(SchemaError::WhitespaceInName {
            what,
            name: name.to_string(),
        });
    }
    Ok(name.to_string())
}

fn single_line(text: &str, what: &'static str) -> Result<(), SchemaError> {
    if text.contains(['\n', '\r']) {
        return Err(SchemaError::MultiLineText {
            what,
            text: text.to_string(),
        });
    }
    Ok(())
}

/// The contract of one library function.
///
/// Arguments are kept sorted by position; positions may be sparse.
///
/// # Examples
///
/// ```
/// use contract_schema_core::*;
///
/// let fopen = FunctionContract::new("fopen")
///     .unwrap()
///     .returning(ReturnContract::new("FILE *"))
///     .use_retval()
///     .with_argument(
///         ArgumentConstraint::new(2).unwrap().with(Predicate::NotNull).unwrap(),
///     )
///     .unwrap()
///     .with_argument(
///         ArgumentConstraint::new(1).unwrap().with(Predicate::StringTerminated).unwrap(),
///     )
///     .unwrap();
///
/// let positions: Vec<u32> = fopen.arguments().iter().map(|a| a.position().get()).collect();
/// assert_eq!(positions, vec![1, 2]);
/// assert!(fopen.uses_retval());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FunctionRepr")]
pub struct FunctionContract {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    returns: Option<ReturnContract>,
    #[serde(default, skip_serializing_if = "is_false")]
    use_retval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    noreturn: Option<bool>,
    #[serde(default, skip_serializing_if = "is_false")]
    leak_ignore: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pure: bool,
    #[serde(rename = "const", default, skip_serializing_if = "is_false")]
    is_const: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    arguments: Vec<ArgumentConstraint>,
}

#[derive(Deserialize)]
struct FunctionRepr {
    name: String,
    #[serde(default)]
    returns: Option<ReturnContract>,
    #[serde(default)]
    use_retval: bool,
    #[serde(default)]
    noreturn: Option<bool>,
    #[serde(default)]
    leak_ignore: bool,
    #[serde(default)]
    pure: bool,
    #[serde(rename = "const", default)]
    is_const: bool,
    #[serde(default)]
    arguments: Vec<ArgumentConstraint>,
}

impl TryFrom<FunctionRepr> for FunctionContract {
    type Error = SchemaError;

    fn try_from(repr: FunctionRepr) -> Result<Self, Self::Error> {
        let mut function = Self::new(&repr.name)?;
        function.returns = repr.returns;
        function.use_retval = repr.use_retval;
        function.noreturn = repr.noreturn;
        function.leak_ignore = repr.leak_ignore;
        function.pure = repr.pure;
        function.is_const = repr.is_const;
        repr.arguments.into_iter().try_fold(function, Self::with_argument)
    }
}

impl FunctionContract {
    /// Creates a contract with no constraints.
    pub fn new(name: &str) -> Result<Self, SchemaError> {
        Ok(Self {
            name: checked_name(name, "function")?,
            returns: None,
            use_retval: false,
            noreturn: None,
            leak_ignore: false,
            pure: false,
            is_const: false,
            arguments: Vec::new(),
        })
    }

    /// Trims the return type, rejecting an empty or multi-line one.
    pub(crate) fn normalize_return_type(mut self) -> Result<Self, SchemaError> {
        if let Some(returns) = self.returns.as_mut() {
            let type_name = returns.type_name.trim();
            if type_name.is_empty() {
                return Err(SchemaError::EmptyReturnType(self.name));
            }
            single_line(type_name, "return type")?;
            returns.type_name = type_name.to_string();
        }
        Ok(self)
    }

    /// Adds an argument constraint, keeping arguments ordered by position.
    pub fn with_argument(mut self, argument: ArgumentConstraint) -> Result<Self, SchemaError> {
        let position = argument.position();
        let index = self.arguments.partition_point(|a| a.position() < position);
        if self.arguments.get(index).is_some_and(|a| a.position() == position) {
            return Err(SchemaError::DuplicateArgument {
                function: self.name,
                position: position.get(),
            });
        }
        self.arguments.insert(index, argument);
        Ok(self)
    }

    pub fn returning(mut self, returns: ReturnContract) -> Self {
        self.returns = Some(returns);
        self
    }

    /// Marks the return value as one callers must check.
    pub fn use_retval(mut self) -> Self {
        self.use_retval = true;
        self
    }

    pub fn noreturn(mut self, noreturn: bool) -> Self {
        self.noreturn = Some(noreturn);
        self
    }

    /// Suppresses leak tracking for values passed to this call.
    pub fn leak_ignore(mut self) -> Self {
        self.leak_ignore = true;
        self
    }

    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }

    pub fn constant(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn returns(&self) -> Option<&ReturnContract> {
        self.returns.as_ref()
    }

    pub fn uses_retval(&self) -> bool {
        self.use_retval
    }

    /// Returns the explicit noreturn setting, `None` when unspecified.
    pub fn noreturn_flag(&self) -> Option<bool> {
        self.noreturn
    }

    pub fn never_returns(&self) -> bool {
        self.noreturn == Some(true)
    }

    pub fn is_leak_ignored(&self) -> bool {
        self.leak_ignore
    }

    pub fn is_pure(&self) -> bool {
        self.pure
    }

    pub fn is_const(&self) -> bool {
        self.is_const
    }

    pub fn arguments(&self) -> &[ArgumentConstraint] {
        &self.arguments
    }

    pub fn argument(&self, position: ArgPosition) -> Option<&ArgumentConstraint> {
        self.arguments
            .binary_search_by_key(&position, ArgumentConstraint::position)
            .ok()
            .map(|index| &self.arguments[index])
    }
}

/// Whether a rule tracks heap memory or another system resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Memory,
    Resource,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Resource => "resource",
        }
    }
}

/// An allocating function within a [`ResourceRule`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Allocator {
    pub name: String,
    /// The allocator also initializes the data it returns.
    #[serde(default, skip_serializing_if = "is_false")]
    pub init: bool,
}

impl Allocator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init: false,
        }
    }

    pub fn initializing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init: true,
        }
    }
}

/// Allocate/deallocate pairing used for leak detection.
///
/// Any allocator's result must reach one of the deallocators. Within a rule
/// every function name is distinct; uniqueness across rules is enforced by
/// [`SpecBuilder`](crate::SpecBuilder).
///
/// # Examples
///
/// ```
/// use contract_schema_core::{Allocator, ResourceKind, ResourceRule};
///
/// let rule = ResourceRule::new(
///     ResourceKind::Memory,
///     vec![Allocator::new("malloc"), Allocator::initializing("calloc")],
///     vec!["free".into()],
/// )
/// .unwrap();
/// assert!(rule.allocates("calloc"));
/// assert!(rule.deallocates("free"));
///
/// assert!(ResourceRule::new(ResourceKind::Memory, vec![], vec!["free".into()]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ResourceRepr")]
pub struct ResourceRule {
    kind: ResourceKind,
    allocators: Vec<Allocator>,
    deallocators: Vec<String>,
}

#[derive(Deserialize)]
struct ResourceRepr {
    kind: ResourceKind,
    allocators: Vec<Allocator>,
    deallocators: Vec<String>,
}

impl TryFrom<ResourceRepr> for ResourceRule {
    type Error = SchemaError;

    fn try_from(repr: ResourceRepr) -> Result<Self, Self::Error> {
        Self::new(repr.kind, repr.allocators, repr.deallocators)
    }
}

impl ResourceRule {
    /// Creates a rule, requiring at least one allocator and one deallocator
    /// and rejecting a name listed twice. Names are trimmed.
    pub fn new(
        kind: ResourceKind,
        allocators: Vec<Allocator>,
        deallocators: Vec<String>,
    ) -> Result<Self, SchemaError> {
        if allocators.is_empty() || deallocators.is_empty() {
            return Err(SchemaError::IncompleteResource(kind.as_str()));
        }

        let rule = Self {
            kind,
            allocators: allocators
                .into_iter()
                .map(|a| {
                    Ok(Allocator {
                        name: checked_name(&a.name, "resource function")?,
                        init: a.init,
                    })
                })
                .collect::<Result<_, SchemaError>>()?,
            deallocators: deallocators
                .iter()
                .map(|d| checked_name(d, "resource function"))
                .collect::<Result<_, _>>()?,
        };

        let mut seen = std::collections::HashSet::new();
        for name in rule.function_names() {
            if !seen.insert(name) {
                return Err(SchemaError::RepeatedInResource(name.to_string()));
            }
        }

        Ok(rule)
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn allocators(&self) -> &[Allocator] {
        &self.allocators
    }

    pub fn deallocators(&self) -> &[String] {
        &self.deallocators
    }

    /// Iterates over every function name in the rule, allocators first.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.allocators
            .iter()
            .map(|a| a.name.as_str())
            .chain(self.deallocators.iter().map(String::as_str))
    }

    pub fn allocates(&self, name: &str) -> bool {
        self.allocators.iter().any(|a| a.name == name)
    }

    pub fn deallocates(&self, name: &str) -> bool {
        self.deallocators.iter().any(|d| d == name)
    }
}

/// A preprocessor-style constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DefineRepr")]
pub struct ConstantDefine {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct DefineRepr {
    name: String,
    value: String,
}

impl TryFrom<DefineRepr> for ConstantDefine {
    type Error = SchemaError;

    fn try_from(repr: DefineRepr) -> Result<Self, Self::Error> {
        Self::new(&repr.name, &repr.value)
    }
}

impl ConstantDefine {
    /// Creates a define. The value is an expression kept verbatim.
    pub fn new(name: &str, value: &str) -> Result<Self, SchemaError> {
        let name = checked_name(name, "define")?;
        let value = value.trim();
        if value.is_empty() {
            return Err(SchemaError::EmptyDefineValue(name));
        }
        single_line(value, "define value")?;
        Ok(Self {
            name,
            value: value.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Signedness of a plain-old-data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodSign {
    Signed,
    Unsigned,
}

impl PodSign {
    /// Returns the single-letter form used by Cppcheck (`s` / `u`).
    pub fn as_letter(self) -> &'static str {
        match self {
            Self::Signed => "s",
            Self::Unsigned => "u",
        }
    }
}

/// A value type with no hidden ownership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PodRepr")]
pub struct PodType {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sign: Option<PodSign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u32>,
}

#[derive(Deserialize)]
struct PodRepr {
    name: String,
    #[serde(default)]
    sign: Option<PodSign>,
    #[serde(default)]
    size: Option<u32>,
}

impl TryFrom<PodRepr> for PodType {
    type Error = SchemaError;

    fn try_from(repr: PodRepr) -> Result<Self, Self::Error> {
        let mut pod = Self::new(&repr.name)?;
        pod.sign = repr.sign;
        match repr.size {
            Some(size) => pod.with_size(size),
            None => Ok(pod),
        }
    }
}

impl PodType {
    pub fn new(name: &str) -> Result<Self, SchemaError> {
        Ok(Self {
            name: checked_name(name, "podtype")?,
            sign: None,
            size: None,
        })
    }

    pub fn with_sign(mut self, sign: PodSign) -> Self {
        self.sign = Some(sign);
        self
    }

    /// Sets the size in bytes; zero is rejected.
    pub fn with_size(mut self, size: u32) -> Result<Self, SchemaError> {
        if size == 0 {
            return Err(SchemaError::ZeroPodSize(self.name));
        }
        self.size = Some(size);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sign(&self) -> Option<PodSign> {
        self.sign
    }

    pub fn size(&self) -> Option<u32> {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_rejects_inverted_bounds() {
        let err = ValueRange::between(Some(5.into()), Some(1.into())).unwrap_err();
        assert_eq!(
            err,
            SchemaError::InvertedRange {
                min: "5".into(),
                max: "1".into()
            }
        );
        assert!("5:1".parse::<ValidRanges>().is_err());
        assert!("1.5:1.25".parse::<ValidRanges>().is_err());
    }

    #[test]
    fn test_range_accepts_decimal_bounds() {
        let ranges: ValidRanges = "0.0:,-1.0:1.0".parse().unwrap();
        assert!(ranges.contains(0.5));
        assert!(ranges.contains(-0.75));
        assert!(!ranges.contains(-1.5));
        assert_eq!(ranges.to_string(), "0.0:,-1.0:1.0");
        assert_ne!(
            "0.0:".parse::<ValidRanges>().unwrap(),
            "0:".parse::<ValidRanges>().unwrap()
        );
        assert!("1:1.0".parse::<ValidRanges>().is_ok());
    }

    #[test]
    fn test_range_bound_rejects_non_decimal_text() {
        for text in ["1e3", "inf", "NaN", "0x10", "1.2.3", "-", ".", "--1"] {
            assert!(text.parse::<RangeBound>().is_err(), "{text}");
        }
        assert_eq!(".5".parse::<RangeBound>().unwrap().value(), 0.5);
    }

    #[test]
    fn test_range_parsing_handles_open_ends_and_negatives() {
        let ranges: ValidRanges = "-1:,:10,42".parse().unwrap();
        assert_eq!(
            ranges.ranges(),
            &[
                ValueRange::Between {
                    min: Some((-1).into()),
                    max: None
                },
                ValueRange::Between {
                    min: None,
                    max: Some(10.into())
                },
                ValueRange::Exact(42.into()),
            ]
        );
        assert_eq!(ranges.to_string(), "-1:,:10,42");
    }

    #[test]
    fn test_range_rejects_garbage() {
        assert!("".parse::<ValidRanges>().is_err());
        assert!(":".parse::<ValidRanges>().is_err());
        assert!("1:2:3".parse::<ValidRanges>().is_err());
        assert!("abc".parse::<ValidRanges>().is_err());
        assert!("0:10,".parse::<ValidRanges>().is_err());
    }

    #[test]
    fn test_argument_predicates_compare_as_set() {
        let a = ArgumentConstraint::new(1)
            .unwrap()
            .with(Predicate::NotNull)
            .unwrap()
            .with(Predicate::NotUninit)
            .unwrap();
        let b = ArgumentConstraint::new(1)
            .unwrap()
            .with(Predicate::NotUninit)
            .unwrap()
            .with(Predicate::NotNull)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_range_predicate_rejected() {
        let arg = ArgumentConstraint::new(3)
            .unwrap()
            .with(Predicate::ValidRange("0:1".parse().unwrap()))
            .unwrap();
        let err = arg
            .with(Predicate::ValidRange("5:9".parse().unwrap()))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicatePredicate {
                position: 3,
                predicate: "valid"
            }
        );
    }

    #[test]
    fn test_function_rejects_duplicate_argument() {
        let err = FunctionContract::new("memcpy")
            .unwrap()
            .with_argument(ArgumentConstraint::new(1).unwrap())
            .unwrap()
            .with_argument(ArgumentConstraint::new(1).unwrap())
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateArgument { position: 1, .. }));
    }

    #[test]
    fn test_function_rejects_empty_name() {
        assert_eq!(
            FunctionContract::new("  ").unwrap_err(),
            SchemaError::EmptyName("function")
        );
    }

    #[test]
    fn test_names_reject_inner_whitespace() {
        assert_eq!(
            FunctionContract::new("fopen 64").unwrap_err(),
            SchemaError::WhitespaceInName {
                what: "function",
                name: "fopen 64".into()
            }
        );
        assert!(ConstantDefine::new("A B", "1").is_err());
        assert!(PodType::new("long\tint").is_err());
        assert!(
            ResourceRule::new(
                ResourceKind::Memory,
                vec![Allocator::new("my alloc")],
                vec!["free".into()],
            )
            .is_err()
        );
        assert_eq!(FunctionContract::new(" fopen ").unwrap().name(), "fopen");
    }

    #[test]
    fn test_resource_names_are_trimmed() {
        let rule = ResourceRule::new(
            ResourceKind::Memory,
            vec![Allocator::initializing(" calloc ")],
            vec!["free\n".into()],
        )
        .unwrap();
        assert!(rule.allocates("calloc"));
        assert!(rule.allocators()[0].init);
        assert!(rule.deallocates("free"));
    }

    #[test]
    fn test_define_value_must_be_one_line() {
        let err = ConstantDefine::new("LIMIT", "1 +\n2").unwrap_err();
        assert!(matches!(
            err,
            SchemaError::MultiLineText {
                what: "define value",
                ..
            }
        ));
        assert_eq!(ConstantDefine::new("LIMIT", " 1 + 2 ").unwrap().value(), "1 + 2");
    }

    #[test]
    fn test_deserialize_rejects_zero_position() {
        let json = r#"{"name": "f", "arguments": [{"position": 0}]}"#;
        assert!(serde_json::from_str::<FunctionContract>(json).is_err());
    }

    #[test]
    fn test_deserialize_function_with_predicates() {
        let json = r#"{
            "name": "memset",
            "returns": {"type": "void *", "nullability": "not_null"},
            "arguments": [
                {"position": 1, "predicates": ["not_null", {"min_size": {"type": "argvalue", "arg": 3}}]},
                {"position": 3, "predicates": [{"valid_range": "0:"}]}
            ]
        }"#;
        let function: FunctionContract = serde_json::from_str(json).unwrap();
        assert_eq!(function.name(), "memset");
        assert_eq!(
            function.returns().unwrap().nullability,
            Nullability::NotNull
        );
        let first = &function.arguments()[0];
        assert_eq!(
            first.min_size(),
            Some(&MinSize::ArgValue {
                arg: ArgPosition::new(3).unwrap()
            })
        );
        assert!(function.arguments()[1].valid_range().unwrap().contains(100));
    }

    #[test]
    fn test_resource_rejects_name_in_both_roles() {
        let err = ResourceRule::new(
            ResourceKind::Memory,
            vec![Allocator::new("realloc")],
            vec!["realloc".into()],
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::RepeatedInResource("realloc".into()));
    }

    #[test]
    fn test_pod_rejects_zero_size() {
        let err = PodType::new("int32_t").unwrap().with_size(0).unwrap_err();
        assert_eq!(err, SchemaError::ZeroPodSize("int32_t".into()));
    }

    #[test]
    fn test_define_requires_value() {
        assert!(ConstantDefine::new("EOF", "(-1)").is_ok());
        assert!(matches!(
            ConstantDefine::new("EOF", " "),
            Err(SchemaError::EmptyDefineValue(_))
        ));
    }

    #[test]
    fn test_return_is_void() {
        assert!(ReturnContract::new("void").is_void());
        assert!(!ReturnContract::new("void *").is_void());
    }
}
