use thiserror::Error;

use crate::{compiler::Diagnostic, conditional::Conditional};

/// The result type for the `scanforge` crate.
pub type Result<T> = std::result::Result<T, ScanForgeError>;

/// A macro that constructs a new ScanForgeError::UnsupportedFeature variant.
#[macro_export]
macro_rules! unsupported {
    ($feature:expr) => {
        $crate::ScanForgeError::new($crate::ScanForgeErrorKind::UnsupportedFeature(
            $feature.to_string(),
        ))
    };
}

/// The error type for the `scanforge` crate.
#[derive(Error, Debug)]
pub struct ScanForgeError {
    /// The source of the error.
    pub source: Box<ScanForgeErrorKind>,
}

impl ScanForgeError {
    /// Create a new `ScanForgeError`.
    pub fn new(kind: ScanForgeErrorKind) -> Self {
        ScanForgeError {
            source: Box::new(kind),
        }
    }

    /// Get the kind of the error.
    pub fn kind(&self) -> &ScanForgeErrorKind {
        &self.source
    }
}

impl std::fmt::Display for ScanForgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// The error kind type.
#[derive(Error, Debug)]
pub enum ScanForgeErrorKind {
    /// An error occurred during the parsing of the regex syntax.
    #[error(transparent)]
    RegexSyntaxError(#[from] regex_syntax::ast::Error),

    /// A std::io error occurred.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Used regex features that are not supported.
    #[error("Unsupported regex feature: {0}")]
    UnsupportedFeature(String),

    /// Two zero-width assertions that can't hold at the same position were composed.
    #[error("Conflicting conditionals: '{existing}' can't be combined with '{added}'")]
    ConflictingConditional {
        /// The conditional accumulated along the path so far.
        existing: Conditional,
        /// The conditional that was about to be added.
        added: Conditional,
    },

    /// A bracket expression doesn't match any byte.
    #[error("Bracket expression matches no byte")]
    EmptyBracketExpression,

    /// The end points of a range in a bracket expression are out of order.
    #[error("Invalid bracket range {start:#04x}-{end:#04x}")]
    InvalidBracketRange {
        /// The first byte of the range.
        start: u8,
        /// The last byte of the range.
        end: u8,
    },

    /// A repetition bound is larger than 255.
    #[error("Repetition bound {0} is out of range (0..=255)")]
    OutOfRangeBound(u32),

    /// The lower bound is greater than the upper bound, or both are zero.
    #[error("Invalid repetition bounds {{{lower},{upper}}}")]
    InvalidBoundCombination {
        /// The lower bound.
        lower: u32,
        /// The upper bound.
        upper: u32,
    },

    /// A rule references a macro that wasn't defined.
    #[error("Undefined macro '{0}'")]
    UndefinedMacro(String),

    /// A macro references itself, directly or indirectly.
    #[error("Recursive macro '{0}'")]
    RecursiveMacro(String),

    /// One or more rules or macros failed to compile.
    #[error("{} error(s) during compilation of the rule set", .0.len())]
    CompilationFailed(Vec<Diagnostic>),
}

impl From<regex_syntax::ast::Error> for ScanForgeError {
    fn from(error: regex_syntax::ast::Error) -> Self {
        ScanForgeError::new(ScanForgeErrorKind::RegexSyntaxError(error))
    }
}

impl From<std::io::Error> for ScanForgeError {
    fn from(error: std::io::Error) -> Self {
        ScanForgeError::new(ScanForgeErrorKind::IoError(error))
    }
}

impl From<ScanForgeErrorKind> for ScanForgeError {
    fn from(kind: ScanForgeErrorKind) -> Self {
        ScanForgeError::new(kind)
    }
}
