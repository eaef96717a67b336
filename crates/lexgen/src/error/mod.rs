//! # Error Types
//!
//! Error types and diagnostics for rule compilation.
//!
//! ## Overview
//!
//! Every stage of the pipeline reports through one of four families:
//!
//! - [`PatternError`]: syntax errors inside a single pattern
//! - [`SyntaxError`]: rule-file level errors, with line and column
//! - [`ValidationError`]: rule sets that are well-formed but unusable
//!   (empty-matching rules, ambiguous rules, unresolved mode references)
//! - [`InternalError`]: violated post-construction invariants; these
//!   indicate a bug in the compiler itself and carry enough state to
//!   debug it
//!
//! [`CompileError`] is the sum over all of them; the pipeline returns
//! `Err(Vec<CompileError>)` so that callers always see every collected
//! diagnostic, not just the first.
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, errors integrate with
//! [`miette`] and carry stable error codes.

use compact_str::CompactString;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Syntax error inside a single pattern, positioned by byte offset into
/// the pattern text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[error("{kind}")]
pub struct PatternError {
    /// Byte offset into the pattern text where the error was detected.
    pub pos: usize,
    #[source]
    pub kind: PatternErrorKind,
}

/// Kinds of pattern syntax errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum PatternErrorKind {
    #[error("unrecognized escape code '{code}'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(pattern::unknown_escape)))]
    UnknownEscape { code: char },

    #[error("dangling escape at end of pattern")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(pattern::dangling_escape)))]
    DanglingEscape,

    #[error("character '{ch}' repeated inside class")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(pattern::duplicate_class_char)))]
    DuplicateClassChar { ch: char },

    #[error("character class matches no byte")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(pattern::empty_class)))]
    EmptyClass,

    #[error("empty alternative")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(pattern::empty_alternative)))]
    EmptyAlternative,

    #[error("quantifier '{quantifier}' has nothing to repeat")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(pattern::dangling_quantifier)))]
    DanglingQuantifier { quantifier: char },

    #[error("unterminated group, expected ')'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(pattern::unterminated_group)))]
    UnterminatedGroup,

    #[error("unterminated character class, expected ']'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(pattern::unterminated_class)))]
    UnterminatedClass,

    #[error("unmatched '{terminator}'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(pattern::stray_terminator)))]
    StrayTerminator { terminator: char },
}

impl PatternError {
    /// Create a new pattern error at the given byte offset.
    #[must_use]
    pub const fn new(pos: usize, kind: PatternErrorKind) -> Self {
        Self { pos, kind }
    }
}

/// Rule-file syntax error with 1-based line and column
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[error("line {line}, column {col}: {kind}")]
pub struct SyntaxError {
    pub line: usize,
    pub col: usize,
    #[source]
    pub kind: SyntaxErrorKind,
}

/// Kinds of rule-file syntax errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum SyntaxErrorKind {
    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Pattern(PatternErrorKind),

    #[error("rule name '{name}' is reserved")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(rules::reserved_name)))]
    ReservedRuleName { name: CompactString },

    #[error("duplicate rule name '{name}' in mode '{mode}'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(rules::duplicate_rule)))]
    DuplicateRuleName {
        name: CompactString,
        mode: CompactString,
    },

    #[error("duplicate mode-transition source '{source_label}'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(rules::duplicate_transition)))]
    DuplicateTransitionSource { source_label: CompactString },

    #[error("invalid mode or rule name '{name}'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(rules::invalid_name)))]
    InvalidName { name: CompactString },

    #[error("malformed mode transition, expected 'name -> name'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(rules::malformed_transition)))]
    MalformedTransition,
}

impl SyntaxError {
    /// Create a new rule-file syntax error.
    #[must_use]
    pub const fn new(line: usize, col: usize, kind: SyntaxErrorKind) -> Self {
        Self { line, col, kind }
    }

    /// Wrap a pattern error, offsetting its position by the column at
    /// which the pattern text starts within the line.
    #[must_use]
    pub const fn from_pattern(line: usize, pattern_col: usize, err: PatternError) -> Self {
        Self {
            line,
            col: pattern_col + err.pos,
            kind: SyntaxErrorKind::Pattern(err.kind),
        }
    }
}

/// A rule set that parsed cleanly but cannot be compiled into a usable
/// automaton
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum ValidationError {
    #[error("rule '{rule}' matches the empty string")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(validate::trivially_matched)))]
    TriviallyMatchedRule { rule: CompactString },

    #[error("rules {} accept the same input", join_names(.rules))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(validate::ambiguous_rules)))]
    AmbiguousRules { rules: Vec<CompactString> },

    #[error("mode transition references unknown rule or mode '{reference}'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(validate::unresolved_reference)))]
    UnresolvedModeReference { reference: CompactString },
}

/// Violated post-construction invariant. Always a bug in the compiler,
/// never in the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum InternalError {
    #[error(
        "mode '{mode}': match names changed during subset construction \
         (missing: [{}], unexpected: [{}])",
        join_names(.missing),
        join_names(.unexpected)
    )]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(internal::match_names)))]
    MatchNamesMismatch {
        mode: CompactString,
        missing: Vec<CompactString>,
        unexpected: Vec<CompactString>,
    },

    #[error(
        "minimization merged nodes {first} and {second} although they \
         disagree on byte 0x{byte:02x}"
    )]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(internal::conflicting_merge)))]
    ConflictingMerge { first: u32, second: u32, byte: u8 },
}

/// Top-level compilation error: the sum over every stage's failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum CompileError {
    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Internal(#[from] InternalError),
}

/// Format a name list as `'a', 'b', 'c'` for error messages.
fn join_names(names: &[CompactString]) -> String {
    let mut out = String::new();
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('\'');
        out.push_str(name);
        out.push('\'');
    }
    out
}
