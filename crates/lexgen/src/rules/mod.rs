//! # Rules Module
//!
//! The textual front end: pattern parsing and rule-file parsing.
//!
//! ## Overview
//!
//! A rule file declares named, moded pattern rules and the transitions
//! between modes. This module turns that text into read-only values:
//!
//! - [`Pattern`] / [`PatternKind`] - the pattern AST
//! - [`PatternParser`] - one rule's pattern text into a [`Pattern`]
//! - [`RuleSet`] - a whole rule file into [`Rule`]s grouped by mode,
//!   plus [`ModeTransition`] declarations
//!
//! Everything downstream (NFA construction onward) consumes these
//! values and never re-reads the source text.

pub mod parser;
pub mod pattern;
pub mod ruleset;

pub use parser::PatternParser;
pub use pattern::{ByteSet, Pattern, PatternKind, escape_set};
pub use ruleset::{MODE_MAIN, ModeRef, ModeTransition, Rule, RuleSet, qualify};
