//! # Lexgen
//!
//! A lexer-generator core: compiles named textual pattern rules into a
//! minimized deterministic finite automaton that a generated lexer can
//! execute to tokenize byte streams.
//!
//! ## Overview
//!
//! Rule files declare patterns (literals, character classes,
//! alternation, grouping, `?`/`*`/`+` quantifiers) grouped into named
//! modes, plus transitions between modes for sublanguages such as
//! string interpolation. Compilation runs as a single-threaded, one-shot
//! pipeline:
//!
//! 1. **Parse** the rule file into a [`RuleSet`] of [`Pattern`] trees
//! 2. **Build** one NFA per mode (Thompson's construction)
//! 3. **Determinize** each NFA (powerset construction), resolving
//!    literal-vs-pattern overlap in favor of literals
//! 4. **Minimize** each DFA (partition refinement)
//! 5. **Combine** all modes into one [`CombinedAutomaton`] with a mode
//!    table, ready for a code-generation backend
//!
//! Every stage either succeeds whole or fails with all collected
//! diagnostics; there is no partial output.
//!
//! ## Quick Start
//!
//! ```rust
//! use lexgen::compile;
//!
//! let source = "\
//! if: if
//! ident: \\l(\\l|\\d|_)*
//! num: \\d+
//! ";
//!
//! let compiled = compile(source).expect("rule set compiles");
//! let dfa = &compiled.automaton.dfa;
//!
//! // The literal rule wins on its own text, the pattern elsewhere.
//! assert_eq!(dfa.match_name(b"if"), Some("if"));
//! assert_eq!(dfa.match_name(b"ifx"), Some("ident"));
//! assert_eq!(dfa.match_name(b"42"), Some("num"));
//! assert_eq!(dfa.match_name(b"!"), None);
//! ```
//!
//! ## Modules
//!
//! - [`rules`] - pattern and rule-file parsing
//! - [`automaton`] - NFA construction, determinization, minimization,
//!   mode combination
//! - [`pipeline`] - the [`compile`] driver and its size metrics
//! - [`error`] - error types and diagnostics

pub mod automaton;
pub mod error;
pub mod pipeline;
pub mod rules;

// Re-export commonly used types
pub use automaton::{CombinedAutomaton, Dfa, Mode, Nfa, NodeId};
pub use error::{
    CompileError, InternalError, PatternError, SyntaxError, ValidationError,
};
pub use pipeline::{Compiled, CompileStats, ModeStats, compile};
pub use rules::{
    ByteSet, ModeRef, ModeTransition, Pattern, PatternKind, PatternParser, Rule, RuleSet,
};
