//! # Pipeline Module
//!
//! The one-shot compilation driver: rule text in, combined automaton
//! out.
//!
//! ## Overview
//!
//! [`compile`] runs every stage in order - rule-file parsing, NFA
//! construction, subset construction, minimization, mode combination -
//! for every mode, `main` first. Validation failures of a stage are
//! collected across all modes before aborting, so a caller sees every
//! diagnostic at once; no stage ever emits a partial automaton.

use compact_str::CompactString;

use crate::automaton::{CombinedAutomaton, build_nfa, combine, construct, minimize};
use crate::error::{CompileError, ValidationError};
use crate::rules::RuleSet;

/// Node counts per mode, per stage
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeStats {
    pub name: CompactString,
    pub rules: usize,
    pub nfa_nodes: usize,
    pub dfa_nodes: usize,
    pub minimized_nodes: usize,
}

/// Size summary of one compilation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompileStats {
    pub rule_count: usize,
    pub modes: Vec<ModeStats>,
    pub combined_nodes: usize,
}

/// A successful compilation: the automaton plus its size metrics.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub automaton: CombinedAutomaton,
    pub stats: CompileStats,
}

/// Compile rule-file text into a [`CombinedAutomaton`].
///
/// # Errors
///
/// Returns every diagnostic collected before the pipeline had to stop:
/// a syntax error aborts immediately, while validation errors
/// (empty-matching rules, ambiguous rules, unresolved mode references)
/// are gathered across all modes of the failing stage first.
pub fn compile(text: &str) -> Result<Compiled, Vec<CompileError>> {
    let rules = RuleSet::parse(text).map_err(|err| vec![err.into()])?;

    let mut stats = CompileStats {
        rule_count: rules.rule_count(),
        ..CompileStats::default()
    };
    let mut errors: Vec<CompileError> = Vec::new();

    // Thompson construction; rules accepting the empty string would
    // let a generated lexer loop without consuming input.
    let mut nfas = Vec::new();
    for (mode, mode_rules) in rules.modes() {
        let nfa = build_nfa(mode, mode_rules);
        errors.extend(
            nfa.trivially_matched()
                .into_iter()
                .map(|rule| ValidationError::TriviallyMatchedRule { rule }.into()),
        );
        stats.modes.push(ModeStats {
            name: mode.into(),
            rules: mode_rules.len(),
            nfa_nodes: nfa.node_count(),
            dfa_nodes: 0,
            minimized_nodes: 0,
        });
        nfas.push((CompactString::from(mode), nfa));
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut dfas = Vec::new();
    for (idx, (mode, nfa)) in nfas.iter().enumerate() {
        match construct(mode, nfa) {
            Ok(dfa) => {
                stats.modes[idx].dfa_nodes = dfa.node_count();
                dfas.push((mode.clone(), dfa));
            }
            Err(stage_errors) => errors.extend(stage_errors),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut minimized = Vec::new();
    for (idx, (mode, dfa)) in dfas.into_iter().enumerate() {
        match minimize(&dfa) {
            Ok(min) => {
                stats.modes[idx].minimized_nodes = min.node_count();
                minimized.push((mode, min));
            }
            Err(internal) => errors.push(internal.into()),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let automaton = combine(minimized, rules.transitions().to_vec())
        .map_err(|errs| errs.into_iter().map(CompileError::from).collect::<Vec<_>>())?;
    stats.combined_nodes = automaton.dfa.node_count();

    Ok(Compiled { automaton, stats })
}
