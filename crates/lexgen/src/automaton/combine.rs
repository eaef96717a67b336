use std::collections::{BTreeMap, BTreeSet};

use compact_str::CompactString;

use crate::error::ValidationError;
use crate::rules::{MODE_MAIN, ModeRef, ModeTransition, qualify};

use super::{Dfa, NodeId};

/// One named sub-automaton inside a [`CombinedAutomaton`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mode {
    pub name: CompactString,
    pub start_node: NodeId,
    pub invalid_node: NodeId,
    /// Name the generated lexer reports for unrecognized input in this
    /// mode
    pub invalid_rule_name: CompactString,
    /// Name reported for input cut off mid-token
    pub incomplete_rule_name: CompactString,
}

/// Every mode's minimized DFA merged into one shared node space,
/// together with the mode table and the raw mode-transition edges the
/// code-generation backend renders.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombinedAutomaton {
    pub dfa: Dfa,
    pub modes: Vec<Mode>,
    /// Node index to index into `modes`
    node_to_mode: Vec<u32>,
    pub transitions: Vec<ModeTransition>,
}

impl CombinedAutomaton {
    /// The mode a node belongs to
    #[must_use]
    pub fn mode_of(&self, node: NodeId) -> &Mode {
        &self.modes[self.node_to_mode[node.index()] as usize]
    }

    /// The full node-to-mode table: index into [`Self::modes`] for
    /// every node of the combined DFA
    #[must_use]
    pub fn node_to_mode(&self) -> &[u32] {
        &self.node_to_mode
    }

    #[must_use]
    pub fn mode_named(&self, name: &str) -> Option<&Mode> {
        self.modes.iter().find(|m| m.name == name)
    }

    /// Every rule name matched somewhere in the combined DFA
    #[must_use]
    pub fn match_names(&self) -> BTreeSet<CompactString> {
        self.dfa.accept_names()
    }
}

/// Merge per-mode minimized DFAs into one addressable automaton.
///
/// Modes are processed `main` first, the rest lexicographically; each
/// mode's nodes are shifted by a fixed offset, preserving its internal
/// topology and its start/invalid identities.
///
/// # Errors
///
/// Returns every [`ValidationError::UnresolvedModeReference`] for
/// transition declarations naming a mode or rule that does not exist.
pub fn combine(
    mode_dfas: Vec<(CompactString, Dfa)>,
    transitions: Vec<ModeTransition>,
) -> Result<CombinedAutomaton, Vec<ValidationError>> {
    let mut ordered = mode_dfas;
    ordered.sort_by_key(|(name, _)| (name.as_str() != MODE_MAIN, name.clone()));

    validate_references(&ordered, &transitions)?;

    let total: usize = ordered.iter().map(|(_, dfa)| dfa.node_count()).sum();
    let mut combined = Dfa::with_node_count(total);
    let mut literal_rules = BTreeSet::new();
    let mut modes = Vec::with_capacity(ordered.len());
    let mut node_to_mode = vec![0_u32; total];

    let mut base = 0_u32;
    for (mode_idx, (name, dfa)) in ordered.iter().enumerate() {
        let shift = |node: NodeId| NodeId(base + node.0);
        for n in 0..dfa.node_count() {
            let node = NodeId(u32::try_from(n).unwrap_or(0));
            for (byte, to) in dfa.transitions(node) {
                combined.set_transition(shift(node), byte, shift(to));
            }
            if let Some(accept) = dfa.accept(node) {
                combined.set_accept(shift(node), accept.into());
            }
            node_to_mode[shift(node).index()] = u32::try_from(mode_idx).unwrap_or(0);
        }
        literal_rules.extend(dfa.literal_rules().iter().cloned());

        modes.push(Mode {
            name: name.clone(),
            start_node: shift(NodeId::START),
            invalid_node: shift(NodeId::INVALID),
            invalid_rule_name: qualify(name, "invalid"),
            incomplete_rule_name: qualify(name, "incomplete"),
        });
        base += u32::try_from(dfa.node_count()).unwrap_or(0);
    }
    combined.set_literal_rules(literal_rules);

    Ok(CombinedAutomaton {
        dfa: combined,
        modes,
        node_to_mode,
        transitions,
    })
}

/// Every `(mode, label)` referenced on either side of a transition
/// declaration must name an existing mode and, when a label is given,
/// an existing rule in it. All unresolved references are collected
/// before failing.
fn validate_references(
    ordered: &[(CompactString, Dfa)],
    transitions: &[ModeTransition],
) -> Result<(), Vec<ValidationError>> {
    let mut labels: BTreeMap<&str, BTreeSet<CompactString>> = BTreeMap::new();
    for (name, dfa) in ordered {
        let prefix_len = if name.as_str() == MODE_MAIN { 0 } else { name.len() + 1 };
        labels.insert(
            name.as_str(),
            dfa.accept_names()
                .iter()
                .map(|qualified| CompactString::from(&qualified[prefix_len..]))
                .collect(),
        );
    }

    let resolves = |reference: &ModeRef| {
        labels.get(reference.mode.as_str()).is_some_and(|known| {
            reference
                .label
                .as_ref()
                .is_none_or(|label| known.contains(label))
        })
    };

    let mut errors = Vec::new();
    for transition in transitions {
        for side in [&transition.from, &transition.to] {
            if !resolves(side) {
                errors.push(ValidationError::UnresolvedModeReference {
                    reference: side.display_name(),
                });
            }
        }
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{build_nfa, construct, minimize};
    use crate::rules::RuleSet;

    fn compile_modes(rules_text: &str) -> (Vec<(CompactString, Dfa)>, Vec<ModeTransition>) {
        let set = RuleSet::parse(rules_text).unwrap();
        let dfas = set
            .modes()
            .map(|(mode, rules)| {
                let nfa = build_nfa(mode, rules);
                let dfa = minimize(&construct(mode, &nfa).unwrap()).unwrap();
                (CompactString::from(mode), dfa)
            })
            .collect();
        (dfas, set.transitions().to_vec())
    }

    #[test]
    fn test_combines_two_modes_with_transition() {
        // Scenario: a string sublanguage entered on `str_start`.
        let (dfas, transitions) =
            compile_modes("str_start: \"\nstr.str_end: \"\nstr_start -> str");
        let main_nodes = dfas
            .iter()
            .find(|(n, _)| n.as_str() == MODE_MAIN)
            .unwrap()
            .1
            .node_count();
        let combined = combine(dfas, transitions).unwrap();

        assert_eq!(combined.modes.len(), 2);
        assert_eq!(combined.modes[0].name, MODE_MAIN);
        assert_eq!(combined.modes[1].name, "str");

        // Every node is classified into its source mode.
        assert_eq!(combined.modes[0].start_node, NodeId::START);
        assert_eq!(combined.modes[0].invalid_node, NodeId::INVALID);
        let str_mode = combined.mode_named("str").unwrap();
        assert_eq!(str_mode.start_node.index(), main_nodes);
        for n in 0..combined.dfa.node_count() {
            let node = NodeId(u32::try_from(n).unwrap());
            let expected = if n < main_nodes { MODE_MAIN } else { "str" };
            assert_eq!(combined.mode_of(node).name, expected, "node {n}");
        }

        // The transition edge passes through unchanged.
        let t = &combined.transitions[0];
        assert_eq!(t.from.mode, MODE_MAIN);
        assert_eq!(t.from.label.as_deref(), Some("str_start"));
        assert_eq!(t.to.mode, "str");
        assert_eq!(t.to.label, None);
    }

    #[test]
    fn test_mode_table_reserved_names() {
        let (dfas, transitions) = compile_modes("a: x\nstr.b: y");
        let combined = combine(dfas, transitions).unwrap();
        let main = combined.mode_named(MODE_MAIN).unwrap();
        assert_eq!(main.invalid_rule_name, "invalid");
        assert_eq!(main.incomplete_rule_name, "incomplete");
        let str_mode = combined.mode_named("str").unwrap();
        assert_eq!(str_mode.invalid_rule_name, "str.invalid");
        assert_eq!(str_mode.incomplete_rule_name, "str.incomplete");
    }

    #[test]
    fn test_mode_topology_preserved() {
        let (dfas, transitions) = compile_modes("a: pq\nstr.b: pr");
        let per_mode: Vec<(CompactString, Dfa)> = dfas.clone();
        let combined = combine(dfas, transitions).unwrap();

        for (name, dfa) in &per_mode {
            let mode = combined.mode_named(name).unwrap();
            let base = mode.start_node.0;
            for n in 0..dfa.node_count() {
                let node = NodeId(u32::try_from(n).unwrap());
                let shifted = NodeId(base + node.0);
                let original: Vec<(u8, u32)> =
                    dfa.transitions(node).map(|(b, to)| (b, base + to.0)).collect();
                let merged: Vec<(u8, u32)> =
                    combined.dfa.transitions(shifted).map(|(b, to)| (b, to.0)).collect();
                assert_eq!(original, merged);
                assert_eq!(dfa.accept(node), combined.dfa.accept(shifted));
            }
        }
    }

    #[test]
    fn test_modes_ordered_main_first_then_lexicographic() {
        let (dfas, transitions) = compile_modes("zz.a: x\naa.b: y\nc: z");
        let combined = combine(dfas, transitions).unwrap();
        let order: Vec<&str> = combined.modes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(order, vec![MODE_MAIN, "aa", "zz"]);
    }

    #[test]
    fn test_unresolved_references_all_collected() {
        let (dfas, transitions) = compile_modes(
            "a: x\nghost -> str\na -> nowhere\n",
        );
        let errors = combine(dfas, transitions).unwrap_err();
        let refs: Vec<String> = errors
            .iter()
            .map(|e| match e {
                ValidationError::UnresolvedModeReference { reference } => reference.to_string(),
                other => panic!("unexpected error {other:?}"),
            })
            .collect();
        // `ghost` is no rule in main, `str` and `nowhere` are no modes.
        assert_eq!(refs, vec!["ghost", "str", "nowhere"]);
    }

    #[test]
    fn test_transition_to_specific_rule_resolves() {
        let (dfas, transitions) = compile_modes("a: x\nstr.b: y\na -> str.b\n");
        assert!(combine(dfas, transitions).is_ok());
    }

    #[test]
    fn test_every_rule_survives_combination() {
        let (dfas, transitions) =
            compile_modes("kw: if\nident: \\l\\w*\nstr.end: q\nstr.esc: e");
        let combined = combine(dfas, transitions).unwrap();
        let names = combined.match_names();
        for expected in ["kw", "ident", "str.end", "str.esc"] {
            assert!(names.contains(expected), "{expected}");
        }
        assert_eq!(names.len(), 4);
    }
}
