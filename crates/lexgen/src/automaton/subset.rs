use std::collections::{BTreeSet, VecDeque};

use compact_str::CompactString;
use hashbrown::HashMap;

use crate::error::{CompileError, InternalError, ValidationError};

use super::nfa::{Nfa, NodeSet};
use super::{Dfa, NodeId};

/// Convert one mode's NFA into a DFA via powerset construction.
///
/// Each DFA node stands for the frozen ε-closed set of NFA nodes
/// reachable on some input. The start state's closure becomes node 0
/// and the (unreachable) invalid closure node 1; all other states are
/// numbered in discovery order. The invalid node is completed with a
/// self-loop on every byte that cannot start a rule, so a generated
/// lexer can always advance past unrecognized input.
///
/// # Errors
///
/// Returns every [`ValidationError::AmbiguousRules`] group found across
/// the whole DFA when two or more rules accept on the same node after
/// literal-preference resolution, or an [`InternalError`] if the rule
/// name set changed during construction.
pub fn construct(mode: &str, nfa: &Nfa) -> Result<Dfa, Vec<CompileError>> {
    let alphabet: Vec<u8> = nfa.alphabet().into_iter().collect();

    let start_key = nfa.epsilon_closure(&[NodeId::START]);
    let invalid_key = nfa.epsilon_closure(&[NodeId::INVALID]);

    // Discovery-ordered state keys; the map carries each key's index.
    let mut keys: Vec<NodeSet> = vec![start_key.clone()];
    let mut key_index: HashMap<NodeSet, usize, ahash::RandomState> = HashMap::default();
    key_index.insert(start_key, 0);

    let mut edges: Vec<(usize, u8, usize)> = Vec::new();
    let mut worklist: VecDeque<usize> = VecDeque::from([0]);

    while let Some(src) = worklist.pop_front() {
        let key = keys[src].clone();
        for &byte in &alphabet {
            let step: Vec<NodeId> = key
                .iter()
                .flat_map(|&n| {
                    nfa.byte_edges(n)
                        .iter()
                        .filter(move |&&(b, _)| b == byte)
                        .map(|&(_, to)| to)
                })
                .collect();
            if step.is_empty() {
                continue;
            }
            let dst_key = nfa.epsilon_closure(&step);
            let dst = *key_index.entry(dst_key.clone()).or_insert_with(|| {
                let idx = keys.len();
                keys.push(dst_key);
                worklist.push_back(idx);
                idx
            });
            edges.push((src, byte, dst));
        }
    }

    // The invalid state is unreachable by construction; give it a slot
    // explicitly so the generated lexer has a home for bytes that never
    // start any rule.
    let invalid = *key_index.entry(invalid_key.clone()).or_insert_with(|| {
        let idx = keys.len();
        keys.push(invalid_key);
        idx
    });

    // Renumber: start stays 0, invalid is forced to 1, everything else
    // keeps discovery order.
    let mut final_id = vec![NodeId(0); keys.len()];
    final_id[invalid] = NodeId::INVALID;
    let mut next = 2;
    for (idx, id) in final_id.iter_mut().enumerate() {
        if idx != 0 && idx != invalid {
            *id = NodeId(next);
            next += 1;
        }
    }

    let mut dfa = Dfa::with_node_count(keys.len());
    for (src, byte, dst) in edges {
        dfa.set_transition(final_id[src], byte, final_id[dst]);
    }

    // Invalid-node completion: loop on every byte that has no
    // transition out of the start node.
    for byte in 0..=u8::MAX {
        if dfa.target(NodeId::START, byte).is_none() {
            dfa.set_transition(NodeId::INVALID, byte, NodeId::INVALID);
        }
    }

    // Resolve match names, letting literal rules shadow pattern rules;
    // collect every ambiguous group before reporting any.
    let mut ambiguous: BTreeSet<Vec<CompactString>> = BTreeSet::new();
    for (idx, key) in keys.iter().enumerate() {
        let mut names: BTreeSet<CompactString> = key
            .iter()
            .filter_map(|&n| nfa.accept(n).map(CompactString::from))
            .collect();
        let literals: BTreeSet<CompactString> = names
            .intersection(nfa.literal_rules())
            .cloned()
            .collect();
        if !literals.is_empty() {
            names = literals;
        }
        if names.len() > 1 {
            ambiguous.insert(names.into_iter().collect());
        } else if let Some(name) = names.pop_first() {
            dfa.set_accept(final_id[idx], name);
        }
    }
    if !ambiguous.is_empty() {
        return Err(ambiguous
            .into_iter()
            .map(|rules| ValidationError::AmbiguousRules { rules }.into())
            .collect());
    }

    // Completeness: construction must neither drop nor invent rules.
    let expected = nfa.accept_names();
    let actual = dfa.accept_names();
    if expected != actual {
        let err = InternalError::MatchNamesMismatch {
            mode: mode.into(),
            missing: expected.difference(&actual).cloned().collect(),
            unexpected: actual.difference(&expected).cloned().collect(),
        };
        return Err(vec![err.into()]);
    }

    dfa.set_literal_rules(nfa.literal_rules().clone());
    Ok(dfa)
}
