use std::collections::{BTreeMap, VecDeque};

use hashbrown::{HashMap, HashSet};

use crate::error::InternalError;

use super::{Dfa, NodeId};

/// Reduce a DFA to its minimal language-equivalent form via partition
/// refinement.
///
/// The initial partition has one block per match name plus one block of
/// non-matching nodes, so states accepting different rules are never
/// merged. Refinement splits any block unevenly covered by the
/// preimage of another block; both halves are re-queued (intersection
/// first). Final node ids are ordered by each block's sorted tuple of
/// original ids, which keeps the start node at 0 and the invalid node
/// at 1 and makes the operation idempotent.
///
/// # Errors
///
/// Returns an [`InternalError`] if two merged nodes disagree on any
/// byte's destination; this is a defensive check and should be
/// unreachable for a correct refinement.
pub fn minimize(dfa: &Dfa) -> Result<Dfa, InternalError> {
    let node_count = dfa.node_count();
    let alphabet: Vec<u8> = dfa.alphabet().into_iter().collect();

    // Initial partition, keyed by match name; `None` (the non-match
    // block) sorts first.
    let mut by_name: BTreeMap<Option<&str>, Vec<u32>> = BTreeMap::new();
    for id in 0..node_count {
        let id = u32::try_from(id).unwrap_or(0);
        by_name.entry(dfa.accept(NodeId(id))).or_default().push(id);
    }
    let mut blocks: Vec<Vec<u32>> = Vec::with_capacity(by_name.len());
    let mut block_of: Vec<usize> = vec![0; node_count];
    for members in by_name.into_values() {
        let idx = blocks.len();
        for &m in &members {
            block_of[m as usize] = idx;
        }
        blocks.push(members);
    }

    // Reverse-transition index: byte -> destination -> sources.
    let mut reverse: HashMap<(u8, u32), Vec<u32>, ahash::RandomState> = HashMap::default();
    for src in 0..node_count {
        let src = u32::try_from(src).unwrap_or(0);
        for (byte, to) in dfa.transitions(NodeId(src)) {
            reverse.entry((byte, to.0)).or_default().push(src);
        }
    }

    let mut worklist: VecDeque<usize> = (0..blocks.len()).collect();
    let mut pending: Vec<bool> = vec![true; blocks.len()];

    while let Some(splitter) = worklist.pop_front() {
        pending[splitter] = false;
        // Snapshot: the splitter may itself be split below, which only
        // re-queues the halves; reprocessing is idempotent.
        let members = blocks[splitter].clone();

        for &byte in &alphabet {
            let mut preimage: HashSet<u32, ahash::RandomState> = HashSet::default();
            for &m in &members {
                if let Some(sources) = reverse.get(&(byte, m)) {
                    preimage.extend(sources.iter().copied());
                }
            }
            if preimage.is_empty() {
                continue;
            }

            let mut hits: HashMap<usize, usize, ahash::RandomState> = HashMap::default();
            for &p in &preimage {
                *hits.entry(block_of[p as usize]).or_insert(0) += 1;
            }
            let mut affected: Vec<usize> = hits
                .iter()
                .filter(|&(&idx, &count)| count < blocks[idx].len())
                .map(|(&idx, _)| idx)
                .collect();
            affected.sort_unstable();

            for idx in affected {
                let (inside, outside): (Vec<u32>, Vec<u32>) = blocks[idx]
                    .iter()
                    .partition(|&&m| preimage.contains(&m));
                // Replace the block with the intersection half and
                // append the difference half.
                blocks[idx] = inside;
                let new_idx = blocks.len();
                for &m in &outside {
                    block_of[m as usize] = new_idx;
                }
                blocks.push(outside);

                if !pending[idx] {
                    pending[idx] = true;
                    worklist.push_back(idx);
                }
                pending.push(true);
                worklist.push_back(new_idx);
            }
        }
    }

    // Deterministic renumbering: blocks ordered by their sorted member
    // tuples. The block holding node 0 sorts first and the one holding
    // node 1 second, so start/invalid identities survive.
    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by(|&a, &b| blocks[a].cmp(&blocks[b]));
    let mut new_id = vec![0_u32; blocks.len()];
    for (pos, &idx) in order.iter().enumerate() {
        new_id[idx] = u32::try_from(pos).unwrap_or(0);
    }

    let mut out = Dfa::with_node_count(blocks.len());
    for (idx, members) in blocks.iter().enumerate() {
        let src = NodeId(new_id[idx]);
        let signature = block_signature(dfa, members[0], &block_of, &new_id);
        for &m in &members[1..] {
            let other = block_signature(dfa, m, &block_of, &new_id);
            if other != signature {
                let byte = conflicting_byte(&signature, &other);
                return Err(InternalError::ConflictingMerge {
                    first: members[0],
                    second: m,
                    byte,
                });
            }
        }
        for (byte, to) in signature {
            out.set_transition(src, byte, NodeId(to));
        }
        if let Some(name) = dfa.accept(NodeId(members[0])) {
            out.set_accept(src, name.into());
        }
    }
    out.set_literal_rules(dfa.literal_rules().clone());
    Ok(out)
}

/// A node's transitions mapped through the block renumbering.
fn block_signature(
    dfa: &Dfa,
    node: u32,
    block_of: &[usize],
    new_id: &[u32],
) -> BTreeMap<u8, u32> {
    dfa.transitions(NodeId(node))
        .map(|(byte, to)| (byte, new_id[block_of[to.index()]]))
        .collect()
}

fn conflicting_byte(a: &BTreeMap<u8, u32>, b: &BTreeMap<u8, u32>) -> u8 {
    for byte in 0..=u8::MAX {
        if a.get(&byte) != b.get(&byte) {
            return byte;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{build_nfa, construct};
    use crate::rules::{MODE_MAIN, RuleSet};

    fn dfa_for(rules_text: &str) -> Dfa {
        let set = RuleSet::parse(rules_text).unwrap();
        let nfa = build_nfa(MODE_MAIN, set.mode(MODE_MAIN).unwrap());
        construct(MODE_MAIN, &nfa).unwrap()
    }

    #[test]
    fn test_merges_equivalent_interior_states() {
        // "ab" and "cb" share their suffix; the two interior states
        // are indistinguishable and must merge.
        let fat = dfa_for("x: ab|cb");
        assert_eq!(fat.node_count(), 5);
        let min = minimize(&fat).unwrap();
        assert_eq!(min.node_count(), 4);
        assert_eq!(min.match_name(b"ab"), Some("x"));
        assert_eq!(min.match_name(b"cb"), Some("x"));
        assert_eq!(min.match_name(b"a"), None);
    }

    #[test]
    fn test_characterization_of_renumbering() {
        // Pins the exact output numbering: blocks are ordered by their
        // sorted original-id tuples, keeping start at 0, invalid at 1.
        let min = minimize(&dfa_for("x: ab|cb")).unwrap();
        // Node 2 is the merged interior pair, node 3 the match node.
        assert_eq!(min.target(NodeId::START, b'a'), Some(NodeId(2)));
        assert_eq!(min.target(NodeId::START, b'c'), Some(NodeId(2)));
        assert_eq!(min.target(NodeId(2), b'b'), Some(NodeId(3)));
        assert_eq!(min.accept(NodeId(3)), Some("x"));
        assert_eq!(min.target(NodeId::INVALID, b'z'), Some(NodeId::INVALID));
        assert_eq!(min.target(NodeId::INVALID, b'a'), None);
    }

    #[test]
    fn test_keeps_distinct_rules_apart() {
        let fat = dfa_for("x: ab\ny: cb");
        let min = minimize(&fat).unwrap();
        assert_eq!(min.match_name(b"ab"), Some("x"));
        assert_eq!(min.match_name(b"cb"), Some("y"));
        // Interior states lead to different rules and must not merge.
        assert_ne!(
            min.target(NodeId::START, b'a'),
            min.target(NodeId::START, b'c')
        );
    }

    #[test]
    fn test_idempotent() {
        let fat = dfa_for("kw: if\nident: \\l(\\l|\\d|_)*\nnum: \\d+");
        let once = minimize(&fat).unwrap();
        let twice = minimize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_language_preserving() {
        let fat = dfa_for("kw: if\nident: \\l(\\l|\\d|_)*\nnum: \\d+");
        let min = minimize(&fat).unwrap();
        assert!(min.node_count() <= fat.node_count());
        for input in [
            b"if".as_slice(),
            b"i",
            b"ifx",
            b"a1_b2",
            b"007",
            b"9a",
            b"",
            b"!",
        ] {
            assert_eq!(fat.match_name(input), min.match_name(input), "{input:?}");
        }
    }

    #[test]
    fn test_preserves_accept_name_set() {
        let fat = dfa_for("kw: if\nident: \\l\\w*\nnum: \\d+");
        let min = minimize(&fat).unwrap();
        assert_eq!(fat.accept_names(), min.accept_names());
        assert_eq!(fat.literal_rules(), min.literal_rules());
    }

    #[test]
    fn test_invalid_loops_survive_minimization() {
        let min = minimize(&dfa_for("x: ab")).unwrap();
        for byte in 0..=u8::MAX {
            if byte == b'a' {
                assert!(min.target(NodeId::INVALID, byte).is_none());
            } else {
                assert_eq!(min.target(NodeId::INVALID, byte), Some(NodeId::INVALID));
            }
        }
    }
}
