use std::collections::BTreeSet;

use compact_str::CompactString;
use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::rules::{Pattern, PatternKind, Rule, qualify};

use super::NodeId;

/// Scratch/key type for sets of NFA nodes; kept sorted so equal sets
/// compare and hash equal.
pub type NodeSet = SmallVec<[NodeId; 8]>;

#[derive(Debug, Clone, Default)]
struct NfaState {
    byte_edges: Vec<(u8, NodeId)>,
    epsilon: Vec<NodeId>,
    accept: Option<CompactString>,
}

/// A nondeterministic automaton for one mode. Node 0 is the start,
/// node 1 the reserved invalid sink (kept unreachable so downstream
/// DFA numbering can pin it).
#[derive(Debug, Clone)]
pub struct Nfa {
    states: Vec<NfaState>,
    literal_rules: BTreeSet<CompactString>,
}

impl Default for Nfa {
    fn default() -> Self {
        Self::new()
    }
}

impl Nfa {
    #[must_use]
    pub fn new() -> Self {
        Self {
            // Nodes 0 (start) and 1 (invalid) exist from the outset.
            states: vec![NfaState::default(), NfaState::default()],
            literal_rules: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.states.len()
    }

    /// The rule accepted at `node`, if it is a match node
    #[must_use]
    pub fn accept(&self, node: NodeId) -> Option<&str> {
        self.states[node.index()].accept.as_deref()
    }

    /// All rule names with a match node, in sorted order
    #[must_use]
    pub fn accept_names(&self) -> BTreeSet<CompactString> {
        self.states
            .iter()
            .filter_map(|s| s.accept.clone())
            .collect()
    }

    /// Names of the rules that denote a fixed byte string
    #[must_use]
    pub const fn literal_rules(&self) -> &BTreeSet<CompactString> {
        &self.literal_rules
    }

    /// The byte alphabet: every byte labeling any transition
    #[must_use]
    pub fn alphabet(&self) -> BTreeSet<u8> {
        self.states
            .iter()
            .flat_map(|s| s.byte_edges.iter().map(|&(b, _)| b))
            .collect()
    }

    /// Byte-labeled edges out of `node`
    #[must_use]
    pub fn byte_edges(&self, node: NodeId) -> &[(u8, NodeId)] {
        &self.states[node.index()].byte_edges
    }

    fn add_state(&mut self) -> NodeId {
        let id = NodeId(u32::try_from(self.states.len()).unwrap_or(0));
        self.states.push(NfaState::default());
        id
    }

    fn add_byte_edge(&mut self, from: NodeId, byte: u8, to: NodeId) {
        self.states[from.index()].byte_edges.push((byte, to));
    }

    fn add_epsilon(&mut self, from: NodeId, to: NodeId) {
        self.states[from.index()].epsilon.push(to);
    }

    /// Transitive ε-reachability from `seeds`, returned sorted.
    #[must_use]
    pub fn epsilon_closure(&self, seeds: &[NodeId]) -> NodeSet {
        let mut seen: HashSet<NodeId, ahash::RandomState> = seeds.iter().copied().collect();
        let mut stack: Vec<NodeId> = seeds.to_vec();

        while let Some(node) = stack.pop() {
            for &next in &self.states[node.index()].epsilon {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }

        let mut closure: NodeSet = seen.into_iter().collect();
        closure.sort_unstable();
        closure
    }

    /// Rule names whose match node is already in the ε-closure of the
    /// start node: such rules accept the empty string outright, which
    /// would let a generated lexer loop without consuming input.
    #[must_use]
    pub fn trivially_matched(&self) -> Vec<CompactString> {
        self.epsilon_closure(&[NodeId::START])
            .iter()
            .filter_map(|&n| self.states[n.index()].accept.clone())
            .collect()
    }

    /// Names of every rule accepting exactly the input `bytes`.
    ///
    /// This simulates the NFA for testing and cross-checking against
    /// the DFA; the core never lexes live streams.
    #[must_use]
    pub fn accepting_names(&self, bytes: &[u8]) -> BTreeSet<CompactString> {
        let mut current = self.epsilon_closure(&[NodeId::START]);
        for &byte in bytes {
            let step: Vec<NodeId> = current
                .iter()
                .flat_map(|&n| {
                    self.states[n.index()]
                        .byte_edges
                        .iter()
                        .filter(move |&&(b, _)| b == byte)
                        .map(|&(_, to)| to)
                })
                .collect();
            if step.is_empty() {
                return BTreeSet::new();
            }
            current = self.epsilon_closure(&step);
        }
        current
            .iter()
            .filter_map(|&n| self.states[n.index()].accept.clone())
            .collect()
    }
}

/// Build a mode's NFA from its rules via Thompson's construction.
///
/// Rules are wired in lexicographic name order so node numbering is
/// reproducible across runs; each rule gets a fresh match node wired
/// between the shared start node and itself.
#[must_use]
pub fn build(mode: &str, rules: &[Rule]) -> Nfa {
    let mut nfa = Nfa::new();

    let mut ordered: Vec<&Rule> = rules.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));

    for rule in ordered {
        let match_node = nfa.add_state();
        wire(&mut nfa, &rule.pattern, NodeId::START, match_node);
        let name = qualify(mode, &rule.name);
        if rule.is_literal() {
            nfa.literal_rules.insert(name.clone());
        }
        nfa.states[match_node.index()].accept = Some(name);
    }

    nfa
}

/// Wire `pattern` between `(start, end)`.
fn wire(nfa: &mut Nfa, pattern: &Pattern, start: NodeId, end: NodeId) {
    match &pattern.kind {
        PatternKind::Charset(set) => {
            for byte in set.iter() {
                nfa.add_byte_edge(start, byte, end);
            }
        }
        PatternKind::Seq(subs) => {
            let Some((last, init)) = subs.split_last() else {
                nfa.add_epsilon(start, end);
                return;
            };
            let mut current = start;
            for sub in init {
                let next = nfa.add_state();
                wire(nfa, sub, current, next);
                current = next;
            }
            wire(nfa, last, current, end);
        }
        PatternKind::Choice(subs) => {
            for sub in subs {
                wire(nfa, sub, start, end);
            }
        }
        PatternKind::Opt(sub) => {
            nfa.add_epsilon(start, end);
            wire(nfa, sub, start, end);
        }
        PatternKind::Star(sub) => {
            let branch = nfa.add_state();
            nfa.add_epsilon(start, branch);
            nfa.add_epsilon(branch, end);
            wire(nfa, sub, branch, branch);
        }
        PatternKind::Plus(sub) => {
            let pre = nfa.add_state();
            let post = nfa.add_state();
            nfa.add_epsilon(start, pre);
            nfa.add_epsilon(post, end);
            nfa.add_epsilon(post, pre);
            wire(nfa, sub, pre, post);
        }
    }
}
