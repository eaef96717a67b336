use std::collections::{BTreeMap, BTreeSet};

use compact_str::CompactString;

use super::NodeId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct DfaState {
    /// Ordered by byte so renumbering and rendering are deterministic
    transitions: BTreeMap<u8, NodeId>,
    accept: Option<CompactString>,
}

/// A deterministic automaton: each `(node, byte)` pair has at most one
/// destination. Node 0 is the start, node 1 the invalid sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dfa {
    states: Vec<DfaState>,
    literal_rules: BTreeSet<CompactString>,
}

impl Dfa {
    pub(crate) fn with_node_count(count: usize) -> Self {
        Self {
            states: vec![DfaState::default(); count],
            literal_rules: BTreeSet::new(),
        }
    }

    pub(crate) fn set_transition(&mut self, from: NodeId, byte: u8, to: NodeId) {
        self.states[from.index()].transitions.insert(byte, to);
    }

    pub(crate) fn set_accept(&mut self, node: NodeId, name: CompactString) {
        self.states[node.index()].accept = Some(name);
    }

    pub(crate) fn set_literal_rules(&mut self, literal_rules: BTreeSet<CompactString>) {
        self.literal_rules = literal_rules;
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.states.len()
    }

    /// The destination of `(node, byte)`, if defined
    #[must_use]
    pub fn target(&self, node: NodeId, byte: u8) -> Option<NodeId> {
        self.states[node.index()].transitions.get(&byte).copied()
    }

    /// Outgoing transitions of `node`, in ascending byte order
    pub fn transitions(&self, node: NodeId) -> impl Iterator<Item = (u8, NodeId)> + '_ {
        self.states[node.index()]
            .transitions
            .iter()
            .map(|(&b, &to)| (b, to))
    }

    /// The rule matched at `node`, if it is a match node
    #[must_use]
    pub fn accept(&self, node: NodeId) -> Option<&str> {
        self.states[node.index()].accept.as_deref()
    }

    /// All rule names matched somewhere in this DFA, sorted
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

    /// Every byte labeling any transition
    #[must_use]
    pub fn alphabet(&self) -> BTreeSet<u8> {
        self.states
            .iter()
            .flat_map(|s| s.transitions.keys().copied())
            .collect()
    }

    /// The rule matching exactly the input `bytes`, if any.
    ///
    /// Simulation helper for testing and cross-checking against the
    /// NFA; the core never lexes live streams.
    #[must_use]
    pub fn match_name(&self, bytes: &[u8]) -> Option<&str> {
        let mut node = NodeId::START;
        for &byte in bytes {
            node = self.target(node, byte)?;
        }
        self.accept(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_dfa() -> Dfa {
        // start --a--> 2(accept "x"), invalid loops on 'z'.
        let mut dfa = Dfa::with_node_count(3);
        dfa.set_transition(NodeId::START, b'a', NodeId(2));
        dfa.set_transition(NodeId::INVALID, b'z', NodeId::INVALID);
        dfa.set_accept(NodeId(2), "x".into());
        dfa
    }

    #[test]
    fn test_target_and_accept() {
        let dfa = tiny_dfa();
        assert_eq!(dfa.target(NodeId::START, b'a'), Some(NodeId(2)));
        assert_eq!(dfa.target(NodeId::START, b'b'), None);
        assert_eq!(dfa.accept(NodeId(2)), Some("x"));
        assert_eq!(dfa.accept(NodeId::START), None);
    }

    #[test]
    fn test_match_name_runs_from_start() {
        let dfa = tiny_dfa();
        assert_eq!(dfa.match_name(b"a"), Some("x"));
        assert_eq!(dfa.match_name(b""), None);
        assert_eq!(dfa.match_name(b"aa"), None);
        assert_eq!(dfa.match_name(b"b"), None);
    }

    #[test]
    fn test_alphabet_and_names() {
        let dfa = tiny_dfa();
        let alpha: Vec<u8> = dfa.alphabet().into_iter().collect();
        assert_eq!(alpha, vec![b'a', b'z']);
        assert!(dfa.accept_names().contains("x"));
    }
}
