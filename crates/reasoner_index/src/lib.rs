//! A trie over term structure, keyed by atom value / list operator / a
//! `List` marker for operator-less lists / a `Var` marker for variables.
//! Each node remembers every assertion id whose term passes through it.
//! Queries return **candidate sets** — supersets of the true answer that
//! the caller refines with a real unification/matching check — never a
//! final result on their own.
//!
//! All index mutation happens exclusively while the owning knowledge base
//! holds its write lock (see `reasoner_kb`), and read queries materialize
//! their result before that lock is released, so the trie itself uses
//! plain `FxHashMap`/`FxHashSet` rather than a concurrent map: there is
//! never more than one mutator active at a time, and wrapping every node
//! in its own lock would only add uncontended overhead.

use std::collections::hash_map::Entry;

use reasoner_term::{intern_atom, Symbol, Term};
use rustc_hash::{FxHashMap, FxHashSet};

/// Identifies an assertion for indexing purposes. Owned by `reasoner_kb`;
/// the index itself treats it as an opaque key.
pub type AssertionId = u64;

#[derive(Clone, PartialEq, Eq, Hash)]
enum Key {
    /// An atom's value, or a list's operator atom.
    Symbol(Symbol),
    /// A list whose head isn't a bare atom (or is empty).
    List,
    /// A variable.
    Var,
}

fn key_of(term: &Term) -> Key {
    match term {
        Term::Atom(s) => Key::Symbol(s.clone()),
        Term::Var(_) => Key::Var,
        Term::List(_) => match term.operator() {
            Some(op) => Key::Symbol(intern_atom(op)),
            None => Key::List,
        },
    }
}

#[derive(Default)]
struct Node {
    ids: FxHashSet<AssertionId>,
    children: FxHashMap<Key, Node>,
}

impl Node {
    fn insert(&mut self, term: &Term, id: AssertionId) {
        self.ids.insert(id);
        let key = key_of(term);
        let child = self.children.entry(key).or_default();
        child.ids.insert(id);
        if let Some(kids) = term.children() {
            for kid in kids {
                child.insert(kid, id);
            }
        }
    }

    /// Remove `id` from this subtree. Returns `true` if this node became
    /// empty and its parent should prune the edge to it.
    fn remove(&mut self, term: &Term, id: AssertionId) -> bool {
        self.ids.remove(&id);
        let key = key_of(term);
        if let Entry::Occupied(mut entry) = self.children.entry(key) {
            let child = entry.get_mut();
            if let Some(kids) = term.children() {
                for kid in kids {
                    child.remove(kid, id);
                }
            }
            child.ids.remove(&id);
            if child.ids.is_empty() && child.children.is_empty() {
                entry.remove();
            }
        }
        self.ids.is_empty() && self.children.is_empty()
    }

    fn collect_all(&self, out: &mut FxHashSet<AssertionId>) {
        out.extend(self.ids.iter().copied());
        for child in self.children.values() {
            child.collect_all(out);
        }
    }
}

/// A path index over a set of terms, supporting candidate retrieval for
/// unifiable / instance / generalization queries.
#[derive(Default)]
pub struct PathIndex {
    root: Node,
}

impl PathIndex {
    pub fn new() -> Self {
        PathIndex::default()
    }

    /// Index `term` under `id`. Call once per assertion on admission.
    pub fn insert(&mut self, term: &Term, id: AssertionId) {
        self.root.insert(term, id);
    }

    /// Remove `id`'s indexing for `term`, pruning empty subtries.
    pub fn remove(&mut self, term: &Term, id: AssertionId) {
        self.root.remove(term, id);
    }

    /// Candidates whose structure could unify with `term`: always include
    /// children under the `Var` marker, include the specific-key child,
    /// and for list queries also include `List`-marker children; recurse
    /// into the first child when descending.
    pub fn find_unifiable(&self, term: &Term) -> FxHashSet<AssertionId> {
        let mut out = FxHashSet::default();
        collect_unifiable(&self.root, term, &mut out);
        out
    }

    /// Candidates that `pattern` could match as an instance: a variable in
    /// `pattern` matches everything below this node; a concrete key
    /// follows the specific child.
    pub fn find_instances(&self, pattern: &Term) -> FxHashSet<AssertionId> {
        let mut out = FxHashSet::default();
        collect_instances(&self.root, pattern, &mut out);
        out
    }

    /// Candidates that are more general than `term`: include `Var`-marker
    /// children at every level (a stored variable generalizes anything),
    /// plus the specific-key child.
    pub fn find_generalizations(&self, term: &Term) -> FxHashSet<AssertionId> {
        let mut out = FxHashSet::default();
        collect_generalizations(&self.root, term, &mut out);
        out
    }
}

fn collect_unifiable(node: &Node, term: &Term, out: &mut FxHashSet<AssertionId>) {
    if let Some(var_child) = node.children.get(&Key::Var) {
        out.extend(var_child.ids.iter().copied());
    }
    if let Term::Var(_) = term {
        out.extend(node.ids.iter().copied());
        return;
    }
    let key = key_of(term);
    if let Some(child) = node.children.get(&key) {
        out.extend(child.ids.iter().copied());
        if let Some(kids) = term.children() {
            if let Some(first) = kids.first() {
                collect_unifiable(child, first, out);
            }
        }
    }
    if term.is_list() {
        if let Some(list_child) = node.children.get(&Key::List) {
            out.extend(list_child.ids.iter().copied());
        }
    }
}

fn collect_instances(node: &Node, pattern: &Term, out: &mut FxHashSet<AssertionId>) {
    if let Term::Var(_) = pattern {
        node.collect_all(out);
        return;
    }
    let key = key_of(pattern);
    if let Some(child) = node.children.get(&key) {
        out.extend(child.ids.iter().copied());
        if let Some(kids) = pattern.children() {
            if let Some(first) = kids.first() {
                collect_instances(child, first, out);
            }
        }
    }
}

fn collect_generalizations(node: &Node, term: &Term, out: &mut FxHashSet<AssertionId>) {
    if let Some(var_child) = node.children.get(&Key::Var) {
        out.extend(var_child.ids.iter().copied());
    }
    let key = key_of(term);
    if let Some(child) = node.children.get(&key) {
        out.extend(child.ids.iter().copied());
        if let Some(kids) = term.children() {
            if let Some(first) = kids.first() {
                collect_generalizations(child, first, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Term {
        reasoner_parser_for_tests::parse(s)
    }

    // Minimal inline parser for test fixtures so this crate doesn't need a
    // dependency on reasoner_parser just for tests.
    mod reasoner_parser_for_tests {
        use reasoner_term::Term;

        pub fn parse(input: &str) -> Term {
            let mut chars = input.chars().peekable();
            parse_term(&mut chars)
        }

        fn parse_term(chars: &mut std::iter::Peekable<std::str::Chars>) -> Term {
            while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                chars.next();
            }
            match chars.peek() {
                Some('(') => {
                    chars.next();
                    let mut kids = Vec::new();
                    loop {
                        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                            chars.next();
                        }
                        if chars.peek() == Some(&')') {
                            chars.next();
                            break;
                        }
                        kids.push(parse_term(chars));
                    }
                    Term::list(kids)
                }
                Some('?') => {
                    let mut s = String::new();
                    while matches!(chars.peek(), Some(c) if !c.is_whitespace() && *c != '(' && *c != ')') {
                        s.push(chars.next().unwrap());
                    }
                    Term::var(&s)
                }
                _ => {
                    let mut s = String::new();
                    while matches!(chars.peek(), Some(c) if !c.is_whitespace() && *c != '(' && *c != ')') {
                        s.push(chars.next().unwrap());
                    }
                    Term::atom(&s)
                }
            }
        }
    }

    #[test]
    fn unifiable_finds_exact_match() {
        let mut idx = PathIndex::new();
        let fact = t("(subclass Cat Mammal)");
        idx.insert(&fact, 1);
        let candidates = idx.find_unifiable(&t("(subclass Cat Mammal)"));
        assert!(candidates.contains(&1));
    }

    #[test]
    fn unifiable_finds_via_query_variable() {
        let mut idx = PathIndex::new();
        let fact = t("(subclass Cat Mammal)");
        idx.insert(&fact, 1);
        let candidates = idx.find_unifiable(&t("?x"));
        assert!(candidates.contains(&1));
    }

    #[test]
    fn unifiable_finds_stored_variable() {
        let mut idx = PathIndex::new();
        let rule_body = t("(subclass ?x Mammal)");
        idx.insert(&rule_body, 2);
        let candidates = idx.find_unifiable(&t("(subclass Cat Mammal)"));
        assert!(candidates.contains(&2));
    }

    #[test]
    fn instances_match_ground_pattern() {
        let mut idx = PathIndex::new();
        idx.insert(&t("(subclass Cat Mammal)"), 1);
        idx.insert(&t("(subclass Dog Mammal)"), 2);
        let candidates = idx.find_instances(&t("(subclass Cat Mammal)"));
        assert!(candidates.contains(&1));
        assert!(!candidates.contains(&2));
    }

    #[test]
    fn generalizations_finds_stored_variable_over_ground_query() {
        let mut idx = PathIndex::new();
        idx.insert(&t("(subclass ?x Mammal)"), 5);
        let candidates = idx.find_generalizations(&t("(subclass Cat Mammal)"));
        assert!(candidates.contains(&5));
    }

    #[test]
    fn remove_prunes_empty_subtries() {
        let mut idx = PathIndex::new();
        let fact = t("(subclass Cat Mammal)");
        idx.insert(&fact, 1);
        idx.remove(&fact, 1);
        assert!(idx.root.children.is_empty());
        assert!(idx.root.ids.is_empty());
    }
}
