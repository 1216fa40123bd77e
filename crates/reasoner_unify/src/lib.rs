//! Unification, one-way matching, capture-free substitution, and subterm
//! rewriting over [`reasoner_term::Term`]. All operations are depth-bounded
//! to ~50 to keep pathological recursion from blowing the stack; hitting
//! the bound is treated as an ordinary failure, same as a structural or
//! arity mismatch.

use reasoner_term::{Symbol, Term};
use rustc_hash::FxHashMap;

/// Recursion bound for unify/match/subst/rewrite. Chosen generously above
/// any term depth a forward-chaining derivation guard (depth <= 4) would
/// ever produce.
const MAX_DEPTH: usize = 50;

/// A variable substitution. Variables may be bound to terms containing
/// other (unbound) variables; [`subst`] chases these chains to a fixed
/// point.
pub type Bindings = FxHashMap<Symbol, Term>;

/// Two-way unification with occurs-check. Returns the bindings extended
/// with whatever new variable assignments were needed to make `x` and `y`
/// equal, or `None` on structural mismatch, arity mismatch, an occurs-check
/// violation, or the depth bound being reached.
pub fn unify(x: &Term, y: &Term, bindings: &Bindings) -> Option<Bindings> {
    unify_depth(x, y, bindings, 0)
}

fn unify_depth(x: &Term, y: &Term, bindings: &Bindings, depth: usize) -> Option<Bindings> {
    if depth > MAX_DEPTH {
        return None;
    }
    let x = chase(x, bindings);
    let y = chase(y, bindings);
    match (&x, &y) {
        (Term::Var(a), Term::Var(b)) if a == b => Some(bindings.clone()),
        (Term::Var(a), _) => bind(a.clone(), y, bindings),
        (_, Term::Var(b)) => bind(b.clone(), x, bindings),
        (Term::Atom(a), Term::Atom(b)) => {
            if a == b {
                Some(bindings.clone())
            } else {
                None
            }
        }
        (Term::List(_), Term::List(_)) => {
            let xs = x.children().unwrap();
            let ys = y.children().unwrap();
            if xs.len() != ys.len() {
                return None;
            }
            let mut current = bindings.clone();
            for (cx, cy) in xs.iter().zip(ys.iter()) {
                current = unify_depth(cx, cy, &current, depth + 1)?;
            }
            Some(current)
        }
        _ => None,
    }
}

/// Follow a variable through `bindings` to the term it ultimately resolves
/// to (or the unbound variable itself).
fn chase(term: &Term, bindings: &Bindings) -> Term {
    let mut current = term.clone();
    let mut steps = 0;
    while let Term::Var(name) = &current {
        match bindings.get(name) {
            Some(next) if steps < MAX_DEPTH => {
                current = next.clone();
                steps += 1;
            }
            _ => break,
        }
    }
    current
}

fn bind(var: Symbol, term: Term, bindings: &Bindings) -> Option<Bindings> {
    let resolved = subst(&term, bindings);
    if resolved.free_vars().contains(&var) {
        return None; // occurs-check violation
    }
    let mut next = bindings.clone();
    next.insert(var, resolved);
    Some(next)
}

/// One-way pattern match: variables bind only in `pattern`, never in
/// `term`. No occurs-check is needed because `pattern` variables can't
/// appear in `term` in a way that would create a cycle through `term`
/// alone.
pub fn match_term(pattern: &Term, term: &Term, bindings: &Bindings) -> Option<Bindings> {
    match_depth(pattern, term, bindings, 0)
}

fn match_depth(pattern: &Term, term: &Term, bindings: &Bindings, depth: usize) -> Option<Bindings> {
    if depth > MAX_DEPTH {
        return None;
    }
    match pattern {
        Term::Var(name) => match bindings.get(name) {
            Some(bound) if bound == term => Some(bindings.clone()),
            Some(_) => None,
            None => {
                let mut next = bindings.clone();
                next.insert(name.clone(), term.clone());
                Some(next)
            }
        },
        Term::Atom(a) => match term {
            Term::Atom(b) if a == b => Some(bindings.clone()),
            _ => None,
        },
        Term::List(_) => match term {
            Term::List(_) => {
                let ps = pattern.children().unwrap();
                let ts = term.children().unwrap();
                if ps.len() != ts.len() {
                    return None;
                }
                let mut current = bindings.clone();
                for (p, t) in ps.iter().zip(ts.iter()) {
                    current = match_depth(p, t, &current, depth + 1)?;
                }
                Some(current)
            }
            _ => None,
        },
    }
}

/// Fully substitute `term` under `bindings`, chasing variable chains to a
/// fixed point. Atoms are returned unchanged (cheap clone of the shared
/// symbol); lists are only rebuilt if a child actually changed.
pub fn subst(term: &Term, bindings: &Bindings) -> Term {
    subst_depth(term, bindings, 0)
}

fn subst_depth(term: &Term, bindings: &Bindings, depth: usize) -> Term {
    if depth > MAX_DEPTH {
        return term.clone();
    }
    match term {
        Term::Atom(_) => term.clone(),
        Term::Var(name) => match bindings.get(name) {
            Some(bound) => subst_depth(bound, bindings, depth + 1),
            None => term.clone(),
        },
        Term::List(_) => {
            let children = term.children().unwrap();
            let mut changed = false;
            let mut new_children = Vec::with_capacity(children.len());
            for c in children {
                let nc = subst_depth(c, bindings, depth + 1);
                if &nc != c {
                    changed = true;
                }
                new_children.push(nc);
            }
            if changed {
                Term::list(new_children)
            } else {
                term.clone()
            }
        }
    }
}

/// Try to rewrite `target` using the rule `lhs -> rhs`: match `lhs` at the
/// root first; if that fails and `target` is a list, recurse into its
/// children. Returns `Some` only if some subterm actually changed.
pub fn rewrite(target: &Term, lhs: &Term, rhs: &Term) -> Option<Term> {
    rewrite_depth(target, lhs, rhs, 0)
}

fn rewrite_depth(target: &Term, lhs: &Term, rhs: &Term, depth: usize) -> Option<Term> {
    if depth > MAX_DEPTH {
        return None;
    }
    let empty = Bindings::default();
    if let Some(bindings) = match_term(lhs, target, &empty) {
        return Some(subst(rhs, &bindings));
    }
    if let Term::List(_) = target {
        let children = target.children().unwrap();
        let mut changed = false;
        let mut new_children = Vec::with_capacity(children.len());
        for c in children {
            match rewrite_depth(c, lhs, rhs, depth + 1) {
                Some(nc) => {
                    changed = true;
                    new_children.push(nc);
                }
                None => new_children.push(c.clone()),
            }
        }
        if changed {
            return Some(Term::list(new_children));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unify_two_ground_equal_atoms() {
        let b = unify(&Term::atom("Cat"), &Term::atom("Cat"), &Bindings::default());
        assert!(b.is_some());
    }

    #[test]
    fn unify_fails_on_atom_mismatch() {
        let b = unify(&Term::atom("Cat"), &Term::atom("Dog"), &Bindings::default());
        assert!(b.is_none());
    }

    #[test]
    fn unify_binds_variable() {
        let b = unify(&Term::var("?x"), &Term::atom("Cat"), &Bindings::default()).unwrap();
        assert_eq!(subst(&Term::var("?x"), &b), Term::atom("Cat"));
    }

    #[test]
    fn unify_rejects_arity_mismatch() {
        let x = Term::list(vec![Term::atom("p"), Term::atom("a")]);
        let y = Term::list(vec![Term::atom("p"), Term::atom("a"), Term::atom("b")]);
        assert!(unify(&x, &y, &Bindings::default()).is_none());
    }

    #[test]
    fn unify_occurs_check_rejects_self_reference() {
        let x = Term::var("?x");
        let y = Term::list(vec![Term::atom("f"), Term::var("?x")]);
        assert!(unify(&x, &y, &Bindings::default()).is_none());
    }

    #[test]
    fn unify_correctness_property() {
        // For all x, y, b: if unify(x, y, b) = b', then subst(x, b') = subst(y, b').
        let x = Term::list(vec![Term::atom("p"), Term::var("?x"), Term::atom("b")]);
        let y = Term::list(vec![Term::atom("p"), Term::atom("a"), Term::var("?y")]);
        let b = unify(&x, &y, &Bindings::default()).unwrap();
        assert_eq!(subst(&x, &b), subst(&y, &b));
    }

    #[test]
    fn match_one_way_does_not_bind_term_side() {
        let pattern = Term::list(vec![Term::atom("p"), Term::var("?x")]);
        let term = Term::list(vec![Term::atom("p"), Term::var("?y")]);
        let b = match_term(&pattern, &term, &Bindings::default()).unwrap();
        assert_eq!(subst(&Term::var("?x"), &b), Term::var("?y"));
    }

    #[test]
    fn match_correctness_property() {
        // For all p, t: if match(p, t, {}) = b, then subst(p, b) = t.
        let pattern = Term::list(vec![Term::atom("p"), Term::var("?x"), Term::atom("b")]);
        let term = Term::list(vec![Term::atom("p"), Term::atom("a"), Term::atom("b")]);
        let b = match_term(&pattern, &term, &Bindings::default()).unwrap();
        assert_eq!(subst(&pattern, &b), term);
    }

    #[test]
    fn match_fails_on_symbol_mismatch() {
        let pattern = Term::list(vec![Term::atom("p"), Term::var("?x")]);
        let term = Term::list(vec![Term::atom("q"), Term::atom("a")]);
        assert!(match_term(&pattern, &term, &Bindings::default()).is_none());
    }

    #[test]
    fn subst_idempotent() {
        // For all t, b: subst(subst(t, b), b) = subst(t, b).
        let mut b = Bindings::default();
        b.insert(reasoner_term::intern_var("?x"), Term::atom("Cat"));
        let t = Term::list(vec![Term::atom("instance"), Term::var("?x"), Term::atom("Animal")]);
        let once = subst(&t, &b);
        let twice = subst(&once, &b);
        assert_eq!(once, twice);
    }

    #[test]
    fn rewrite_applies_at_root() {
        let lhs = Term::list(vec![Term::atom("mother"), Term::atom("Alice")]);
        let rhs = Term::atom("Bob");
        let target = Term::list(vec![Term::atom("mother"), Term::atom("Alice")]);
        let result = rewrite(&target, &lhs, &rhs).unwrap();
        assert_eq!(result, Term::atom("Bob"));
    }

    #[test]
    fn rewrite_applies_to_subterm() {
        let lhs = Term::list(vec![Term::atom("mother"), Term::atom("Alice")]);
        let rhs = Term::atom("Bob");
        let target = Term::list(vec![
            Term::atom("likes"),
            Term::atom("Carol"),
            Term::list(vec![Term::atom("mother"), Term::atom("Alice")]),
        ]);
        let result = rewrite(&target, &lhs, &rhs).unwrap();
        assert_eq!(
            result,
            Term::list(vec![Term::atom("likes"), Term::atom("Carol"), Term::atom("Bob")])
        );
    }

    #[test]
    fn rewrite_returns_none_when_nothing_changes() {
        let lhs = Term::atom("Nope");
        let rhs = Term::atom("Bob");
        let target = Term::list(vec![Term::atom("likes"), Term::atom("Carol"), Term::atom("Dave")]);
        assert!(rewrite(&target, &lhs, &rhs).is_none());
    }
}
