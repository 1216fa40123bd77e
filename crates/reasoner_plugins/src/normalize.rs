//! Turns a freshly parsed KIF term into a [`PotentialAssertion`]: strips
//! `forall`/`exists` quantifiers (skolemizing the latter), simplifies the
//! body, and classifies it as an equality or a negation.

use reasoner_context::Context;
use reasoner_kb::{AssertionKind, PotentialAssertion};
use reasoner_term::{Symbol, Term};
use reasoner_unify::{subst, Bindings};

fn variables_of(binder: &Term) -> Vec<Symbol> {
    match binder {
        Term::Var(s) => vec![s.clone()],
        Term::List(_) => binder
            .children()
            .unwrap()
            .iter()
            .filter_map(|t| match t {
                Term::Var(s) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        Term::Atom(_) => Vec::new(),
    }
}

/// Baseline priority assigned to input (not derived) assertions before
/// discounting by size. Kept distinct from any future LLM-ingestion base
/// (which would run higher, reflecting a collaborator's own confidence
/// signal) since every assertion this plugin normalizes today comes from
/// a file or a direct feed, never from an external collaborator.
pub const BASE_PRIORITY: f64 = 10.0;

/// Heavier terms start out less certain: priority falls off as `weight`
/// grows, so a long conjunction doesn't outrank a short, specific fact.
fn priority_for(term: &Term) -> f64 {
    BASE_PRIORITY / (1.0 + term.weight() as f64)
}

/// Classifies a simplified term as `(is_equality, is_oriented_equality,
/// is_negated)`. An equality is oriented left-to-right exactly when its
/// left side is heavier than its right, so rewriting always replaces a
/// larger subterm with a smaller one and can't loop on itself.
pub fn classify(term: &Term) -> (bool, bool, bool) {
    let is_negated = term.operator() == Some("not");
    let is_equality = matches!(term.operator(), Some("=") | Some("equal"));
    let is_oriented_equality = is_equality
        && term
            .children()
            .map(|c| c.len() == 3 && c[1].weight() > c[2].weight())
            .unwrap_or(false);
    (is_equality, is_oriented_equality, is_negated)
}

/// `Some((antecedent, consequent))` if `term` is a well-formed top-level
/// `(=> antecedent consequent)` or `(<=> antecedent consequent)` form.
pub fn rule_parts(term: &Term) -> Option<(Term, Term)> {
    match term.operator() {
        Some("=>") | Some("<=>") => {
            let children = term.children()?;
            (children.len() == 3).then(|| (children[1].clone(), children[2].clone()))
        }
        _ => None,
    }
}

pub fn is_biconditional(term: &Term) -> bool {
    term.operator() == Some("<=>")
}

/// Normalizes a non-rule term into a [`PotentialAssertion`]. Rule forms
/// (`=>`/`<=>`, bare or `forall`-wrapped) are handled upstream by the
/// caller and never reach here. Returns `None` (after logging a warning)
/// for a ground form that still contains a free variable once
/// simplified — such a term carries no assertable fact.
pub fn normalize(term: &Term, ctx: &Context, source_note: Option<String>) -> Option<PotentialAssertion> {
    if let Some("forall") = term.operator() {
        let children = term.children().unwrap();
        if children.len() == 3 {
            let vars = variables_of(&children[1]);
            let body = reasoner_context::simplify(&children[2]);
            return Some(PotentialAssertion {
                priority: priority_for(&body),
                kif: body,
                source_note,
                support: Vec::new(),
                kind: AssertionKind::Universal,
                is_equality: false,
                is_oriented_equality: false,
                is_negated: false,
                quantified_vars: vars,
                depth: 0,
            });
        }
    }
    if let Some("exists") = term.operator() {
        let children = term.children().unwrap();
        if children.len() == 3 {
            let vars = variables_of(&children[1]);
            let mut body = children[2].clone();
            for var in &vars {
                let skolem = ctx.skolemize_constant();
                let mut bindings = Bindings::default();
                bindings.insert(var.clone(), skolem);
                body = subst(&body, &bindings);
            }
            let body = reasoner_context::simplify(&body);
            return Some(PotentialAssertion {
                priority: priority_for(&body),
                kif: body,
                source_note,
                support: Vec::new(),
                kind: AssertionKind::Skolemized,
                is_equality: false,
                is_oriented_equality: false,
                is_negated: false,
                quantified_vars: Vec::new(),
                depth: 0,
            });
        }
    }
    let simplified = reasoner_context::simplify(term);
    if simplified.contains_variable() {
        log::warn!("rejecting ground input with a free variable: {simplified}");
        return None;
    }
    let (is_equality, is_oriented_equality, is_negated) = classify(&simplified);
    Some(PotentialAssertion {
        priority: priority_for(&simplified),
        kif: simplified,
        source_note,
        support: Vec::new(),
        kind: AssertionKind::Ground,
        is_equality,
        is_oriented_equality,
        is_negated,
        quantified_vars: Vec::new(),
        depth: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forall_becomes_universal_assertion() {
        let ctx = Context::new(100);
        let term = Term::list(vec![
            Term::atom("forall"),
            Term::var("?x"),
            Term::list(vec![Term::atom("subclass"), Term::var("?x"), Term::atom("Mammal")]),
        ]);
        let candidate = normalize(&term, &ctx, None).unwrap();
        assert_eq!(candidate.kind, AssertionKind::Universal);
        assert_eq!(candidate.quantified_vars.len(), 1);
    }

    #[test]
    fn exists_skolemizes_to_a_ground_fact() {
        let ctx = Context::new(100);
        let term = Term::list(vec![
            Term::atom("exists"),
            Term::var("?x"),
            Term::list(vec![Term::atom("instance"), Term::var("?x"), Term::atom("Cat")]),
        ]);
        let candidate = normalize(&term, &ctx, None).unwrap();
        assert_eq!(candidate.kind, AssertionKind::Skolemized);
        assert!(candidate.kif.is_ground());
    }

    #[test]
    fn plain_equality_is_marked_as_such_when_oriented() {
        let ctx = Context::new(100);
        let term = Term::list(vec![
            Term::atom("="),
            Term::list(vec![Term::atom("mother"), Term::atom("Alice")]),
            Term::atom("Bob"),
        ]);
        let candidate = normalize(&term, &ctx, None).unwrap();
        assert!(candidate.is_equality);
        assert!(candidate.is_oriented_equality);
    }

    #[test]
    fn equal_weight_sides_are_not_treated_as_oriented() {
        let ctx = Context::new(100);
        let term = Term::list(vec![Term::atom("="), Term::atom("Morningstar"), Term::atom("Eveningstar")]);
        let candidate = normalize(&term, &ctx, None).unwrap();
        assert!(candidate.is_equality);
        assert!(!candidate.is_oriented_equality);
    }

    #[test]
    fn ground_form_with_a_free_variable_is_rejected() {
        let ctx = Context::new(100);
        let term = Term::list(vec![Term::atom("instance"), Term::var("?x"), Term::atom("Cat")]);
        assert!(normalize(&term, &ctx, None).is_none());
    }

    #[test]
    fn priority_falls_off_with_term_weight() {
        let ctx = Context::new(100);
        let light = Term::list(vec![Term::atom("p"), Term::atom("a")]);
        let heavy = Term::list(vec![
            Term::atom("p"),
            Term::list(vec![Term::atom("q"), Term::atom("a"), Term::atom("b")]),
        ]);
        let light = normalize(&light, &ctx, None).unwrap();
        let heavy = normalize(&heavy, &ctx, None).unwrap();
        assert!(heavy.priority < light.priority);
    }
}
