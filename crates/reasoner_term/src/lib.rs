//! Immutable symbolic term algebra: atoms, variables, and lists.
//!
//! Terms never mutate after construction. Atoms and variables are interned
//! by printed value (see [`intern`]) so equal symbols share one allocation.
//! Lists are not interned, but each list caches its derived properties
//! (free variables, weight, containment flags, structural hash) the first
//! time they're asked for, via [`std::sync::OnceLock`] — "publish once"
//! memoization, never recomputed, never invalidated because terms are
//! immutable.

mod intern;

pub use intern::{intern_atom, intern_var};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use rustc_hash::{FxHashSet, FxHasher};

/// An interned symbol: an atom's or variable's printed name.
pub type Symbol = Arc<str>;

/// Prefix identifying a Skolem constant, e.g. `skc_x_12`.
pub const SKOLEM_CONSTANT_PREFIX: &str = "skc_";
/// Prefix identifying a Skolem function symbol, e.g. `skf_x_12`.
pub const SKOLEM_FUNCTION_PREFIX: &str = "skf_";

/// Derived, cached properties of a list term.
struct Derived {
    vars: Arc<FxHashSet<Symbol>>,
    weight: u64,
    hash: u64,
    contains_var: bool,
    contains_skolem: bool,
}

struct ListData {
    children: Vec<Term>,
    cache: OnceLock<Derived>,
}

impl fmt::Debug for ListData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.children.iter()).finish()
    }
}

/// A symbolic term: an atom, a variable, or an ordered list of terms.
///
/// Structural equality is by value: two atoms are equal iff their printed
/// names match; two lists are equal iff their children are, in order.
#[derive(Clone, Debug)]
pub enum Term {
    /// A constant symbol, e.g. `Cat`.
    Atom(Symbol),
    /// A free variable, e.g. `?x`. Name includes the leading `?`.
    Var(Symbol),
    /// An ordered sequence of terms, e.g. `(subclass Cat Mammal)`.
    List(Arc<ListData>),
}

impl Term {
    /// Construct an atom term, interning its name.
    pub fn atom(value: &str) -> Term {
        Term::Atom(intern_atom(value))
    }

    /// Construct a variable term. Panics if `name` doesn't start with `?`
    /// or has fewer than 2 characters — callers (the parser) are expected
    /// to validate this themselves and report a proper parse error instead.
    pub fn var(name: &str) -> Term {
        debug_assert!(
            name.starts_with('?') && name.chars().count() >= 2,
            "invalid variable name: {name:?}"
        );
        Term::Var(intern_var(name))
    }

    /// Construct a list term from already-built children.
    pub fn list(children: Vec<Term>) -> Term {
        Term::List(Arc::new(ListData {
            children,
            cache: OnceLock::new(),
        }))
    }

    /// True if this term is an atom.
    pub fn is_atom(&self) -> bool {
        matches!(self, Term::Atom(_))
    }

    /// True if this term is a variable.
    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    /// True if this term is a list.
    pub fn is_list(&self) -> bool {
        matches!(self, Term::List(_))
    }

    /// The children of a list term, or `None` for atoms/variables.
    pub fn children(&self) -> Option<&[Term]> {
        match self {
            Term::List(data) => Some(&data.children),
            _ => None,
        }
    }

    /// The printed name of an atom or variable, or `None` for lists.
    pub fn name(&self) -> Option<&str> {
        match self {
            Term::Atom(s) | Term::Var(s) => Some(s),
            Term::List(_) => None,
        }
    }

    /// The operator of a list: its first element's atom name, if the first
    /// element is an atom. `None` for non-lists or lists whose head isn't
    /// a bare atom.
    pub fn operator(&self) -> Option<&str> {
        match self {
            Term::List(data) => match data.children.first() {
                Some(Term::Atom(s)) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    fn derived(&self) -> Option<&Derived> {
        match self {
            Term::List(data) => Some(data.cache.get_or_init(|| compute_derived(&data.children))),
            _ => None,
        }
    }

    /// The weight of this term: 1 for atoms/variables, `1 + sum(child
    /// weights)` for lists.
    pub fn weight(&self) -> u64 {
        match self {
            Term::Atom(_) | Term::Var(_) => 1,
            Term::List(_) => self.derived().unwrap().weight,
        }
    }

    /// The set of free variables occurring anywhere in this term.
    pub fn free_vars(&self) -> Arc<FxHashSet<Symbol>> {
        match self {
            Term::Atom(_) => Arc::new(FxHashSet::default()),
            Term::Var(s) => {
                let mut set = FxHashSet::default();
                set.insert(s.clone());
                Arc::new(set)
            }
            Term::List(_) => self.derived().unwrap().vars.clone(),
        }
    }

    /// True if this term contains a variable anywhere (including being one
    /// itself).
    pub fn contains_variable(&self) -> bool {
        match self {
            Term::Atom(_) => false,
            Term::Var(_) => true,
            Term::List(_) => self.derived().unwrap().contains_var,
        }
    }

    /// True if this term is ground: contains no free variables.
    pub fn is_ground(&self) -> bool {
        !self.contains_variable()
    }

    /// True if this term contains a Skolem constant or function symbol
    /// anywhere, per the prefix convention in [`SKOLEM_CONSTANT_PREFIX`] /
    /// [`SKOLEM_FUNCTION_PREFIX`].
    pub fn contains_skolem(&self) -> bool {
        match self {
            Term::Atom(s) => s.starts_with(SKOLEM_CONSTANT_PREFIX),
            Term::Var(_) => false,
            Term::List(_) => self.derived().unwrap().contains_skolem,
        }
    }

    fn structural_hash(&self) -> u64 {
        match self {
            Term::Atom(s) => {
                let mut h = FxHasher::default();
                0u8.hash(&mut h);
                s.hash(&mut h);
                h.finish()
            }
            Term::Var(s) => {
                let mut h = FxHasher::default();
                1u8.hash(&mut h);
                s.hash(&mut h);
                h.finish()
            }
            Term::List(_) => self.derived().unwrap().hash,
        }
    }

    /// Print this term using KIF surface syntax: atoms are quoted when they
    /// contain whitespace, parens, quotes, `?`, or `;`; lists are
    /// parenthesized and space-separated.
    pub fn print(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Term::Atom(s) => write_atom(s, out),
            Term::Var(s) => out.push_str(s),
            Term::List(data) => {
                out.push('(');
                for (i, child) in data.children.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    child.write_to(out);
                }
                out.push(')');
            }
        }
    }
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == '?' || c == ';')
}

fn write_atom(value: &str, out: &mut String) {
    if needs_quoting(value) {
        out.push('"');
        for c in value.chars() {
            match c {
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                '\r' => out.push_str("\\r"),
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                other => out.push(other),
            }
        }
        out.push('"');
    } else {
        out.push_str(value);
    }
}

fn compute_derived(children: &[Term]) -> Derived {
    let mut vars: FxHashSet<Symbol> = FxHashSet::default();
    let mut weight: u64 = 1;
    let mut contains_var = false;
    let mut contains_skolem = false;
    let mut hasher = FxHasher::default();
    2u8.hash(&mut hasher);
    children.len().hash(&mut hasher);

    if let Some(Term::Atom(op)) = children.first() {
        if op.starts_with(crate::SKOLEM_FUNCTION_PREFIX) {
            contains_skolem = true;
        }
    }

    for child in children {
        weight += child.weight();
        contains_var |= child.contains_variable();
        contains_skolem |= child.contains_skolem();
        for v in child.free_vars().iter() {
            vars.insert(v.clone());
        }
        child.structural_hash().hash(&mut hasher);
    }

    Derived {
        vars: Arc::new(vars),
        weight,
        hash: hasher.finish(),
        contains_var,
        contains_skolem,
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Term::Atom(a), Term::Atom(b)) => a == b,
            (Term::Var(a), Term::Var(b)) => a == b,
            (Term::List(a), Term::List(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                a.children == b.children
            }
            _ => false,
        }
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.structural_hash());
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.print())
    }
}
