//! Global string interning for atom and variable symbols.
//!
//! Interning means two atoms with the same printed name share one
//! allocation; this makes `Term::Atom`/`Term::Var` cheap to clone (an `Arc`
//! bump) and lets downstream code use pointer-equality as a fast pre-check
//! before falling back to string comparison.

use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;

use crate::Symbol;

struct Interner {
    atoms: RwLock<FxHashMap<Box<str>, Symbol>>,
    vars: RwLock<FxHashMap<Box<str>, Symbol>>,
}

impl Interner {
    fn new() -> Self {
        Interner {
            atoms: RwLock::new(FxHashMap::default()),
            vars: RwLock::new(FxHashMap::default()),
        }
    }
}

fn interner() -> &'static Interner {
    static INSTANCE: std::sync::OnceLock<Interner> = std::sync::OnceLock::new();
    INSTANCE.get_or_init(Interner::new)
}

fn intern_in(table: &RwLock<FxHashMap<Box<str>, Symbol>>, value: &str) -> Symbol {
    if let Some(existing) = table.read().unwrap().get(value) {
        return existing.clone();
    }
    let mut guard = table.write().unwrap();
    if let Some(existing) = guard.get(value) {
        return existing.clone();
    }
    let symbol: Symbol = Arc::from(value);
    guard.insert(Box::from(value), symbol.clone());
    symbol
}

/// Intern an atom's printed name, returning the shared symbol.
pub fn intern_atom(value: &str) -> Symbol {
    intern_in(&interner().atoms, value)
}

/// Intern a variable's printed name (including the leading `?`).
pub fn intern_var(value: &str) -> Symbol {
    intern_in(&interner().vars, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_interns_to_same_allocation() {
        let a = intern_atom("Mammal");
        let b = intern_atom("Mammal");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn atoms_and_vars_are_separate_tables() {
        let a = intern_atom("?x");
        let v = intern_var("?x");
        assert_eq!(&*a, &*v);
        assert!(!Arc::ptr_eq(&a, &v));
    }
}
