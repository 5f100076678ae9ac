//! Naming resolver: one final identifier per source variable.
//!
//! Several authorities compete to name a variable. Highest priority first:
//!
//! 1. An explicit override installed by the current clause (pattern arms,
//!    state-threading step functions).
//! 2. A prior resolution of the same variable id.
//! 3. A prior resolution of the same declared name.
//! 4. The declared name with its shadow-avoidance suffix stripped.
//! 5. The case-converted declared name.
//!
//! Every resolution is memoized under both the id and the declared name in
//! the innermost scope, so later lookups are stable. Resolution never fails.
//!
//! Scopes follow the target's binding structure (function bodies, case
//! clauses, fold step functions), not source blocks.

pub mod case;

use rustc_hash::FxHashMap;

use ember_ir::VarId;

use crate::config::NamingConfig;

/// Which rule produced a name. Reported for tracing and tests.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NameRule {
    Override,
    ById,
    ByName,
    ShadowStripped,
    Converted,
}

/// Who holds a final name inside one scope.
#[derive(Clone, Debug)]
struct Holder {
    /// `None` for placeholders that belong to no variable.
    id: Option<VarId>,
    declared: String,
}

#[derive(Debug, Default)]
struct Scope {
    by_id: FxHashMap<VarId, String>,
    by_name: FxHashMap<String, String>,
    held: FxHashMap<String, Holder>,
}

/// Scoped variable-binding table.
#[derive(Debug)]
pub struct Resolver {
    config: NamingConfig,
    scopes: Vec<Scope>,
}

impl Resolver {
    pub fn new(config: NamingConfig) -> Self {
        Resolver {
            config,
            scopes: vec![Scope::default()],
        }
    }

    pub fn config(&self) -> &NamingConfig {
        &self.config
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost scope. The unit scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Resolve a variable to its final name.
    pub fn resolve(&mut self, id: VarId, declared: &str, override_name: Option<&str>) -> String {
        self.resolve_with_rule(id, declared, override_name).0
    }

    /// Resolve and report which rule decided.
    pub fn resolve_with_rule(
        &mut self,
        id: VarId,
        declared: &str,
        override_name: Option<&str>,
    ) -> (String, NameRule) {
        let (name, rule) = if let Some(name) = override_name {
            (name.to_string(), NameRule::Override)
        } else if let Some(name) = self.lookup(id) {
            (name.to_string(), NameRule::ById)
        } else if let Some(name) = self.lookup_name(declared) {
            (name.to_string(), NameRule::ByName)
        } else if let Some(name) = self.strip_shadow(id, declared) {
            (name, NameRule::ShadowStripped)
        } else {
            (self.fresh(id, declared), NameRule::Converted)
        };
        self.memoize(id, declared, &name);
        (name, rule)
    }

    /// Name previously resolved for `id`, searching outward.
    pub fn lookup(&self, id: VarId) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.by_id.get(&id))
            .map(String::as_str)
    }

    /// Check if `id` has been resolved in any enclosing scope.
    pub fn is_bound(&self, id: VarId) -> bool {
        self.lookup(id).is_some()
    }

    /// Check if some variable declared as `declared` has been resolved.
    pub fn is_name_bound(&self, declared: &str) -> bool {
        self.lookup_name(declared).is_some()
    }

    /// Whether `name` is taken in any enclosing scope, by a variable or a
    /// reservation.
    pub fn is_held(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.held.contains_key(name))
    }

    /// Innermost holder of `name`: the variable, or `None` for a reservation.
    pub fn holder(&self, name: &str) -> Option<Option<VarId>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.held.get(name))
            .map(|h| h.id)
    }

    fn lookup_name(&self, declared: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.by_name.get(declared))
            .map(String::as_str)
    }

    fn memoize(&mut self, id: VarId, declared: &str, name: &str) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        scope.by_id.insert(id, name.to_string());
        scope.by_name.insert(declared.to_string(), name.to_string());
        scope.held.insert(
            name.to_string(),
            Holder {
                id: Some(id),
                declared: declared.to_string(),
            },
        );
    }

    /// Whether `name` is held in an enclosing scope by something other than
    /// `id` declared as `declared`.
    fn conflicts(&self, name: &str, id: Option<VarId>, declared: &str) -> bool {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.held.get(name))
            .is_some_and(|h| h.declared != declared && (h.id.is_none() || h.id != id))
    }

    fn strip_shadow(&self, id: VarId, declared: &str) -> Option<String> {
        let (base, digits) = case::split_shadow_suffix(declared, self.config.shadow_separator)?;
        let stripped = case::convert_name(base, self.config.escape_reserved);
        if self.conflicts(&stripped, Some(id), declared) {
            let kept = format!("{}_{digits}", stripped.trim_end_matches('_'));
            return Some(self.disambiguate(kept, Some(id), declared));
        }
        Some(stripped)
    }

    fn fresh(&self, id: VarId, declared: &str) -> String {
        let converted = case::convert_name(declared, self.config.escape_reserved);
        self.disambiguate(converted, Some(id), declared)
    }

    fn disambiguate(&self, base: String, id: Option<VarId>, declared: &str) -> String {
        if base == "_" || !self.conflicts(&base, id, declared) {
            return base;
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.conflicts(&candidate, id, declared) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Deterministic placeholder for parameter `index`: `g`, `g1`, `g2`, ...
    pub fn placeholder_text(&self, index: u32) -> String {
        let prefix = &self.config.placeholder_prefix;
        if index == 0 {
            prefix.clone()
        } else {
            format!("{prefix}{index}")
        }
    }

    /// Reserve a placeholder (or any variable-less name) in the innermost
    /// scope so later user variables do not collide with it.
    pub fn reserve(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.held.entry(name.to_string()).or_insert(Holder {
                id: None,
                declared: String::new(),
            });
        }
    }

    /// Case-converted form of a declared name without registering anything.
    pub fn display(&self, declared: &str) -> String {
        match case::split_shadow_suffix(declared, self.config.shadow_separator) {
            Some((base, _)) => case::convert_name(base, self.config.escape_reserved),
            None => case::convert_name(declared, self.config.escape_reserved),
        }
    }
}
