//! Lowering configuration.

/// Naming policy for resolved identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamingConfig {
    /// Separator the front-end places between a name and its
    /// shadow-avoidance digits (`x$1`).
    pub shadow_separator: char,
    /// Prefix of index-derived placeholder names (`g`, `g1`, `g2`, ...).
    pub placeholder_prefix: String,
    /// Append `_` to names that are reserved words in the target.
    pub escape_reserved: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        NamingConfig {
            shadow_separator: '$',
            placeholder_prefix: "g".to_string(),
            escape_reserved: true,
        }
    }
}

/// Configuration for lowering one or more units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LowerConfig {
    /// Maximum source nodes converted per unit before aborting.
    pub max_nodes: usize,
    /// Maximum consecutive nesting of one node kind before aborting.
    pub max_kind_repetitions: usize,
    pub naming: NamingConfig,
    /// Recover declarative iteration and state-threading folds. When off,
    /// every loop lowers to an opaque repetition.
    pub recover_loops: bool,
}

impl Default for LowerConfig {
    fn default() -> Self {
        LowerConfig {
            max_nodes: 1_000_000,
            max_kind_repetitions: 250_000,
            naming: NamingConfig::default(),
            recover_loops: true,
        }
    }
}

impl LowerConfig {
    /// Create config with a custom node budget.
    #[must_use]
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    #[must_use]
    pub fn with_max_kind_repetitions(mut self, max: usize) -> Self {
        self.max_kind_repetitions = max;
        self
    }

    #[must_use]
    pub fn with_naming(mut self, naming: NamingConfig) -> Self {
        self.naming = naming;
        self
    }

    /// Config that keeps every loop opaque.
    #[must_use]
    pub fn without_loop_recovery(mut self) -> Self {
        self.recover_loops = false;
        self
    }
}
