use crate::constants::{ConstantError, ConstantStore};

/// Mutable session state shared by the interpreter and its built-ins.
///
/// The environment contains:
/// - `constants`: the user-defined constants, including the search path.
/// - `should_exit`: a flag the read-eval-print loop checks after each line.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Named constants visible to `$NAME` expansion and the executable resolver.
    pub constants: ConstantStore,
    /// When set to true, indicates that an interactive loop should exit.
    pub should_exit: bool,
}

impl Environment {
    /// Start a session whose search path is `search_path`.
    pub fn new(search_path: impl Into<String>) -> Self {
        Self {
            constants: ConstantStore::with_search_path(search_path),
            should_exit: false,
        }
    }

    /// Get the value of a constant.
    pub fn get_const(&self, key: &str) -> Option<&str> {
        self.constants.get(key)
    }

    /// Set or override a constant after validating its name.
    pub fn set_const(&mut self, key: &str, value: impl Into<String>) -> Result<(), ConstantError> {
        self.constants.set(key, value)
    }

    /// Expand `$NAME` references in `arg`.
    pub fn expand(&self, arg: &str) -> String {
        self.constants.expand(arg)
    }
}
