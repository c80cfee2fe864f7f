use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Key under which the executable search path is stored.
pub const PATH_KEY: &str = "PATH";

/// Search path the store is seeded with when the caller doesn't provide one.
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").expect("key pattern is valid"));
static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z0-9]+)").expect("reference pattern is valid"));

/// Errors reported by [`ConstantStore`] mutations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConstantError {
    /// The key doesn't start with a letter or contains a non-alphanumeric character.
    #[error("invalid constant name '{0}'")]
    InvalidKey(String),
}

/// Store of user-defined named constants.
///
/// Keys start with an ASCII letter followed by ASCII letters or digits.
/// Assigning to an existing key replaces its value. Constants are never removed
/// implicitly; the store lives as long as the interpreter session owning it.
#[derive(Debug, Clone)]
pub struct ConstantStore {
    values: HashMap<String, String>,
}

impl ConstantStore {
    /// Create a store seeded with [`PATH_KEY`] set to `search_path`.
    pub fn with_search_path(search_path: impl Into<String>) -> Self {
        let mut values = HashMap::new();
        values.insert(PATH_KEY.to_string(), search_path.into());
        Self { values }
    }

    /// Returns true when `key` is usable as a constant name.
    pub fn is_valid_key(key: &str) -> bool {
        KEY_RE.is_match(key)
    }

    /// Look up a constant.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Define or overwrite a constant. An invalid key leaves the store untouched.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), ConstantError> {
        if !Self::is_valid_key(key) {
            return Err(ConstantError::InvalidKey(key.to_string()));
        }
        self.values.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Current value of the search path, empty when it was never defined.
    pub fn search_path(&self) -> &str {
        self.get(PATH_KEY).unwrap_or_default()
    }

    /// Replace every `$KEY` reference in `arg` with the constant's value.
    ///
    /// The key is the longest run of ASCII alphanumerics after `$`. Undefined
    /// constants expand to nothing. Substituted text is not scanned again, and a
    /// `$` not followed by an alphanumeric is kept as is.
    pub fn expand(&self, arg: &str) -> String {
        REFERENCE_RE
            .replace_all(arg, |caps: &Captures<'_>| self.get(&caps[1]).unwrap_or_default().to_string())
            .into_owned()
    }
}

impl Default for ConstantStore {
    fn default() -> Self {
        Self::with_search_path(DEFAULT_PATH)
    }
}
