//! The shell-wide environment model and mutable shell state.
//!
//! The environment is an insertion-ordered collection of unique `NAME=VALUE`
//! bindings. Order matters because the `env` and `export` builtins report
//! bindings in the order they were created, which is observable behavior.
//! A binding may exist without a value (`export NAME` with no `=`); such
//! bindings appear in `export` listings but not in `env` output and expand
//! to the empty string.

use std::env as stdenv;
use std::ffi::CString;
use std::io::IsTerminal;
use std::path::PathBuf;

/// One environment binding. `value` is `None` for names exported without a
/// value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub value: Option<String>,
}

/// Insertion-ordered map of environment bindings with unique names.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: Vec<Binding>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current process environment, preserving its order.
    pub fn from_process() -> Self {
        let mut env = Self::new();
        for (name, value) in stdenv::vars() {
            env.set(&name, &value);
        }
        env
    }

    /// Look up the value bound to `name`. A value-less binding reads as
    /// absent, which makes it expand to the empty string like an unset name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|b| b.name == name)
            .and_then(|b| b.value.as_deref())
    }

    /// True when `name` is bound at all, valued or not.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.iter().any(|b| b.name == name)
    }

    /// Bind `name` to `value`, updating an existing binding in place so its
    /// position in the listing is preserved.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.vars.iter_mut().find(|b| b.name == name) {
            Some(binding) => binding.value = Some(value.to_string()),
            None => self.vars.push(Binding {
                name: name.to_string(),
                value: Some(value.to_string()),
            }),
        }
    }

    /// Make sure `name` is bound; creates a value-less binding when absent
    /// and leaves an existing binding untouched.
    pub fn ensure(&mut self, name: &str) {
        if !self.contains(name) {
            self.vars.push(Binding {
                name: name.to_string(),
                value: None,
            });
        }
    }

    /// Remove the binding for `name`. Absent names are ignored.
    pub fn unset(&mut self, name: &str) {
        self.vars.retain(|b| b.name != name);
    }

    /// Iterate bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.vars.iter()
    }

    /// Materialize the `NAME=VALUE` array handed to `execve`. Only valued
    /// bindings are serialized. Bindings that cannot be represented as a
    /// C string (embedded NUL) are skipped.
    pub fn to_exec_array(&self) -> Vec<CString> {
        self.vars
            .iter()
            .filter_map(|b| {
                let value = b.value.as_deref()?;
                CString::new(format!("{}={}", b.name, value)).ok()
            })
            .collect()
    }
}

/// Check a candidate variable name against `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Mutable state owned by the shell for its whole lifetime: the environment,
/// the last exit status, the tracked working directory, and whether standard
/// input is a terminal. `pending_exit` is set by the `exit` builtin so the
/// driver loop can terminate after the current line finishes.
#[derive(Debug)]
pub struct ShellState {
    pub env: Environment,
    pub last_status: i32,
    pub cwd: PathBuf,
    pub interactive: bool,
    pub pending_exit: Option<i32>,
}

impl ShellState {
    /// Build the startup state: ingest the process environment, seed `PWD`
    /// from the working directory when unset, and bump `SHLVL` when it holds
    /// a number.
    pub fn new() -> Self {
        let mut env = Environment::from_process();
        let cwd = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        if env.get("PWD").is_none() {
            env.set("PWD", &cwd.to_string_lossy());
        }
        if let Some(level) = env.get("SHLVL") {
            if let Ok(n) = level.parse::<i64>() {
                env.set("SHLVL", &(n + 1).to_string());
            }
        }
        Self {
            env,
            last_status: 0,
            cwd,
            interactive: std::io::stdin().is_terminal(),
            pending_exit: None,
        }
    }

    /// State over a caller-provided environment. Used by tests to stay
    /// independent of the process environment.
    pub fn with_env(env: Environment) -> Self {
        let cwd = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            env,
            last_status: 0,
            cwd,
            interactive: false,
            pending_exit: None,
        }
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut env = Environment::new();
        assert_eq!(env.get("SOME_RANDOM_VAR_12345"), None);

        env.set("KEY", "VALUE");
        assert_eq!(env.get("KEY"), Some("VALUE"));

        env.set("KEY", "OTHER");
        assert_eq!(env.get("KEY"), Some("OTHER"));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut env = Environment::new();
        env.set("B", "1");
        env.set("A", "2");
        env.set("C", "3");
        env.set("A", "updated");

        let names: Vec<&str> = env.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["B", "A", "C"]);
        assert_eq!(env.get("A"), Some("updated"));
    }

    #[test]
    fn test_unset_then_set_appends_at_end() {
        let mut env = Environment::new();
        env.set("X", "1");
        env.set("Y", "2");
        env.unset("X");
        env.set("X", "1");

        let names: Vec<&str> = env.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Y", "X"]);
    }

    #[test]
    fn test_unset_absent_is_silent() {
        let mut env = Environment::new();
        env.set("X", "1");
        env.unset("NOT_THERE");
        assert_eq!(env.get("X"), Some("1"));
    }

    #[test]
    fn test_valueless_binding_reads_as_unset() {
        let mut env = Environment::new();
        env.ensure("MARKED");
        assert!(env.contains("MARKED"));
        assert_eq!(env.get("MARKED"), None);

        // ensure never clobbers an existing value
        env.set("MARKED", "v");
        env.ensure("MARKED");
        assert_eq!(env.get("MARKED"), Some("v"));
    }

    #[test]
    fn test_exec_array_skips_valueless() {
        let mut env = Environment::new();
        env.set("A", "1");
        env.ensure("B");
        env.set("C", "x y");

        let serialized: Vec<String> = env
            .to_exec_array()
            .iter()
            .map(|c| c.to_string_lossy().into_owned())
            .collect();
        assert_eq!(serialized, ["A=1", "C=x y"]);
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("PATH"));
        assert!(is_valid_name("_private"));
        assert!(is_valid_name("a1_b2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name("with-dash"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("x="));
    }

    #[test]
    fn test_state_reads_process_env() {
        let state = ShellState::new();
        assert!(state.env.get("PATH").is_some());
        assert!(state.env.get("PWD").is_some());
        assert_eq!(state.last_status, 0);
    }
}
