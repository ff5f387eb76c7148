//! `%Name%` variable expansion for declaration values.
//!
//! Disable directives and link targets reference other plugins through
//! project-scoped variables such as `%BaseDir%`. Expansion is a plain
//! single-pass substitution: values are not re-expanded, and unknown
//! variables are left in place so the failure is visible downstream.

use std::collections::HashMap;
use std::fmt;

/// Project-scoped variable table used to expand declared paths.
///
/// Lookups are case-insensitive. Expansion never fails; an unknown
/// `%Name%` token survives verbatim in the output, which makes the
/// unresolved reference show up in the eventual path-lookup error.
///
/// # Examples
///
/// ```
/// use bakery_core::Variables;
///
/// let mut vars = Variables::new();
/// vars.set("BaseDir", "/opt/bakery");
/// assert_eq!(
///     vars.expand("%BaseDir%/Proj/net.script"),
///     "/opt/bakery/Proj/net.script"
/// );
/// assert_eq!(vars.expand("%Unknown%/x"), "%Unknown%/x");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Variables {
    map: HashMap<String, String>,
}

impl Variables {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map.insert(name.into().to_ascii_lowercase(), value.into());
    }

    /// Returns a variable's value, if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Expands every `%Name%` token in `input` in one pass.
    #[must_use]
    pub fn expand(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find('%') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('%') {
                Some(end) => {
                    let name = &after[..end];
                    match self.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            // Unknown variable: keep the token verbatim.
                            out.push('%');
                            out.push_str(name);
                            out.push('%');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    // Unpaired '%' - literal tail.
                    out.push('%');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl fmt::Display for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Variables({} entries)", self.map.len())
    }
}

/// Converts Windows-style `\` separators in a declared path to `/`.
///
/// Declarations are routinely authored on Windows; normalizing lets the
/// path index match regardless of the authoring platform.
#[must_use]
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Resolves `.` and `..` components of a declared path without touching the
/// filesystem.
///
/// Declared paths (link targets, disable directives) are matched against the
/// path index by equality, so they must be brought to the same canonical
/// spelling the enumerator produced.
#[must_use]
pub fn clean_declared_path(path: &std::path::Path) -> std::path::PathBuf {
    use std::path::Component;

    let mut out = std::path::PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_variables() {
        let mut vars = Variables::new();
        vars.set("BaseDir", "/base");
        vars.set("Arch", "x64");
        assert_eq!(
            vars.expand("%BaseDir%/apps/%Arch%/a.script"),
            "/base/apps/x64/a.script"
        );
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut vars = Variables::new();
        vars.set("BaseDir", "/base");
        assert_eq!(vars.expand("%basedir%/a"), "/base/a");
        assert_eq!(vars.get("BASEDIR"), Some("/base"));
    }

    #[test]
    fn unknown_variable_survives() {
        let vars = Variables::new();
        assert_eq!(vars.expand("%Missing%/a"), "%Missing%/a");
    }

    #[test]
    fn unpaired_percent_is_literal() {
        let vars = Variables::new();
        assert_eq!(vars.expand("100% done"), "100% done");
    }

    #[test]
    fn expansion_is_single_pass() {
        let mut vars = Variables::new();
        vars.set("A", "%B%");
        vars.set("B", "never");
        assert_eq!(vars.expand("%A%"), "%B%");
    }

    #[test]
    fn normalizes_backslashes() {
        assert_eq!(
            normalize_separators("%BaseDir%\\Proj\\a.script"),
            "%BaseDir%/Proj/a.script"
        );
    }

    #[test]
    fn clean_path_resolves_dots() {
        use std::path::{Path, PathBuf};
        assert_eq!(
            clean_declared_path(Path::new("/base/proj/sub/../other/./x.script")),
            PathBuf::from("/base/proj/other/x.script")
        );
        assert_eq!(
            clean_declared_path(Path::new("/a/b/../../c")),
            PathBuf::from("/c")
        );
    }
}
