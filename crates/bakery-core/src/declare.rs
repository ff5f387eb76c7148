//! Plugin declaration parsing and targeted key rewrite.
//!
//! Declarations are ini-like text files: `[Section]` headers followed by
//! lines. Only `[Main]` is interpreted (key=value metadata); every other
//! section is carried as opaque lines for downstream consumers.
//!
//! [`set_key`] rewrites exactly one key in place, preserving the rest of the
//! file byte-for-byte (modulo line endings). It is the persistence primitive
//! behind the disable directive's `Selected=False` write.

use crate::error::{CoreError, Result};
use crate::types::{
    LINK_KEY, MAIN_SECTION, PROJECT_SCRIPT, Plugin, PluginKind, SelectedState,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Parses a plugin declaration into a [`Plugin`].
///
/// `default_level` is the nesting depth computed by the enumerator and is
/// used when the declaration carries no `Level` key. Body sections (anything
/// but `[Main]`) are collected verbatim; comment lines (`;` or `//`) and
/// blanks are dropped.
///
/// # Errors
///
/// * [`CoreError::InvalidDeclaration`] - no `[Main]` section
/// * [`CoreError::MissingLinkTarget`] - a `.link` declaration without a
///   `Link` key
pub fn parse_plugin(
    full_path: &Path,
    short_path: &str,
    kind: PluginKind,
    default_level: u32,
    text: &str,
) -> Result<Plugin> {
    let mut main: BTreeMap<String, String> = BTreeMap::new();
    let mut sections: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut current: Option<String> = None;
    let mut saw_main = false;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with("//") {
            continue;
        }
        if let Some(name) = section_header(line) {
            if name.eq_ignore_ascii_case(MAIN_SECTION) {
                saw_main = true;
                current = Some(MAIN_SECTION.to_string());
            } else {
                sections.entry(name.to_string()).or_default();
                current = Some(name.to_string());
            }
            continue;
        }
        match current.as_deref() {
            Some(MAIN_SECTION) => {
                if let Some((key, value)) = line.split_once('=') {
                    main.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
                }
            }
            Some(name) => {
                if let Some(lines) = sections.get_mut(name) {
                    lines.push(line.to_string());
                }
            }
            // Lines before the first header are ignored.
            None => {}
        }
    }

    if !saw_main {
        return Err(CoreError::InvalidDeclaration {
            path: full_path.to_path_buf(),
            reason: "missing [Main] section".to_string(),
        });
    }

    let stem = full_path
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    let title = main.get("title").cloned().unwrap_or(stem);
    let level = main
        .get("level")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default_level);
    let mandatory = main
        .get("mandatory")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    let selected = SelectedState::from_declared(main.get("selected").map(String::as_str));
    let link_target = main.get(&LINK_KEY.to_ascii_lowercase()).cloned();

    if kind == PluginKind::Link && link_target.is_none() {
        return Err(CoreError::MissingLinkTarget {
            path: full_path.to_path_buf(),
        });
    }

    let main_level = full_path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(PROJECT_SCRIPT));

    Ok(Plugin {
        full_path: full_path.to_path_buf(),
        short_path: short_path.to_string(),
        kind,
        title,
        description: main.get("description").cloned().unwrap_or_default(),
        author: main.get("author").cloned().unwrap_or_default(),
        version: main.get("version").cloned().unwrap_or_else(|| "1".to_string()),
        level,
        main_level,
        mandatory,
        selected,
        main,
        // Link content is spliced in from the target during the second load
        // stage; whatever body a .link file carries is discarded.
        sections: if kind == PluginKind::Link {
            BTreeMap::new()
        } else {
            sections
        },
        link_target,
    })
}

/// Reads one key from a section of a declaration file on disk.
///
/// Section and key matching are case-insensitive. Returns `Ok(None)` when
/// the section or key is absent.
///
/// # Errors
///
/// Returns [`CoreError::Io`] if the file cannot be read.
pub fn read_key(path: &Path, section: &str, key: &str) -> Result<Option<String>> {
    let text = fs::read_to_string(path)?;
    let mut in_section = false;
    for raw in text.lines() {
        let line = raw.trim();
        if let Some(name) = section_header(line) {
            in_section = name.eq_ignore_ascii_case(section);
            continue;
        }
        if in_section
            && let Some((k, v)) = line.split_once('=')
            && k.trim().eq_ignore_ascii_case(key)
        {
            return Ok(Some(v.trim().to_string()));
        }
    }
    Ok(None)
}

/// Rewrites exactly one key of a declaration file on disk.
///
/// Replaces the key's line if present in the section, inserts the key right
/// after the section header otherwise, and appends the whole section when it
/// does not exist yet. All other lines are preserved.
///
/// This is the write half of the disable directive: the engine persists
/// `Selected=False` to a disabled target's declaration so a later reload
/// reflects the same outcome without re-running the engine.
///
/// # Errors
///
/// Returns [`CoreError::Io`] if the file cannot be read or written back.
pub fn set_key(path: &Path, section: &str, key: &str, value: &str) -> Result<()> {
    let text = fs::read_to_string(path)?;
    let mut lines: Vec<String> = text.lines().map(String::from).collect();

    let header_at = lines
        .iter()
        .position(|l| section_header(l.trim()).is_some_and(|n| n.eq_ignore_ascii_case(section)));

    match header_at {
        Some(header) => {
            let section_end = lines
                .iter()
                .skip(header + 1)
                .position(|l| section_header(l.trim()).is_some())
                .map_or(lines.len(), |off| header + 1 + off);

            let existing = lines[header + 1..section_end].iter().position(|l| {
                l.split_once('=')
                    .is_some_and(|(k, _)| k.trim().eq_ignore_ascii_case(key))
            });

            match existing {
                Some(off) => lines[header + 1 + off] = format!("{key}={value}"),
                None => lines.insert(header + 1, format!("{key}={value}")),
            }
        }
        None => {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(format!("[{section}]"));
            lines.push(format!("{key}={value}"));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    fs::write(path, out)?;
    tracing::debug!(path = %path.display(), section, key, value, "declaration key rewritten");
    Ok(())
}

fn section_header(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}
