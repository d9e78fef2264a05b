//! `parse-configure-ac`: pull feature checks out of an autoconf script.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

const CHECK_PATTERN: &str = r"AC_CHECK_(HEADERS?|FUNCS?|TYPES?|DECLS?|LIB)\s*\(\s*(?:\[([^\]]*)\]|([^,)\[]*))(?:\s*,\s*(?:\[([^\]]*)\]|([^,)\[]*)))?";

/// Checks requested by a `configure.ac`, sorted and de-duplicated.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigureChecks {
    pub headers: BTreeSet<String>,
    pub functions: BTreeSet<String>,
    pub types: BTreeSet<String>,
    pub declarations: BTreeSet<String>,
    /// Library name to the functions probed in it.
    pub libraries: BTreeMap<String, BTreeSet<String>>,
}

impl ConfigureChecks {
    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

/// Read and parse a `configure.ac` file.
pub fn parse_configure_ac(path: &Path) -> Result<ConfigureChecks> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_checks(&text)
}

/// Parse autoconf text. `dnl` and `#` comment lines are ignored.
pub fn parse_checks(text: &str) -> Result<ConfigureChecks> {
    let check = Regex::new(CHECK_PATTERN)?;
    let body: String = text
        .lines()
        .filter(|line| {
            let line = line.trim_start();
            !line.starts_with("dnl") && !line.starts_with('#')
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut checks = ConfigureChecks::default();
    for caps in check.captures_iter(&body) {
        let first = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        let second = caps.get(4).or_else(|| caps.get(5)).map_or("", |m| m.as_str());

        match &caps[1] {
            "HEADER" | "HEADERS" => checks.headers.extend(words(first)),
            "FUNC" | "FUNCS" => checks.functions.extend(words(first)),
            "TYPE" | "TYPES" => checks.types.extend(items(first)),
            "DECL" | "DECLS" => checks.declarations.extend(items(first)),
            _ => {
                let lib = first.trim();
                if !lib.is_empty() {
                    checks
                        .libraries
                        .entry(lib.to_string())
                        .or_default()
                        .extend(words(second));
                }
            }
        }
    }
    Ok(checks)
}

fn words(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split_whitespace().map(str::to_string)
}

fn items(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
