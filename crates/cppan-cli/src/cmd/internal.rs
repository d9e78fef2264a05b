//! Internal commands, addressed by a bare first operand.
//!
//! Each entry fixes its argument count. The orchestrator checks the count
//! against the table before any handler runs.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use cppan_core::autotools::parse_configure_ac;
use cppan_core::builder::VarsCheck;
use cppan_core::imports::fix_imports;

use crate::Orchestrator;
use crate::cmd::list;

type Handler = fn(&Orchestrator<'_>, &[String]) -> Result<i32>;

/// One row of the command table.
pub struct InternalCommand {
    pub name: &'static str,
    /// Required arguments, by name.
    pub args: &'static [&'static str],
    /// Trailing arguments that may be omitted.
    pub optional: &'static [&'static str],
    handler: Handler,
}

impl fmt::Debug for InternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalCommand")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

impl PartialEq for InternalCommand {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl InternalCommand {
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.args.len() && count <= self.args.len() + self.optional.len()
    }

    pub fn usage(&self) -> String {
        let mut usage = format!("usage: cppan {}", self.name);
        for arg in self.args {
            usage.push(' ');
            usage.push_str(arg);
        }
        for arg in self.optional {
            usage.push_str(" [");
            usage.push_str(arg);
            usage.push(']');
        }
        usage
    }

    pub fn run(&self, orchestrator: &Orchestrator<'_>, args: &[String]) -> Result<i32> {
        (self.handler)(orchestrator, args)
    }
}

pub static COMMANDS: &[InternalCommand] = &[
    InternalCommand {
        name: "internal-fix-imports",
        args: &["target", "aliases.file", "old.file", "new.file"],
        optional: &[],
        handler: run_fix_imports,
    },
    InternalCommand {
        name: "internal-parallel-vars-check",
        args: &["vars_dir", "vars_file", "checks_file", "generator"],
        optional: &["toolchain"],
        handler: run_vars_check,
    },
    InternalCommand {
        name: "parse-configure-ac",
        args: &["configure.ac"],
        optional: &[],
        handler: run_parse_configure_ac,
    },
    InternalCommand {
        name: "list",
        args: &[],
        optional: &["filter"],
        handler: run_list,
    },
];

pub fn find(name: &str) -> Option<&'static InternalCommand> {
    COMMANDS.iter().find(|c| c.name == name)
}

fn run_fix_imports(_: &Orchestrator<'_>, args: &[String]) -> Result<i32> {
    fix_imports(
        &args[0],
        Path::new(&args[1]),
        Path::new(&args[2]),
        Path::new(&args[3]),
    )?;
    Ok(0)
}

fn run_vars_check(orchestrator: &Orchestrator<'_>, args: &[String]) -> Result<i32> {
    let check = VarsCheck {
        vars_dir: PathBuf::from(&args[0]),
        vars_file: PathBuf::from(&args[1]),
        checks_file: PathBuf::from(&args[2]),
        generator: args[3].clone(),
        toolchain: args.get(4).map(PathBuf::from),
    };
    orchestrator.backend().driver().vars_check(&check)
}

fn run_parse_configure_ac(_: &Orchestrator<'_>, args: &[String]) -> Result<i32> {
    let checks = parse_configure_ac(Path::new(&args[0]))?;
    print!("{}", checks.to_toml()?);
    Ok(0)
}

fn run_list(orchestrator: &Orchestrator<'_>, args: &[String]) -> Result<i32> {
    list::list(orchestrator.context(), args.first().map(String::as_str))?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_arity() {
        let fix = find("internal-fix-imports").unwrap();
        assert!(!fix.accepts(3));
        assert!(fix.accepts(4));
        assert!(!fix.accepts(5));
    }

    #[test]
    fn test_optional_arity() {
        let vars = find("internal-parallel-vars-check").unwrap();
        assert!(!vars.accepts(3));
        assert!(vars.accepts(4));
        assert!(vars.accepts(5));
        assert!(!vars.accepts(6));

        let list = find("list").unwrap();
        assert!(list.accepts(0));
        assert!(list.accepts(1));
        assert!(!list.accepts(2));
    }

    #[test]
    fn test_usage_names_command_and_arguments() {
        assert_eq!(
            find("internal-fix-imports").unwrap().usage(),
            "usage: cppan internal-fix-imports target aliases.file old.file new.file"
        );
        assert_eq!(
            find("internal-parallel-vars-check").unwrap().usage(),
            "usage: cppan internal-parallel-vars-check vars_dir vars_file checks_file generator [toolchain]"
        );
    }

    #[test]
    fn test_unknown_names() {
        assert!(find("build").is_none());
        assert!(find("").is_none());
    }
}
