//! Build orchestration
//!
//! Drives the native build system (`cmake`) for a source directory. Every
//! target is configured into `<source>/.cppan/build`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

/// Arguments of `internal-parallel-vars-check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarsCheck {
    pub vars_dir: PathBuf,
    pub vars_file: PathBuf,
    pub checks_file: PathBuf,
    pub generator: String,
    pub toolchain: Option<PathBuf>,
}

/// Native build-system operations. Each returns the exit status of the
/// underlying tool.
pub trait BuildDriver {
    /// Configure and build `target`.
    fn build(&self, target: &Path, config: Option<&str>) -> Result<i32>;

    /// Build an already configured `target`.
    fn build_only(&self, target: &Path, config: Option<&str>) -> Result<i32>;

    /// Wipe the build directory, then configure and build.
    fn rebuild(&self, target: &Path, config: Option<&str>) -> Result<i32>;

    /// Configure `target` without building.
    fn generate(&self, target: &Path, config: Option<&str>) -> Result<i32>;

    /// Print what [`build`](Self::build) would run.
    fn dry_run(&self, target: &Path, config: Option<&str>) -> Result<i32>;

    /// Configure with a settings cache script and build a package source tree.
    fn build_package(&self, source: &Path, settings: &Path, config: Option<&str>) -> Result<i32>;

    /// Run configuration checks for a vars directory.
    fn vars_check(&self, check: &VarsCheck) -> Result<i32>;
}

/// [`BuildDriver`] backed by `cmake`.
#[derive(Debug, Clone, Default)]
pub struct CmakeDriver {
    program: Option<PathBuf>,
}

impl CmakeDriver {
    /// Locate `cmake` on `PATH` when first needed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit `cmake` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    fn program(&self) -> Result<PathBuf> {
        match &self.program {
            Some(program) => Ok(program.clone()),
            None => which::which("cmake").context("cmake not found in PATH"),
        }
    }

    /// Command lines (without the program) that build `target`.
    pub fn plan(&self, target: &Path, config: Option<&str>) -> Result<Vec<Vec<OsString>>> {
        let source = source_dir(target)?;
        let build = build_dir(&source);
        Ok(vec![
            configure_args(&source, &build, config, &[]),
            build_args(&build, config),
        ])
    }

    fn run(&self, args: &[OsString]) -> Result<i32> {
        let program = self.program()?;
        debug!("{} {}", program.display(), render(args));
        let status = Command::new(&program)
            .args(args)
            .status()
            .with_context(|| format!("Failed to execute {}", program.display()))?;
        Ok(status.code().unwrap_or(1))
    }

    fn run_all(&self, steps: &[Vec<OsString>]) -> Result<i32> {
        for step in steps {
            let code = self.run(step)?;
            if code != 0 {
                return Ok(code);
            }
        }
        Ok(0)
    }
}

impl BuildDriver for CmakeDriver {
    fn build(&self, target: &Path, config: Option<&str>) -> Result<i32> {
        info!("Building {}", target.display());
        self.run_all(&self.plan(target, config)?)
    }

    fn build_only(&self, target: &Path, config: Option<&str>) -> Result<i32> {
        let build = build_dir(&source_dir(target)?);
        if !build.is_dir() {
            bail!("{} is not configured; run --generate first", target.display());
        }
        self.run(&build_args(&build, config))
    }

    fn rebuild(&self, target: &Path, config: Option<&str>) -> Result<i32> {
        let build = build_dir(&source_dir(target)?);
        if build.exists() {
            std::fs::remove_dir_all(&build)
                .with_context(|| format!("Failed to clean {}", build.display()))?;
        }
        self.build(target, config)
    }

    fn generate(&self, target: &Path, config: Option<&str>) -> Result<i32> {
        let source = source_dir(target)?;
        self.run(&configure_args(&source, &build_dir(&source), config, &[]))
    }

    fn dry_run(&self, target: &Path, config: Option<&str>) -> Result<i32> {
        let program = self
            .program()
            .unwrap_or_else(|_| PathBuf::from("cmake"));
        for step in self.plan(target, config)? {
            println!("{} {}", program.display(), render(&step));
        }
        Ok(0)
    }

    fn build_package(&self, source: &Path, settings: &Path, config: Option<&str>) -> Result<i32> {
        if !source.is_dir() {
            bail!("package sources not found at {}", source.display());
        }
        let build = build_dir(source);
        let extra = [OsString::from("-C"), settings.as_os_str().to_owned()];
        self.run_all(&[
            configure_args(source, &build, config, &extra),
            build_args(&build, config),
        ])
    }

    fn vars_check(&self, check: &VarsCheck) -> Result<i32> {
        let mut args: Vec<OsString> = vec![
            "-S".into(),
            check.vars_dir.clone().into(),
            "-B".into(),
            check.vars_dir.join("build").into(),
            "-G".into(),
            check.generator.clone().into(),
            define("VARS_FILE", &check.vars_file),
            define("CHECKS_FILE", &check.checks_file),
        ];
        if let Some(toolchain) = &check.toolchain {
            args.push(define("CMAKE_TOOLCHAIN_FILE", toolchain));
        }
        self.run(&args)
    }
}

/// Directory holding the sources of `target` (a directory or a file in it).
fn source_dir(target: &Path) -> Result<PathBuf> {
    if target.is_dir() {
        return Ok(target.to_path_buf());
    }
    if target.is_file() {
        return Ok(match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        });
    }
    bail!("build target not found: {}", target.display())
}

fn build_dir(source: &Path) -> PathBuf {
    source.join(".cppan").join("build")
}

fn configure_args(
    source: &Path,
    build: &Path,
    config: Option<&str>,
    extra: &[OsString],
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-S".into(),
        source.as_os_str().to_owned(),
        "-B".into(),
        build.as_os_str().to_owned(),
    ];
    if let Some(config) = config {
        args.push(format!("-DCMAKE_BUILD_TYPE={config}").into());
    }
    args.extend(extra.iter().cloned());
    args
}

fn build_args(build: &Path, config: Option<&str>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--build".into(), build.as_os_str().to_owned()];
    if let Some(config) = config {
        args.push("--config".into());
        args.push(config.into());
    }
    args
}

fn define(name: &str, value: &Path) -> OsString {
    let mut arg = OsString::from(format!("-D{name}="));
    arg.push(value);
    arg
}

fn render(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_plan_configures_then_builds() {
        let dir = TempDir::new().unwrap();
        let driver = CmakeDriver::with_program("cmake");
        let plan = driver.plan(dir.path(), Some("Release")).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0][0], "-S");
        assert_eq!(plan[0][3], dir.path().join(".cppan/build").into_os_string());
        assert_eq!(plan[0][4], "-DCMAKE_BUILD_TYPE=Release");
        let expected: Vec<OsString> = vec![
            "--build".into(),
            plan[0][3].clone(),
            "--config".into(),
            "Release".into(),
        ];
        assert_eq!(plan[1], expected);
    }

    #[test]
    fn test_file_target_builds_its_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("main.cpp");
        std::fs::write(&file, "int main() {}").unwrap();
        assert_eq!(source_dir(&file).unwrap(), dir.path());
        assert!(source_dir(&dir.path().join("missing.cpp")).is_err());
    }

    #[test]
    fn test_build_only_requires_configuration() {
        let dir = TempDir::new().unwrap();
        let driver = CmakeDriver::with_program("cmake");
        assert!(driver.build_only(dir.path(), None).is_err());
    }

    #[cfg(unix)]
    fn fake_cmake(dir: &Path, exit_code: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("cmake");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" >> \"{}\"\nexit {exit_code}\n", dir.join("log").display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn test_rebuild_wipes_build_dir_and_runs_both_steps() {
        let tools = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let stale = project.path().join(".cppan/build/stale");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "x").unwrap();

        let driver = CmakeDriver::with_program(fake_cmake(tools.path(), 0));
        assert_eq!(driver.rebuild(project.path(), None).unwrap(), 0);

        assert!(!stale.exists());
        let log = std::fs::read_to_string(tools.path().join("log")).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.lines().nth(1).unwrap().starts_with("--build"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_configure_stops_the_build() {
        let tools = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let driver = CmakeDriver::with_program(fake_cmake(tools.path(), 3));

        assert_eq!(driver.build(project.path(), None).unwrap(), 3);
        let log = std::fs::read_to_string(tools.path().join("log")).unwrap();
        assert_eq!(log.lines().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_vars_check_passes_generator_and_toolchain() {
        let tools = TempDir::new().unwrap();
        let driver = CmakeDriver::with_program(fake_cmake(tools.path(), 0));
        let check = VarsCheck {
            vars_dir: tools.path().join("vars"),
            vars_file: PathBuf::from("vars.txt"),
            checks_file: PathBuf::from("checks.txt"),
            generator: "Ninja".to_string(),
            toolchain: Some(PathBuf::from("tc.cmake")),
        };
        assert_eq!(driver.vars_check(&check).unwrap(), 0);

        let log = std::fs::read_to_string(tools.path().join("log")).unwrap();
        assert!(log.contains("-G Ninja"));
        assert!(log.contains("-DCHECKS_FILE=checks.txt"));
        assert!(log.contains("-DCMAKE_TOOLCHAIN_FILE=tc.cmake"));
    }
}
