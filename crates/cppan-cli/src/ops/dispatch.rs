//! Argument classification and dispatch.
//!
//! [`Orchestrator::classify`] turns the operands after the program name into
//! a [`DispatchOutcome`] without side effects; [`Orchestrator::run`] executes
//! it and yields the process exit code.
//!
//! Classification order for a bare first operand: internal command, URL,
//! existing directory, existing file, otherwise unknown.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use cppan_core::ConfigSession;
use cppan_core::config::make_archive_name;
use cppan_schema::PackageId;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::cmd::clean;
use crate::cmd::internal::{self, InternalCommand};
use crate::cmd::self_upgrade::{self, UpdateAgent, UpgradeOutcome};
use crate::ops::backend::Backend;
use crate::ops::context::ProcessContext;
use crate::ops::error::CliError;
use crate::ops::scope::ScopedCurrentDir;
use crate::{Action, Options};

/// Where an explicit build target comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSource {
    Remote(Url),
    Local(PathBuf),
}

/// Result of parsing the flagged grammar.
#[derive(Debug)]
pub enum Parsed {
    Options(Box<Options>),
    /// Help, version, or a parse error; clap has already rendered it.
    Message(clap::Error),
}

/// What an invocation means.
#[derive(Debug)]
pub enum DispatchOutcome {
    InternalCommand {
        command: &'static InternalCommand,
        args: Vec<String>,
    },
    /// Process the configuration of the current directory, or of `dir`.
    DefaultRun { dir: Option<PathBuf> },
    BuildTarget(BuildSource),
    UnknownCommand(String),
    FlaggedOptions(Parsed),
}

/// Drives one invocation against the bootstrapped context.
pub struct Orchestrator<'a> {
    ctx: &'a ProcessContext,
    backend: &'a dyn Backend,
}

impl std::fmt::Debug for Orchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("ctx", self.ctx)
            .finish_non_exhaustive()
    }
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: &'a ProcessContext, backend: &'a dyn Backend) -> Self {
        Self { ctx, backend }
    }

    pub fn context(&self) -> &'a ProcessContext {
        self.ctx
    }

    pub fn backend(&self) -> &'a dyn Backend {
        self.backend
    }

    /// Decide what `args` (without the program name) asks for. Internal
    /// command arity is checked here, so a bad count never reaches a handler.
    pub fn classify(args: &[String]) -> Result<DispatchOutcome, CliError> {
        let Some(first) = args.first() else {
            return Ok(DispatchOutcome::DefaultRun { dir: None });
        };

        if first.starts_with('-') {
            let argv = std::iter::once("cppan").chain(args.iter().map(String::as_str));
            let parsed = match Options::try_parse_from(argv) {
                Ok(options) => Parsed::Options(Box::new(options)),
                Err(err) => Parsed::Message(err),
            };
            return Ok(DispatchOutcome::FlaggedOptions(parsed));
        }

        if let Some(command) = internal::find(first) {
            let rest = &args[1..];
            if !command.accepts(rest.len()) {
                return Err(CliError::Usage(command.usage()));
            }
            return Ok(DispatchOutcome::InternalCommand {
                command,
                args: rest.to_vec(),
            });
        }

        if let Some(url) = parse_url(first) {
            return Ok(DispatchOutcome::BuildTarget(BuildSource::Remote(url)));
        }

        let path = Path::new(first);
        if path.is_dir() {
            return Ok(DispatchOutcome::DefaultRun {
                dir: Some(path.to_path_buf()),
            });
        }
        if path.is_file() {
            return Ok(DispatchOutcome::BuildTarget(BuildSource::Local(path.to_path_buf())));
        }

        Ok(DispatchOutcome::UnknownCommand(first.clone()))
    }

    /// Classify and execute. Returns the process exit code.
    pub async fn run(&self, args: &[String]) -> Result<i32, CliError> {
        match Self::classify(args)? {
            DispatchOutcome::InternalCommand { command, args } => {
                debug!("internal command {}", command.name);
                command.run(self, &args).map_err(CliError::Config)
            }
            DispatchOutcome::DefaultRun { dir } => {
                let _scope = dir.as_deref().map(ScopedCurrentDir::enter).transpose()?;
                self.default_run()?;
                Ok(0)
            }
            DispatchOutcome::BuildTarget(BuildSource::Remote(url)) => self.build_remote(&url).await,
            DispatchOutcome::BuildTarget(BuildSource::Local(path)) => {
                self.backend.driver().build(&path, None).map_err(CliError::Config)
            }
            DispatchOutcome::UnknownCommand(name) => Err(CliError::UnknownCommand(name)),
            DispatchOutcome::FlaggedOptions(Parsed::Message(err)) => Ok(show_message(&err)),
            DispatchOutcome::FlaggedOptions(Parsed::Options(options)) => self.run_options(&options).await,
        }
    }

    fn default_run(&self) -> Result<(), CliError> {
        let mut session = self.backend.session(self.ctx.settings());
        session.load_current_config().map_err(CliError::Config)?;
        session.process(self.backend.driver()).map_err(CliError::Config)
    }

    async fn run_options(&self, opts: &Options) -> Result<i32, CliError> {
        if let Some(dst) = &opts.self_upgrade_copy {
            self_upgrade::copy_self_to(dst)?;
            return Ok(0);
        }

        if opts.clear_cache || opts.clear_vars_cache {
            let storage = self.ctx.storage();
            if opts.clear_cache {
                clean::clear_cache(&storage).map_err(CliError::Unhandled)?;
            }
            if opts.clear_vars_cache {
                clean::clear_vars_cache(&storage).map_err(CliError::Unhandled)?;
            }
            return Ok(0);
        }

        if let Some(action) = opts.primary_action() {
            return self.run_action(action, opts.config.as_deref());
        }

        if let Some(pattern) = &opts.clean_packages {
            let removed = clean::clean_packages(self.ctx, pattern).map_err(CliError::Unhandled)?;
            info!("Removed {removed} package(s)");
            return Ok(0);
        }

        let _scope = opts.dir.as_deref().map(ScopedCurrentDir::enter).transpose()?;

        self.ctx.update_http(|http| {
            http.verbose = opts.curl_verbose;
            http.ignore_ssl_checks = opts.ignore_ssl_checks;
        });

        let mut session = self.backend.session(self.ctx.settings());
        self.ctx.set_proxy(session.settings().proxy.clone());

        if opts.self_upgrade {
            self.self_upgrade(session.as_ref()).await?;
            return Ok(0);
        }

        session.load_current_config().map_err(CliError::Config)?;
        // The loaded configuration decides the proxy, even over options.
        self.ctx.set_proxy(session.settings().proxy.clone());

        if opts.prepare_archive {
            prepare_archives(session.as_mut()).map_err(CliError::Config)?;
        } else {
            session.process(self.backend.driver()).map_err(CliError::Config)?;
        }
        Ok(0)
    }

    fn run_action(&self, action: Action<'_>, config: Option<&str>) -> Result<i32, CliError> {
        let driver = self.backend.driver();
        let result = match action {
            Action::Build(path) => driver.build(path, config),
            Action::BuildOnly(path) => driver.build_only(path, config),
            Action::Rebuild(path) => driver.rebuild(path, config),
            Action::Generate(path) => driver.generate(path, config),
            Action::DryRun(path) => driver.dry_run(path, config),
            Action::BuildPackage { package, settings } => {
                return self.build_package(package, settings, config);
            }
        };
        result.map_err(CliError::Config)
    }

    fn build_package(&self, package: &str, settings: &Path, config: Option<&str>) -> Result<i32, CliError> {
        let id = PackageId::parse(package)
            .with_context(|| format!("Invalid package '{package}'"))
            .map_err(CliError::Config)?;
        let source = self.ctx.storage().package_src_dir(&id.path);

        let code = self
            .backend
            .driver()
            .build_package(&source, settings, config)
            .map_err(CliError::Config)?;
        if code == 0 {
            self.ctx
                .db()
                .record_package(&id)
                .map_err(|e| CliError::Unhandled(e.into()))?;
        }
        Ok(code)
    }

    async fn build_remote(&self, url: &Url) -> Result<i32, CliError> {
        let transport = self.backend.transport(&self.ctx.http_settings())?;
        let archive = tempfile::NamedTempFile::new()?;
        info!("Downloading {url}");
        transport.fetch(url.as_str(), archive.path()).await?;

        let workdir = tempfile::tempdir()?;
        self.backend
            .unpacker()
            .unpack(archive.path(), workdir.path())
            .map_err(|e| CliError::Unhandled(e.into()))?;

        let root = single_root(workdir.path())?;
        self.backend.driver().build(&root, None).map_err(CliError::Config)
    }

    async fn self_upgrade(&self, session: &dyn ConfigSession) -> Result<(), CliError> {
        let transport = self.backend.transport(&self.ctx.http_settings())?;
        let agent = UpdateAgent::new(transport.as_ref(), self.backend.unpacker(), &session.settings().host);
        let live = std::env::current_exe()?;

        match agent.upgrade(&live).await? {
            UpgradeOutcome::Replaced => info!("cppan has been upgraded"),
            UpgradeOutcome::Handoff => info!("cppan will be upgraded when this process exits"),
        }
        Ok(())
    }
}

/// Print help, version or a parse error. Returns the exit code.
fn show_message(err: &clap::Error) -> i32 {
    if let Err(e) = err.print() {
        warn!("Failed to print message: {e}");
    }
    match message_exit_code(err.kind()) {
        0 => 0,
        code => {
            if let Err(e) = Options::command().print_help() {
                warn!("Failed to print help: {e}");
            }
            code
        }
    }
}

fn message_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn parse_url(text: &str) -> Option<Url> {
    let url = Url::parse(text).ok()?;
    let remote = matches!(url.scheme(), "http" | "https" | "ftp") && url.has_host();
    remote.then_some(url)
}

/// Archives usually wrap everything in one top-level directory.
fn single_root(dir: &Path) -> std::io::Result<PathBuf> {
    let entries: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    match entries.as_slice() {
        [only] if only.file_type()?.is_dir() => Ok(only.path()),
        _ => Ok(dir.to_path_buf()),
    }
}

fn prepare_archives(session: &mut dyn ConfigSession) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let projects = session.projects();
    let outputs: Vec<PathBuf> = projects
        .keys()
        .map(|path| cwd.join(make_archive_name(&path.to_string())))
        .collect();
    for ((path, project), archive) in projects.iter_mut().zip(&outputs) {
        project.find_sources(&cwd)?;
        project.exclude(&cwd, &outputs);
        // Hidden, so source scans never pick up a partial archive.
        let staged = tempfile::Builder::new()
            .prefix(".cppan-archive")
            .tempfile_in(&cwd)
            .context("Failed to create archive file")?;
        project.write_archive(&cwd, staged.path())?;
        staged
            .persist(archive)
            .with_context(|| format!("Failed to write {}", archive.display()))?;
        info!("Wrote {} ({} files) for {path}", archive.display(), project.files().len());
    }
    Ok(())
}
