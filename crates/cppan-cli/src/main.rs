//! cppan - C/C++ dependency manager CLI

use std::process::ExitCode;

use cppan_cli::{BootstrapGate, CliError, NativeBackend, Orchestrator, ProcessContext};

static CONTEXT: BootstrapGate = BootstrapGate::new();

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(&args).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(CliError::Usage(usage)) => {
            eprintln!("{usage}");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("cppan: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<i32, CliError> {
    let ctx = CONTEXT.get_or_bootstrap(ProcessContext::bootstrap)?;
    let backend = NativeBackend::new();
    Orchestrator::new(ctx, &backend).run(args).await
}
