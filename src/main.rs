use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use clap_complete::aot::generate;
use studiod::cli::{Cli, Commands};
use studiod::commands;
use studiod::config::{resolve_config, StudiodConfig};
use studiod::lock::LockError;
use studiod::registry::SystemRegistry;
use studiod::supervisor::Supervisor;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start => {
            if let Err(e) = run_start(cli.global.config_file).await {
                if let Some(LockError::AlreadyRunning { pid }) = root_lock_error(&e) {
                    // A second `start` against a live deployment is a no-op,
                    // not a failure.
                    eprintln!("studiod is already running (pid {}).", pid);
                    eprintln!("Run `studiod kill` to stop it.");
                    std::process::exit(0);
                }
                eprintln!("Error: {:#}", e);
                eprintln!("If processes are left behind, `studiod kill` forces a cleanup.");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Status => commands::status::run(cli.global.config_file.as_deref()),
        Commands::Kill => commands::kill::run(cli.global.config_file.as_deref()),
        Commands::Init => commands::init::run(),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "studiod", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn root_lock_error(e: &anyhow::Error) -> Option<&LockError> {
    e.chain().find_map(|cause| cause.downcast_ref::<LockError>())
}

async fn run_start(config_file: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = resolve_config(config_file.as_deref())?;
    let config = StudiodConfig::load(&config_path)?;
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    studiod::logging::init(Some(&base_dir.join(&config.supervisor.log_file)))?;

    let supervisor = Supervisor::new(&config, &base_dir, Arc::new(SystemRegistry));
    supervisor.run().await
}
