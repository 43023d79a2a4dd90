//! Jail definition and management CLI.
//!
//! Builds flavour images from a `Jailfile` manifest and drives
//! instance lifecycles (create/run/unrun) against the ezjail backend.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use jailfile::build::{BuildRequest, run_build};
use jailfile::create::{CreateRequest, run_create};
use jailfile::io::backend::EzjailBackend;
use jailfile::io::config::{DEFAULT_CONFIG_PATH, load_config};
use jailfile::run::{run_instance, unrun_instance};
use jailfile::{Error, exit_codes};

#[derive(Parser)]
#[command(
    name = "jailfile",
    version,
    about = "Build and run jail flavours from a Jailfile"
)]
struct Cli {
    /// Manifest to operate on.
    #[arg(short = 'f', long, global = true, default_value = "Jailfile")]
    jailfile: PathBuf,

    /// Configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Materialize the flavour image described by the Jailfile.
    Build {
        /// Copy the built tree into this directory.
        #[arg(long)]
        build: Option<PathBuf>,

        /// Install the built flavour into the flavours directory.
        #[arg(long)]
        install: bool,
    },
    /// Create an instance from the flavour and bootstrap it.
    Create {
        /// Instance name (defaults to `<flavour>_<uuid>`).
        #[arg(long)]
        name: Option<String>,

        /// Network spec passed through to the backend.
        #[arg(long)]
        network: Option<String>,
    },
    /// Run the ENTRYPOINT (or an explicit command) in an instance.
    Run {
        /// Instance to run in.
        name: String,

        /// Command overriding the manifest ENTRYPOINT.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Undo bootstrap side effects and stop an instance.
    Unrun {
        /// Instance to deactivate.
        name: String,
    },
}

fn main() {
    jailfile::logging::init();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(exit_code(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Build { build, install } => {
            let outcome = run_build(
                &BuildRequest {
                    manifest_path: cli.jailfile,
                    build_dir: build,
                    install,
                },
                &config,
            )?;
            println!("built flavour {}", outcome.name);
            Ok(())
        }
        Command::Create { name, network } => {
            let backend = EzjailBackend::new(&config);
            let instance = run_create(
                &CreateRequest {
                    manifest_path: cli.jailfile,
                    instance: name,
                    network,
                },
                &config,
                &backend,
            )?;
            println!("{instance}");
            Ok(())
        }
        Command::Run { name, command } => {
            let backend = EzjailBackend::new(&config);
            let override_command = (!command.is_empty()).then(|| command.join(" "));
            run_instance(&name, override_command.as_deref(), &config, &backend)
        }
        Command::Unrun { name } => {
            let backend = EzjailBackend::new(&config);
            unrun_instance(&name, &config, &backend)
        }
    }
}

/// Map the failure taxonomy onto stable exit codes.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(Error::Execution { .. }) => exit_codes::EXECUTION_FAILED,
        Some(Error::Backend(_)) => exit_codes::BACKEND_UNAVAILABLE,
        _ => exit_codes::INVALID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_build_with_flags() {
        let cli = Cli::parse_from(["jailfile", "build", "--build", "out", "--install"]);
        let Command::Build { build, install } = cli.command else {
            panic!("expected build command");
        };
        assert_eq!(build, Some(PathBuf::from("out")));
        assert!(install);
    }

    #[test]
    fn parse_run_with_override_command() {
        let cli = Cli::parse_from(["jailfile", "run", "web_1", "uptime", "-a"]);
        let Command::Run { name, command } = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(name, "web_1");
        assert_eq!(command, vec!["uptime".to_string(), "-a".to_string()]);
    }

    #[test]
    fn jailfile_flag_defaults_to_jailfile() {
        let cli = Cli::parse_from(["jailfile", "unrun", "web_1"]);
        assert_eq!(cli.jailfile, PathBuf::from("Jailfile"));
    }

    #[test]
    fn execution_errors_map_to_dedicated_exit_code() {
        use jailfile::core::directive::DirectiveKind;
        use jailfile::engine::Phase;

        let err = anyhow::Error::new(Error::Execution {
            kind: DirectiveKind::Run,
            position: 2,
            phase: Phase::Bootstrap,
            status: 1,
        });
        assert_eq!(exit_code(&err), exit_codes::EXECUTION_FAILED);

        let backend = anyhow::Error::new(Error::Backend("unreachable".to_string()));
        assert_eq!(exit_code(&backend), exit_codes::BACKEND_UNAVAILABLE);

        let parse = anyhow::Error::new(Error::Validation("duplicate NAME".to_string()));
        assert_eq!(exit_code(&parse), exit_codes::INVALID);
    }
}
