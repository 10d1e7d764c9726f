//! Juryrig CLI - diagnose agent build-loop failures, apply guarded fixes.

use clap::Parser;
use juryrig::cli::{Cli, Commands};
use juryrig::commands::{self, Output};
use juryrig::config::Config;
use juryrig::storage::find_git_root;
use std::env;
use std::path::PathBuf;
use std::process;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    // Determine repo path: --repo flag > JR_REPO env > git root > cwd
    let repo_path = resolve_repo_path(cli.repo_path, human);

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring invalid config: {}", e);
            Config::default()
        }
    };

    if let Err(e) = run_command(cli.command, &repo_path, &config, human) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            let err = serde_json::json!({ "error": e.to_string() });
            eprintln!("{}", err);
        }
        process::exit(1);
    }
}

/// Resolve the repository path based on explicit flag, environment
/// variable, or auto-detection.
///
/// When an explicit path is provided it is used literally without git root
/// detection, so specific subdirectories can be targeted. Otherwise the
/// git root of the current directory keeps behavior consistent regardless
/// of which subdirectory jr runs from.
fn resolve_repo_path(explicit_path: Option<PathBuf>, human: bool) -> PathBuf {
    match explicit_path {
        Some(path) => {
            if !path.exists() {
                if human {
                    eprintln!(
                        "Error: Specified repo path does not exist: {}",
                        path.display()
                    );
                } else {
                    eprintln!(
                        r#"{{"error": "Specified repo path does not exist: {}"}}"#,
                        path.display()
                    );
                }
                process::exit(1);
            }
            path
        }
        None => {
            let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            find_git_root(&cwd).unwrap_or(cwd)
        }
    }
}

fn run_command(
    command: Commands,
    repo_path: &std::path::Path,
    config: &Config,
    human: bool,
) -> Result<(), juryrig::Error> {
    match command {
        Commands::Diagnose {
            paths,
            summaries,
            iteration_logs,
            threshold,
            max_errors,
        } => {
            let inputs = commands::DiagnoseInputs {
                paths,
                summaries,
                iteration_logs,
                threshold,
                max_errors,
            };
            let result = commands::diagnose(&inputs, config)?;
            output(&result, human);
        }

        Commands::Fix {
            cause,
            message,
            dependency,
            policy,
            yes,
            no_rollback,
            no_snapshot,
            dry_run,
        } => {
            let options = commands::FixOptions {
                message,
                dependency,
                policy,
                yes,
                no_rollback,
                no_snapshot,
                dry_run,
            };
            let result = commands::fix(repo_path, &cause, &options, config)?;
            let failed = !result.dry_run && !result.success && !result.skipped;
            output(&result, human);
            if failed {
                process::exit(1);
            }
        }

        Commands::Auto {
            paths,
            summaries,
            policy,
            yes,
            no_rollback,
        } => {
            let inputs = commands::DiagnoseInputs {
                paths,
                summaries,
                ..Default::default()
            };
            let options = commands::AutoOptions {
                policy,
                yes,
                no_rollback,
            };
            let result = commands::auto(repo_path, &inputs, &options, config)?;
            output(&result, human);
        }

        Commands::Report { log } => {
            let result = commands::report(repo_path, log.as_deref(), config)?;
            output(&result, human);
        }

        Commands::Agents { paths, roster } => {
            let result = commands::agents(&paths, &roster)?;
            output(&result, human);
        }
    }

    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
