//! mirror - Command-line interface for the remote sync engine.
//!
//! Mirrors directory trees to and from a host over SSH and runs remote
//! commands. Connection settings come from a profile (see `config`) and can
//! be overridden with flags. Progress lines go to stderr.

mod config;
mod connect;

use clap::{Parser, Subcommand};
use engine::{
    delete_tree, download_file_or_tree, path_exists, run_shell_command, upload_directory,
    ChecksumAlgorithm, CommandOptions, DownloadOptions, ExistingDirPolicy, ProgressCallback,
    ProgressEvent, Session, TransferSummary, UploadOptions,
};
use log::debug;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use crate::config::Profile;

/// mirror - Sync directory trees with a remote host over SSH
#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(version = "0.1.0")]
#[command(about = "Upload, download and delete remote trees, and run remote commands")]
struct Args {
    #[command(flatten)]
    target: TargetArgs,

    /// Log every remote call
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Connection flags. Each one overrides the matching profile value.
#[derive(clap::Args, Debug, Default)]
struct TargetArgs {
    /// Profile file (defaults to ./mirror.toml if present)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    host: Option<String>,

    #[arg(long, global = true)]
    port: Option<u16>,

    #[arg(long, short = 'u', global = true)]
    user: Option<String>,

    /// Private key file
    #[arg(long, short = 'i', value_name = "PATH", global = true)]
    identity: Option<PathBuf>,

    /// Do not try the SSH agent
    #[arg(long, global = true)]
    no_agent: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local directory tree
    Upload {
        /// Local directory to upload
        local: PathBuf,
        /// Remote directory to create
        remote: String,
        /// Write into remote directories that already exist
        #[arg(long)]
        merge: bool,
        /// Verify each file after transfer: sha256 or blake3
        #[arg(long, value_name = "ALGORITHM")]
        verify: Option<String>,
    },
    /// Download a remote file or tree
    Download {
        /// Remote directory the relative path is resolved against
        remote_root: String,
        /// Local directory mirroring the remote root
        local_root: PathBuf,
        /// Path under the remote root (defaults to the whole root)
        #[arg(default_value = "")]
        relative: String,
        #[arg(long, value_name = "ALGORITHM")]
        verify: Option<String>,
        /// Keep the local modification time instead of the remote one
        #[arg(long)]
        no_mtime: bool,
    },
    /// Delete a remote file or tree (a missing path is not an error)
    Delete {
        remote_root: String,
        #[arg(default_value = "")]
        relative: String,
    },
    /// Run a shell command on the remote host and exit with its status
    /// (128 + signal number if it was killed; 255 if mirror itself fails)
    Exec {
        command: String,
        /// Print the result as JSON on stdout
        #[arg(long)]
        json: bool,
        /// Shell that wraps the command (overrides the profile)
        #[arg(long)]
        shell: Option<String>,
        /// Run the shell without -i
        #[arg(long)]
        no_interactive: bool,
        /// Do not request a pseudo-terminal
        #[arg(long)]
        no_pty: bool,
    },
    /// Exit 0 if a remote path exists, 1 otherwise
    Exists { path: String },
}

/// A validated subcommand, ready to run against a session.
#[derive(Debug)]
enum Operation {
    Upload {
        local: PathBuf,
        remote: String,
        options: UploadOptions,
    },
    Download {
        remote_root: String,
        local_root: PathBuf,
        relative: String,
        options: DownloadOptions,
    },
    Delete {
        remote_root: String,
        relative: String,
    },
    Exec {
        command: String,
        options: CommandOptions,
        json: bool,
    },
    Exists {
        path: String,
    },
}

/// CLI implementation of ProgressCallback printing one line per file
struct CliProgress {
    verbose: bool,
    start_time: Instant,
    files: u64,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            start_time: Instant::now(),
            files: 0,
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: std::time::Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn finish(&self, summary: &TransferSummary) {
        let _ = self.write_summary(&mut io::stderr(), summary);
    }

    fn write_summary<W: Write>(&self, out: &mut W, summary: &TransferSummary) -> io::Result<()> {
        // The non-verbose counter is redrawn with \r and never ends its line
        if !self.verbose && self.files > 0 {
            writeln!(out)?;
        }
        writeln!(
            out,
            "Summary: {} files, {} directories, {}",
            summary.files,
            summary.directories,
            Self::format_bytes(summary.bytes)
        )?;
        writeln!(out, "Elapsed: {}", Self::format_duration(self.start_time.elapsed()))
    }
}

impl ProgressCallback for CliProgress {
    fn on_file_done(&mut self, event: &ProgressEvent) {
        self.files += 1;
        if self.verbose {
            eprintln!(
                "[{:4}] {}: {} ({})",
                self.files,
                event.direction,
                event.relative_path,
                Self::format_bytes(event.bytes)
            );
        } else {
            eprint!("\r{} files", self.files);
            let _ = io::stderr().flush();
        }
    }
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let exit_code = match run_cli(&args) {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            error_exit_code(&args.command)
        }
    };

    std::process::exit(exit_code);
}

/// Exit code for a failure of the CLI itself.
///
/// `exec` exits with the remote command's status, so like ssh(1) it reports
/// its own failures as 255 to keep them apart from a remote status of 2.
/// Other subcommands use 2.
fn error_exit_code(command: &Command) -> i32 {
    match command {
        Command::Exec { .. } => 255,
        _ => 2,
    }
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<i32, String> {
    let (profile, operation) = plan(args)?;
    let session = connect::connect(&profile)?;
    execute(&session, operation, args.verbose)
}

/// Resolve the profile and validate the subcommand without touching the network.
fn plan(args: &Args) -> Result<(Profile, Operation), String> {
    let mut profile = Profile::load(args.target.config.as_deref())
        .map_err(|e| format!("Invalid profile: {}", e))?;
    apply_overrides(&mut profile, &args.target);
    profile.require_target()?;

    let operation = match &args.command {
        Command::Upload {
            local,
            remote,
            merge,
            verify,
        } => {
            if !local.is_dir() {
                return Err(format!("Local directory does not exist: {}", local.display()));
            }
            let existing_dirs = if *merge || profile.merge_existing_dirs {
                ExistingDirPolicy::Merge
            } else {
                ExistingDirPolicy::Fail
            };
            Operation::Upload {
                local: local.clone(),
                remote: remote.clone(),
                options: UploadOptions {
                    existing_dirs,
                    verify: parse_algorithm(verify.as_deref())?,
                },
            }
        }
        Command::Download {
            remote_root,
            local_root,
            relative,
            verify,
            no_mtime,
        } => {
            if let Some(parent) = local_root.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!(
                        "Parent of local root does not exist: {}",
                        parent.display()
                    ));
                }
            }
            Operation::Download {
                remote_root: remote_root.clone(),
                local_root: local_root.clone(),
                relative: relative.clone(),
                options: DownloadOptions {
                    verify: parse_algorithm(verify.as_deref())?,
                    preserve_mtime: !no_mtime,
                },
            }
        }
        Command::Delete {
            remote_root,
            relative,
        } => {
            if relative.trim_matches('/').is_empty() && remote_root.trim_end_matches('/').is_empty() {
                return Err("Refusing to delete the remote filesystem root".to_string());
            }
            Operation::Delete {
                remote_root: remote_root.clone(),
                relative: relative.clone(),
            }
        }
        Command::Exec {
            command,
            json,
            shell,
            no_interactive,
            no_pty,
        } => {
            if command.trim().is_empty() {
                return Err("Command cannot be empty".to_string());
            }
            Operation::Exec {
                command: command.clone(),
                options: CommandOptions {
                    shell: shell.clone().unwrap_or_else(|| profile.shell.clone()),
                    interactive: !no_interactive,
                    pty: !no_pty,
                },
                json: *json,
            }
        }
        Command::Exists { path } => Operation::Exists { path: path.clone() },
    };

    Ok((profile, operation))
}

fn apply_overrides(profile: &mut Profile, target: &TargetArgs) {
    if let Some(host) = &target.host {
        profile.host = Some(host.clone());
    }
    if let Some(port) = target.port {
        profile.port = port;
    }
    if let Some(user) = &target.user {
        profile.username = Some(user.clone());
    }
    if let Some(identity) = &target.identity {
        profile.identity_file = Some(identity.clone());
    }
    if target.no_agent {
        profile.use_agent = false;
    }
}

fn parse_algorithm(name: Option<&str>) -> Result<Option<ChecksumAlgorithm>, String> {
    match name {
        None => Ok(None),
        Some(name) => ChecksumAlgorithm::parse(name).map(Some).ok_or_else(|| {
            format!(
                "Invalid hash algorithm '{}'. Must be 'sha256' or 'blake3'",
                name
            )
        }),
    }
}

/// Run a planned operation. Returns the process exit code.
fn execute<S: Session>(session: &S, operation: Operation, verbose: bool) -> Result<i32, String> {
    debug!("Running {:?}", operation);
    match operation {
        Operation::Upload {
            local,
            remote,
            options,
        } => {
            let mut progress = CliProgress::new(verbose);
            let summary = upload_directory(session, &local, &remote, &options, Some(&mut progress))
                .map_err(|e| format!("Upload failed: {}", e))?;
            progress.finish(&summary);
            Ok(0)
        }
        Operation::Download {
            remote_root,
            local_root,
            relative,
            options,
        } => {
            let mut progress = CliProgress::new(verbose);
            let summary = download_file_or_tree(
                session,
                &remote_root,
                &local_root,
                &relative,
                &options,
                Some(&mut progress),
            )
            .map_err(|e| format!("Download failed: {}", e))?;
            progress.finish(&summary);
            Ok(0)
        }
        Operation::Delete {
            remote_root,
            relative,
        } => {
            let mut progress = CliProgress::new(verbose);
            let summary = delete_tree(session, &remote_root, &relative, Some(&mut progress))
                .map_err(|e| format!("Delete failed: {}", e))?;
            progress.finish(&summary);
            Ok(0)
        }
        Operation::Exec {
            command,
            options,
            json,
        } => {
            let result = run_shell_command(session, &command, &options)
                .map_err(|e| format!("Command failed to run: {}", e))?;
            if json {
                let rendered = serde_json::to_string_pretty(&result)
                    .map_err(|e| format!("Cannot encode result: {}", e))?;
                println!("{}", rendered);
            } else {
                print!("{}", result.stdout);
                eprint!("{}", result.stderr);
            }
            Ok(result.exit_code)
        }
        Operation::Exists { path } => {
            let exists =
                path_exists(session, &path).map_err(|e| format!("Cannot inspect {}: {}", path, e))?;
            println!("{}", exists);
            Ok(if exists { 0 } else { 1 })
        }
    }
}
