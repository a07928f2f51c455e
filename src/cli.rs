// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the exec subcommand and its host, credential and output flags.

use clap::{Args, Parser, Subcommand};
use commandcast::config::{Settings, split_host_list};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "commandcast")]
#[command(about = "Run a command on multiple hosts over SSH")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only captured output
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Settings file (default: ./commandcast.yml or ~/.config/commandcast/config.yml)
    #[arg(long, global = true, env = "COMMANDCAST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a command on all hosts
    #[command(visible_alias = "e")]
    Exec(ExecArgs),
}

#[derive(Args)]
pub struct ExecArgs {
    /// Command to run on every host
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Read commands from a prompt until `exit`
    #[arg(short, long)]
    pub interactive: bool,

    /// Hosts, comma separated (default: localhost)
    #[arg(long)]
    pub hosts: Option<String>,

    /// File with one host per line; takes precedence over --hosts
    #[arg(long)]
    pub hostfile: Option<PathBuf>,

    /// SSH user (default: $USER)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Seconds to wait for all hosts to answer one command (default: 15)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Private key files, comma separated (default: ~/.ssh/id_ed25519,~/.ssh/id_dsa,~/.ssh/id_rsa)
    #[arg(long, value_delimiter = ',')]
    pub keys: Option<Vec<String>>,

    /// Password to offer after keys
    #[arg(long)]
    pub password: Option<String>,

    /// OpenSSH config used for host aliases (default: ~/.ssh/config)
    #[arg(long)]
    pub ssh_config: Option<PathBuf>,
}

impl ExecArgs {
    /// The command line joined into one string, trimmed.
    pub fn command_line(&self) -> String {
        self.command.join(" ").trim().to_string()
    }

    /// Flag values as settings, to be laid over the settings file.
    pub fn settings(&self) -> Settings {
        Settings {
            user: self.user.clone(),
            keys: self.keys.clone(),
            timeout: self.timeout.map(Duration::from_secs),
            hosts: self.hosts.as_deref().map(split_host_list),
            hostfile: self.hostfile.clone(),
            ssh_config: self.ssh_config.clone(),
        }
    }
}
