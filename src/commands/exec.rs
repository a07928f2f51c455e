// ABOUTME: Exec command implementation.
// ABOUTME: Resolves the batch, runs one command or an interactive loop, then closes sessions.

use crate::cli::ExecArgs;
use commandcast::config::{self, Settings, SshConfig, select_host_tokens};
use commandcast::diagnostics::{Diagnostics, Warning};
use commandcast::dispatch::Dispatcher;
use commandcast::error::{Error, Result};
use commandcast::host::{Batch, HostResolver};
use commandcast::output::Output;
use commandcast::ssh::CredentialSources;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Line that ends interactive mode.
const EXIT_KEYWORD: &str = "exit";

/// Run the exec subcommand.
pub async fn exec_command(
    args: ExecArgs,
    config_path: Option<PathBuf>,
    mut output: Output,
) -> Result<()> {
    let home = config::home_dir();
    let cwd = std::env::current_dir()?;
    let file_settings = Settings::locate(config_path.as_deref(), &cwd, home.as_deref())?;
    let settings = args.settings().overlay(file_settings.unwrap_or_default());
    settings.validate()?;

    let mut diag = Diagnostics::default();

    let credentials =
        CredentialSources::from_env(settings.key_paths(home.as_deref()), args.password.clone());
    let auth = credentials.resolve().await.ok_or(Error::NoAuthMethods)?;
    output.label(
        "Keys",
        &auth.iter().map(|method| method.to_string()).collect::<Vec<_>>(),
    );

    let tokens = select_host_tokens(settings.hostfile.as_deref(), settings.host_list(), &mut diag);

    let mut resolver = HostResolver::new(settings.user(), settings.timeout(), auth);
    if let Some(aliases) = load_aliases(&settings.ssh_config_path(home.as_deref()), &mut diag) {
        resolver = resolver.aliases(aliases);
    }

    let batch = Batch::resolve(&tokens, &resolver);
    output.label(
        "Hosts",
        &batch.hosts().iter().map(|host| host.to_string()).collect::<Vec<_>>(),
    );

    if batch.is_empty() {
        output.warning("no valid hosts to run on");
    } else {
        let dispatcher = Dispatcher::default();
        if args.interactive {
            interactive(&dispatcher, &batch, &mut output).await?;
        } else {
            let command = args.command_line();
            if !command.is_empty() {
                output.progress(&format!(">>> {command}"));
                dispatcher.dispatch(&batch, &command, &mut output).await;
            }
        }
    }

    batch.close_all(&mut diag).await;

    for line in diag.report() {
        output.warning(&line);
    }

    Ok(())
}

/// Prompt for commands until `exit` or end of input.
async fn interactive(dispatcher: &Dispatcher, batch: &Batch, output: &mut Output) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        output.prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = line.trim();
        if command == EXIT_KEYWORD {
            break;
        }
        if command.is_empty() {
            continue;
        }

        dispatcher.dispatch(batch, command, output).await;
    }

    Ok(())
}

/// Alias config from `path`. Missing or malformed files mean no aliases.
fn load_aliases(path: &Path, diag: &mut Diagnostics) -> Option<SshConfig> {
    match SshConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            diag.warn(Warning::ssh_config(format!("ignoring {}: {}", path.display(), e)));
            None
        }
    }
}
