// ABOUTME: Command module aggregator for the commandcast CLI.
// ABOUTME: Re-exports the exec command handler.

mod exec;

pub use exec::exec_command;
