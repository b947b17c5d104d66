use clap::{Arg, ArgAction, ArgMatches, Command};
use clap_complete::Shell;

pub fn build_cli() -> Command {
    Command::new("veil")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect and operate the shared window-modification registry")
        .long_about(
            "veil's cooperating processes coordinate through a shared registry so that \
            each on-screen window is modified exactly once. This CLI inspects that \
            registry from the outside: show what has been modified, force a stale-entry \
            sweep, or wipe the state for a fresh coordinated run.",
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("status")
                .about("Show registry mode, record count and live records")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Output in JSON format")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("dir")
                        .long("dir")
                        .help("Inspect a file-backed registry in this directory instead of the configured store")
                        .value_name("PATH"),
                ),
        )
        .subcommand(
            Command::new("reclaim")
                .about("Force a stale-record reclamation pass, bypassing the rate limiter")
                .arg(
                    Arg::new("dir")
                        .long("dir")
                        .help("Operate on a file-backed registry in this directory instead of the configured store")
                        .value_name("PATH"),
                ),
        )
        .subcommand(
            Command::new("reset")
                .about("Delete the registry state for a fresh coordinated run")
                .long_about(
                    "Deletes the file-backed store (or unlinks the shared-memory segment). \
                    No cooperating process may have the registry open; records they already \
                    hold locally are unaffected.",
                )
                .arg(
                    Arg::new("dir")
                        .long("dir")
                        .help("Operate on a file-backed registry in this directory instead of the configured store")
                        .value_name("PATH"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .help("Shell to generate completions for")
                        .required(true)
                        .value_parser(clap::value_parser!(Shell)),
                ),
        )
}

#[allow(dead_code)]
pub fn get_matches() -> ArgMatches {
    build_cli().get_matches()
}
