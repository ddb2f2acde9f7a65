//! CLI argument definitions for `wavdeck`.

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("wavdeck")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Preview several WAV files mixed together")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(
            Command::new("play")
                .about("Mix and play WAV files with live per-track controls")
                .arg(
                    Arg::new("FILES")
                        .help("WAV files to mix; all must share one sample rate")
                        .required(true)
                        .num_args(1..)
                        .index(1),
                )
                .arg(
                    Arg::new("volume")
                        .long("volume")
                        .short('v')
                        .value_name("VOLUME")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(f32))
                        .help("Track volume 0.0-1.0; repeat once per file, or give once for all"),
                )
                .arg(
                    Arg::new("pan")
                        .long("pan")
                        .short('p')
                        .value_name("PAN")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(f32))
                        .allow_negative_numbers(true)
                        .help("Track pan -1.0 (left) to 1.0 (right); repeat once per file"),
                )
                .arg(
                    Arg::new("route")
                        .long("route")
                        .short('r')
                        .value_name("ROUTE")
                        .action(ArgAction::Append)
                        .help("Track output routing: left, right or both; repeat once per file"),
                )
                .arg(
                    Arg::new("seek")
                        .long("seek")
                        .short('s')
                        .value_name("TIME")
                        .value_parser(value_parser!(f64))
                        .help("Start at the given time in seconds"),
                )
                .arg(
                    Arg::new("master-volume")
                        .long("master-volume")
                        .short('m')
                        .value_name("VOLUME")
                        .value_parser(value_parser!(f32))
                        .help("Master bus volume 0.0-1.0"),
                )
                .arg(
                    Arg::new("settings-json")
                        .long("settings-json")
                        .value_name("PATH")
                        .help("Path to a JSON file with mixer settings"),
                )
                .arg(
                    Arg::new("quiet")
                        .long("quiet")
                        .short('q')
                        .action(ArgAction::SetTrue)
                        .help("Skip the terminal UI; logs go to stderr"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Print the parsed WAV header of each file")
                .arg(
                    Arg::new("FILES")
                        .help("WAV files to inspect")
                        .required(true)
                        .num_args(1..)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Emit default JSON payloads")
                .subcommand_required(true)
                .subcommand(
                    Command::new("settings-json")
                        .about("Print the default mixer settings as JSON"),
                ),
        )
}
