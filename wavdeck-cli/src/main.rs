//! # wavdeck
//!
//! Preview several WAV files mixed together, with live per-track volume, pan
//! and output routing.

use log::error;

mod cli;
mod controls;
mod logging;
mod runner;
mod ui;

fn main() {
    let log_buffer = logging::init();
    let args = cli::args::build_cli().get_matches();

    let code = match runner::run(&args, log_buffer) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            -1
        }
    };

    std::process::exit(code)
}
