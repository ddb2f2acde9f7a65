use std::{error::Error, fs, io, thread::sleep, time::Duration};

use clap::ArgMatches;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::info;
use ratatui::{backend::CrosstermBackend, Terminal};

use wavdeck_lib::playback::{MixerSettings, Transport};

use crate::{cli, controls, logging, logging::LogBuffer, ui};

pub fn run(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32, Box<dyn Error>> {
    match args.subcommand() {
        Some(("play", play_args)) => run_play(play_args, log_buffer),
        Some(("info", info_args)) => Ok(cli::info::run_info(info_args)),
        Some(("create", create_args)) => match create_args.subcommand() {
            Some(("settings-json", _)) => {
                println!("{}", MixerSettings::default().to_json_pretty());
                Ok(0)
            }
            _ => Ok(-1),
        },
        _ => Ok(-1),
    }
}

fn run_play(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32, Box<dyn Error>> {
    let quiet = args.get_flag("quiet");
    let settings = match args.get_one::<String>("settings-json") {
        Some(path) => MixerSettings::from_json(&fs::read_to_string(path)?)?,
        None => MixerSettings::default(),
    };
    let specs = cli::tracks::build_track_specs(args)?;
    let master_volume = args.get_one::<f32>("master-volume").copied().unwrap_or(1.0);

    let mut transport = Transport::with_default_output(settings);
    transport.set_master_volume(master_volume);
    transport.start(&specs)?;
    if let Some(seek) = args.get_one::<f64>("seek") {
        transport.seek(*seek);
    }
    info!(
        "playing {} tracks, {:.1}s",
        transport.track_count(),
        transport.duration_seconds()
    );

    let mut desk = controls::MixDesk::new(specs, transport.master_volume());

    let _raw_mode = RawModeGuard::enable().ok();
    let mut terminal = if !quiet {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide);
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend).ok()
    } else {
        None
    };
    let echo_before = terminal
        .as_ref()
        .map(|_| logging::set_echo_stderr(false));

    // UI / input loop.
    while transport.is_running() {
        if let Some(term) = terminal.as_mut() {
            let status = controls::status_text(&transport, &desk);
            let log_lines = logging::snapshot(&log_buffer);
            ui::draw_status(term, &status, &log_lines);
        }

        if !controls::handle_key_event(&mut transport, &mut desk) {
            break;
        }

        sleep(Duration::from_millis(50));
    }
    transport.stop();

    // Restore the terminal state before exiting.
    if let Some(mut term) = terminal {
        let _ = term.show_cursor();
        let stdout = term.backend_mut();
        let _ = execute!(stdout, LeaveAlternateScreen, cursor::Show);
    }
    if let Some(echo) = echo_before {
        logging::set_echo_stderr(echo);
    }

    Ok(0)
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
