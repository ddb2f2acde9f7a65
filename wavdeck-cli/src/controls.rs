use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use wavdeck_lib::dsp::ChannelSelect;
use wavdeck_lib::playback::{Transport, TrackSpec};

const SEEK_STEP_SECONDS: f64 = 5.0;
const VOLUME_STEP: f32 = 0.05;
const PAN_STEP: f32 = 0.1;

/// What the user has dialled in, mirrored so the UI can show it.
pub struct MixDesk {
    pub tracks: Vec<TrackSpec>,
    pub selected: usize,
    pub master_volume: f32,
}

impl MixDesk {
    pub fn new(tracks: Vec<TrackSpec>, master_volume: f32) -> Self {
        Self {
            tracks,
            selected: 0,
            master_volume,
        }
    }
}

pub struct StatusSnapshot {
    pub text: String,
    pub tracks: Vec<String>,
}

pub fn status_text(transport: &Transport, desk: &MixDesk) -> StatusSnapshot {
    let time = transport.position_seconds();
    let duration = transport.duration_seconds();
    let state = if transport.is_running() {
        "▶ Playing"
    } else {
        "■ Stopped"
    };
    let percent = if duration > 0.0 {
        (time / duration * 100.0).min(100.0)
    } else {
        0.0
    };
    let text = format!(
        "{}   {} / {}   ({:>5.1}%)\nMaster: {:.2} | output: {}",
        state,
        format_time(time),
        format_time(duration),
        percent,
        desk.master_volume,
        transport.active_backend().unwrap_or("none")
    );

    let tracks = desk
        .tracks
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let marker = if index == desk.selected { ">" } else { " " };
            let name = spec
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| spec.path.display().to_string());
            format!(
                "{} {}. {:<24} vol {:.2}  pan {:+.1}  {}",
                marker,
                index + 1,
                name,
                spec.volume,
                spec.pan,
                spec.channel_select
            )
        })
        .collect();

    StatusSnapshot { text, tracks }
}

pub fn handle_key_event(transport: &mut Transport, desk: &mut MixDesk) -> bool {
    if event::poll(Duration::from_millis(100)).unwrap_or(false) {
        if let Ok(Event::Key(key)) = event::read() {
            if key.kind != KeyEventKind::Press {
                return true;
            }
            return apply_key(transport, desk, key.code);
        }
    }

    true
}

/// Apply one key press. Returns `false` when the user asked to quit.
pub fn apply_key(transport: &mut Transport, desk: &mut MixDesk, code: KeyCode) -> bool {
    let index = desk.selected;
    match code {
        KeyCode::Char('q') | KeyCode::Esc => {
            transport.stop();
            return false;
        }
        KeyCode::Left => {
            let target = (transport.position_seconds() - SEEK_STEP_SECONDS).max(0.0);
            transport.seek(target);
        }
        KeyCode::Right => {
            let target = (transport.position_seconds() + SEEK_STEP_SECONDS)
                .min(transport.duration_seconds());
            transport.seek(target);
        }
        KeyCode::Char(digit @ '1'..='9') => {
            let picked = digit as usize - '1' as usize;
            if picked < desk.tracks.len() {
                desk.selected = picked;
            }
        }
        KeyCode::Up => {
            desk.master_volume = (desk.master_volume + VOLUME_STEP).min(1.0);
            transport.set_master_volume(desk.master_volume);
        }
        KeyCode::Down => {
            desk.master_volume = (desk.master_volume - VOLUME_STEP).max(0.0);
            transport.set_master_volume(desk.master_volume);
        }
        _ => {
            let Some(spec) = desk.tracks.get_mut(index) else {
                return true;
            };
            match code {
                KeyCode::Char('=') | KeyCode::Char('+') => {
                    spec.volume = (spec.volume + VOLUME_STEP).min(1.0);
                    transport.set_track_volume(index, spec.volume);
                }
                KeyCode::Char('-') => {
                    spec.volume = (spec.volume - VOLUME_STEP).max(0.0);
                    transport.set_track_volume(index, spec.volume);
                }
                KeyCode::Char('[') => {
                    spec.pan = (spec.pan - PAN_STEP).max(-1.0);
                    transport.set_track_pan(index, spec.pan);
                }
                KeyCode::Char(']') => {
                    spec.pan = (spec.pan + PAN_STEP).min(1.0);
                    transport.set_track_pan(index, spec.pan);
                }
                KeyCode::Char('l') | KeyCode::Char('r') | KeyCode::Char('b') => {
                    let route = match code {
                        KeyCode::Char('l') => ChannelSelect::LeftOnly,
                        KeyCode::Char('r') => ChannelSelect::RightOnly,
                        _ => ChannelSelect::Both,
                    };
                    spec.channel_select = route;
                    transport.set_track_channel_select(index, route);
                }
                _ => {}
            }
        }
    }

    true
}

fn format_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0).floor() as u32;
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
