//! Pairing of per-track `play` options with the listed files.

use clap::ArgMatches;

use wavdeck_lib::dsp::ChannelSelect;
use wavdeck_lib::playback::TrackSpec;

/// Spread `values` over `count` tracks: one value applies to every track,
/// otherwise there must be exactly one value per track.
fn per_track<T: Clone>(values: Vec<T>, count: usize, name: &str) -> Result<Vec<Option<T>>, String> {
    match values.len() {
        0 => Ok(vec![None; count]),
        1 => Ok(vec![values.into_iter().next(); count]),
        n if n == count => Ok(values.into_iter().map(Some).collect()),
        n => Err(format!(
            "got {} --{} values for {} files; give one, or one per file",
            n, name, count
        )),
    }
}

pub fn build_track_specs(args: &ArgMatches) -> Result<Vec<TrackSpec>, String> {
    let files: Vec<String> = args
        .get_many::<String>("FILES")
        .unwrap_or_default()
        .cloned()
        .collect();
    let count = files.len();

    let volumes = per_track(
        args.get_many::<f32>("volume").unwrap_or_default().copied().collect(),
        count,
        "volume",
    )?;
    let pans = per_track(
        args.get_many::<f32>("pan").unwrap_or_default().copied().collect(),
        count,
        "pan",
    )?;
    let routes = args
        .get_many::<String>("route")
        .unwrap_or_default()
        .map(|route| route.parse::<ChannelSelect>())
        .collect::<Result<Vec<_>, _>>()?;
    let routes = per_track(routes, count, "route")?;

    let specs = files
        .into_iter()
        .zip(volumes)
        .zip(pans)
        .zip(routes)
        .map(|(((file, volume), pan), route)| {
            let mut spec = TrackSpec::new(file);
            if let Some(volume) = volume {
                spec = spec.with_volume(volume);
            }
            if let Some(pan) = pan {
                spec = spec.with_pan(pan);
            }
            if let Some(route) = route {
                spec = spec.with_channel_select(route);
            }
            spec
        })
        .collect();
    Ok(specs)
}
