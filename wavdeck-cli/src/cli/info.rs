//! `wavdeck info`: header inspection without playback.

use clap::ArgMatches;
use log::error;

use wavdeck_lib::container::open_header;

/// Print one summary line per file. Returns a non-zero code if any file was
/// rejected.
pub fn run_info(args: &ArgMatches) -> i32 {
    let mut code = 0;
    for path in args.get_many::<String>("FILES").unwrap_or_default() {
        match open_header(path) {
            Ok(header) => println!(
                "{}: {:?}, {} ch, {} Hz, {} frames ({:.3}s), data at byte {}",
                path,
                header.encoding,
                header.channels,
                header.sample_rate,
                header.frame_count(),
                header.duration_seconds(),
                header.data_offset
            ),
            Err(err) => {
                error!("{}: {}", path, err);
                code = 1;
            }
        }
    }
    code
}
