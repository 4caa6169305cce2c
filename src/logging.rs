use log::LevelFilter;

pub use log::LevelFilter::*;

pub fn setup_logging(verbosity: LevelFilter) {
    let result = fern::Dispatch::new()
        .level(verbosity)
        .format(|out, message, record| out.finish(format_args!("({}) {}: {}", record.level(), record.target(), message)))
        .chain(std::io::stdout())
        .apply();

    // A second call (e.g. from another test) keeps the first logger.
    if let Err(err) = result {
        log::debug!("Logging already configured: {}", err);
    }
}
