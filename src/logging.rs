/// Initialize the logger with the specified verbosity level
///
/// Safe to call more than once; only the first call installs a logger.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=warn, 1=info, 2=debug, 3+=trace)
pub fn setup_logger(verbose: u8) {
    let env_filter = filter_for(verbose);

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(env_filter))
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .try_init();
}

fn filter_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "doclock=warn",
        1 => "doclock=info",
        2 => "doclock=debug",
        _ => "doclock=trace",
    }
}
