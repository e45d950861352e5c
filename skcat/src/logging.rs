use log::LevelFilter;

/// Bits of the `--debug` bitfield, least verbose first. Higher bits are accepted and ignored.
const ERR: u32 = 1 << 0;
const WARN: u32 = 1 << 1;
const NOTICE: u32 = 1 << 2;
const INFO: u32 = 1 << 3;
const DEBUG: u32 = 1 << 4;

/// The most verbose level whose bit is set in `bits`.
pub fn level_filter(bits: u32) -> LevelFilter {
    [
        (DEBUG, LevelFilter::Trace),
        (INFO, LevelFilter::Debug),
        (NOTICE, LevelFilter::Info),
        (WARN, LevelFilter::Warn),
        (ERR, LevelFilter::Error),
    ]
    .into_iter()
    .find_map(|(bit, level)| (bits & bit != 0).then_some(level))
    .unwrap_or(LevelFilter::Off)
}

/// Logs to stderr. Without a bitfield the filter is taken from `RUST_LOG`.
pub fn init(debug: Option<u32>) {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(bits) = debug {
        builder.filter_level(level_filter(bits));
    }
    builder.init();
}

#[test]
fn bitfield() {
    assert_eq!(level_filter(0), LevelFilter::Off);
    assert_eq!(level_filter(ERR), LevelFilter::Error);
    assert_eq!(level_filter(ERR | WARN), LevelFilter::Warn);
    assert_eq!(level_filter(7), LevelFilter::Info);
    assert_eq!(level_filter(NOTICE), LevelFilter::Info);
    assert_eq!(level_filter(INFO | ERR), LevelFilter::Debug);
    assert_eq!(level_filter(31), LevelFilter::Trace);
    assert_eq!(level_filter(1 << 5), LevelFilter::Off);
    assert_eq!(level_filter(1023), LevelFilter::Trace);
}
