/// `client-id` of the optimizer-side connections.
pub const DAKOTA_CLIENT_ID: &str = "dakota_consumer";
/// `client-id` of the listener's connection.
pub const KEPLER_CLIENT_ID: &str = "kepler_consumer";
/// `client-id` of one-shot reporting commands.
pub const REPORT_CLIENT_ID: &str = "camm_report";
pub const MONITOR_CLIENT_ID: &str = "camm_monitor";

/// Reporting user when neither `--user` nor `$USER` is available.
pub const FALLBACK_USER: &str = "camm";
