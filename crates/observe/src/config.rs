use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone)]
pub struct Config {
    /// Filters spans and events based on a set of filter directives
    /// https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
    pub(crate) env_filter: String,
    /// Events at this level or more severe get written to stderr, everything
    /// else goes to stdout. `off` writes everything to stdout.
    pub(crate) stderr_threshold: LevelFilter,
}

impl Config {
    pub fn new(env_filter: &str, stderr_threshold: LevelFilter) -> Self {
        Self {
            env_filter: env_filter.into(),
            stderr_threshold,
        }
    }
}
