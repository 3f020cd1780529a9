//! Tracing configuration and initialization.

use tracing_subscriber::{
    EnvFilter,
    fmt::format::FmtSpan,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

enum TrcMode {
    /// Compact, colorful output for interactive use.
    Pretty,
    /// Plain verbose output with span enter/close events.
    Plain,
}

pub struct Trc {
    mode: TrcMode,
    env_filter: EnvFilter,
}

impl Default for Trc {
    fn default() -> Self {
        let maybe_env_filter =
            EnvFilter::try_from_env("DSGATE_LOG").or_else(|_| EnvFilter::try_from_default_env());

        match maybe_env_filter {
            Ok(env_filter) => Self {
                // An explicit filter means someone is debugging; show them everything.
                mode: TrcMode::Plain,
                env_filter,
            },
            Err(_) => Self {
                mode: TrcMode::Pretty,
                env_filter: EnvFilter::new("info"),
            },
        }
    }
}

impl Trc {
    pub fn init(self) -> Result<(), TryInitError> {
        match self.mode {
            TrcMode::Plain => tracing_subscriber::registry()
                .with(self.env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE),
                )
                .try_init(),
            TrcMode::Pretty => tracing_subscriber::registry()
                .with(self.env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .without_time()
                        .compact(),
                )
                .try_init(),
        }
    }
}
