use eyre::Result;
use serde::Deserialize;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt,
    prelude::*,
    Layer, Registry,
};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// Multi-line, human oriented
    Pretty,
    /// One JSON object per event
    Json,
    /// Terse single line
    Compact,
    /// The `tracing_subscriber` default format
    #[serde(other)]
    #[default]
    Full,
}

/// Logging level. A "higher level" means more will be logged.
#[derive(Default, Debug, Clone, Copy, Deserialize, PartialOrd, Ord, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Off
    Off = 0,
    /// Error
    Error = 1,
    /// Warn
    Warn = 2,
    /// Debug
    Debug = 4,
    /// Trace
    Trace = 5,
    /// Info
    #[serde(other)]
    #[default]
    Info = 3,
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> LevelFilter {
        match level {
            Level::Off => LevelFilter::OFF,
            Level::Error => LevelFilter::ERROR,
            Level::Warn => LevelFilter::WARN,
            Level::Debug => LevelFilter::DEBUG,
            Level::Trace => LevelFilter::TRACE,
            Level::Info => LevelFilter::INFO,
        }
    }
}

/// Configuration for the tracing subscribers used by the oracle agents
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TracingConfig {
    #[serde(default)]
    fmt: Style,
    #[serde(default)]
    level: Level,
}

impl TracingConfig {
    /// Build the per-target filter: `level` everywhere, with chatty transport
    /// crates held at info unless tracing.
    pub fn targets(&self) -> Targets {
        let mut targets = Targets::new().with_default(self.level);
        if self.level < Level::Trace {
            // only show these debug and trace logs at trace level
            for target in ["hyper", "reqwest", "h2", "tower"] {
                targets = targets.with_target(target, LevelFilter::from(self.level.min(Level::Info)));
            }
        }
        targets
    }

    /// Attempt to instantiate and register a tracing subscriber setup from
    /// settings.
    pub fn start_tracing(&self) -> Result<()> {
        let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match self.fmt {
            Style::Pretty => fmt::layer().pretty().boxed(),
            Style::Json => fmt::layer().json().boxed(),
            Style::Compact => fmt::layer().compact().boxed(),
            Style::Full => fmt::layer().boxed(),
        };
        let err_layer = tracing_error::ErrorLayer::default();

        let subscriber = Registry::default()
            .with(fmt_layer.with_filter(self.targets()))
            .with(err_layer);

        subscriber.try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_values_fall_back_to_defaults() {
        let config: TracingConfig =
            serde_json::from_str(r#"{"fmt": "sparkly", "level": "loud"}"#).unwrap();
        assert_eq!(config.fmt, Style::Full);
        assert_eq!(config.level, Level::Info);
    }

    #[test]
    fn levels_are_ordered_by_verbosity() {
        assert!(Level::Off < Level::Error);
        assert!(Level::Warn < Level::Info);
        assert!(Level::Info < Level::Debug);
        assert!(Level::Debug < Level::Trace);
    }
}
