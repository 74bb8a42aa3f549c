use color_eyre::eyre::Result;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    registry::Registry,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use super::{LogConfig, LOG_FILENAME};

/// One formatted output, filtered independently of the others.
pub(super) type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// How an output renders events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Style {
    Json,
    Plain { ansi: bool },
}

impl Style {
    fn for_config(config: &LogConfig, terminal: bool) -> Self {
        if config.json_format {
            Self::Json
        } else {
            Self::Plain { ansi: terminal }
        }
    }
}

/// Directive used when `RUST_LOG` is unset.
pub(super) fn filter_directive(level: Level) -> String {
    format!("ordersync={}", level.as_str().to_ascii_lowercase())
}

pub(super) fn output_layer<W>(writer: W, style: Style, level: Level) -> OutputLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));
    let layer = fmt::layer::<Registry>()
        .with_writer(writer)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    match style {
        Style::Json => layer
            .json()
            .with_current_span(true)
            .with_filter(filter)
            .boxed(),
        Style::Plain { ansi } => layer.with_ansi(ansi).with_filter(filter).boxed(),
    }
}

/// Install the global subscriber: a rolling file under `config.log_dir`
/// plus stderr, leaving stdout to command output.
pub fn init_logging(config: LogConfig) -> Result<()> {
    std::fs::create_dir_all(&config.log_dir)?;
    let file = RollingFileAppender::new(config.rotation.clone(), &config.log_dir, LOG_FILENAME);

    let outputs = vec![
        output_layer(file, Style::for_config(&config, false), config.log_level),
        output_layer(
            std::io::stderr,
            Style::for_config(&config, true),
            config.log_level,
        ),
    ];
    tracing_subscriber::registry()
        .with(outputs)
        .with(ErrorLayer::default())
        .try_init()?;
    Ok(())
}

/// Parse rotation period from string.
#[must_use]
pub fn parse_rotation(s: &str) -> Rotation {
    match s.to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}
