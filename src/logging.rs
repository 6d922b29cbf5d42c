use std::env;
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, Layer, Registry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// Installs the global subscriber.
///
/// `SLURMWATCH_LOG` overrides the filter, `SLURMWATCH_LOG_FORMAT` picks
/// `compact` (default), `pretty` or `json`, and `SLURMWATCH_LOG_FILE` adds a
/// daily-rolling file sink next to stdout.
pub fn init(verbose: bool) {
    let format = parse_format(env::var("SLURMWATCH_LOG_FORMAT").ok().as_deref());
    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(format, std::io::stdout, true)];
    if let Some((writer, guard)) = build_file_writer() {
        layers.push(fmt_layer(format, writer, false));
        let _ = FILE_GUARD.set(guard);
    }

    let result = Registry::default()
        .with(layers)
        .with(build_filter(verbose))
        .try_init();
    if let Err(e) = result {
        eprintln!("logging already initialised: {}", e);
    }
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(ansi)
        .with_writer(writer);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

fn build_filter(verbose: bool) -> EnvFilter {
    match env::var("SLURMWATCH_LOG") {
        Ok(value) => EnvFilter::new(value),
        Err(_) => {
            if verbose {
                EnvFilter::new("debug")
            } else {
                EnvFilter::new("info")
            }
        }
    }
}

fn parse_format(value: Option<&str>) -> LogFormat {
    match value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_ascii_lowercase())
    {
        Some(value) if value == "json" => LogFormat::Json,
        Some(value) if value == "pretty" => LogFormat::Pretty,
        _ => LogFormat::Compact,
    }
}

fn build_file_writer() -> Option<(NonBlocking, WorkerGuard)> {
    let file_path = env::var("SLURMWATCH_LOG_FILE")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())?;

    let path = Path::new(&file_path);
    let file_name = path.file_name()?.to_string_lossy().to_string();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let appender = tracing_appender::rolling::daily(dir, file_name);
    Some(tracing_appender::non_blocking(appender))
}
