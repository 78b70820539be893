use std::fmt::Display;
use std::sync::LazyLock;
use std::time::Duration;

use console::Style;
use indicatif::ProgressStyle;

use crate::progress::Mode;

const ANSI_BLUE: Style = Style::new().blue();

static STYLE_SINGLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed}] {msg:32} [{bar:30.green/white}] {percent:>3}%")
        .expect("Error setting progress bar template")
        .progress_chars("█▓░")
});

static STYLE_MULTI: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("{msg:32} [{bar:30.cyan/blue}] {percent:>3}%")
        .expect("Error setting progress bar template")
        .progress_chars("█▓░")
});

pub(crate) fn style_stage(mode: Mode) -> ProgressStyle {
    match mode {
        Mode::Single => STYLE_SINGLE.clone(),
        Mode::Multi => STYLE_MULTI.clone(),
    }
}

pub fn as_overhead(elapsed: Duration) -> impl Display {
    let f = format!("(+{}ms)", elapsed.as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Installs the global subscriber: formatted log lines filtered by
/// `RUST_LOG` (or `verbosity` when unset), and progress bars for this
/// crate's task spans.
#[cfg(feature = "logging")]
pub fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    use tracing_indicatif::IndicatifLayer;
    use tracing_subscriber::filter::{EnvFilter, filter_fn};
    use tracing_subscriber::prelude::*;

    let fallback = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let indicatif = IndicatifLayer::new();
    let fmt = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(indicatif.get_stderr_writer())
        .with_filter(filter);

    let crate_name = env!("CARGO_CRATE_NAME");
    let bars = indicatif.with_filter(filter_fn(move |meta| {
        meta.is_span() && meta.target().starts_with(crate_name)
    }));

    tracing_subscriber::registry().with(fmt).with(bars).try_init()?;

    Ok(())
}
