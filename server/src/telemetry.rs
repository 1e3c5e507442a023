// server/src/telemetry.rs
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber: INFO by default, `RUST_LOG` overrides,
/// and span-close events so request durations show up.
pub fn init_tracing() {
  tracing_subscriber::fmt()
    .with_env_filter(default_filter())
    .with_span_events(FmtSpan::CLOSE)
    .init();
}

fn default_filter() -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
  use super::default_filter;
  use tracing::level_filters::LevelFilter;

  #[test]
  fn info_is_the_default_level() {
    if std::env::var_os("RUST_LOG").is_none() {
      assert_eq!(default_filter().max_level_hint(), Some(LevelFilter::INFO));
    }
  }
}
