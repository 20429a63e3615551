// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Pick the effective log level.
///
/// `quiet` wins over everything and clamps output to warnings. Otherwise the
/// given level is used, falling back to INFO if it is None or invalid.
pub fn resolve_level(log_level: Option<&str>, quiet: bool) -> Level {
    if quiet {
        return Level::WARN;
    }
    log_level
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

/// Initialize logging for the process.
pub fn init_logging(log_level: Option<&str>, quiet: bool) {
    FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(resolve_level(log_level, quiet))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level() {
        assert_eq!(resolve_level(None, false), Level::INFO);
        assert_eq!(resolve_level(Some("debug"), false), Level::DEBUG);
        assert_eq!(resolve_level(Some("bogus"), false), Level::INFO);
        assert_eq!(resolve_level(Some("trace"), true), Level::WARN);
    }
}
