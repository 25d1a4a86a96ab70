//! Tracing setup for the binary
//!
//! `RUST_LOG` wins when set; otherwise `--debug` and `--verbose` pick the
//! default level. Output goes to stderr so it never mixes with tool output
//! captured from stdout.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn default_directive(verbose: bool, debug: bool) -> &'static str {
    if debug {
        "ewfwizard=debug,ewfacquire=debug"
    } else if verbose {
        "ewfwizard=info,ewfacquire=warn"
    } else {
        "ewfwizard=warn,ewfacquire=warn"
    }
}

/// Installs the global subscriber; a second call is a no-op
pub fn init(verbose: bool, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, debug)));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(debug)
            .with_line_number(debug)
            .compact(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert!(default_directive(false, true).contains("debug"));
        assert!(default_directive(true, false).starts_with("ewfwizard=info"));
        assert!(default_directive(false, false).starts_with("ewfwizard=warn"));
    }

    #[test]
    fn test_init_twice() {
        init(false, false);
        init(true, true);
    }
}
