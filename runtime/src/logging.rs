//! Tracing subscriber setup.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber: `RUST_LOG` directives plus a default
/// level for this crate (debug when `verbose`).
pub fn init(json: bool, verbose: bool) {
    let default_directive = if verbose {
        "makerwatch=debug"
    } else {
        "makerwatch=info"
    };
    let filter = EnvFilter::from_default_env().add_directive(
        default_directive
            .parse()
            .unwrap_or_else(|_| LevelFilter::INFO.into()),
    );

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = installed {
        eprintln!("  logging already initialized: {e}");
    }
}
