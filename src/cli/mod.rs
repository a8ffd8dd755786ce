//! CLI subcommand implementations for the netsieve binary.

pub mod capture_cmd;
pub mod doctor;
pub mod output;
pub mod serve_cmd;

/// Initialize tracing for a CLI command.
///
/// Default directive is `netsieve=info`, raised to `debug` when the
/// `--verbose` flag (propagated via `NETSIEVE_VERBOSE`) is set; `RUST_LOG`
/// still takes precedence through the env filter.
pub fn init_tracing() {
    let directive = if std::env::var("NETSIEVE_VERBOSE").is_ok() {
        "netsieve=debug"
    } else {
        "netsieve=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap()),
        )
        .init();
}
