use anyhow::Context as _;

/// Applied when `RUST_LOG` is unset: everything at info, with the HTTP and
/// HTML-parsing stacks underneath the pipeline quieted down to warnings.
const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,reqwest=warn,html5ever=warn";

pub fn init() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_DIRECTIVES))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
