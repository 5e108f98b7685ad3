mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands};
use pc_collector::{Collector, HttpUpstream};
use pc_core::config::{Config, DEFAULT_CONFIG_PATH};
use pc_core::DelayPlanner;
use pc_server::AppContext;
use pc_store::{FragmentStore, FsStore};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            concat!(
                "playcast_relay=trace,pc_collector=trace,pc_server=debug,",
                "pc_store=debug,pc_core=debug,tower_http=debug"
            )
            .to_string()
        } else {
            concat!(
                "playcast_relay=info,pc_collector=info,pc_server=info,",
                "pc_store=info,pc_core=info,tower_http=info"
            )
            .to_string()
        }
    });

    // Logs go to stderr so `plan` output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run { host, port } => {
            let config = with_listen(load_config(config_path)?, host, port);
            runtime()?.block_on(run_relay(config))
        }
        Commands::Collect => {
            let config = load_config(config_path)?;
            runtime()?.block_on(collect_only(config))
        }
        Commands::Serve { host, port } => {
            let config = with_listen(load_config(config_path)?, host, port);
            runtime()?.block_on(serve_only(config))
        }
        Commands::Plan { current, delay } => {
            let config = load_config(config_path)?;
            runtime()?.block_on(print_plan(config, current, delay))
        }
        Commands::Validate => validate_config(config_path),
        Commands::Version => {
            println!("playcast-relay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start tokio runtime")
}

/// An explicit `--config` must load; the default path may be absent.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(p) => Config::load(p)?,
        None => Config::load_or_default(None),
    };
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }
    Ok(config)
}

/// Apply `--host`/`--port` over the configured listen address.
fn with_listen(mut config: Config, host: Option<String>, port: Option<u16>) -> Config {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config
}

async fn open_store(config: &Config, clear: bool) -> Result<Arc<FsStore>> {
    let dir = &config.store.directory;
    let store = FsStore::open(dir)
        .await
        .with_context(|| format!("cannot open store at {}", dir.display()))?;
    if clear {
        store.clear().await?;
    }
    tracing::info!("Fragment store at {}", dir.display());
    Ok(Arc::new(store))
}

/// Open the store and bootstrap a collector. Bootstrap failure is fatal.
async fn start_collector(
    config: &Config,
    store: Arc<FsStore>,
    cancel: CancellationToken,
) -> Result<Collector> {
    config.require_upstream()?;
    let upstream = Arc::new(HttpUpstream::from_config(&config.upstream)?);
    tracing::info!("Upstream feed at {}", upstream.base_url());

    let collector = Collector::bootstrap(upstream, store, cancel)
        .await
        .context("cannot start without a sync record")?;
    Ok(collector.with_ready_threshold(config.delay.fragments))
}

async fn run_relay(config: Config) -> Result<()> {
    let store = open_store(&config, config.store.clear_on_start).await?;
    let cancel = CancellationToken::new();

    let collector = start_collector(&config, store.clone(), cancel.clone()).await?;
    let collector_handle = tokio::spawn(collector.run());

    let listener = pc_server::bind(&config.server.host, config.server.port).await?;
    let ctx = AppContext::new(config, store, cancel.clone());
    let served = pc_server::serve(ctx, listener, cancel.clone()).await;

    tracing::info!("Shutting down...");
    cancel.cancel();
    if let Err(e) = collector_handle.await {
        tracing::error!("Collector task failed: {e}");
    }

    served.map_err(Into::into)
}

async fn collect_only(config: Config) -> Result<()> {
    let store = open_store(&config, config.store.clear_on_start).await?;
    let cancel = CancellationToken::new();

    let collector = start_collector(&config, store, cancel.clone()).await?;
    let collector_handle = tokio::spawn(collector.run());

    pc_server::shutdown_signal(cancel).await;
    collector_handle.await.context("collector task failed")?;
    Ok(())
}

async fn serve_only(config: Config) -> Result<()> {
    let store = open_store(&config, false).await?;
    let cancel = CancellationToken::new();

    let listener = pc_server::bind(&config.server.host, config.server.port).await?;
    let ctx = AppContext::new(config, store, cancel.clone());
    pc_server::serve(ctx, listener, cancel).await?;
    Ok(())
}

async fn print_plan(config: Config, current: Option<u64>, delay: Option<u64>) -> Result<()> {
    let store = open_store(&config, false).await?;
    let Some(sync) = store.sync().await? else {
        anyhow::bail!(
            "no sync record in {}; run the collector first",
            config.store.directory.display()
        );
    };

    let current = match current {
        Some(n) => n,
        None => store
            .current()
            .await?
            .unwrap_or_else(|| u64::try_from(sync.fragment).unwrap_or(0)),
    };

    let planner = match delay {
        Some(fragments) => DelayPlanner::new(
            fragments,
            Duration::from_secs(config.delay.safety_margin_secs),
        ),
        None => DelayPlanner::from(&config.delay),
    };

    let plan = planner.plan(&sync, current)?;
    let delayed = planner.delayed_sync(&sync, &plan);

    println!("{}", serde_json::to_string_pretty(&delayed)?);
    if plan.catch_up {
        eprintln!(
            "buffer short by {} fragments: wait {}s, resume at fragment {}",
            plan.deficit,
            plan.wait.as_secs(),
            plan.resume_fragment
        );
    } else {
        eprintln!(
            "no wait: resume at fragment {} (tick {})",
            plan.resume_fragment, plan.resume_tick
        );
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    println!("Validating config: {}", path.display());

    let config = Config::load(path)?;
    println!("✓ Configuration is valid");
    println!("  Upstream: {}", display_or_unset(&config.upstream.url));
    println!("  Store: {}", config.store.directory.display());
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!(
        "  Delay: {} fragments (+{}s margin)",
        config.delay.fragments, config.delay.safety_margin_secs
    );

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("Warnings:");
        for warning in warnings {
            println!("  - {warning}");
        }
    }
    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}
