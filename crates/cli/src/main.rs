use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use gst_contracts::settings::{self, ConfigError, Settings};
use gst_server::config::ServerConfig;
use gst_warehouse::{MOCK_DATA_PATH_KEY, MySqlSettings, ProviderOptions, new_provider, tsv};
use tracing_subscriber::EnvFilter;

mod args;

use args::{Cli, Commands, ExportArgs, ServerArgs};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Export(args) => run_export(args).await,
        Commands::Server(args) => run_server(args).await,
    };

    if let Err(err) = result {
        match err.downcast_ref::<ConfigError>() {
            Some(config_err) => eprintln!("STARTUP_ERROR {}", config_err),
            None => eprintln!("error: {:#}", err),
        }
        std::process::exit(1);
    }
}

async fn run_export(args: ExportArgs) -> Result<()> {
    let kv = settings::load()?;
    let provider = new_provider(ProviderOptions::MySql(MySqlSettings::from_kv(&kv)?))?;

    tracing::info!("executing warehouse query; this may take several minutes");
    let started = Instant::now();
    let collection = provider
        .execute()
        .await
        .context("failed to execute warehouse query")?;
    tracing::info!(
        records = collection.len(),
        latency_ms = started.elapsed().as_millis() as u64,
        "retrieved sample records"
    );

    if let Some(parent) = args.output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create output directory {}", parent.display())
        })?;
    }

    tsv::write_tsv_file(&collection, &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    tracing::info!(path = %args.output.display(), "results written");

    Ok(())
}

async fn run_server(args: ServerArgs) -> Result<()> {
    let mut kv = settings::load()?;
    apply_server_flags(&mut kv, &args);

    let config = ServerConfig::from_kv(&kv)?;
    let options = ProviderOptions::from_kv(&kv)?;
    let source = match &options {
        ProviderOptions::MockData(path) => format!("mock:{}", path.display()),
        ProviderOptions::MySql(settings) => format!("mysql:{}/{}", settings.host, settings.database),
    };
    let provider = new_provider(options)?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind dashboard listener on {}", config.bind_addr))?;
    let bind_addr = listener.local_addr().unwrap_or(config.bind_addr);

    tracing::info!(
        bind_addr = %bind_addr,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        source = %source,
        "gst dashboard listening"
    );

    axum::serve(listener, gst_server::http::router(config, provider))
        .await
        .context("dashboard server failed")
}

/// Layers command-line flags over the loaded settings.
fn apply_server_flags(kv: &mut Settings, args: &ServerArgs) {
    if let Some(bind) = args.bind {
        kv.insert("GST_BIND_ADDR".to_string(), bind.to_string());
    }
    if let Some(port) = args.port {
        let addr = settings::parse_socket_addr(kv, "GST_BIND_ADDR", ServerConfig::default().bind_addr)
            .map(|mut addr| {
                addr.set_port(port);
                addr.to_string()
            });
        // An unparsable address is left for ServerConfig to report.
        if let Ok(addr) = addr {
            kv.insert("GST_BIND_ADDR".to_string(), addr);
        }
    }
    if let Some(mock) = &args.mock {
        kv.insert(MOCK_DATA_PATH_KEY.to_string(), path_setting(mock));
    }
    if let Some(ttl) = args.cache_ttl_secs {
        kv.insert("GST_CACHE_TTL_SECS".to_string(), ttl.to_string());
    }
}

fn path_setting(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
