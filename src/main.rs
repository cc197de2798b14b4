use std::{net::IpAddr, path::PathBuf, time::Duration};

use clap::Parser;
use lanshare::{config::DEFAULT_PORT, Preferences, ServerConfig, ShareServer};
use tracing::{error, info, warn};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

// --- Configuration ---
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory to share; defaults to the one shared last time
    #[arg(short, long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind to
    #[arg(short, long, value_name = "ADDR", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Directory served under /static
    #[arg(long, value_name = "DIR", default_value = "static")]
    static_dir: PathBuf,

    /// Seconds to wait for in-flight requests when stopping
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    grace_secs: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::INFO.into())),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let prefs_path = Preferences::default_path();
    let mut prefs = Preferences::load_from(&prefs_path);

    let Some(root_dir) = args.dir.or_else(|| prefs.upload_dir.clone()) else {
        eprintln!("Error: no directory to share. Pass one with --dir.");
        std::process::exit(2);
    };

    let server = ShareServer::new(ServerConfig {
        bind_ip: args.bind,
        port: args.port,
        static_dir: args.static_dir,
        shutdown_grace: Duration::from_secs(args.grace_secs),
    });

    if let Err(e) = server.start(&root_dir).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    prefs.upload_dir = Some(root_dir);
    if let Err(e) = prefs.save_to(&prefs_path) {
        warn!("Failed to save preferences to {}: {}", prefs_path.display(), e);
    }

    if let Some(url) = server.base_url().await {
        info!("Share URL: {}", url);
        println!("Sharing at {}", url);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutting down...");
    server.stop().await;
}
