use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mountvisor::config::{Config, Settings};
use mountvisor::{Bus, LogWriter, LsofProbe, MountProbe, Stack, Subscribe, Supervisor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "mountvisor",
    version,
    about = "Supervises a remote mount, a union overlay on top of it and a cache mover"
)]
struct Cli {
    /// Configuration file (TOML); defaults to ./mountvisor.toml when present
    #[arg(short, long, value_name = "FILE", env = "MOUNTVISOR_CONFIG")]
    config: Option<PathBuf>,

    /// Remote store name, overrides the configuration
    #[arg(short, long, value_name = "NAME")]
    remote: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Mount everything and supervise until interrupted (default)
    Run,
    /// Print the resolved external commands and exit
    Plan,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mountvisor=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn plan(settings: &Settings) {
    let remote = settings.remote_spec();
    let overlay = settings.overlay_spec();
    let unmount = |path: &std::path::Path| settings.tools.unmount.clone().path_arg(path);
    let lsof = |path: &std::path::Path| settings.tools.lsof.clone().path_arg(path);

    println!("platform:        {:?}", settings.platform);
    println!("remote mount:    {}", remote.mount_command());
    println!("overlay mount:   {}", overlay.mount_command());
    println!("remote unmount:  {}", unmount(remote.mount_point()));
    println!("overlay unmount: {}", unmount(overlay.mount_point()));
    println!("busy probe:      {}", lsof(remote.mount_point()));
    println!(
        "move:            (cd {}) {}",
        settings.cache_dir.display(),
        settings.move_command()
    );
    println!("move period:     {}s", settings.schedule.period.as_secs());
    for window in &settings.schedule.windows {
        println!("  from {}  --bwlimit={}", window.start.format("%H:%M"), window.limit);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(remote) = cli.remote {
        config.remote = remote;
    }
    let settings = config.resolve()?;

    if cli.command == Some(Command::Plan) {
        plan(&settings);
        return Ok(());
    }

    tracing::info!(
        remote = %settings.remote,
        remote_mount = %settings.remote_mount.display(),
        overlay_mount = %settings.overlay_mount.display(),
        cache_dir = %settings.cache_dir.display(),
        "starting mountvisor"
    );

    let cfg = settings.supervisor_config();
    let bus = Bus::new(cfg.bus_capacity);
    let probe: Arc<dyn MountProbe> = Arc::new(LsofProbe::new(settings.tools.lsof.clone()));
    let stack = Stack::from_settings(&settings, Arc::clone(&probe), &bus);
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    Supervisor::new(cfg, bus, stack, probe, subscribers)
        .run()
        .await?;

    tracing::info!("mountvisor stopped");
    Ok(())
}
