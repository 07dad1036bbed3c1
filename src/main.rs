//! Live Monitor CLI - spectate a multiplayer rhythm-game room from a terminal.
//!
//! This is the main binary entry point. See the `live_monitor` library for
//! the orchestrator itself; this binary drives it with the headless engine.

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::time::Instant;

    use anyhow::{Context, Result};
    use clap::{Parser, Subcommand};

    use live_monitor::constants::{FRAME_RATE_DELAY, STATUS_PRINT_INTERVAL};
    use live_monitor::headless::HeadlessEngine;
    use live_monitor::{
        FrameOutcome, HttpResourceFetcher, LiveMonitor, MonitorConfig, PlayerId, RenderSurface,
        RoomUser, SurfaceSize,
    };

    /// Nominal viewport reported for every headless scene.
    const HEADLESS_VIEWPORT: SurfaceSize = SurfaceSize::new(1280, 720);

    #[derive(Parser)]
    #[command(name = "live-monitor")]
    #[command(version)]
    #[command(about = "Spectate a live multiplayer rhythm-game room")]
    struct Cli {
        /// Path to the JSON config file (defaults to the platform config dir).
        #[arg(long, global = true)]
        config: Option<PathBuf>,

        #[command(subcommand)]
        command: Commands,
    }

    #[derive(Subcommand)]
    enum Commands {
        /// Join a room and monitor players until Ctrl-C
        Watch {
            /// Room to join
            #[arg(long)]
            room: String,
            /// Player ids to monitor (repeatable)
            #[arg(long = "player")]
            players: Vec<PlayerId>,
            /// Monitor every monitorable player in the room
            #[arg(long)]
            all: bool,
            /// Fetch the resource pack and load it into every scene
            #[arg(long)]
            resources: bool,
        },
        /// Print the resolved configuration
        Status,
    }

    /// Stand-in for a canvas: only remembers its buffer size.
    #[derive(Debug, Default)]
    struct TerminalSurface {
        player: PlayerId,
    }

    impl RenderSurface for TerminalSurface {
        fn set_buffer_size(&self, width: u32, height: u32) {
            log::debug!("Player {} surface buffer is now {width}x{height}", self.player);
        }
    }

    fn load_config(path: Option<PathBuf>) -> Result<MonitorConfig> {
        let path = match path {
            Some(path) => path,
            None => MonitorConfig::default_path()?,
        };
        MonitorConfig::load(Some(&path))
    }

    fn print_roster_changes(before: &[RoomUser], after: &[RoomUser]) {
        for user in after.iter().filter(|u| !before.iter().any(|b| b.id == u.id)) {
            let tag = if user.monitorable { "" } else { " (not monitorable)" };
            println!("+ {} [{}]{tag}", user.display_name, user.id);
        }
        for user in before.iter().filter(|b| !after.iter().any(|u| u.id == b.id)) {
            println!("- {} [{}]", user.display_name, user.id);
        }
    }

    fn start_scene(monitor: &LiveMonitor, player: PlayerId) {
        if monitor.add_scene(player).is_err() {
            return;
        }
        monitor.observe_resize(player, HEADLESS_VIEWPORT);

        let monitor = monitor.clone();
        tokio::task::spawn_local(async move {
            let surface: Rc<dyn RenderSurface> = Rc::new(TerminalSurface { player });
            let outcome = monitor.attach_render_target(player, surface).await;
            log::info!("Scene for player {player}: {outcome:?}");
        });
    }

    async fn watch(
        config: MonitorConfig,
        room: String,
        players: Vec<PlayerId>,
        all: bool,
        resources: bool,
    ) -> Result<()> {
        config.validate()?;
        let auth = config
            .auth()
            .context("No session token; set LIVE_MONITOR_TOKEN")?;
        let endpoint = config.live_endpoint(&auth)?;

        let monitor = LiveMonitor::from_config(Rc::new(HeadlessEngine::new()), &config);
        monitor
            .connect(endpoint, Some(&auth))
            .await
            .context("Failed to connect to relay")?;
        println!("Connected to {}", config.server_url);

        monitor.join_room(&room)?;
        println!("Joining room {room}...");

        if resources {
            match config.resource_base.clone() {
                Some(base) => {
                    let fetcher = HttpResourceFetcher::with_files(base, config.resource_files.clone());
                    let monitor = monitor.clone();
                    tokio::task::spawn_local(async move {
                        if let Err(e) = monitor.load_resource_pack(&fetcher).await {
                            eprintln!("Resource pack unavailable: {e}");
                        }
                    });
                }
                None => eprintln!("--resources ignored: resource_base is not configured"),
            }
        }

        let wanted: HashSet<PlayerId> = players.into_iter().collect();
        let mut attempted: HashSet<PlayerId> = HashSet::new();
        let mut known: Vec<RoomUser> = Vec::new();

        let started = Instant::now();
        let mut frames = tokio::time::interval(FRAME_RATE_DELAY);
        let mut summary = tokio::time::interval(STATUS_PRINT_INTERVAL);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    println!("Shutting down...");
                    break;
                }
                _ = frames.tick() => {
                    let now_ms = started.elapsed().as_secs_f64() * 1000.0;
                    if monitor.frame(now_ms) == FrameOutcome::ConnectionLost {
                        anyhow::bail!("Connection to relay lost");
                    }

                    let roster = monitor.roster();
                    print_roster_changes(&known, &roster);
                    attempted.retain(|id| roster.iter().any(|u| u.id == *id));

                    for user in &roster {
                        let selected = if all { user.monitorable } else { wanted.contains(&user.id) };
                        if selected && attempted.insert(user.id) {
                            start_scene(&monitor, user.id);
                        }
                    }
                    known = roster;
                }
                _ = summary.tick() => {
                    let status = monitor.status();
                    println!(
                        "[{}] {} member(s), {} scene(s), {} frame(s){}",
                        status.connection,
                        status.roster.len(),
                        status.scenes.len(),
                        status.frames,
                        status.last_error.map(|e| format!(", last error: {e}")).unwrap_or_default(),
                    );
                }
            }
        }

        if let Err(e) = monitor.leave_room() {
            log::debug!("Leave on shutdown failed: {e}");
        }
        monitor.disconnect();
        Ok(())
    }

    fn status(config: &MonitorConfig) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(config)?);
        match config.auth() {
            Some(auth) => {
                let endpoint = config.live_endpoint(&auth)?;
                let base = endpoint.ws_url.split('?').next().unwrap_or_default();
                println!("token: set");
                println!("live endpoint: {base}");
            }
            None => println!("token: not set (LIVE_MONITOR_TOKEN)"),
        }
        if let Err(e) = config.validate() {
            println!("invalid: {e}");
        }
        Ok(())
    }

    pub fn run() -> Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .init();

        let cli = Cli::parse();
        let config = load_config(cli.config)?;

        match cli.command {
            Commands::Watch {
                room,
                players,
                all,
                resources,
            } => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context("Failed to build async runtime")?;
                let local = tokio::task::LocalSet::new();
                local.block_on(&runtime, watch(config, room, players, all, resources))
            }
            Commands::Status => status(&config),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    cli::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
