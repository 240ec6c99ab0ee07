use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use spooky_assets::WorldDef;
use spooky_kernel::{ObjectKind, World};
use spooky_server::{Command, GameServer, ServerConfig, Session};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spooky-cli", about = "CLI tool for Spooky School worlds")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Build a world file and report whether it is valid
    Validate {
        world: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List the areas of a world file with their contents
    Inspect {
        world: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Drive a world from `<player> <command>` lines on stdin
    Play {
        world: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// NPC ticks to run after every input line
        #[arg(short, long, default_value = "1")]
        ticks_per_command: u32,
        /// Print every bundle as a JSON line instead of text
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

fn load_world(path: &Path, config: &ServerConfig) -> anyhow::Result<World> {
    WorldDef::load(path)
        .and_then(|def| def.build(config.rules.clone()))
        .with_context(|| format!("building world {}", path.display()))
}

fn inspect(world: &World) {
    println!("{}", world.summary());
    for area in world.areas().iter() {
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for occupant in area.grid().tiles().filter_map(|t| t.occupant()) {
            let kind = match occupant.kind() {
                ObjectKind::Player => "players",
                ObjectKind::Npc => "npcs",
                ObjectKind::Door => "doors",
                ObjectKind::Movable => "movables",
                ObjectKind::Item => "items",
                ObjectKind::Fixture => "fixtures",
            };
            *counts.entry(kind).or_default() += 1;
        }
        let owner = area.owner().map_or("-".to_string(), |o| o.to_string());
        let contents: Vec<String> = counts.iter().map(|(k, n)| format!("{k}={n}")).collect();
        println!(
            "  {:<12} {:>3}x{:<3} owner={:<8} {}",
            area.name(),
            area.grid().width(),
            area.grid().height(),
            owner,
            contents.join(" ")
        );
    }
}

fn print_bundles(session: &Session, json: bool) -> anyhow::Result<()> {
    let name = session.name();
    for bundle in session.drain() {
        if json {
            println!("{}", serde_json::to_string(&bundle)?);
            continue;
        }
        if let Some(message) = &bundle.message {
            println!("[{name}] {message}");
        }
        for line in &bundle.log {
            println!("[{name}] log: {line}");
        }
    }
    Ok(())
}

fn play(server: &GameServer, ticks_per_command: u32, json: bool) -> anyhow::Result<()> {
    let mut sessions: BTreeMap<String, Session> = BTreeMap::new();
    let stdin = std::io::stdin();
    for (number, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((player, rest)) = line.split_once(char::is_whitespace) else {
            eprintln!("line {}: expected `<player> <command>`", number + 1);
            continue;
        };
        let rest = rest.trim();

        if rest.eq_ignore_ascii_case("JOIN") {
            match server.connect(player)? {
                Some(session) => {
                    sessions.insert(player.to_string(), session);
                }
                None => println!("[{player}] could not join"),
            }
        } else if !sessions.contains_key(player) {
            eprintln!("line {}: {player} has not joined", number + 1);
            continue;
        } else {
            match rest.parse::<Command>() {
                Ok(command) => {
                    let leaving = command == Command::Leave;
                    server.handle(player, command)?;
                    if leaving {
                        if let Some(session) = sessions.remove(player) {
                            print_bundles(&session, json)?;
                        }
                    }
                }
                Err(err) => {
                    eprintln!("line {}: {err}", number + 1);
                    continue;
                }
            }
        }

        for _ in 0..ticks_per_command {
            server.tick()?;
        }
        for session in sessions.values() {
            print_bundles(session, json)?;
        }
    }
    println!("{}", server.summary());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info => {
            println!("spooky-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("kernel: tick={}", World::default().tick());
            println!("assets: {}", spooky_assets::crate_info());
            println!("server: {}", spooky_server::crate_info());
        }
        Commands::Validate { world, config } => {
            let config = load_config(config.as_deref())?;
            match load_world(&world, &config) {
                Ok(built) => println!("OK: {}", built.summary()),
                Err(err) => bail!("invalid world: {err:#}"),
            }
        }
        Commands::Inspect { world, config } => {
            let config = load_config(config.as_deref())?;
            inspect(&load_world(&world, &config)?);
        }
        Commands::Play {
            world,
            config,
            ticks_per_command,
            json,
        } => {
            let config = load_config(config.as_deref())?;
            let server = GameServer::new(load_world(&world, &config)?, config);
            play(&server, ticks_per_command, json)?;
        }
    }

    Ok(())
}
