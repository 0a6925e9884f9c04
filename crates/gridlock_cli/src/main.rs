//! Gridlock CLI
//!
//! Local driver for the arbitration engine: `demo` floods a session with
//! bot claims (useful for eyeballing rejections, rankings, and the
//! snapshot writer), `inspect` summarizes a snapshot file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::Rng;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use gridlock_core::save::load_from_path;
use gridlock_core::{
    Audience, ClientCommand, Connection, EngineConfig, GridSession, ServerEvent,
    DEFAULT_LEADERBOARD_LIMIT,
};

#[derive(Parser)]
#[command(name = "gridlock")]
#[command(about = "Drive and inspect the Gridlock arbitration engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a local bot-driven session against a fresh engine
    Demo {
        /// Grid side length
        #[arg(long, default_value_t = 20)]
        size: u16,

        /// Number of bot actors
        #[arg(long, default_value_t = 4)]
        bots: usize,

        /// Claim rounds to run (every bot attempts once per round)
        #[arg(long, default_value_t = 10)]
        rounds: u32,

        /// Per-actor cooldown in milliseconds
        #[arg(long, default_value_t = 100)]
        cooldown_ms: u64,

        /// Per-cell lock in milliseconds
        #[arg(long, default_value_t = 1_000)]
        lock_ms: u64,

        /// Snapshot file; omit to run without persistence
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Print a summary of a snapshot file
    Inspect {
        /// Snapshot file path
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo { size, bots, rounds, cooldown_ms, lock_ms, save } => {
            run_demo(size, bots, rounds, cooldown_ms, lock_ms, save)
        }
        Commands::Inspect { file } => inspect(&file),
    }
}

fn run_demo(
    size: u16,
    bots: usize,
    rounds: u32,
    cooldown_ms: u64,
    lock_ms: u64,
    save: Option<PathBuf>,
) -> Result<()> {
    let session = GridSession::new(EngineConfig {
        grid_size: size,
        cooldown_ms,
        lock_ms,
        save_debounce_ms: 250,
        save_path: save,
    });

    let mut rng = rand::thread_rng();

    let connections: Vec<Connection> = (1..=bots)
        .map(|i| Connection::new(format!("bot-{}", i), random_color(&mut rng)))
        .collect();

    for (i, conn) in connections.iter().enumerate() {
        session.handle(conn, ClientCommand::Join { display_name: format!("Bot {}", i + 1) });
    }
    println!("🤖 {} bots joined a {}x{} grid", bots, size, size);

    let mut captures = 0u32;
    let mut rejections = 0u32;

    for _ in 0..rounds {
        for conn in &connections {
            // Aim slightly past the edge now and then so boundary
            // rejections show up in the mix
            let x = rng.gen_range(-1..i32::from(size) + 1);
            let y = rng.gen_range(-1..i32::from(size) + 1);

            for (audience, event) in session.handle(conn, ClientCommand::Claim { x, y }) {
                match (audience, event) {
                    (Audience::Everyone, ServerEvent::OwnershipUpdate { cell }) => {
                        captures += 1;
                        println!("  ⚡ {} took {}", cell.owner_id, cell.coord);
                    }
                    (Audience::Requester, ServerEvent::ClaimRejected { reason, x, y }) => {
                        rejections += 1;
                        println!("  ✋ {} at ({}, {}): {}", conn.actor_id, x, y, reason);
                    }
                    _ => {}
                }
            }
        }

        // Let cooldowns breathe between rounds
        std::thread::sleep(Duration::from_millis(cooldown_ms));
    }

    println!("\n=== {} captures, {} rejections ===", captures, rejections);
    println!("🏆 Leaderboard:");
    let board = session.with_engine(|engine| engine.leaderboard(DEFAULT_LEADERBOARD_LIMIT));
    for (rank, actor) in board.iter().enumerate() {
        println!("  {}. {} - {} cells", rank + 1, actor.display_name, actor.score);
    }

    // Push the pending snapshot out before the process exits
    session.with_engine(|engine| engine.flush());

    Ok(())
}

fn inspect(file: &PathBuf) -> Result<()> {
    let save = load_from_path(file)
        .with_context(|| format!("failed to read snapshot {}", file.display()))?;

    println!("Snapshot: {}", file.display());
    println!("  Version:  {}", save.version);
    println!("  Written:  {}", format_timestamp(save.timestamp));
    println!("  Cells:    {}", save.cells.len());

    let mut per_owner: HashMap<&str, u32> = HashMap::new();
    for cell in &save.cells {
        *per_owner.entry(cell.owner_id.as_str()).or_default() += 1;
    }

    let mut owners: Vec<(&str, u32)> = per_owner.into_iter().collect();
    owners.sort_by(|a, b| b.1.cmp(&a.1));

    println!("  Owners:   {}", owners.len());
    for (owner, count) in owners {
        println!("    {} - {} cells", owner, count);
    }

    Ok(())
}

fn random_color(rng: &mut impl Rng) -> String {
    let hue = rng.gen_range(0..360);
    format!("hsl({}, 70%, 60%)", hue)
}

fn format_timestamp(millis: u64) -> String {
    use time::{format_description::well_known::Rfc3339, OffsetDateTime};

    OffsetDateTime::from_unix_timestamp_nanos((millis as i128) * 1_000_000)
        .ok()
        .and_then(|ts| ts.format(&Rfc3339).ok())
        .unwrap_or_else(|| "unknown".to_string())
}
