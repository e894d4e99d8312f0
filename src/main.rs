//! Headless world driver
//!
//! Builds a world, loads the spawn area, walks an observer east while
//! streaming chunks, and drops a test body through the collision grid.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glam::{IVec2, Vec2};

use blockstream::{Aabb, LogProgress, TILE_SIZE, World, WorldConfig};

/// Procedural 2D block world streamer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// World seed (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,

    /// TOML file with world settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Observer updates to run after the initial load
    #[arg(long, default_value_t = 64)]
    steps: u32,

    /// Blocks the observer moves east per update
    #[arg(long, default_value_t = 8)]
    step_blocks: i32,

    /// Print an ASCII strip of the terrain around spawn
    #[arg(long, default_value_t = false)]
    map: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> blockstream::Result<()> {
    let mut config = match &args.config {
        Some(path) => WorldConfig::load(path)?,
        None => WorldConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let world = World::new(config)?;
    world.initial_load(&LogProgress);

    let spawn = world.spawn_point();
    let body_size = IVec2::new(12, 28);
    let mut body = Aabb::new(spawn.entity_position(body_size), body_size);
    body.position.y -= (4 * TILE_SIZE) as f32;
    for _ in 0..60 {
        body.velocity.y = (body.velocity.y + 0.6).min(TILE_SIZE as f32);
        world.step_body(&mut body);
    }
    tracing::info!(
        x = body.position.x,
        y = body.position.y,
        on_ground = body.on_ground,
        "test body settled"
    );

    if args.map {
        print_map(&world, spawn.block_x, spawn.block_y);
    }

    let mut observer = spawn.position;
    let stride = (args.step_blocks * TILE_SIZE) as f32;
    for _ in 0..args.steps {
        observer += Vec2::new(stride, 0.0);
        world.update_observer(observer);
    }
    world.poll();

    let stats = world.stats();
    println!("seed              {}", stats.seed);
    println!("spawn             ({}, {})", spawn.block_x, spawn.block_y);
    println!("loaded chunks     {}", stats.loaded_chunks);
    println!("in flight         {}", stats.in_flight);
    println!("chunks generated  {}", stats.chunks_generated);
    println!("chunks discarded  {}", stats.chunks_discarded);
    println!("chunks evicted    {}", stats.chunks_evicted);
    println!("grid rebuilds     {}", stats.grid_rebuilds);
    println!("memoized columns  {}", stats.memoized_columns);

    world.shutdown();
    Ok(())
}

fn print_map(world: &World, center_x: i32, center_y: i32) {
    const HALF_WIDTH: i32 = 48;
    const ABOVE: i32 = 12;
    const BELOW: i32 = 20;

    for y in center_y - ABOVE..=center_y + BELOW {
        let row: String = (center_x - HALF_WIDTH..=center_x + HALF_WIDTH)
            .map(|x| {
                if (x, y) == (center_x, center_y) {
                    '@'
                } else {
                    world.get_block(x, y).glyph()
                }
            })
            .collect();
        println!("{row}");
    }
}
