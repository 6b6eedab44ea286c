mod app;
mod camera;
mod error;
mod scene;
mod util;

use std::path::PathBuf;

use clap::Parser;

use scene::mesh::Topology;

/// Software rasterizer for a single textured, normal-mapped mesh.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Window width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Window height in pixels
    #[arg(long, default_value_t = 800)]
    height: u32,

    /// Directory holding the mesh and the vehicle_*.png maps
    #[arg(short = 'p', long, default_value = "resources")]
    asset_path: PathBuf,

    /// OBJ file inside the asset directory
    #[arg(short, long, default_value = "vehicle.obj")]
    mesh: String,

    /// How the mesh indices are submitted
    #[arg(short, long, value_enum, default_value_t = Topology::TriangleList)]
    topology: Topology,

    /// Log FPS from the start (toggle with F11)
    #[arg(long)]
    print_fps: bool,

    /// Mesh rotation speed in degrees per second
    #[arg(long, default_value_t = 45.0)]
    rotation_speed: f32,

    /// Worker threads for banded rasterization, 1 rasterizes on the main thread
    #[arg(short = 'j', long, default_value_t = 1)]
    threads: usize,

    /// Render N frames without a window and save the last one
    #[arg(long, value_name = "N")]
    headless: Option<u32>,

    /// Output image for headless mode
    #[arg(short, long, default_value = "frame.png")]
    output: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[show_image::main]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let params = app::Params {
        width: args.width,
        height: args.height,
        print_fps: args.print_fps,
        asset_path: args.asset_path,
        mesh_file: args.mesh,
        topology: args.topology,
        rotation_speed: args.rotation_speed,
        threads: args.threads,
        headless_frames: args.headless,
        output: args.output,
    };

    app::run(params)?;

    return Ok(());
}
