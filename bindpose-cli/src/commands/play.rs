//! `bindpose play`: playback clock simulation

use anyhow::{Context, Result, bail};
use bindpose::{
    Frame, PackOptions, PlaybackClock, PlaybackConfig, PlaybackDirection, VertexSkin,
    pack_skinning_buffers, resolve_bind_poses,
};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use super::{AnimationArgs, load_mesh};

#[derive(Args, Debug)]
pub struct PlayArgs {
    #[command(flatten)]
    pub animation: AnimationArgs,

    /// Mesh JSON file (offsets are computed without skin data if omitted)
    #[arg(long)]
    pub mesh_file: Option<PathBuf>,

    /// Playback rate in frames per second
    #[arg(long, env = "BINDPOSE_FPS", default_value_t = 1.0)]
    pub fps: f64,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 10)]
    pub ticks: u32,

    /// Milliseconds per tick (defaults to just over one frame time)
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Play backwards
    #[arg(long)]
    pub reverse: bool,
}

pub fn execute(args: PlayArgs) -> Result<()> {
    let loaded = args.animation.load()?;
    let skins = match &args.mesh_file {
        Some(path) => load_mesh(path, &loaded.mesh)?.skins(),
        None => Vec::<VertexSkin>::new(),
    };

    let table = resolve_bind_poses(
        &loaded.armature,
        &loaded.action,
        &args.animation.resolve_options(),
    )
    .context("Failed to resolve bind poses")?;
    let (_, mesh) = pack_skinning_buffers(&loaded.armature, &table, &skins, &PackOptions::default())
        .context("Failed to pack skinning buffers")?;

    let frames = mesh.animation().frames();
    let (Some(&start_frame), Some(&end_frame)) = (frames.first(), frames.last()) else {
        bail!("Action '{}' has no frames to play", loaded.action.name());
    };

    let config = PlaybackConfig {
        start_frame,
        end_frame,
        fps: args.fps,
        direction: if args.reverse {
            PlaybackDirection::Reverse
        } else {
            PlaybackDirection::Forward
        },
    };
    let mut clock = PlaybackClock::new(config).context("Invalid playback settings")?;

    let tick = Duration::from_millis(
        args.tick_ms
            .unwrap_or_else(|| clock.frame_time_ms().floor() as u64 + 1),
    );

    println!(
        "Playing '{}' frames {}..={} at {} fps, {} ms per tick",
        loaded.action.name(),
        start_frame,
        end_frame,
        args.fps,
        tick.as_millis()
    );
    print_tick(0, clock.current_frame(), &clock.offsets_for(&mesh).to_array());

    for i in 1..=args.ticks {
        let frame = clock.tick(tick);
        print_tick(i, frame, &clock.offsets_for(&mesh).to_array());
    }

    Ok(())
}

fn print_tick(tick: u32, frame: Frame, offsets: &[f32; 6]) {
    println!("tick {tick:>3}: frame {frame:>4}  offsets {offsets:?}");
}
