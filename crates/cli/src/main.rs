#![deny(unsafe_code)]
//! CLI binary for inspecting the clipping-mask pipeline without a GPU.
//!
//! Subcommands:
//! - `variants`: print the 19-entry shader variant catalog
//! - `layout`: show where N clipping contexts land in the mask buffers
//! - `plan <scene>`: print the frame plan for a JSON model snapshot

mod error;

use avatar_gl_core::clipping::layout::{layout_contexts, nominal_capacity};
use avatar_gl_core::frame::sort_by_render_order;
use avatar_gl_core::variant::{catalog, VariantInfo};
use avatar_gl_core::{
    ClippingManager, FrameCommand, FramePlanner, Model, ModelSnapshot, RendererConfig,
};
use clap::{Parser, Subcommand};
use error::CliError;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "avatar-gl", about = "Clipping-mask and shader-variant inspector")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every shader variant with its program and blend factors.
    Variants,
    /// Lay out N clipping contexts over B mask buffers.
    Layout {
        /// Number of in-use clipping contexts.
        #[arg(short, long)]
        contexts: usize,

        /// Number of mask buffers.
        #[arg(short, long, default_value_t = 1)]
        buffers: i32,
    },
    /// Plan frames for a model snapshot stored as JSON.
    Plan {
        /// Path to the model snapshot.
        scene: PathBuf,

        /// Renderer settings as a JSON file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of mask buffers, overriding the config.
        #[arg(short, long)]
        buffers: Option<i32>,

        /// Regenerate each mask right before the drawable using it.
        #[arg(long)]
        high_precision: bool,

        /// Number of consecutive frames to plan.
        #[arg(short, long, default_value_t = 1)]
        frames: usize,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn load_scene(path: &Path) -> Result<ModelSnapshot, CliError> {
    let text = read_file(path)?;
    serde_json::from_str(&text).map_err(|source| CliError::Scene {
        path: path.to_path_buf(),
        source,
    })
}

fn load_config(path: &Path) -> Result<RendererConfig, CliError> {
    let text = read_file(path)?;
    RendererConfig::from_json(&text).map_err(|source| CliError::Config {
        path: path.to_path_buf(),
        source,
    })
}

fn describe_variant(info: &VariantInfo) -> String {
    let blend = info.blend;
    let mode = info
        .blend_mode
        .map_or_else(|| "mask".to_string(), |m| format!("{m:?}"));
    format!(
        "{:>2}  {:<14} {:<15} {:<5} program {}  rgb {:?}/{:?} alpha {:?}/{:?}",
        info.index,
        mode,
        format!("{:?}", info.mask),
        if info.premultiplied { "pma" } else { "" },
        info.program_slot,
        blend.src_rgb,
        blend.dst_rgb,
        blend.src_alpha,
        blend.dst_alpha,
    )
}

fn describe_command(command: &FrameCommand) -> String {
    match *command {
        FrameCommand::PreDraw => "pre_draw".to_string(),
        FrameCommand::SetMaskViewport => "set_mask_viewport".to_string(),
        FrameCommand::RestoreViewport => "restore_viewport".to_string(),
        FrameCommand::BeginMask { buffer } => format!("begin_mask buffer={buffer}"),
        FrameCommand::EndMask { buffer } => format!("end_mask buffer={buffer}"),
        FrameCommand::ClearMask { buffer } => format!("clear_mask buffer={buffer}"),
        FrameCommand::DrawMask {
            drawable,
            context,
            culling,
        } => format!("  draw_mask drawable={drawable} context={} culling={culling}", context.0),
        FrameCommand::Draw {
            drawable,
            context,
            culling,
        } => match context {
            Some(id) => format!("draw drawable={drawable} context={} culling={culling}", id.0),
            None => format!("draw drawable={drawable} culling={culling}"),
        },
        FrameCommand::PostDraw => "post_draw".to_string(),
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Variants => {
            let variants = catalog();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&variants)?);
            } else {
                for info in &variants {
                    println!("{}", describe_variant(info));
                }
            }
        }
        Command::Layout { contexts, buffers } => {
            let config = RendererConfig {
                mask_buffer_count: buffers,
                ..RendererConfig::default()
            };
            let buffer_count = config.effective_mask_buffer_count();
            let slots = layout_contexts(contexts, buffer_count);
            let capacity = nominal_capacity(buffer_count);

            if cli.json {
                let info = serde_json::json!({
                    "contexts": contexts,
                    "buffers": buffer_count,
                    "nominal_capacity": capacity,
                    "slots": slots,
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                for (i, slot) in slots.iter().enumerate() {
                    let b = slot.bounds;
                    println!(
                        "context {i:>3}: buffer {} channel {} at ({:.4}, {:.4}) size {:.4}x{:.4}",
                        slot.buffer, slot.channel, b.x, b.y, b.width, b.height
                    );
                }
                if contexts > capacity {
                    eprintln!(
                        "note: {contexts} contexts exceed the nominal capacity of {capacity}; masks lose resolution"
                    );
                }
            }
        }
        Command::Plan {
            scene,
            config,
            buffers,
            high_precision,
            frames,
        } => {
            let model = load_scene(&scene)?;
            let mut settings = match config {
                Some(path) => load_config(&path)?,
                None => RendererConfig::default(),
            };
            if let Some(count) = buffers {
                settings.mask_buffer_count = count;
            }
            settings.high_precision_mask |= high_precision;

            let mut order = Vec::new();
            sort_by_render_order(&model, &mut order).map_err(CliError::RenderOrder)?;

            let mut clipping = model.is_using_masking().then(|| {
                ClippingManager::new(
                    &model,
                    settings.effective_mask_buffer_count(),
                    settings.mask_buffer_size,
                )
            });

            let mut planner = FramePlanner::new();
            let mut plans = Vec::with_capacity(frames);
            for _ in 0..frames {
                let commands =
                    planner.plan(&model, clipping.as_mut(), settings.high_precision_mask);
                plans.push(commands.to_vec());
            }

            if cli.json {
                let info = serde_json::json!({
                    "drawables": model.drawable_count(),
                    "contexts": clipping.as_ref().map_or(0, |c| c.contexts().len()),
                    "high_precision": settings.high_precision_mask,
                    "frames": plans,
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                if let Some(manager) = &clipping {
                    for (i, ctx) in manager.contexts().iter().enumerate() {
                        println!(
                            "context {i}: clips {:?} -> drawables {:?}",
                            ctx.clip_ids(),
                            ctx.clipped_drawables()
                        );
                    }
                }
                for (frame, commands) in plans.iter().enumerate() {
                    println!("frame {frame}:");
                    for command in commands {
                        println!("  {}", describe_command(command));
                    }
                }
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json_mode = cli.json;
    if let Err(e) = run(cli) {
        if json_mode {
            let j = serde_json::json!({"error": e.to_string(), "exit_code": e.exit_code()});
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}
