// =============================================================================
// VOXIN - Vulkan bring-up and a single-triangle frame loop
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  WinitWindow (events, close flag, surface)                      │
// │    └── GraphicsContext (owns every Vulkan object)               │
// │          └── Instance -> Surface -> Device -> Swapchain         │
// │                └── Render pass, pipeline, framebuffers          │
// │                      └── Command buffer + semaphores            │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Poll window events, stop if close was requested
// 2. Acquire swapchain image
// 3. Record + submit the draw for that image
// 4. Present
// 5. Wait for the device to go idle
//
// =============================================================================

mod backend;
mod config;
mod context;
mod error;
mod frame_loop;
mod window;

use anyhow::{Context, Result};
use config::Config;
use context::GraphicsContext;
use frame_loop::FrameLoop;
use window::WinitWindow;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    init_logging();

    // Load configuration from voxin.toml
    let config = Config::load();
    config.validate().context("Invalid configuration")?;

    log::info!("Starting Voxin");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        config.window.title
    );
    log::info!(
        "Present mode preference: {:?}, device selection: {:?}",
        config.vulkan.present_mode,
        config.vulkan.device_selection
    );

    let mut window = WinitWindow::create(
        config.window.width,
        config.window.height,
        &config.window.title,
    )?;

    let mut context =
        GraphicsContext::new(&config, &window).context("Failed to initialize Vulkan")?;

    let mut frames = FrameLoop::new(context.pacing());
    let result = frames.run(&mut window, &mut context);
    if result.is_err() {
        log::error!(
            "Frame loop stopped in {:?} after {} frame(s)",
            frames.state(),
            frames.frames_presented()
        );
    }

    // Vulkan objects go before the window that backs the surface.
    drop(context);
    drop(window);

    let presented = result.context("Frame loop failed")?;
    log::info!("Presented {} frame(s)", presented);
    Ok(())
}

/// Initialize logging; `RUST_LOG` overrides the default `info` level
fn init_logging() {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
