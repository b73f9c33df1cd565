//! LED Matrix fireworks + marquee display
//!
//! Runs forever on the Pi: a fireworks burst, then every configured
//! message scrolls past once, then fireworks again.
//!
//! ## Architecture
//! - **Main thread**: owns the LED matrix and runs the cycle scheduler
//! - **NTP thread** (std::thread): periodically corrects the clock the
//!   time message reads from, shared via `Arc<Mutex<TimeKeeper>>`
//!
//! ## Usage
//! ```sh
//! sudo ./target/release/led-marquee-rs --config config.json --rows 64 --cols 64
//! ```

#[cfg(not(feature = "hardware"))]
fn main() {
    eprintln!("This binary requires the 'hardware' feature (rpi-led-matrix).");
    eprintln!("Build with: cargo build --release");
    eprintln!("Tests can run without it: cargo test --no-default-features");
    std::process::exit(1);
}

#[cfg(feature = "hardware")]
fn main() {
    use clap::Parser;
    use led_marquee_rs::assets::{IconStore, list_fonts, list_icons};
    use led_marquee_rs::clock::SystemClock;
    use led_marquee_rs::config::Config;
    use led_marquee_rs::font::FontSet;
    use led_marquee_rs::marquee::ScrollCompositor;
    use led_marquee_rs::scene::SceneRoot;
    use led_marquee_rs::scheduler::CycleScheduler;
    use led_marquee_rs::surface::LedSurface;
    use led_marquee_rs::timekeeping::{TimeKeeper, resync, spawn_resync, time_provider};
    use led_marquee_rs::{PanelConfig, setup_signal_handler};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing_subscriber::EnvFilter;

    /// Fireworks and scrolling marquee for an RGB LED matrix
    #[derive(Parser)]
    #[command(name = "led-marquee-rs")]
    #[command(about = "Fireworks and scrolling marquee for an RGB LED matrix")]
    #[command(version)]
    struct Args {
        /// Path to the JSON config file
        #[arg(long, default_value = "config.json")]
        config: PathBuf,

        /// Number of rows on the LED panel
        #[arg(long, default_value = "64")]
        rows: u32,

        /// Number of columns on the LED panel
        #[arg(long, default_value = "64")]
        cols: u32,

        /// Brightness (0-100), overrides the config file
        #[arg(long)]
        brightness: Option<u8>,
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();
    let panel = PanelConfig::new(args.rows, args.cols);

    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config {}: {}", args.config.display(), e);
            std::process::exit(1);
        }
    };
    let brightness = args.brightness.unwrap_or(config.brightness).min(100);

    tracing::info!("LED Marquee v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Panel: {}x{}, brightness {}", panel.cols, panel.rows, brightness);
    tracing::info!("Messages: {}", config.messages.len());

    let fonts = match FontSet::load(&config.fonts.dir, &config.fonts.small, &config.fonts.large) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("Failed to load fonts: {}", e);
            tracing::error!(
                "Available fonts in {}: {:?}",
                config.fonts.dir.display(),
                list_fonts(&config.fonts.dir)
            );
            std::process::exit(1);
        }
    };

    let icons = IconStore::new(&config.graphics_dir);
    tracing::info!(
        "Graphics: {} ({} icons)",
        icons.root().display(),
        list_icons(&icons.root().join("graphics")).len()
    );

    let surface = match LedSurface::new(panel, brightness) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to initialize LED matrix: {}", e);
            std::process::exit(1);
        }
    };

    let keeper = Arc::new(Mutex::new(TimeKeeper::new(config.ntp.timezone_offset)));
    let messages = config.messages(&time_provider(Arc::clone(&keeper)));

    let mut scheduler = CycleScheduler::new(
        surface,
        SystemClock::new(),
        rand::rng(),
        ScrollCompositor::new(fonts, icons),
        messages,
    );
    if let Some(budget) = config.element_budget {
        tracing::info!("Scene element budget: {}", budget);
        scheduler = scheduler.with_scene(SceneRoot::with_element_budget(panel, budget));
    }

    if config.ntp.enabled {
        if let Err(e) = scheduler.show_status("Syncing...") {
            tracing::warn!("Could not show status: {}", e);
        }

        let first_delay = match resync(&keeper, &config.ntp.server) {
            Ok(()) => config.ntp.interval(),
            Err(e) => {
                tracing::warn!("{}", e);
                if scheduler.show_status("NTP failed").is_ok() {
                    std::thread::sleep(Duration::from_secs(2));
                }
                config.ntp.retry()
            }
        };

        if let Err(e) = spawn_resync(
            Arc::clone(&keeper),
            config.ntp.server.clone(),
            first_delay,
            config.ntp.interval(),
            config.ntp.retry(),
        ) {
            tracing::warn!("Could not start NTP resync thread: {}", e);
        }
    }

    let running = setup_signal_handler();
    scheduler.run(&running);

    tracing::info!("Shutting down cleanly.");
}
