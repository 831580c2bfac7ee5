//! Climate clock for an RGB LED matrix.
//!
//! Shows a fire animation with a countdown to the climate deadline on top,
//! rotating through years, weeks, days, hours, minutes and seconds, with the
//! local time underneath.
//!
//! ## Architecture
//! - **Startup** (tokio): sync the clock, fetch the deadline. Either failing
//!   is fatal.
//! - **Frame thread** (std::thread): owns the display and runs the loop
//! - **HTTP server** (tokio/axum): offset, brightness and resync controls
//!
//! ## Rust concepts
//! - `#[tokio::main]` async entry point
//! - `JoinHandle<Result<()>>` to carry the frame thread's error back
//! - `Handle::block_on` to run async time sync from a plain thread
//!
//! ## Usage
//! ```sh
//! sudo ./target/release/climate-clock-rs --rows 32 --cols 64 --utc-offset 1
//! ```

use clap::Parser;
use climate_clock_rs::clock::{NetworkTimeSync, SystemClock, WallClock, sync_clock};
use climate_clock_rs::countdown::{CountdownEngine, Titles, UtcOffset};
use climate_clock_rs::deadline::{DEFAULT_DEADLINE_URL, DeadlineSource};
use climate_clock_rs::render::{DEFAULT_BRIGHTNESS, DisplaySink};
use climate_clock_rs::scheduler::{ControlCommand, DisplayStatus, FrameScheduler};
use climate_clock_rs::server::{self, AppState};
use climate_clock_rs::sink::{FrameBuffer, SnapshotSink};
use climate_clock_rs::{Error, PanelConfig, Result, is_running, setup_signal_handler};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SYNC_RETRY_DELAY: Duration = Duration::from_secs(2);

/// LED matrix climate clock
#[derive(Parser)]
#[command(name = "climate-clock-rs")]
#[command(about = "Fire-backed climate deadline countdown for an RGB LED matrix")]
#[command(version)]
struct Args {
    /// Number of rows on the LED panel
    #[arg(long, default_value = "32")]
    rows: u32,

    /// Number of columns on the LED panel
    #[arg(long, default_value = "64")]
    cols: u32,

    /// Port for the HTTP control API
    #[arg(long, default_value = "8080")]
    port: u16,

    /// URL of the deadline text file (YYYY-MM-DD HH:MM:SS)
    #[arg(long, default_value = DEFAULT_DEADLINE_URL)]
    deadline_url: String,

    /// Use this deadline instead of fetching one
    #[arg(long)]
    deadline: Option<String>,

    /// Any HTTPS server whose Date header we trust for the time
    #[arg(long, default_value = "https://sparkes.github.io/")]
    time_url: String,

    /// Trust the system clock and skip the startup sync
    #[arg(long)]
    skip_sync: bool,

    /// How many times to try the time sync before giving up
    #[arg(long, default_value = "5")]
    sync_attempts: u32,

    /// Initial UTC offset in hours
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    utc_offset: i32,

    /// Initial brightness (0-100)
    #[arg(long, default_value_t = DEFAULT_BRIGHTNESS)]
    brightness: u8,

    /// Pause between frames in milliseconds
    #[arg(long, default_value = "10")]
    frame_delay_ms: u64,

    /// First line-1 text
    #[arg(long, default_value = "COUNTDOWN")]
    title: String,

    /// Second line-1 text
    #[arg(long, default_value = "TO 1.5 DEGREES")]
    subtitle: String,

    /// Render to memory instead of the LED matrix
    #[arg(long)]
    headless: bool,

    /// In headless mode, write the frame to this PNG once a second
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

/// Everything the frame thread needs besides the display itself.
struct FrameContext {
    rx: Receiver<ControlCommand>,
    clock: Arc<dyn WallClock>,
    countdown: CountdownEngine,
    status: Arc<Mutex<DisplayStatus>>,
    resync: NetworkTimeSync,
    brightness: u8,
    frame_delay: Duration,
    running: Arc<AtomicBool>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let panel = PanelConfig::new(args.rows, args.cols).validate()?;

    tracing::info!("Climate clock v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Panel: {}x{}", panel.cols, panel.rows);
    tracing::info!("UTC offset: {:+}", args.utc_offset);
    tracing::info!("Port: {}", args.port);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let clock = Arc::new(SystemClock::new());
    if args.skip_sync {
        tracing::info!("Skipping time sync, using system clock");
    } else {
        sync_clock(
            clock.as_ref(),
            &client,
            &args.time_url,
            args.sync_attempts,
            SYNC_RETRY_DELAY,
        )
        .await?;
    }

    let source = match args.deadline {
        Some(text) => DeadlineSource::Fixed(text),
        None => DeadlineSource::Url(args.deadline_url),
    };
    let deadline = source.load(&client).await?;

    let offset = Arc::new(UtcOffset::new(args.utc_offset));
    let titles = Titles {
        title: args.title,
        subtitle: args.subtitle,
    };
    let status = Arc::new(Mutex::new(DisplayStatus::new()));
    let running = setup_signal_handler();
    let (tx, rx) = mpsc::channel();

    let ctx = FrameContext {
        rx,
        clock: clock.clone(),
        countdown: CountdownEngine::new(deadline, offset.clone(), titles),
        status: status.clone(),
        resync: NetworkTimeSync {
            handle: tokio::runtime::Handle::current(),
            client,
            clock,
            url: args.time_url,
            attempts: args.sync_attempts,
            retry_delay: SYNC_RETRY_DELAY,
        },
        brightness: args.brightness,
        frame_delay: Duration::from_millis(args.frame_delay_ms),
        running: running.clone(),
    };

    let headless = args.headless;
    let snapshot = args.snapshot;
    let frame_handle = std::thread::spawn(move || -> Result<()> {
        if !headless {
            return drive_matrix(panel, ctx);
        }
        match snapshot {
            Some(path) => {
                tracing::info!("Headless, writing snapshots to {}", path.display());
                drive(SnapshotSink::new(panel, path, Duration::from_secs(1)), ctx)
            }
            None => {
                tracing::info!("Headless, rendering to memory only");
                drive(FrameBuffer::new(panel), ctx)
            }
        }
    });

    let app = server::create_router(AppState {
        command_tx: tx,
        status,
        offset,
    });

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API Documentation: http://localhost:{}/docs", args.port);

    let shutdown = running.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while is_running(&shutdown) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        })
        .await?;

    tracing::info!("Server stopped, waiting for frame loop");
    frame_handle.join().map_err(|_| Error::FrameThreadPanicked)?
}

/// Drive the physical panel. The matrix library is not thread-safe, so this
/// must be called on the frame thread.
#[cfg(feature = "hardware")]
fn drive_matrix(panel: PanelConfig, ctx: FrameContext) -> Result<()> {
    match climate_clock_rs::sink::MatrixSink::new(panel) {
        Ok(sink) => drive(sink, ctx),
        Err(e) => {
            // Stop the server too, the error comes back through join()
            ctx.running.store(false, Ordering::SeqCst);
            Err(Error::Display(e.to_string()))
        }
    }
}

#[cfg(not(feature = "hardware"))]
fn drive_matrix(panel: PanelConfig, ctx: FrameContext) -> Result<()> {
    tracing::warn!("Built without the 'hardware' feature, rendering to memory only");
    drive(FrameBuffer::new(panel), ctx)
}

/// Build the scheduler around `sink` and run it until shutdown.
///
/// A scheduler that cannot start clears `running` so the HTTP server
/// winds down, and the error is returned for `main` to report.
fn drive<S: DisplaySink>(sink: S, ctx: FrameContext) -> Result<()> {
    let scheduler = FrameScheduler::new(sink, ctx.rx, ctx.clock, ctx.countdown, ctx.status);
    match scheduler {
        Ok(scheduler) => {
            scheduler
                .with_resync(Box::new(ctx.resync))
                .with_brightness(ctx.brightness)
                .with_frame_delay(ctx.frame_delay)
                .run(&ctx.running);
            Ok(())
        }
        Err(e) => {
            ctx.running.store(false, Ordering::SeqCst);
            Err(e)
        }
    }
}
