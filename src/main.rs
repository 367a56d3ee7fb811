use std::backtrace::Backtrace;
use std::fs::File;
use std::io::Write;
use std::panic;

use anyhow::Context;
use log::{info, LevelFilter};

use hearth::HearthConfig;

// Faster small allocations for the per-frame uniform and draw lists.
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const CRASH_LOG: &str = "hearth_crash.log";

fn main() -> anyhow::Result<()> {
    setup_diagnostics();

    let config = HearthConfig::from_env().context("loading configuration")?;
    info!("Starting Hearth ({}x{})...", config.window_size.0, config.window_size.1);

    hearth::run_native(config).context("hearth terminated")?;
    info!("Hearth exited cleanly.");
    Ok(())
}

/// Logger plus a panic hook that leaves a crash report behind.
fn setup_diagnostics() {
    env_logger::Builder::new()
        .filter_level(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .format_timestamp_millis()
        .format_target(false)
        .parse_default_env()
        .init();

    panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();

        let msg = match panic_info.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<dyn Any>",
            },
        };

        let location = panic_info
            .location()
            .map_or("Unknown location".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));

        let crash_msg = format!(
            "=== HEARTH CRASH ===\nReason: {}\nLocation: {}\n\nStack Trace:\n{}",
            msg, location, backtrace
        );

        eprintln!("\x1b[31;1m{}\x1b[0m", crash_msg);

        if let Ok(mut file) = File::create(CRASH_LOG) {
            let _ = file.write_all(crash_msg.as_bytes());
            eprintln!("Crash report saved to {CRASH_LOG}");
        }
    }));
}
