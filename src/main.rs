mod artnet;
mod audio_io;
mod boot;
mod config;
mod engine;
mod logger;
mod ltc;
mod mtc;
mod passthru;
mod ring;
mod status;
mod supervisor;
mod timecode;

use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use clap::Parser;

use audio_io::{AudioIo, PeakReport};
use boot::BootProgramOrder;
use supervisor::EngineSupervisor;
use timecode::now_ms;

/// 60 Hz, same cadence the teacher drives its metronome's beat clock at.
const TICK_INTERVAL_MS: u64 = 1000 / 60;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// 'c' writes the default config and exits, 'l' extracts logs and exits.
    #[arg(short, long, default_value_t = '-')]
    manual_boot: char,

    #[arg(long, default_value_t = String::from(""))]
    config_path_override: String,
}

impl Args {
    fn boot_order(&self) -> Option<BootProgramOrder> {
        match self.manual_boot {
            'c' => Some(BootProgramOrder::WriteConfig),
            'l' => Some(BootProgramOrder::ExtractLogs),
            _ => None,
        }
    }
}

fn wall_clock_ms_since_midnight() -> i64 {
    let now = chrono::Local::now();
    let midnight = now.date_naive().and_hms_opt(0, 0, 0).expect("midnight is a valid time");
    now.naive_local().signed_duration_since(midnight).num_milliseconds()
}

fn main() {
    logger::init();
    let args = Args::parse();

    let config_path = match PathBuf::from_str(&args.config_path_override) {
        Ok(_) if !args.config_path_override.is_empty() => PathBuf::from(&args.config_path_override),
        _ => match boot::find_config_path("") {
            Ok(path) => path,
            Err(err) => {
                boot::log_boot_error(err);
                return;
            }
        },
    };

    let boot_order = args.boot_order().unwrap_or(BootProgramOrder::Run);
    match boot_order {
        BootProgramOrder::WriteConfig => {
            if let Err(err) = boot::write_default_config(config_path) {
                boot::log_boot_error(err);
            }
        }
        BootProgramOrder::ExtractLogs => {
            if let Err(err) = boot::copy_logs(config_path) {
                boot::log_boot_error(err);
            }
        }
        BootProgramOrder::Run => run(config_path),
    }
}

fn run(config_path: PathBuf) {
    let settings = match boot::get_config(config_path.clone()) {
        Ok(settings) => settings,
        Err(err) => {
            boot::log_boot_error(err);
            return;
        }
    };

    let mut supervisor = EngineSupervisor::from_settings(&settings);

    let audio_io = match AudioIo::start(&mut supervisor, &settings) {
        Ok(io) => io,
        Err(err) => {
            logger::log(format!("failed to start audio I/O: {err}"), logger::LogContext::Audio, logger::LogKind::Error);
            return;
        }
    };

    logger::log(
        format!("running with {} engine(s)", supervisor.len()),
        logger::LogContext::Boot,
        logger::LogKind::Note,
    );

    // No network control layer exists to issue a shutdown command, so the
    // tick loop runs until the process receives a termination signal.
    loop {
        let tick_start = now_ms() as f64;

        while let Ok(report) = audio_io.peak_rx.try_recv() {
            match report {
                PeakReport::Input(index, peak) => {
                    if let Some(engine) = supervisor.engine_mut(index) {
                        engine.report_input_peak(peak);
                    }
                }
                PeakReport::Passthru(index, peak) => {
                    if let Some(engine) = supervisor.engine_mut(index) {
                        engine.report_passthru_peak(peak);
                    }
                }
            }
        }

        supervisor.tick_all(tick_start, wall_clock_ms_since_midnight());

        let elapsed = now_ms() as f64 - tick_start;
        let remaining = TICK_INTERVAL_MS as f64 - elapsed;
        if remaining > 0.0 {
            thread::sleep(Duration::from_millis(remaining as u64));
        }
    }
}
