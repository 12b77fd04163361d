#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{Level as TraceLevel, info};
use tracing_subscriber::FmtSubscriber;

use smx_config::active_pad::SelectedPad;
use smx_config::codec::WireLayout;
use smx_config::config::Preferences;
use smx_config::constants::{config, panels, wire};
use smx_config::context::AppContext;
use smx_config::device::PadSnapshot;
use smx_config::driver::{MemoryDriver, RawConfig};
use smx_config::presets::{self, Preset};
use smx_config::thresholds::Control;
use smx_config::types::{PanelAndSensor, ThresholdPair};

/// Edit StepManiaX pad configuration dumps offline
#[derive(Parser, Debug)]
#[command(name = "smx-config", version)]
struct Cli {
    /// Wire dump for pad 1
    #[arg(long, value_name = "FILE", global = true)]
    pad1: Option<PathBuf>,

    /// Wire dump for pad 2
    #[arg(long, value_name = "FILE", global = true)]
    pad2: Option<PathBuf>,

    /// Dumps use the pre-firmware-5 layout
    #[arg(long, global = true)]
    legacy: bool,

    /// Preferences file (defaults to the user config directory)
    #[arg(long, value_name = "FILE", global = true)]
    preferences: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show both pads and the local preferences
    Status,
    /// Apply a threshold preset (low, normal, high)
    Preset { preset: Preset },
    /// Set one control's thresholds, e.g. `cardinal 40 60`
    SetThreshold { control: Control, low: u8, high: u8 },
    /// Make each control's sensors agree with its first sensor
    SyncThresholds,
    /// Edit the custom sensor list
    CustomSensor {
        #[command(subcommand)]
        action: CustomSensorAction,
    },
    /// Give the inner sensors their own thresholds
    InnerSensors { state: Switch },
    /// Give the outer sensors their own thresholds
    OuterSensors { state: Switch },
    /// Per-panel thresholds instead of cardinal/corner groups
    Advanced { state: Switch },
    /// Which pad to edit when both are connected (p1, p2, both)
    Select { pad: SelectedPad },
    /// Copy pad 1's thresholds and enabled panels to pad 2
    SyncPads,
    /// Write a settings file for the first active pad
    Export {
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Apply a settings file to every active pad
    Import { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum CustomSensorAction {
    Add { panel: i64, sensor: i64 },
    Remove { panel: i64, sensor: i64 },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn enabled(self) -> bool {
        matches!(self, Switch::On)
    }
}

struct PadFile {
    pad: usize,
    path: PathBuf,
    original: RawConfig,
}

fn load_pad(driver: &MemoryDriver, pad: usize, path: &Path, legacy: bool) -> Result<PadFile> {
    let data = fs::read(path).with_context(|| format!("Failed to read pad {} dump {:?}", pad + 1, path))?;
    let bytes: [u8; wire::CONFIG_SIZE] = data.as_slice().try_into().map_err(|_| {
        anyhow!(
            "{:?} is {} bytes, expected a {}-byte configuration",
            path,
            data.len(),
            wire::CONFIG_SIZE
        )
    })?;

    let (layout, firmware_version) = if legacy {
        (WireLayout::Legacy, wire::CURRENT_LAYOUT_MIN_FIRMWARE - 1)
    } else {
        (WireLayout::Current, wire::CURRENT_LAYOUT_MIN_FIRMWARE)
    };
    let original = RawConfig { layout, bytes };
    driver.connect(pad, firmware_version, original);
    Ok(PadFile { pad, path: path.to_path_buf(), original })
}

/// Write back dumps the command modified. The emulator stores writes in the
/// current layout, so legacy dumps come back upgraded.
fn store_pads(driver: &MemoryDriver, files: &[PadFile]) -> Result<()> {
    for file in files {
        let Some(raw) = driver.raw_config(file.pad) else {
            continue;
        };
        if raw == file.original {
            continue;
        }
        fs::write(&file.path, raw.bytes).with_context(|| format!("Failed to write pad {} dump {:?}", file.pad + 1, file.path))?;
        info!(pad = file.pad + 1, path = %file.path.display(), "Saved pad configuration");
    }
    Ok(())
}

fn print_pad(pad: usize, snapshot: &PadSnapshot) {
    if !snapshot.connected {
        println!("Pad {}: not connected", pad + 1);
        return;
    }
    let config = &snapshot.config;
    let preset = presets::classify_name(config);
    println!(
        "Pad {}: firmware {}, {} sensors, preset {}",
        pad + 1,
        snapshot.firmware_version,
        if config.fsr() { "FSR" } else { "load cell" },
        if preset.is_empty() { "custom" } else { preset },
    );

    let enabled = config.enabled_panels();
    for panel in 0..panels::COUNT {
        let state = if enabled[panel] { "" } else { " (disabled)" };
        if config.fsr() {
            let pairs: Vec<String> = PanelAndSensor::all_of(panel)
                .map(|s| config.sensor_thresholds(s).to_string())
                .collect();
            println!("  panel {panel}: {}  color {}{state}", pairs.join(" "), config.step_color(panel));
        } else {
            println!("  panel {panel}: {}  color {}{state}", config.panel_thresholds(panel), config.step_color(panel));
        }
    }
}

fn print_status(ctx: &AppContext) {
    let state = ctx.state();
    for (pad, snapshot) in state.iter().enumerate() {
        print_pad(pad, snapshot);
    }

    let ownership = ctx.ownership();
    println!("Selected pad: {}", ctx.selected_pad());
    println!(
        "Advanced mode: {}{}",
        ctx.advanced_mode(),
        if ctx.advanced_view_required() { " (required)" } else { "" }
    );
    println!("Inner sensors: {}", ownership.use_inner_sensor_thresholds);
    println!("Outer sensors: {}", ownership.use_outer_sensor_thresholds);
    let custom: Vec<String> = ownership.custom_sensors.as_slice().iter().map(ToString::to_string).collect();
    println!("Custom sensors: [{}]", custom.join(", "));
    if ctx.pads_need_sync() {
        println!("Pads are configured differently; run sync-pads to match pad 2 to pad 1");
    }
}

fn sensor(panel: i64, sensor: i64) -> Result<PanelAndSensor> {
    PanelAndSensor::checked(panel, sensor).ok_or_else(|| anyhow!("no sensor {sensor} on panel {panel}"))
}

fn run(ctx: &mut AppContext, command: Command) -> Result<()> {
    match command {
        Command::Status => print_status(ctx),
        Command::Preset { preset } => {
            let written = ctx.apply_preset(preset);
            println!("Applied {preset} to {written} pad(s)");
        }
        Command::SetThreshold { control, low, high } => {
            let written = ctx.set_control_thresholds(control, ThresholdPair::new(low, high), None);
            if written == 0 {
                bail!("{control} has nothing to edit on the selected pads in this mode");
            }
            println!("Set {control} to {low}/{high} on {written} pad(s)");
        }
        Command::SyncThresholds => {
            ctx.sync_owned_thresholds();
        }
        Command::CustomSensor { action } => match action {
            CustomSensorAction::Add { panel, sensor: s } => {
                let s = sensor(panel, s)?;
                if !ctx.add_custom_sensor(s)? {
                    println!("{s} is already a custom sensor");
                }
            }
            CustomSensorAction::Remove { panel, sensor: s } => {
                let s = sensor(panel, s)?;
                if !ctx.remove_custom_sensor(s)? {
                    println!("{s} is not a custom sensor");
                }
            }
        },
        Command::InnerSensors { state } => ctx.set_use_inner_sensor_thresholds(state.enabled())?,
        Command::OuterSensors { state } => ctx.set_use_outer_sensor_thresholds(state.enabled())?,
        Command::Advanced { state } => ctx.set_advanced_mode(state.enabled())?,
        Command::Select { pad } => ctx.select_pad(pad)?,
        Command::SyncPads => {
            if !ctx.sync_p2_from_p1() {
                return Err(anyhow!("both --pad1 and --pad2 are needed to sync pads"));
            }
        }
        Command::Export { output } => {
            let text = ctx.export_settings();
            match output {
                Some(mut path) => {
                    if path.extension().is_none() {
                        path.set_extension(config::SETTINGS_EXTENSION);
                    }
                    fs::write(&path, text).with_context(|| format!("Failed to write settings to {:?}", path))?;
                    info!(path = %path.display(), "Exported settings");
                }
                None => print!("{text}"),
            }
        }
        Command::Import { file } => {
            let text = fs::read_to_string(&file).with_context(|| format!("Failed to read settings from {:?}", file))?;
            let written = ctx.import_settings(&text)?;
            println!("Imported {:?} into {written} pad(s)", file);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let driver = Arc::new(MemoryDriver::new());
    let mut files = Vec::new();
    for (pad, path) in [(0, &cli.pad1), (1, &cli.pad2)] {
        if let Some(path) = path {
            files.push(load_pad(&driver, pad, path, cli.legacy)?);
        }
    }

    let preferences_path = cli.preferences.clone().unwrap_or_else(Preferences::path);
    let preferences = Preferences::load_from(&preferences_path);
    let mut ctx = AppContext::new(driver.clone(), preferences, Some(preferences_path))?;

    run(&mut ctx, cli.command)?;
    ctx.pump();

    store_pads(&driver, &files)
}
