mod cli;

use gifcut::{
    batch::BatchOrchestrator,
    export,
    intake::{Candidate, Intake},
    session::EditingSession,
    settings::{JsonFileStore, SettingsPatch, SettingsState, SettingsStore},
    timeline::{self, DEFAULT_SELECTION},
    toolkit::{FfmpegConverter, Toolkit},
};
use gifcut_av::ToolRegistry;
use gifcut_common::config::Config;
use gifcut_common::events::{EventBus, EventPayload};
use gifcut_common::{ConversionParameters, FilterKind};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, SettingsCommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "gifcut=trace,gifcut_av=debug,gifcut_common=debug".to_string()
        } else {
            "gifcut=info,gifcut_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref().map(expand_path);

    match cli.command {
        Commands::Convert {
            input,
            start,
            end,
            width,
            fps,
            quality,
            filter,
            reverse,
            output,
        } => {
            let config = load_config(config_path.as_deref());
            let patch = SettingsPatch {
                width,
                frame_rate: fps,
                quality,
                filter,
                reverse: reverse.then_some(true),
                ..Default::default()
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_file(&config, &input, start, end, &patch, output))
        }
        Commands::Batch { inputs, out_dir } => {
            let config = load_config(config_path.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(batch_convert(&config, &inputs, out_dir))
        }
        Commands::Probe { file, json } => {
            let config = load_config(config_path.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&config, &file, json))
        }
        Commands::Settings { action } => {
            let config = load_config(config_path.as_deref());
            settings_command(&config, action)
        }
        Commands::CheckTools => {
            let config = load_config(config_path.as_deref());
            check_tools(&config)
        }
        Commands::Validate { file } => {
            let path = file.as_deref().map(expand_path).or(config_path);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("gifcut {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

fn load_config(path: Option<&Path>) -> Config {
    let config = Config::load_or_default(path);
    for warning in config.validate() {
        tracing::warn!("Config: {warning}");
    }
    config
}

fn settings_store(config: &Config) -> Arc<JsonFileStore> {
    let path = config
        .settings_path
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(JsonFileStore::default_path);
    tracing::debug!("Settings file: {}", path.display());
    Arc::new(JsonFileStore::new(path))
}

fn output_dir(config: &Config, requested: Option<PathBuf>) -> Result<PathBuf> {
    match requested.or_else(|| config.output_dir.as_deref().map(expand_path)) {
        Some(dir) => Ok(dir),
        None => Ok(std::env::current_dir()?),
    }
}

fn build_toolkit(config: &Config, events: &Arc<EventBus>) -> (Arc<Toolkit>, Arc<FfmpegConverter>) {
    let converter = Arc::new(FfmpegConverter::new(config.tools.clone(), &config.toolkit));
    let toolkit = Toolkit::new(converter.clone())
        .with_slow_load_notice(Duration::from_secs(config.toolkit.slow_load_notice_secs))
        .with_events(Arc::clone(events));
    (Arc::new(toolkit), converter)
}

/// Load the toolkit, then read the duration of every registered item.
async fn prepare(
    config: &Config,
    events: &Arc<EventBus>,
    intake: &mut Intake,
) -> Result<Arc<Toolkit>> {
    let (toolkit, converter) = build_toolkit(config, events);
    toolkit.load().await?;
    let tools = converter.tools().unwrap_or_default();
    intake.resolve_pending(&tools).await;
    Ok(toolkit)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn convert_file(
    config: &Config,
    input: &Path,
    start: Option<f64>,
    end: Option<f64>,
    patch: &SettingsPatch,
    output: Option<PathBuf>,
) -> Result<()> {
    let events = Arc::new(EventBus::default());
    let mut intake = Intake::new(config.intake.clone()).with_events(Arc::clone(&events));
    intake.add(Candidate::from_path(input)?)?;

    let toolkit = prepare(config, &events, &mut intake).await?;

    let settings = SettingsState::init(settings_store(config)).with_events(Arc::clone(&events));
    let mut session = EditingSession::new(settings);
    session.select(&intake, 0)?;

    // Move the end first so a start past the default window is accepted.
    if let Some(end) = end.or(start.map(|s| s + DEFAULT_SELECTION)) {
        if session.set_end(end).is_none() {
            tracing::warn!("Ignoring end {end}: must be after the start");
        }
    }
    if let Some(start) = start {
        if session.set_start(start).is_none() {
            tracing::warn!("Ignoring start {start}: must be before the end");
        }
    }
    if !patch.is_empty() {
        session.update_settings(patch)?;
    }

    let Some(item) = intake.get(0) else {
        anyhow::bail!("No input registered");
    };
    if !item.is_ready() {
        anyhow::bail!("Could not read the duration of {}", item.name);
    }

    let params = *session.params();
    print_params(&item.name, &params);

    let input_bytes = item.read_bytes().await?;
    let mut run = toolkit.start_conversion(input_bytes, item.name.clone(), params);
    while let Some(progress) = run.progress.next().await {
        eprint!("\rConverting {}: {progress:>3}%", item.name);
    }
    eprintln!();
    let gif = run.result.await?;

    let path = match output {
        Some(path) => {
            let path = expand_path(&path);
            std::fs::write(&path, &gif)?;
            path
        }
        None => export::save_bytes(&gif, &item.name, &output_dir(config, None)?)?,
    };
    println!(
        "Wrote {} ({}, {} bytes)",
        path.display(),
        export::GIF_MIME,
        gif.len()
    );

    Ok(())
}

async fn batch_convert(config: &Config, inputs: &[PathBuf], out_dir: Option<PathBuf>) -> Result<()> {
    let events = Arc::new(EventBus::default());
    let mut intake = Intake::new(config.intake.clone()).with_events(Arc::clone(&events));

    for outcome in intake.ingest(inputs) {
        if let Err(e) = outcome.result {
            eprintln!("Skipping {}: {e}", outcome.path.display());
        }
    }
    if intake.is_empty() {
        anyhow::bail!("No usable input files");
    }

    let toolkit = prepare(config, &events, &mut intake).await?;
    let params = *SettingsState::init(settings_store(config)).params();
    print_params(&format!("{} file(s)", intake.len()), &params);

    let names: HashMap<_, _> = intake
        .items()
        .iter()
        .map(|i| (i.id, i.name.clone()))
        .collect();
    let printer = tokio::spawn(print_batch_events(events.subscribe(), names));

    let orchestrator = BatchOrchestrator::new(toolkit).with_events(Arc::clone(&events));
    let summary = orchestrator.run_batch(intake.items(), &params).await?;
    let _ = printer.await;

    let dir = output_dir(config, out_dir.map(|d| expand_path(&d)))?;
    let saved = export::save_all(&orchestrator.completed(), &dir)?;

    println!("\n{summary}");
    for path in &saved {
        println!("  {}", path.display());
    }

    if summary.failed > 0 {
        anyhow::bail!("{} conversion(s) failed", summary.failed);
    }
    Ok(())
}

async fn print_batch_events(
    mut rx: tokio::sync::broadcast::Receiver<gifcut_common::events::Event>,
    media_names: HashMap<gifcut_common::MediaId, String>,
) {
    use tokio::sync::broadcast::error::RecvError;

    let mut task_names = HashMap::new();
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };
        match event.payload {
            EventPayload::TaskQueued { task_id, media_id } => {
                let name = media_names.get(&media_id).cloned().unwrap_or_default();
                task_names.insert(task_id, name);
            }
            EventPayload::TaskStarted { task_id } => {
                println!("→ {}", task_names.get(&task_id).map_or("?", String::as_str));
            }
            EventPayload::TaskCompleted {
                task_id,
                output_size,
            } => {
                println!(
                    "✓ {} ({output_size} bytes)",
                    task_names.get(&task_id).map_or("?", String::as_str)
                );
            }
            EventPayload::TaskFailed { task_id, error } => {
                println!(
                    "✗ {}: {error}",
                    task_names.get(&task_id).map_or("?", String::as_str)
                );
            }
            EventPayload::BatchFinished { .. } => break,
            _ => {}
        }
    }
}

async fn probe_file(config: &Config, file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let candidate = Candidate::from_path(file)?;
    let tools = ToolRegistry::discover(&config.tools);
    let duration = gifcut_av::probe_duration(&tools, file).await?;

    if json {
        let value = serde_json::json!({
            "file": file,
            "mime": candidate.mime,
            "size": candidate.size,
            "duration": duration,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("File: {}", file.display());
        println!("Type: {}", candidate.mime);
        println!("Size: {} bytes", candidate.size);
        println!("Duration: {} ({duration:.3}s)", timeline::format_time(duration));
    }

    Ok(())
}

fn settings_command(config: &Config, action: SettingsCommand) -> Result<()> {
    let store: Arc<dyn SettingsStore> = settings_store(config);
    let mut settings = SettingsState::init(store);

    let params = match action {
        SettingsCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(settings.params())?);
                return Ok(());
            }
            *settings.params()
        }
        SettingsCommand::Reset => settings.reset()?,
        SettingsCommand::Set {
            start,
            duration,
            width,
            fps,
            quality,
            filter,
            reverse,
        } => settings.set(&SettingsPatch {
            start,
            duration,
            width,
            frame_rate: fps,
            quality,
            filter,
            reverse,
        })?,
    };

    print_params("Settings", &params);
    Ok(())
}

fn print_params(label: &str, params: &ConversionParameters) {
    println!("{label}:");
    println!(
        "  Trim: {} + {}",
        timeline::format_time(params.start),
        timeline::format_time(params.duration)
    );
    println!("  Width: {}px", params.width);
    println!("  Frame rate: {} fps", params.frame_rate);
    println!(
        "  Quality: {} ({} colours)",
        params.quality,
        gifcut_av::palette_colors(params.quality)
    );
    if params.filter != FilterKind::None {
        println!("  Filter: {}", params.filter);
    }
    if params.reverse {
        println!("  Reverse: yes");
    }
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg (which ships ffprobe) to convert videos.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let contents = std::fs::read_to_string(p)?;
            let config = Config::from_json(&contents)?;
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("✓ Configuration is valid");
            } else {
                println!("⚠ Configuration loaded with {} warning(s):", warnings.len());
                for w in &warnings {
                    println!("  - {w}");
                }
            }
            println!("  Max file size: {} bytes", config.intake.max_file_size);
            println!(
                "  Accepted types: {}",
                config.intake.accepted_mime_types.join(", ")
            );
            println!("  Encode timeout: {}s", config.toolkit.encode_timeout_secs);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            println!("  Max file size: {} bytes", config.intake.max_file_size);
        }
    }

    Ok(())
}
