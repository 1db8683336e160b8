use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use cs_audio::FileSource;
use cs_core::CancelToken;
use cs_core::config::{Colormap, LevelsMode, PipelineConfig};

pub mod cli;
pub mod output;
pub mod pipeline;
pub mod rerun;

fn main() -> ExitCode {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Charger la config puis appliquer les overrides CLI
    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    // 4. Ctrl+C : annulation coopérative entre deux étapes
    let cancel = CancelToken::new();
    let handle = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::warn!("Interruption reçue, annulation...");
        handle.cancel();
    }) {
        log::warn!("Handler Ctrl+C indisponible : {e}");
    }

    // 5. Run, complet ou contours seuls
    let result = match (&cli.contours_from, &cli.audio, &cli.out) {
        (Some(assets), _, _) => rerun::rerun_contours(assets, &config, &cancel),
        (None, Some(audio), Some(out)) => {
            let mut pipeline = pipeline::Pipeline::new(config, cli.model.clone(), cancel);
            pipeline.run(&FileSource::new(audio), out)
        }
        _ => {
            log::error!("Fichier audio et dossier de sortie requis");
            return ExitCode::from(1);
        }
    };
    match result {
        Ok(outcome) => {
            let compressed = &outcome.assets.compressed;
            log::info!(
                "{} segments, {} px compressés, {} contours",
                compressed.starts.len(),
                compressed.width,
                compressed.segments.iter().map(|s| s.contour_count).sum::<usize>()
            );
            println!("{}", outcome.assets_path.display());
            if let Some(e) = &outcome.model_error {
                log::error!("{e}");
            }
            exit_code(outcome.exit_code())
        }
        Err(e) => {
            log::error!("{e}");
            exit_code(e.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(exit_byte(code))
}

fn exit_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

/// Config file (or defaults), then CLI overrides.
fn resolve_config(cli: &cli::Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) if path.exists() => cs_core::config::load_config(path)?,
        Some(path) => {
            log::warn!("Config introuvable : {}. Utilisation des défauts.", path.display());
            PipelineConfig::default()
        }
        None => default_config(),
    };
    apply_overrides(&mut config, cli);
    Ok(config)
}

/// `chirospec.toml` in the working directory when present.
fn default_config() -> PipelineConfig {
    let path = Path::new("chirospec.toml");
    if path.exists() {
        match cs_core::config::load_config(path) {
            Ok(config) => return config,
            Err(e) => log::warn!("{e:#}, utilisation des défauts."),
        }
    }
    PipelineConfig::default()
}

fn apply_overrides(config: &mut PipelineConfig, cli: &cli::Cli) {
    if let Some(ref name) = cli.colormap {
        match Colormap::from_name(name) {
            Some(map) => config.render.colormap = map,
            None => log::warn!("Colormap inconnue '{name}', utilisation du défaut."),
        }
    }
    if let Some(ref name) = cli.levels_mode {
        match LevelsMode::from_name(name) {
            Some(mode) => config.contours.levels_mode = mode,
            None => log::warn!("Mode de niveaux inconnu '{name}', utilisation du défaut."),
        }
    }
    if let Some(dpi) = cli.dpi {
        config.render.dpi = dpi;
    }
    if cli.no_inference {
        config.classifier.run_inference_on_upload = false;
    }
    if let Some(percent) = cli.noise_filter {
        config.contours.noise_filter_threshold = Some(percent);
    }
    if cli.svg {
        config.contours.export_svg = true;
    }
    config.clamp_all();
}
