use std::path::PathBuf;

use clap::Parser;

/// chirospec : spectrogrammes, segments, contours et espèces de cris de chauves-souris.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier audio à analyser (WAV, FLAC, MP3, OGG...).
    #[arg(required_unless_present = "contours_from")]
    pub audio: Option<PathBuf>,

    /// Dossier de sortie. Doit être vide ou absent.
    #[arg(short, long, required_unless_present = "contours_from")]
    pub out: Option<PathBuf>,

    /// Modèle ONNX du classifieur. Sans modèle, l'inférence est sautée.
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Recalculer seulement les contours d'un spectrogram_assets.json existant.
    #[arg(long, value_name = "ASSETS", conflicts_with_all = ["audio", "out", "model"])]
    pub contours_from: Option<PathBuf>,

    /// Mettre à zéro les pixels du masque sous ce pourcentage avant les contours.
    #[arg(long, value_name = "PCT")]
    pub noise_filter: Option<f64>,

    /// Écrire aussi les contours en SVG à côté des tuiles compressées.
    #[arg(long, default_value_t = false)]
    pub svg: bool,

    /// Fichier de configuration TOML.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Colormap des tuiles d'affichage : gray, gist_yarg, turbo.
    #[arg(long)]
    pub colormap: Option<String>,

    /// Sélection des niveaux de contour : percentile, multi-otsu, histogram.
    #[arg(long)]
    pub levels_mode: Option<String>,

    /// Suréchantillonnage du rendu intermédiaire.
    #[arg(long)]
    pub dpi: Option<u32>,

    /// Désactiver la classification.
    #[arg(long, default_value_t = false)]
    pub no_inference: bool,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_invocation_parses() {
        let cli = Cli::try_parse_from(["chirospec", "call.wav", "--out", "assets"]).unwrap();
        assert_eq!(cli.audio, Some(PathBuf::from("call.wav")));
        assert_eq!(cli.out, Some(PathBuf::from("assets")));
        assert!(cli.contours_from.is_none());
        assert!(!cli.svg);
        assert!(cli.model.is_none());
        assert!(!cli.no_inference);
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn out_is_required() {
        assert!(Cli::try_parse_from(["chirospec", "call.wav"]).is_err());
        assert!(Cli::try_parse_from(["chirospec"]).is_err());
    }

    #[test]
    fn contours_rerun_needs_no_audio() {
        let cli = Cli::try_parse_from([
            "chirospec",
            "--contours-from",
            "assets/spectrogram_assets.json",
            "--noise-filter",
            "25",
            "--svg",
        ])
        .unwrap();
        assert_eq!(cli.contours_from, Some(PathBuf::from("assets/spectrogram_assets.json")));
        assert_eq!(cli.noise_filter, Some(25.0));
        assert!(cli.svg);
        assert!(cli.audio.is_none());
    }

    #[test]
    fn contours_rerun_conflicts_with_a_new_run() {
        assert!(Cli::try_parse_from(["chirospec", "a.wav", "--contours-from", "x.json"]).is_err());
        assert!(Cli::try_parse_from(["chirospec", "--contours-from", "x.json", "--model", "m.onnx"]).is_err());
    }

    #[test]
    fn overrides_parse() {
        let cli = Cli::try_parse_from([
            "chirospec",
            "call.wav",
            "-o",
            "assets",
            "--model",
            "model.onnx",
            "--colormap",
            "turbo",
            "--levels-mode",
            "multi-otsu",
            "--dpi",
            "130",
            "--no-inference",
        ])
        .unwrap();
        assert_eq!(cli.colormap.as_deref(), Some("turbo"));
        assert_eq!(cli.levels_mode.as_deref(), Some("multi-otsu"));
        assert_eq!(cli.dpi, Some(130));
        assert!(cli.no_inference);
    }
}
