use std::borrow::Cow;
use std::path::{Path, PathBuf};

use cs_audio::{AudioSource, compute_spectrogram, decode, denoise};
use cs_classify::Classifier;
use cs_contour::{Contour, SegmentLayout, group_by_segment, trace_contours};
use cs_core::assets::{CompressedAssets, NormalAssets, SegmentContours};
use cs_core::config::{Colormap, PipelineConfig};
use cs_core::{CancelToken, ErrorKind, PipelineError, Prediction, SpectrogramAssets, Stage};
use cs_render::colormap;
use cs_render::segments::whole_image;
use cs_render::{
    CompressedSpectrogram, RgbRaster, TileImage, TileKind, TileSet, build_mask, compress, extract_segments,
    read_tiles, render_spectrogram, write_tiles,
};

use crate::output::{OutputLock, Rollback, write_assets, write_contour_svgs};

/// Sous-dossier des tuiles du spectrogramme complet.
pub const SPECTROGRAM_DIR: &str = "spectrogram";
/// Sous-dossier des tuiles compressées et des masques.
pub const COMPRESSED_DIR: &str = "compressed";

/// Result of a completed run.
#[derive(Debug)]
pub struct RunOutcome {
    pub assets: SpectrogramAssets,
    pub assets_path: PathBuf,
    /// Set when classification was requested but the model was unusable.
    /// Every other asset has still been written.
    pub model_error: Option<PipelineError>,
}

impl RunOutcome {
    /// Exit code of the run: 0, or 3 when the model failed.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.model_error.as_ref().map_or(0, PipelineError::exit_code)
    }
}

/// Sequential acoustic pipeline. Holds the classifier session between runs.
pub struct Pipeline {
    config: PipelineConfig,
    model_path: Option<PathBuf>,
    classifier: Option<Classifier>,
    cancel: CancelToken,
}

/// Map an `anyhow` failure of a stage onto a pipeline error of `kind`.
pub(crate) fn stage_err(kind: ErrorKind, stage: Stage) -> impl FnOnce(anyhow::Error) -> PipelineError {
    move |e| PipelineError::new(kind, stage, format!("{e:#}"))
}

impl Pipeline {
    #[must_use]
    pub fn new(config: PipelineConfig, model_path: Option<PathBuf>, cancel: CancelToken) -> Self {
        Self {
            config,
            model_path,
            classifier: None,
            cancel,
        }
    }

    /// Run every stage on `source`, writing tiles and the result document
    /// into `output_dir`.
    ///
    /// The directory must be absent or empty. On any fatal error, including
    /// cancellation, the files created by this run are deleted.
    ///
    /// # Errors
    /// `InvalidAudio`, `Io`, `Cancelled` or `Unexpected`. Model failures are
    /// not errors here; see [`RunOutcome::model_error`].
    #[allow(clippy::too_many_lines)]
    pub fn run(&mut self, source: &dyn AudioSource, output_dir: &Path) -> Result<RunOutcome, PipelineError> {
        let _lock = OutputLock::acquire(output_dir)?;
        let mut rollback = Rollback::new();
        let stem = source.stem();
        let colormap = self.config.render.colormap;

        // 1. Décodage
        self.cancel.check(Stage::Decode)?;
        let signal = decode(source)?;
        let duration_ms = signal.duration_ms();
        log::info!(
            "Audio : {} ({} échantillons @ {} Hz, {duration_ms:.1} ms)",
            source.name(),
            signal.samples.len(),
            signal.sample_rate
        );

        // 2. STFT
        self.cancel.check(Stage::Stft)?;
        let mut spec = compute_spectrogram(&signal);
        drop(signal);
        log::info!("STFT : {} bins × {} trames", spec.bins, spec.frames);

        // 3. Débruitage
        self.cancel.check(Stage::Denoise)?;
        let denoised = denoise(&mut spec);

        // 4. Rendu
        self.cancel.check(Stage::Render)?;
        let rendered = render_spectrogram(&spec, duration_ms, self.config.render.dpi)
            .map_err(stage_err(ErrorKind::Unexpected, Stage::Render))?;
        drop(spec);
        let (width, height) = (rendered.image.width, rendered.image.height);
        let (freq_min, freq_max) = (rendered.freq_min, rendered.freq_max);

        let spectrogram_dir = output_dir.join(SPECTROGRAM_DIR);
        rollback.track_dir(spectrogram_dir.clone());
        let normal_tiles = write_display(
            &spectrogram_dir,
            &stem,
            TileKind::Spectrogram,
            &display_raster(&rendered.image, colormap),
        )?;
        rollback.track_files(normal_tiles.files.iter().cloned());

        // 5. Segments
        self.cancel.check(Stage::Segments)?;
        let segments = if denoised.degenerate {
            whole_image(width, duration_ms)
        } else {
            extract_segments(&rendered.image, duration_ms).segments
        };

        // 6. Spectrogramme compressé
        self.cancel.check(Stage::Compress)?;
        let compressed = compress(&rendered.image, &segments).map_err(stage_err(ErrorKind::Unexpected, Stage::Compress))?;
        drop(rendered);

        let compressed_dir = output_dir.join(COMPRESSED_DIR);
        rollback.track_dir(compressed_dir.clone());
        let compressed_display = display_raster(&compressed.image, colormap);
        let compressed_tiles = write_display(&compressed_dir, &stem, TileKind::Compressed, &compressed_display)?;
        rollback.track_files(compressed_tiles.files.iter().cloned());
        let mask = build_mask(&compressed.image, self.config.render.mask_noise);
        let mask_tiles = write_tiles(&compressed_dir, &stem, TileKind::Mask, TileImage::Gray(&mask))
            .map_err(stage_err(ErrorKind::Io, Stage::Compress))?;
        rollback.track_files(mask_tiles.files.iter().cloned());
        drop(mask);

        // 7. Contours, sur les masques relus depuis le disque
        self.cancel.check(Stage::Contours)?;
        let (bundles, contours) = if denoised.degenerate {
            (empty_bundles(&compressed), Vec::new())
        } else {
            let mask = read_tiles(&mask_tiles.files).map_err(stage_err(ErrorKind::Io, Stage::Contours))?;
            let layout = SegmentLayout {
                widths: compressed.widths.clone(),
                starts: compressed.starts.clone(),
                stops: compressed.stops.clone(),
                freq_min: f64::from(freq_min),
                freq_max: f64::from(freq_max),
                height: mask.height,
            };
            let contours = trace_contours(
                &mask.data,
                mask.width as usize,
                mask.height as usize,
                &self.config.contours,
            );
            (group_by_segment(&contours, &layout), contours)
        };
        let contour_total: usize = bundles.iter().map(|b| b.contour_count).sum();
        log::info!("Contours : {contour_total} sur {} segments", bundles.len());

        let svg_files = if self.config.contours.export_svg {
            export_svgs(&compressed_dir, &stem, &contours, &compressed_display)?
        } else {
            Vec::new()
        };
        rollback.track_files(svg_files.iter().cloned());
        drop(compressed_display);

        // 8. Classification
        let mut model_error = None;
        let mut prediction = None;
        if self.config.classifier.run_inference_on_upload {
            self.cancel.check(Stage::Classify)?;
            match self.classify(&compressed.image) {
                Ok(Some(p)) => {
                    log::info!("Prédiction : {} ({:.3})", p.label, p.score);
                    prediction = Some(p.to_output());
                }
                Ok(None) => log::info!("Aucun modèle fourni, classification sautée"),
                Err(e) => {
                    log::warn!("{e}");
                    model_error = Some(e);
                }
            }
        }

        // 9. Document
        self.cancel.check(Stage::Assemble)?;
        let assets = SpectrogramAssets {
            duration: duration_ms,
            freq_min,
            freq_max,
            normal: NormalAssets {
                paths: normal_tiles.document_paths(),
                width,
                height,
                widths: normal_tiles.widths.clone(),
            },
            compressed: CompressedAssets {
                paths: compressed_tiles.document_paths(),
                masks: mask_tiles.document_paths(),
                width: compressed.image.width,
                height: compressed.image.height,
                widths: compressed.widths.clone(),
                starts: compressed.starts.clone(),
                stops: compressed.stops.clone(),
                segments: bundles,
                svgs: document_paths(&svg_files),
            },
            prediction,
            noise_filter_threshold: self.config.contours.noise_filter_threshold,
        };
        let assets_path = write_assets(output_dir, &assets)?;
        rollback.track_file(assets_path.clone());
        self.cancel.check(Stage::Assemble)?;
        rollback.commit();
        log::info!("Assets écrits : {}", assets_path.display());

        Ok(RunOutcome {
            assets,
            assets_path,
            model_error,
        })
    }

    /// Classify with the cached session, loading it on first use.
    /// `Ok(None)` when no model path was configured.
    fn classify(&mut self, image: &RgbRaster) -> Result<Option<Prediction>, PipelineError> {
        if self.classifier.is_none() {
            let Some(path) = self.model_path.as_deref() else {
                return Ok(None);
            };
            self.classifier = Some(Classifier::load(path, self.config.classifier.batch_size)?);
        }
        match self.classifier.as_mut() {
            Some(classifier) => Ok(Some(classifier.classify(image)?)),
            None => Ok(None),
        }
    }
}

/// Display pixels: the analysis raster itself for `gray`, recoloured otherwise.
fn display_raster(image: &RgbRaster, map: Colormap) -> Cow<'_, RgbRaster> {
    if map == Colormap::Gray {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(colormap::apply(map, &image.to_gray()))
    }
}

fn write_display(dir: &Path, stem: &str, kind: TileKind, display: &RgbRaster) -> Result<TileSet, PipelineError> {
    let stage = match kind {
        TileKind::Spectrogram => Stage::Render,
        TileKind::Compressed | TileKind::Mask => Stage::Compress,
    };
    write_tiles(dir, stem, kind, TileImage::Rgb(display)).map_err(stage_err(ErrorKind::Io, stage))
}

/// Both contour drawings over `display`; nothing when there is nothing to draw.
pub(crate) fn export_svgs(
    dir: &Path,
    stem: &str,
    contours: &[Contour],
    display: &RgbRaster,
) -> Result<Vec<PathBuf>, PipelineError> {
    if contours.is_empty() {
        log::info!("SVG : aucun contour à dessiner");
        return Ok(Vec::new());
    }
    write_contour_svgs(dir, stem, contours, (display.width, display.height), &display.data)
}

/// `./<file name>` of each path, as recorded in the result document.
pub(crate) fn document_paths(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .map(|n| format!("./{n}"))
        .collect()
}

/// One contour-less bundle per segment.
fn empty_bundles(compressed: &CompressedSpectrogram) -> Vec<SegmentContours> {
    compressed
        .widths
        .iter()
        .zip(compressed.starts.iter().zip(&compressed.stops))
        .enumerate()
        .map(|(i, (&width_px, (&start_ms, &stop_ms)))| SegmentContours {
            segment_index: i,
            width_px,
            start_ms,
            stop_ms,
            ..SegmentContours::default()
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::f64::consts::PI;
    use std::fs;
    use std::io::Cursor;

    use cs_audio::MemorySource;
    use tempfile::TempDir;

    use super::*;

    pub(crate) const SR: u32 = 256_000;

    /// Mono 16-bit PCM at `SR`.
    pub(crate) fn wav(samples: &[f32]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SR,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer
                    .write_sample((s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16)
                    .unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    pub(crate) fn silence(ms: u32) -> Vec<f32> {
        vec![0.0; (u64::from(SR) * u64::from(ms) / 1000) as usize]
    }

    /// Hann-shaped 10 ms sweep from 25 to 55 kHz centred at `centre_ms`.
    pub(crate) fn add_chirp(signal: &mut [f32], centre_ms: f64) {
        let sr = f64::from(SR);
        let len = (0.010 * sr) as usize;
        let start = (centre_ms / 1000.0 * sr) as usize - len / 2;
        let (f0, f1) = (25_000.0, 55_000.0);
        let rate = (f1 - f0) / 0.010;
        for i in 0..len {
            let t = i as f64 / sr;
            let phase = 2.0 * PI * (f0 * t + rate * t * t / 2.0);
            let env = 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos();
            signal[start + i] += (0.5 * env * phase.sin()) as f32;
        }
    }

    /// 1 kHz tone (exactly two STFT bins at 256 kHz) with 100 ms raised-cosine fades.
    fn faded_tone(ms: u32) -> Vec<f32> {
        let period: Vec<f64> = (0..256).map(|i| (2.0 * PI * f64::from(i) / 256.0).sin()).collect();
        let n = (u64::from(SR) * u64::from(ms) / 1000) as usize;
        let fade = 25_600;
        (0..n)
            .map(|i| {
                let env = if i < fade {
                    0.5 - 0.5 * (PI * i as f64 / fade as f64).cos()
                } else if i >= n - fade {
                    0.5 - 0.5 * (PI * (n - 1 - i) as f64 / fade as f64).cos()
                } else {
                    1.0
                };
                (0.5 * period[i % 256] * env) as f32
            })
            .collect()
    }

    pub(crate) fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.render.dpi = 130;
        config.classifier.run_inference_on_upload = false;
        config
    }

    pub(crate) fn run_samples(name: &str, samples: &[f32]) -> (TempDir, RunOutcome) {
        run_with(config(), name, samples)
    }

    pub(crate) fn run_with(config: PipelineConfig, name: &str, samples: &[f32]) -> (TempDir, RunOutcome) {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new(name, wav(samples));
        let mut pipeline = Pipeline::new(config, None, CancelToken::new());
        let outcome = pipeline.run(&source, dir.path()).unwrap();
        (dir, outcome)
    }

    fn check_invariants(assets: &SpectrogramAssets) {
        let c = &assets.compressed;
        assert_eq!(c.widths.len(), c.starts.len());
        assert_eq!(c.starts.len(), c.stops.len());
        for i in 0..c.starts.len() {
            assert!(c.starts[i] <= c.stops[i]);
            if i + 1 < c.starts.len() {
                assert!(c.stops[i] <= c.starts[i + 1]);
            }
            // start/stop are whole ms: each end is off by at most half a ms (4 px)
            let expected = (c.stops[i] - c.starts[i]) as f64 / assets.duration * f64::from(assets.normal.width);
            assert!((expected - f64::from(c.widths[i])).abs() <= 8.0 + 1e-9);
        }
        assert_eq!(c.widths.iter().sum::<u32>(), c.width);
        let covered: u64 = c.starts.iter().zip(&c.stops).map(|(s, e)| e - s).sum();
        assert!(covered as f64 <= assets.duration.round());

        for bundle in &c.segments {
            assert_eq!(bundle.contour_count, bundle.contours.len());
            let (start, stop) = (bundle.start_ms as f64, bundle.stop_ms as f64);
            for pair in bundle.contours.windows(2) {
                assert!(pair[0].level <= pair[1].level);
            }
            for (i, contour) in bundle.contours.iter().enumerate() {
                assert_eq!(contour.index, i);
                assert_eq!(contour.curve.first(), contour.curve.last());
                for &[t, _] in &contour.curve {
                    assert!(t >= start - 0.01 && t <= stop + 0.01, "{t} outside [{start}, {stop}]");
                }
            }
        }
    }

    pub(crate) fn contour_total(assets: &SpectrogramAssets) -> usize {
        assets.compressed.segments.iter().map(|b| b.contour_count).sum()
    }

    #[test]
    fn silence_keeps_the_whole_recording() {
        let (dir, outcome) = run_samples("silence.wav", &silence(200));
        let assets = &outcome.assets;
        check_invariants(assets);
        assert_eq!(assets.compressed.starts, vec![0]);
        assert_eq!(assets.compressed.stops, vec![200]);
        assert_eq!(assets.compressed.width, assets.normal.width);
        assert_eq!(contour_total(assets), 0);
        assert!(assets.prediction.is_none());
        assert_eq!(outcome.exit_code(), 0);

        assert_eq!(assets.normal.paths, vec!["./silence_spectrogram.01_of_01.jpg"]);
        assert_eq!(assets.compressed.masks, vec!["./silence_compressed.01_of_01.mask.jpg"]);
        assert!(dir.path().join(SPECTROGRAM_DIR).join("silence_spectrogram.01_of_01.jpg").is_file());
        assert!(dir.path().join(COMPRESSED_DIR).join("silence_compressed.01_of_01.jpg").is_file());
        assert!(dir.path().join(COMPRESSED_DIR).join("silence_compressed.01_of_01.mask.jpg").is_file());
        assert!(outcome.assets_path.is_file());
        assert!(!dir.path().join(crate::output::LOCK_FILE).exists());
    }

    #[test]
    fn single_chirp_gives_one_segment_with_contours() {
        let mut samples = silence(400);
        add_chirp(&mut samples, 200.0);
        let (_dir, outcome) = run_samples("chirp.wav", &samples);
        let assets = &outcome.assets;
        check_invariants(assets);

        let c = &assets.compressed;
        assert_eq!(c.starts.len(), 1);
        assert!(c.starts[0] >= 150 && c.starts[0] <= 195, "start {}", c.starts[0]);
        assert!(c.stops[0] >= 205 && c.stops[0] <= 250, "stop {}", c.stops[0]);
        assert!(c.width < assets.normal.width);

        assert!(contour_total(assets) >= 1);
        let in_band = c.segments[0]
            .contours
            .iter()
            .flat_map(|k| k.curve.iter())
            .any(|&[_, f]| (25_000.0..=55_000.0).contains(&f));
        assert!(in_band);
    }

    #[test]
    fn chirps_five_ms_apart_merge() {
        let mut samples = silence(400);
        add_chirp(&mut samples, 200.0);
        add_chirp(&mut samples, 215.0);
        let (_dir, outcome) = run_samples("pair.wav", &samples);
        check_invariants(&outcome.assets);
        let c = &outcome.assets.compressed;
        assert_eq!(c.starts.len(), 1);
        assert_eq!(c.widths.iter().sum::<u32>(), c.width);
    }

    #[test]
    fn chirps_500_ms_apart_stay_separate() {
        let mut samples = silence(800);
        add_chirp(&mut samples, 150.0);
        add_chirp(&mut samples, 665.0);
        let (_dir, outcome) = run_samples("far.wav", &samples);
        let assets = &outcome.assets;
        check_invariants(assets);
        let c = &assets.compressed;
        assert_eq!(c.starts.len(), 2);
        assert!(c.stops[0] < c.starts[1]);
        assert_eq!(c.segments.len(), 2);
        assert!(c.segments.iter().all(|b| b.contour_count >= 1));
    }

    #[test]
    fn out_of_band_tone_is_degenerate() {
        let (_dir, outcome) = run_samples("tone.wav", &faded_tone(250));
        let assets = &outcome.assets;
        check_invariants(assets);
        assert_eq!(assets.compressed.starts, vec![0]);
        assert_eq!(assets.compressed.stops, vec![250]);
        assert_eq!(assets.compressed.width, assets.normal.width);
        assert_eq!(contour_total(assets), 0);
    }

    #[test]
    fn rerun_is_identical() {
        let mut samples = silence(300);
        add_chirp(&mut samples, 150.0);
        let (_a, first) = run_samples("again.wav", &samples);
        let (_b, second) = run_samples("again.wav", &samples);
        assert_eq!(first.assets, second.assets);
    }

    #[test]
    fn invalid_audio_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new("broken.wav", b"definitely not audio".to_vec());
        let mut pipeline = Pipeline::new(config(), None, CancelToken::new());
        let err = pipeline.run(&source, dir.path()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidAudio);
        assert_eq!(err.exit_code(), 2);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_run_removes_the_directory_it_created() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("fresh").join("run");
        let source = MemorySource::new("broken.wav", b"definitely not audio".to_vec());
        let mut pipeline = Pipeline::new(config(), None, CancelToken::new());
        assert!(pipeline.run(&source, &out).is_err());
        assert!(!root.path().join("fresh").exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn svg_export_draws_the_traced_contours() {
        let mut samples = silence(300);
        add_chirp(&mut samples, 150.0);
        let mut config = config();
        config.contours.export_svg = true;
        let (dir, outcome) = run_with(config, "draw.wav", &samples);
        let c = &outcome.assets.compressed;
        assert_eq!(
            c.svgs,
            vec!["./draw_compressed.contours.svg", "./draw_compressed.contours.colored.svg"]
        );
        let filled = fs::read_to_string(dir.path().join(COMPRESSED_DIR).join("draw_compressed.contours.svg")).unwrap();
        assert_eq!(filled.matches("<path").count(), contour_total(&outcome.assets));
        assert!(filled.contains(&format!(r#"width="{}" height="{}""#, c.width, c.height)));
        assert!(dir.path().join(COMPRESSED_DIR).join("draw_compressed.contours.colored.svg").is_file());
    }

    #[test]
    fn svg_export_skips_recordings_without_contours() {
        let mut config = config();
        config.contours.export_svg = true;
        let (dir, outcome) = run_with(config, "quiet.wav", &silence(100));
        assert!(outcome.assets.compressed.svgs.is_empty());
        assert!(!dir.path().join(COMPRESSED_DIR).join("quiet_compressed.contours.svg").exists());
    }

    #[test]
    fn noise_filter_is_recorded_in_the_document() {
        let mut samples = silence(300);
        add_chirp(&mut samples, 150.0);
        let (_a, plain) = run_with(config(), "filtered.wav", &samples);
        let mut config = config();
        config.contours.noise_filter_threshold = Some(100.0);
        let (_b, outcome) = run_with(config, "filtered.wav", &samples);
        assert!(contour_total(&outcome.assets) <= contour_total(&plain.assets));
        assert!(plain.assets.noise_filter_threshold.is_none());
        assert_eq!(outcome.assets.noise_filter_threshold, Some(100.0));
        let text = fs::read_to_string(&outcome.assets_path).unwrap();
        assert!(text.contains("\"noise_filter_threshold\""));
    }

    #[test]
    fn contours_cross_the_tile_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let (width, height) = (50_100u32, 40u32);
        let mut mask = cs_render::GrayRaster::new(width, height);
        for row in mask.data.chunks_exact_mut(width as usize).skip(10).take(20) {
            row[49_976..50_024].fill(220);
        }
        let tiles = write_tiles(dir.path(), "wide", TileKind::Mask, TileImage::Gray(&mask)).unwrap();
        assert_eq!(tiles.widths, vec![50_000, 100]);

        let back = read_tiles(&tiles.files).unwrap();
        assert_eq!(back.width, width);
        let mut contour_config = cs_core::config::ContourConfig::default();
        contour_config.percentile_values = vec![50.0];
        let contours = trace_contours(&back.data, width as usize, height as usize, &contour_config);
        let straddles = |c: &Contour| {
            c.points.iter().any(|&(x, _)| x < 49_995.0) && c.points.iter().any(|&(x, _)| x > 50_005.0)
        };
        assert!(contours.iter().any(straddles));

        let layout = SegmentLayout {
            widths: vec![width],
            starts: vec![0],
            stops: vec![1_002],
            freq_min: 3_000.0,
            freq_max: 122_000.0,
            height,
        };
        let bundles = group_by_segment(&contours, &layout);
        assert_eq!(bundles[0].contour_count, contours.len());
        // 0.02 ms per px: the tile boundary sits at 1 000 ms
        assert!(bundles[0].contours.iter().any(|k| {
            k.curve.iter().any(|&[t, _]| t < 999.9) && k.curve.iter().any(|&[t, _]| t > 1_000.1)
        }));
    }

    #[test]
    fn cancelled_run_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new("cancel.wav", wav(&silence(50)));
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut pipeline = Pipeline::new(config(), None, cancel);
        let err = pipeline.run(&source, dir.path()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
        assert_eq!(err.exit_code(), 5);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unusable_model_still_writes_assets() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new("model.wav", wav(&silence(100)));
        let mut config = config();
        config.classifier.run_inference_on_upload = true;
        let mut pipeline = Pipeline::new(config, Some(dir.path().join("missing.onnx")), CancelToken::new());
        let outcome = pipeline.run(&source, &dir.path().join("out")).unwrap();
        assert_eq!(outcome.exit_code(), 3);
        assert!(outcome.assets.prediction.is_none());
        assert!(outcome.assets_path.is_file());
    }

    #[test]
    fn display_colormap_does_not_change_geometry() {
        let mut samples = silence(300);
        add_chirp(&mut samples, 150.0);
        let (_a, gray) = run_samples("cmap.wav", &samples);

        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.render.colormap = Colormap::Turbo;
        let mut pipeline = Pipeline::new(config, None, CancelToken::new());
        let turbo = pipeline
            .run(&MemorySource::new("cmap.wav", wav(&samples)), dir.path())
            .unwrap();
        assert_eq!(gray.assets.compressed.starts, turbo.assets.compressed.starts);
        assert_eq!(gray.assets.compressed.segments, turbo.assets.compressed.segments);
    }
}
