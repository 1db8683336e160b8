use cs_core::AudioSignal;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AudioError;
use crate::source::AudioSource;

/// Decode a recording into mono f32 samples at its native sample rate.
///
/// Supports WAV, MP3, FLAC, OGG, AAC via symphonia. Multi-channel input is
/// downmixed by averaging; no resampling happens, ultrasonic content is kept.
///
/// # Errors
/// Returns an error if the source cannot be opened, recognised or decoded, if the
/// sample rate is missing or zero, or if no sample is decoded.
///
/// # Example
/// ```no_run
/// use cs_audio::{FileSource, decode};
/// let signal = decode(&FileSource::new("night_01.wav")).unwrap();
/// println!("{} ms @ {} Hz", signal.duration_ms(), signal.sample_rate);
/// ```
pub fn decode(source: &dyn AudioSource) -> Result<AudioSignal, AudioError> {
    let mss = MediaSourceStream::new(source.open()?, MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = source.hint() {
        hint.with_extension(&ext);
    }

    let detected = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;

    let mut format = detected.format;
    let track = format.default_track().ok_or(AudioError::NoTrack)?;

    let sample_rate = match track.codec_params.sample_rate {
        Some(rate) if rate > 0 => rate,
        _ => return Err(AudioError::InvalidSampleRate),
    };
    let channels = track
        .codec_params
        .channels
        .map_or(1, symphonia::core::audio::Channels::count)
        .max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;

    let track_id = track.id;
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut max_sample_frames: usize = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("Audio decode packet error: {e}");
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Audio decode frame error: {e}");
                continue;
            }
            Err(e) => return Err(AudioError::DecodeError(e.to_string())),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.capacity();
        if sample_buf.is_none() || num_frames > max_sample_frames {
            sample_buf = Some(SampleBuffer::<f32>::new(num_frames as u64, spec));
            max_sample_frames = num_frames;
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        // Downmix to mono
        for chunk in buf.samples().chunks(channels) {
            samples.push(chunk.iter().sum::<f32>() / channels as f32);
        }
    }

    if samples.is_empty() {
        return Err(AudioError::Empty);
    }

    let signal = AudioSignal::new(samples, sample_rate);
    log::info!(
        "Decoded {} samples @ {}Hz ({:.1} ms) from {}",
        signal.samples.len(),
        sample_rate,
        signal.duration_ms(),
        source.name()
    );
    Ok(signal)
}
