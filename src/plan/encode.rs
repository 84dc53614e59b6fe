use std::fmt;
use std::path::{Path, PathBuf};

use crate::job::{Bitrate, OutputFormat, SampleRate};
use crate::media::formats::extension_of;

/// Bitrate applied to lossy codecs when the user leaves it on `auto`.
pub const DEFAULT_LOSSY_BITRATE_KBPS: u32 = 192;

/// WAV sample rate for `auto`, so high-rate sources don't turn into huge PCM files.
pub const DEFAULT_WAV_SAMPLE_RATE_HZ: u32 = 44_100;

/// Audio codec chosen for an output extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Mp3,
    Pcm16,
    Flac,
    Aac,
    Vorbis,
    /// Extension the table has no entry for; the engine picks the container default.
    ContainerDefault,
}

impl AudioCodec {
    /// Codec table keyed by lower-case extension.
    pub fn for_extension(extension: &str) -> Self {
        match extension {
            "mp3" => AudioCodec::Mp3,
            "wav" => AudioCodec::Pcm16,
            "flac" => AudioCodec::Flac,
            "m4a" | "aac" => AudioCodec::Aac,
            "ogg" => AudioCodec::Vorbis,
            _ => AudioCodec::ContainerDefault,
        }
    }

    /// Encoder name passed to the engine, `None` to let it choose.
    pub fn ffmpeg_codec(&self) -> Option<&'static str> {
        match self {
            AudioCodec::Mp3 => Some("libmp3lame"),
            AudioCodec::Pcm16 => Some("pcm_s16le"),
            AudioCodec::Flac => Some("flac"),
            AudioCodec::Aac => Some("aac"),
            AudioCodec::Vorbis => Some("libvorbis"),
            AudioCodec::ContainerDefault => None,
        }
    }

    /// Lossless and uncompressed codecs ignore bitrate entirely.
    pub fn takes_bitrate(&self) -> bool {
        matches!(self, AudioCodec::Mp3 | AudioCodec::Aac | AudioCodec::Vorbis)
    }

    /// Bitrate used for `auto`, if the codec has one.
    pub fn default_bitrate_kbps(&self) -> Option<u32> {
        match self {
            AudioCodec::Mp3 | AudioCodec::Aac => Some(DEFAULT_LOSSY_BITRATE_KBPS),
            _ => None,
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ffmpeg_codec().unwrap_or("container default"))
    }
}

/// Concrete encoder settings and the final output path for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodePlan {
    /// Lower-case extension of `output_path`, without the dot.
    pub extension: String,
    pub codec: AudioCodec,
    pub bitrate_kbps: Option<u32>,
    pub sample_rate_hz: Option<u32>,
    pub output_path: PathBuf,
}

impl EncodePlan {
    /// Resolve format, bitrate and sample-rate selectors against the requested output path.
    ///
    /// The path's extension is rewritten only for an explicit format; with
    /// `same` the requested path is kept as is.
    pub fn resolve(
        output_path: &Path,
        format: OutputFormat,
        bitrate: Bitrate,
        sample_rate: SampleRate,
    ) -> Self {
        let output_path = match format.extension() {
            Some(ext) => output_path.with_extension(ext),
            None => output_path.to_path_buf(),
        };
        let extension = extension_of(&output_path).unwrap_or_default();
        let codec = AudioCodec::for_extension(&extension);

        let bitrate_kbps = if codec.takes_bitrate() {
            bitrate.explicit().or(codec.default_bitrate_kbps())
        } else {
            None
        };

        let sample_rate_hz = match (sample_rate.explicit(), codec) {
            (Some(hz), _) => Some(hz),
            (None, AudioCodec::Pcm16) => Some(DEFAULT_WAV_SAMPLE_RATE_HZ),
            (None, _) => None,
        };

        Self {
            extension,
            codec,
            bitrate_kbps,
            sample_rate_hz,
            output_path,
        }
    }

    /// Engine arguments for codec, bitrate and sample rate.
    pub fn codec_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(codec) = self.codec.ffmpeg_codec() {
            args.extend(["-acodec".to_string(), codec.to_string()]);
        }
        if let Some(kbps) = self.bitrate_kbps {
            args.extend(["-b:a".to_string(), format!("{kbps}k")]);
        }
        if let Some(hz) = self.sample_rate_hz {
            args.extend(["-ar".to_string(), hz.to_string()]);
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(path: &str, format: OutputFormat, bitrate: Bitrate, rate: SampleRate) -> EncodePlan {
        EncodePlan::resolve(Path::new(path), format, bitrate, rate)
    }

    #[test]
    fn test_mp3_defaults_to_192k() {
        let plan = resolve("/out/a.mp3", OutputFormat::Same, Bitrate::Auto, SampleRate::Auto);
        assert_eq!(plan.codec, AudioCodec::Mp3);
        assert_eq!(plan.bitrate_kbps, Some(192));
        assert_eq!(plan.sample_rate_hz, None);
        assert_eq!(plan.output_path, PathBuf::from("/out/a.mp3"));
    }

    #[test]
    fn test_explicit_bitrate_overrides_default() {
        let plan = resolve("/out/a.m4a", OutputFormat::Same, Bitrate::Kbps(320), SampleRate::Auto);
        assert_eq!(plan.codec, AudioCodec::Aac);
        assert_eq!(plan.bitrate_kbps, Some(320));
    }

    #[test]
    fn test_wav_auto_rate_is_44100() {
        let plan = resolve("/out/a.flac", OutputFormat::Wav, Bitrate::Kbps(320), SampleRate::Auto);
        assert_eq!(plan.codec, AudioCodec::Pcm16);
        assert_eq!(plan.sample_rate_hz, Some(44_100));
        assert_eq!(plan.bitrate_kbps, None);
        assert_eq!(plan.output_path, PathBuf::from("/out/a.wav"));
    }

    #[test]
    fn test_wav_explicit_rate_is_honored() {
        let plan = resolve("/out/a.wav", OutputFormat::Same, Bitrate::Auto, SampleRate::Hz(96_000));
        assert_eq!(plan.sample_rate_hz, Some(96_000));
    }

    #[test]
    fn test_flac_has_no_bitrate() {
        let plan = resolve("/out/a.flac", OutputFormat::Same, Bitrate::Kbps(256), SampleRate::Hz(48_000));
        assert_eq!(plan.codec, AudioCodec::Flac);
        assert_eq!(plan.bitrate_kbps, None);
        assert_eq!(plan.sample_rate_hz, Some(48_000));
    }

    #[test]
    fn test_ogg_bitrate_only_when_explicit() {
        let auto = resolve("/out/a.ogg", OutputFormat::Same, Bitrate::Auto, SampleRate::Auto);
        assert_eq!(auto.codec, AudioCodec::Vorbis);
        assert_eq!(auto.bitrate_kbps, None);

        let explicit = resolve("/out/a.ogg", OutputFormat::Same, Bitrate::Kbps(160), SampleRate::Auto);
        assert_eq!(explicit.bitrate_kbps, Some(160));
    }

    #[test]
    fn test_unknown_extension_uses_container_default() {
        let plan = resolve("/out/a.wma", OutputFormat::Same, Bitrate::Kbps(128), SampleRate::Auto);
        assert_eq!(plan.codec, AudioCodec::ContainerDefault);
        assert_eq!(plan.bitrate_kbps, None);
        assert!(plan.codec_args().is_empty());
    }

    #[test]
    fn test_uppercase_extension_maps_to_codec() {
        let plan = resolve("/out/Song.MP3", OutputFormat::Same, Bitrate::Auto, SampleRate::Auto);
        assert_eq!(plan.extension, "mp3");
        assert_eq!(plan.codec, AudioCodec::Mp3);
        assert_eq!(plan.output_path, PathBuf::from("/out/Song.MP3"));
    }

    #[test]
    fn test_codec_args() {
        let plan = resolve("/out/a.mp3", OutputFormat::Same, Bitrate::Auto, SampleRate::Hz(48_000));
        assert_eq!(
            plan.codec_args(),
            vec!["-acodec", "libmp3lame", "-b:a", "192k", "-ar", "48000"]
        );
    }
}
