use crate::asset::AudioAsset;
use crate::audio::{AudioBuffer, AudioFormat};
use crate::error::{AssemblyError, Result};
use lofty::file::AudioFile;
use rodio::source::UniformSourceIterator;
use rodio::{Decoder, Source};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Turns an asset into PCM in the requested working format.
pub trait AudioLoader {
    fn load(&self, asset: &AudioAsset, format: AudioFormat) -> Result<AudioBuffer>;

    /// Cheap duration estimate without decoding, if the loader has one.
    fn probe_duration_ms(&self, _asset: &AudioAsset) -> Option<u64> {
        None
    }
}

/// Decodes files with rodio and converts them to the working format.
#[derive(Debug, Clone, Copy, Default)]
pub struct RodioLoader;

impl AudioLoader for RodioLoader {
    fn load(&self, asset: &AudioAsset, format: AudioFormat) -> Result<AudioBuffer> {
        let file = File::open(&asset.path).map_err(|e| AssemblyError::NotFound {
            category: asset.category,
            reason: match e.kind() {
                std::io::ErrorKind::NotFound => {
                    format!("'{}' does not exist", asset.path.display())
                }
                _ => format!("cannot open '{}': {}", asset.path.display(), e),
            },
        })?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| AssemblyError::decode(&asset.path, e))?;

        let native_rate = source.sample_rate();
        let native_channels = source.channels();
        let samples: Vec<i16> =
            UniformSourceIterator::<_, i16>::new(source, format.channels, format.sample_rate)
                .collect();
        if samples.is_empty() {
            return Err(AssemblyError::decode(&asset.path, "no audio frames"));
        }

        let buffer = AudioBuffer::new(format, samples);
        if let Ok(probed_ms) = probe_duration_ms(&asset.path) {
            check_complete(&asset.path, buffer.duration_ms(), probed_ms)?;
        }
        debug!(
            asset = %asset.name(),
            native_rate,
            native_channels,
            duration_ms = buffer.duration_ms(),
            "decoded asset"
        );
        Ok(buffer)
    }

    fn probe_duration_ms(&self, asset: &AudioAsset) -> Option<u64> {
        probe_duration_ms(&asset.path).ok()
    }
}

/// The decoder stops quietly at the first unrecoverable frame, so a stream
/// that ends well before its container says it should counts as corrupt.
fn check_complete(path: &Path, decoded_ms: u64, probed_ms: u64) -> Result<()> {
    let slack_ms = (probed_ms / 10).max(2_000);
    if decoded_ms + slack_ms < probed_ms {
        return Err(AssemblyError::decode(
            path,
            format!("stream ends at {decoded_ms} ms, container says {probed_ms} ms"),
        ));
    }
    Ok(())
}

/// Duration from container metadata (no decoding).
pub fn probe_duration_ms(path: &Path) -> Result<u64> {
    let tagged_file =
        lofty::read_from_path(path).map_err(|e| AssemblyError::decode(path, e))?;
    Ok(tagged_file.properties().duration().as_millis() as u64)
}

/// Loader over pre-built buffers, keyed by asset path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    buffers: HashMap<PathBuf, AudioBuffer>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<PathBuf>, buffer: AudioBuffer) -> Self {
        self.buffers.insert(path.into(), buffer);
        self
    }
}

impl AudioLoader for MemoryLoader {
    fn load(&self, asset: &AudioAsset, format: AudioFormat) -> Result<AudioBuffer> {
        let buffer = self
            .buffers
            .get(&asset.path)
            .ok_or_else(|| AssemblyError::NotFound {
                category: asset.category,
                reason: format!("'{}' does not exist", asset.path.display()),
            })?;
        if buffer.format() != format {
            return Err(AssemblyError::decode(
                &asset.path,
                format!("stored as {:?}, wanted {:?}", buffer.format(), format),
            ));
        }
        Ok(buffer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Category;
    use std::fs;

    /// Minimal PCM WAV writer for decoder fixtures.
    fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        bytes.extend_from_slice(&(channels * 2).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn rodio_loader_missing_file_is_not_found() {
        let asset = AudioAsset::new(Category::Intro, "nonexistent_intro.mp3");
        let err = RodioLoader
            .load(&asset, AudioFormat::CD_STEREO)
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::NotFound {
                category: Category::Intro,
                ..
            }
        ));
    }

    #[test]
    fn rodio_loader_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        fs::write(&path, b"this is plainly not an audio stream").unwrap();
        let asset = AudioAsset::new(Category::Main, &path);
        let err = RodioLoader
            .load(&asset, AudioFormat::CD_STEREO)
            .unwrap_err();
        assert!(matches!(err, AssemblyError::Decode { .. }));
    }

    #[test]
    fn rodio_loader_converts_to_working_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        // One second of mono at 8 kHz.
        let samples: Vec<i16> = (0..8000).map(|i| ((i % 100) * 100) as i16).collect();
        write_wav(&path, 8000, 1, &samples);

        let asset = AudioAsset::new(Category::Main, &path);
        let buffer = RodioLoader.load(&asset, AudioFormat::CD_STEREO).unwrap();
        assert_eq!(buffer.format(), AudioFormat::CD_STEREO);
        assert!(buffer.duration_ms().abs_diff(1000) <= 5);
    }

    #[test]
    fn probe_reads_container_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two_secs.wav");
        write_wav(&path, 8000, 1, &vec![0i16; 16_000]);
        let ms = probe_duration_ms(&path).unwrap();
        assert!(ms.abs_diff(2000) <= 5);
        let asset = AudioAsset::new(Category::Background, &path);
        assert!(RodioLoader.probe_duration_ms(&asset).is_some());
    }

    #[test]
    fn unopenable_path_is_not_found() {
        let asset = AudioAsset::new(Category::Main, "bad\0name.mp3");
        let err = RodioLoader
            .load(&asset, AudioFormat::CD_STEREO)
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::NotFound {
                category: Category::Main,
                ..
            }
        ));
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn stream_far_shorter_than_container_is_corrupt() {
        let path = Path::new("cut.mp3");
        let err = check_complete(path, 30_000, 200_000).unwrap_err();
        assert!(matches!(err, AssemblyError::Decode { .. }));
        assert!(err.to_string().contains("30000 ms"));
    }

    #[test]
    fn small_length_differences_are_tolerated() {
        let path = Path::new("clip.mp3");
        // VBR estimates drift by a few percent.
        assert!(check_complete(path, 1_150_000, 1_200_000).is_ok());
        assert!(check_complete(path, 800, 2_500).is_ok());
        assert!(check_complete(path, 1_250_000, 1_200_000).is_ok());
    }

    #[test]
    fn probe_missing_file_fails() {
        assert!(probe_duration_ms(Path::new("nonexistent.mp3")).is_err());
    }

    #[test]
    fn memory_loader_checks_presence_and_format() {
        let format = AudioFormat {
            sample_rate: 1000,
            channels: 1,
        };
        let loader = MemoryLoader::new().with("a.mp3", AudioBuffer::silent(format, 10));
        let a = AudioAsset::new(Category::Intro, "a.mp3");
        assert_eq!(loader.load(&a, format).unwrap().duration_ms(), 10);
        assert!(matches!(
            loader.load(&a, AudioFormat::CD_STEREO),
            Err(AssemblyError::Decode { .. })
        ));
        let b = AudioAsset::new(Category::Intro, "b.mp3");
        assert!(matches!(
            loader.load(&b, format),
            Err(AssemblyError::NotFound { .. })
        ));
        assert!(loader.probe_duration_ms(&a).is_none());
    }
}
