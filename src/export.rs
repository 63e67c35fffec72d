//! Exporter: encodes a finished mix with ffmpeg and moves it into place.
//!
//! PCM is piped to ffmpeg on stdin. The encoder writes a hidden temp file
//! next to the destination, which is renamed over the destination only when
//! ffmpeg succeeds, so a failed export never leaves a truncated file behind.

use crate::audio::{AudioBuffer, AudioFormat};
use crate::error::{AssemblyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Mp3,
    Wav,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Wav => "wav",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default)]
    pub format: ExportFormat,
    /// mp3: 0 (best) – 9 (worst); ignored for wav.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Extra EBU R128 loudness pass in the encoder.
    #[serde(default)]
    pub loudnorm: bool,
}

fn default_quality() -> u8 {
    2
}

impl Default for ExportSettings {
    fn default() -> Self {
        ExportSettings {
            format: ExportFormat::Mp3,
            quality: default_quality(),
            loudnorm: false,
        }
    }
}

/// Durable destination for a finished mix.
pub trait AudioSink {
    fn write(&self, audio: &AudioBuffer, path: &Path) -> Result<()>;
}

/// Write `audio` to `destination` and hand the path back.
pub fn export<S: AudioSink + ?Sized>(
    sink: &S,
    audio: &AudioBuffer,
    destination: &Path,
) -> Result<PathBuf> {
    info!(path = %destination.display(), duration_ms = audio.duration_ms(), "exporting mix");
    if let Err(e) = sink.write(audio, destination) {
        error!(path = %destination.display(), error = %e, "export failed");
        return Err(e);
    }
    info!(path = %destination.display(), "export complete");
    Ok(destination.to_path_buf())
}

/// Build the ffmpeg argument list that reads raw PCM in `input` layout from
/// stdin and writes `output_path` with the given settings.
pub fn build_ffmpeg_args(
    input: AudioFormat,
    output_path: &str,
    settings: &ExportSettings,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-f".into(),
        "s16le".into(),
        "-ar".into(),
        input.sample_rate.to_string(),
        "-ac".into(),
        input.channels.to_string(),
        "-i".into(),
        "pipe:0".into(),
    ];

    if settings.loudnorm {
        args.push("-af".into());
        args.push("loudnorm".into());
    }

    // The temp file name does not end in the real extension, so the muxer is
    // always named explicitly.
    match settings.format {
        ExportFormat::Wav => {
            args.push("-acodec".into());
            args.push("pcm_s16le".into());
            args.push("-f".into());
            args.push("wav".into());
        }
        ExportFormat::Mp3 => {
            args.push("-codec:a".into());
            args.push("libmp3lame".into());
            args.push("-q:a".into());
            args.push(settings.quality.min(9).to_string());
            args.push("-f".into());
            args.push("mp3".into());
        }
    }

    args.push(output_path.to_string());
    args
}

/// Encodes through an external ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegSink {
    program: PathBuf,
    settings: ExportSettings,
}

impl FfmpegSink {
    pub fn new(settings: ExportSettings) -> Self {
        FfmpegSink {
            program: PathBuf::from("ffmpeg"),
            settings,
        }
    }

    /// Use a specific ffmpeg executable instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    fn run(&self, audio: &AudioBuffer, output: &Path, destination: &Path) -> Result<()> {
        let args = build_ffmpeg_args(
            audio.format(),
            &output.to_string_lossy(),
            &self.settings,
        );
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AssemblyError::Encode {
                path: destination.to_path_buf(),
                reason: format!("failed to launch {}: {}", self.program.display(), e),
            })?;

        let piped = match child.stdin.take() {
            Some(mut stdin) => audio.write_s16le(&mut stdin),
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .map_err(|e| AssemblyError::io(destination, e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AssemblyError::Encode {
                path: destination.to_path_buf(),
                reason: format!(
                    "{} exited with status {}: {}",
                    self.program.display(),
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }
        piped.map_err(|e| AssemblyError::io(destination, e))
    }
}

impl AudioSink for FfmpegSink {
    fn write(&self, audio: &AudioBuffer, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".affmix-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|e| AssemblyError::io(path, e))?;

        self.run(audio, temp.path(), path)?;

        temp.persist(path)
            .map_err(|e| AssemblyError::io(path, e.error))?;
        Ok(())
    }
}
