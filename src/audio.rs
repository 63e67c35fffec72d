//! In-memory PCM: the working representation every layer is mixed in.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use thiserror::Error;

const PCM_CHUNK: usize = 64 * 1024;

/// Interleaved 16-bit PCM layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const CD_STEREO: AudioFormat = AudioFormat {
        sample_rate: 44_100,
        channels: 2,
    };

    /// Frames covering `ms` milliseconds, rounded to the nearest frame.
    pub fn frames_for_ms(&self, ms: u64) -> usize {
        ((ms * self.sample_rate as u64 + 500) / 1000) as usize
    }

    pub fn samples_for_ms(&self, ms: u64) -> usize {
        self.frames_for_ms(ms) * self.channels as usize
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::CD_STEREO
    }
}

#[derive(Debug, Error)]
#[error("layer is {layer:?} but the base is {base:?}")]
pub struct FormatMismatch {
    pub base: AudioFormat,
    pub layer: AudioFormat,
}

/// A decoded or mixed waveform.
///
/// Transformations consume the buffer and hand back the next state, so a
/// mix reads as a chain: base, then each layer on top, then trim and level.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    format: AudioFormat,
    samples: Vec<i16>,
}

impl AudioBuffer {
    /// Trailing samples that do not fill a whole frame are dropped.
    pub fn new(format: AudioFormat, mut samples: Vec<i16>) -> Self {
        let channels = format.channels.max(1) as usize;
        let whole = samples.len() - samples.len() % channels;
        samples.truncate(whole);
        AudioBuffer { format, samples }
    }

    pub fn silent(format: AudioFormat, duration_ms: u64) -> Self {
        AudioBuffer {
            format,
            samples: vec![0; format.samples_for_ms(duration_ms)],
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    /// Length in milliseconds, rounded to the nearest millisecond.
    pub fn duration_ms(&self) -> u64 {
        let rate = self.format.sample_rate.max(1) as u64;
        (self.frames() as u64 * 1000 + rate / 2) / rate
    }

    /// Whole milliseconds covered, rounded down.
    pub fn whole_ms(&self) -> u64 {
        let rate = self.format.sample_rate.max(1) as u64;
        self.frames() as u64 * 1000 / rate
    }

    /// Loudest absolute sample value.
    pub fn peak(&self) -> u16 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }

    /// Mix `layer` into this buffer starting at `position_ms`.
    ///
    /// Additive with saturation. The result keeps this buffer's length: any
    /// part of the layer past the end is dropped.
    pub fn overlay(
        mut self,
        layer: &AudioBuffer,
        position_ms: u64,
    ) -> Result<AudioBuffer, FormatMismatch> {
        if layer.format != self.format {
            return Err(FormatMismatch {
                base: self.format,
                layer: layer.format,
            });
        }
        let start = self.format.samples_for_ms(position_ms);
        if start >= self.samples.len() {
            return Ok(self);
        }
        for (dst, src) in self.samples[start..].iter_mut().zip(&layer.samples) {
            *dst = dst.saturating_add(*src);
        }
        Ok(self)
    }

    /// Keep only `[0, duration_ms)`. Shorter buffers are returned unchanged.
    pub fn truncated(mut self, duration_ms: u64) -> AudioBuffer {
        let keep = self.format.samples_for_ms(duration_ms);
        self.samples.truncate(keep);
        self
    }

    /// Scale so the peak sits `headroom_db` below full scale.
    /// Silence is returned untouched.
    pub fn normalized(mut self, headroom_db: f64) -> AudioBuffer {
        let peak = self.peak();
        if peak == 0 {
            return self;
        }
        let target = i16::MAX as f64 * 10f64.powf(-headroom_db.max(0.0) / 20.0);
        let gain = target / peak as f64;
        for s in &mut self.samples {
            *s = (*s as f64 * gain)
                .round()
                .clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        }
        self
    }

    /// Stream the samples as raw little-endian `s16le` PCM.
    pub fn write_s16le<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(PCM_CHUNK * 2);
        for chunk in self.samples.chunks(PCM_CHUNK) {
            bytes.clear();
            bytes.extend(chunk.iter().flat_map(|s| s.to_le_bytes()));
            out.write_all(&bytes)?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONO_1K: AudioFormat = AudioFormat {
        sample_rate: 1000,
        channels: 1,
    };

    fn constant(format: AudioFormat, duration_ms: u64, value: i16) -> AudioBuffer {
        AudioBuffer::new(format, vec![value; format.samples_for_ms(duration_ms)])
    }

    #[test]
    fn duration_follows_frames_and_rate() {
        let buf = AudioBuffer::silent(AudioFormat::CD_STEREO, 1_200_000);
        assert_eq!(buf.frames(), 52_920_000);
        assert_eq!(buf.duration_ms(), 1_200_000);
    }

    #[test]
    fn whole_ms_rounds_down() {
        let fmt = AudioFormat {
            sample_rate: 3000,
            channels: 1,
        };
        let buf = AudioBuffer::new(fmt, vec![0; 2999]);
        assert_eq!(buf.duration_ms(), 1000);
        assert_eq!(buf.whole_ms(), 999);
    }

    #[test]
    fn new_drops_partial_frames() {
        let stereo = AudioFormat {
            sample_rate: 1000,
            channels: 2,
        };
        let buf = AudioBuffer::new(stereo, vec![1, 2, 3]);
        assert_eq!(buf.samples(), &[1, 2]);
        assert_eq!(buf.frames(), 1);
    }

    #[test]
    fn overlay_adds_at_position() {
        let base = constant(MONO_1K, 10, 100);
        let layer = constant(MONO_1K, 3, 5);
        let mixed = base.overlay(&layer, 4).unwrap();
        assert_eq!(
            mixed.samples(),
            &[100, 100, 100, 100, 105, 105, 105, 100, 100, 100]
        );
    }

    #[test]
    fn overlay_never_extends_the_base() {
        let base = constant(MONO_1K, 5, 0);
        let layer = constant(MONO_1K, 10, 1);
        let mixed = base.overlay(&layer, 3).unwrap();
        assert_eq!(mixed.samples(), &[0, 0, 0, 1, 1]);
        let past_end = constant(MONO_1K, 5, 0).overlay(&layer, 50).unwrap();
        assert_eq!(past_end.peak(), 0);
    }

    #[test]
    fn overlay_saturates() {
        let base = constant(MONO_1K, 2, i16::MAX - 10);
        let layer = constant(MONO_1K, 2, 100);
        let mixed = base.overlay(&layer, 0).unwrap();
        assert!(mixed.samples().iter().all(|s| *s == i16::MAX));
    }

    #[test]
    fn overlay_rejects_other_formats() {
        let base = constant(MONO_1K, 2, 0);
        let layer = constant(AudioFormat::CD_STEREO, 2, 0);
        let err = base.overlay(&layer, 0).unwrap_err();
        assert_eq!(err.base, MONO_1K);
        assert_eq!(err.layer, AudioFormat::CD_STEREO);
    }

    #[test]
    fn truncated_cuts_to_exact_length() {
        let buf = constant(MONO_1K, 25, 1).truncated(20);
        assert_eq!(buf.duration_ms(), 20);
        let short = constant(MONO_1K, 5, 1).truncated(20);
        assert_eq!(short.duration_ms(), 5);
    }

    #[test]
    fn normalized_brings_peak_below_full_scale() {
        let buf = AudioBuffer::new(MONO_1K, vec![1000, -2000, 500]);
        let norm = buf.normalized(0.1);
        let expected = (i16::MAX as f64 * 10f64.powf(-0.1 / 20.0)).round() as u16;
        assert_eq!(norm.peak(), expected);
        // Relative levels survive.
        let s = norm.samples();
        assert_eq!(s[1].unsigned_abs(), expected);
        assert!(s[1] < 0);
        assert!((s[0] as i32 * 2 - s[1].unsigned_abs() as i32).abs() <= 2);
    }

    #[test]
    fn normalized_leaves_silence_alone() {
        let buf = AudioBuffer::silent(MONO_1K, 10).normalized(0.1);
        assert_eq!(buf.peak(), 0);
    }

    #[test]
    fn s16le_is_interleaved_little_endian() {
        let buf = AudioBuffer::new(MONO_1K, vec![1, -1, 256]);
        let mut out = Vec::new();
        buf.write_s16le(&mut out).unwrap();
        assert_eq!(out, vec![1, 0, 0xff, 0xff, 0, 1]);
    }
}
