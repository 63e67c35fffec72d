//! Layer compositor: background as the base, intro/main/outro layered on top
//! at their planned offsets, then trimmed to the fixed window and levelled.

use crate::audio::{AudioBuffer, AudioFormat};
use crate::decode::AudioLoader;
use crate::error::{AssemblyError, Result};
use crate::timeline::{MIN_BACKGROUND_DURATION_MS, Timeline};
use tracing::{debug, info, warn};

/// Container durations are estimates (bitrate-derived for headerless MP3),
/// so the metadata pre-check only rejects beds short by more than this.
const PROBE_SLACK_MS: u64 = 2_000;

pub struct Compositor<'a, L: AudioLoader + ?Sized> {
    loader: &'a L,
    format: AudioFormat,
    headroom_db: f64,
}

impl<'a, L: AudioLoader + ?Sized> Compositor<'a, L> {
    pub fn new(loader: &'a L, format: AudioFormat, headroom_db: f64) -> Self {
        Compositor {
            loader,
            format,
            headroom_db,
        }
    }

    /// Mix the whole timeline. Any failing asset aborts with no output.
    pub fn compose(&self, timeline: &Timeline) -> Result<AudioBuffer> {
        if let Some(probed) = self.loader.probe_duration_ms(&timeline.background) {
            if probed + PROBE_SLACK_MS < MIN_BACKGROUND_DURATION_MS {
                warn!(
                    background = %timeline.background.name(),
                    probed_ms = probed,
                    "background metadata is too short, skipping decode"
                );
                return Err(AssemblyError::InsufficientDuration {
                    actual_ms: probed,
                    required_ms: MIN_BACKGROUND_DURATION_MS,
                });
            }
        }
        let mut mix = self.loader.load(&timeline.background, self.format)?;
        self.check_background(&mix)?;
        info!(
            background = %timeline.background.name(),
            duration_ms = mix.duration_ms(),
            "loaded background"
        );

        for placement in &timeline.placements {
            let layer = self.loader.load(&placement.asset, self.format)?;
            debug!(
                layer = ?placement.kind,
                asset = %placement.asset.name(),
                start_ms = placement.start_ms,
                duration_ms = layer.duration_ms(),
                "overlaying"
            );
            mix = mix
                .overlay(&layer, placement.start_ms)
                .map_err(|e| AssemblyError::decode(&placement.asset.path, e))?;
        }

        let mix = mix.truncated(timeline.total_duration_ms);
        let peak_before = mix.peak();
        let mix = mix.normalized(self.headroom_db);
        info!(
            duration_ms = mix.duration_ms(),
            peak_before,
            peak_after = mix.peak(),
            "composed mix"
        );
        Ok(mix)
    }

    /// The decoded bed must fill every frame of the minimum window.
    fn check_background(&self, background: &AudioBuffer) -> Result<()> {
        let required = self.format.frames_for_ms(MIN_BACKGROUND_DURATION_MS);
        if background.frames() < required {
            return Err(AssemblyError::InsufficientDuration {
                actual_ms: background.whole_ms(),
                required_ms: MIN_BACKGROUND_DURATION_MS,
            });
        }
        Ok(())
    }
}
