//! Timeline planning: where each layer starts inside the fixed 20 minute window.

use crate::asset::AudioAsset;
use crate::error::{AssemblyError, Result};
use crate::selector::Selection;
use serde::Serialize;

/// Length of every finished mix.
pub const TOTAL_DURATION_MS: u64 = 20 * 60 * 1000;
/// Nominal end of the intro; main sections never start before this.
pub const INTRO_END_MS: u64 = 4 * 60 * 1000;
/// Fixed start of the outro.
pub const OUTRO_START_MS: u64 = 17 * 60 * 1000;
/// Backgrounds shorter than this are rejected before composing.
pub const MIN_BACKGROUND_DURATION_MS: u64 = 20 * 60 * 1000;

/// Spacing between consecutive main sections for `count` sections.
///
/// The window is the literal `[INTRO_END_MS, OUTRO_START_MS)`; it does not
/// adapt to the real intro/outro lengths.
pub fn main_section_interval(count: usize) -> Result<u64> {
    if count == 0 {
        return Err(AssemblyError::NoContent);
    }
    Ok((OUTRO_START_MS - INTRO_END_MS) / count as u64)
}

/// Start offsets of `count` evenly spread main sections.
pub fn main_section_offsets(count: usize) -> Result<Vec<u64>> {
    let interval = main_section_interval(count)?;
    Ok((0..count as u64)
        .map(|i| INTRO_END_MS + i * interval)
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "layer", content = "index")]
pub enum LayerKind {
    Intro,
    Main(usize),
    Outro,
}

/// One asset placed on the timeline.
#[derive(Debug, Clone, Serialize)]
pub struct Placement {
    pub kind: LayerKind,
    pub asset: AudioAsset,
    pub start_ms: u64,
}

/// The planned mix: a background plus layers in overlay order.
///
/// Placements may run past `total_duration_ms`; the compositor truncates.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub background: AudioAsset,
    pub placements: Vec<Placement>,
    pub interval_ms: u64,
    pub total_duration_ms: u64,
}

impl Timeline {
    /// Intro at 0, main sections evenly from `INTRO_END_MS`, outro at
    /// `OUTRO_START_MS`. Fails with `NoContent` before any arithmetic when
    /// there are no main sections.
    pub fn plan(selection: &Selection) -> Result<Self> {
        let interval_ms = main_section_interval(selection.main_sections.len())?;
        let offsets = main_section_offsets(selection.main_sections.len())?;

        let mut placements = Vec::with_capacity(selection.main_sections.len() + 2);
        placements.push(Placement {
            kind: LayerKind::Intro,
            asset: selection.intro.clone(),
            start_ms: 0,
        });
        for (i, (asset, start_ms)) in selection.main_sections.iter().zip(offsets).enumerate() {
            placements.push(Placement {
                kind: LayerKind::Main(i),
                asset: asset.clone(),
                start_ms,
            });
        }
        placements.push(Placement {
            kind: LayerKind::Outro,
            asset: selection.outro.clone(),
            start_ms: OUTRO_START_MS,
        });

        tracing::info!(
            sections = selection.main_sections.len(),
            interval_ms,
            "planned timeline"
        );

        Ok(Timeline {
            background: selection.background.clone(),
            placements,
            interval_ms,
            total_duration_ms: TOTAL_DURATION_MS,
        })
    }

    /// Offsets of the main sections only, in placement order.
    pub fn main_offsets(&self) -> Vec<u64> {
        self.placements
            .iter()
            .filter(|p| matches!(p.kind, LayerKind::Main(_)))
            .map(|p| p.start_ms)
            .collect()
    }
}
