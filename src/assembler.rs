//! Assembler: the whole request pipeline behind one call.
//!
//! Select → plan → compose → export, strictly in sequence. Every request
//! builds its own selection, timeline and mix; the only shared state is the
//! read-only pool, loader and sink, so one `Assembler` can serve concurrent
//! callers.

use crate::asset::{AssetPool, DirectoryPool};
use crate::audio::AudioFormat;
use crate::compositor::Compositor;
use crate::config::MixerConfig;
use crate::decode::{AudioLoader, RodioLoader};
use crate::error::Result;
use crate::export::{self, AudioSink, FfmpegSink};
use crate::selector::{AssetSelector, Selection};
use crate::timeline::{OUTRO_START_MS, Timeline};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// What a successful assembly produced.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub intro: String,
    pub outro: String,
    pub background: String,
    pub main_sections: Vec<String>,
    pub main_offsets_ms: Vec<u64>,
    pub outro_start_ms: u64,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

pub struct Assembler<P, L, S> {
    pool: P,
    loader: L,
    sink: S,
    format: AudioFormat,
    headroom_db: f64,
}

/// The production wiring: directories on disk, rodio decoding, ffmpeg export.
pub type FsAssembler = Assembler<DirectoryPool, RodioLoader, FfmpegSink>;

impl FsAssembler {
    pub fn from_config(config: &MixerConfig) -> Self {
        Assembler::new(
            config.pool(),
            RodioLoader,
            FfmpegSink::new(config.export.clone()),
        )
        .with_format(config.format())
        .with_headroom_db(config.headroom_db)
    }
}

impl<P: AssetPool, L: AudioLoader, S: AudioSink> Assembler<P, L, S> {
    pub fn new(pool: P, loader: L, sink: S) -> Self {
        Assembler {
            pool,
            loader,
            sink,
            format: AudioFormat::default(),
            headroom_db: 0.1,
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_headroom_db(mut self, headroom_db: f64) -> Self {
        self.headroom_db = headroom_db;
        self
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Pick the inputs for one mix, reproducibly when seeded.
    pub fn select(&self, seed: Option<u64>) -> Result<Selection> {
        match seed {
            Some(seed) => AssetSelector::with_seed(&self.pool, seed).select(),
            None => AssetSelector::new(&self.pool).select(),
        }
    }

    /// Randomly select assets and build a mix at `destination`.
    pub fn assemble(&self, destination: &Path) -> Result<AssemblyReport> {
        self.assemble_seeded(destination, None)
    }

    pub fn assemble_seeded(&self, destination: &Path, seed: Option<u64>) -> Result<AssemblyReport> {
        let selection = self.select(seed)?;
        self.assemble_selection(&selection, destination)
    }

    /// Build a mix from an explicit selection, skipping random picks.
    pub fn assemble_selection(
        &self,
        selection: &Selection,
        destination: &Path,
    ) -> Result<AssemblyReport> {
        let timeline = Timeline::plan(selection)?;
        info!(offsets = ?timeline.main_offsets(), "main section offsets");

        let mix = Compositor::new(&self.loader, self.format, self.headroom_db).compose(&timeline)?;
        let output = export::export(&self.sink, &mix, destination)?;

        Ok(AssemblyReport {
            output,
            intro: selection.intro.name(),
            outro: selection.outro.name(),
            background: selection.background.name(),
            main_sections: selection.main_sections.iter().map(|a| a.name()).collect(),
            main_offsets_ms: timeline.main_offsets(),
            outro_start_ms: OUTRO_START_MS,
            duration_ms: mix.duration_ms(),
            completed_at: Utc::now(),
        })
    }
}
