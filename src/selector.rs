use crate::asset::{AssetPool, AudioAsset, Category};
use crate::error::{AssemblyError, Result};
use serde::Serialize;
use tracing::info;

/// The inputs of one mix, as picked from the pools.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub intro: AudioAsset,
    pub outro: AudioAsset,
    pub main_sections: Vec<AudioAsset>,
    pub background: AudioAsset,
}

/// Picks assets from a pool. Never mutates the pool.
pub struct AssetSelector<'a, P: AssetPool + ?Sized> {
    pool: &'a P,
    rng: fastrand::Rng,
}

impl<'a, P: AssetPool + ?Sized> AssetSelector<'a, P> {
    pub fn new(pool: &'a P) -> Self {
        AssetSelector {
            pool,
            rng: fastrand::Rng::new(),
        }
    }

    /// Reproducible picks for the same pool contents and seed.
    pub fn with_seed(pool: &'a P, seed: u64) -> Self {
        AssetSelector {
            pool,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Uniformly pick one asset from the category.
    pub fn select_one(&mut self, category: Category) -> Result<AudioAsset> {
        let mut assets = self.pool.list(category)?;
        if assets.is_empty() {
            return Err(AssemblyError::NotFound {
                category,
                reason: "pool is empty".to_string(),
            });
        }
        let idx = self.rng.usize(..assets.len());
        let picked = assets.swap_remove(idx);
        info!(%category, asset = %picked.name(), "selected asset");
        Ok(picked)
    }

    /// Every asset of the category, in listing order.
    pub fn select_all(&mut self, category: Category) -> Result<Vec<AudioAsset>> {
        let assets = self.pool.list(category)?;
        if assets.is_empty() {
            return Err(AssemblyError::NotFound {
                category,
                reason: "pool is empty".to_string(),
            });
        }
        info!(%category, count = assets.len(), "selected all assets");
        Ok(assets)
    }

    /// Main sections: like `select_all`, but an empty pool means there is
    /// nothing to distribute on the timeline.
    pub fn select_main(&mut self) -> Result<Vec<AudioAsset>> {
        let assets = self.pool.list(Category::Main)?;
        if assets.is_empty() {
            return Err(AssemblyError::NoContent);
        }
        info!(count = assets.len(), "selected main sections");
        Ok(assets)
    }

    /// Pick the full input set for one mix.
    pub fn select(&mut self) -> Result<Selection> {
        let intro = self.select_one(Category::Intro)?;
        let outro = self.select_one(Category::Outro)?;
        let main_sections = self.select_main()?;
        let background = self.select_one(Category::Background)?;
        Ok(Selection {
            intro,
            outro,
            main_sections,
            background,
        })
    }
}
