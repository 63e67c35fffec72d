use crate::error::{AssemblyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// The four fixed asset categories a mix is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Intro,
    Outro,
    Main,
    Background,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Intro,
        Category::Outro,
        Category::Main,
        Category::Background,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Intro => "intro",
            Category::Outro => "outro",
            Category::Main => "main",
            Category::Background => "background",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selectable audio file. Its duration is only known once decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioAsset {
    pub path: PathBuf,
    pub category: Category,
}

impl AudioAsset {
    pub fn new(category: Category, path: impl Into<PathBuf>) -> Self {
        AudioAsset {
            path: path.into(),
            category,
        }
    }

    /// File name for log lines and reports.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Read-only source of assets, one listing per category.
///
/// Implementations return the whole category in a single call; callers treat
/// that listing as the snapshot for the rest of the request.
pub trait AssetPool {
    fn list(&self, category: Category) -> Result<Vec<AudioAsset>>;
}

/// Pool backed by one directory per category under a common root.
#[derive(Debug, Clone)]
pub struct DirectoryPool {
    dirs: HashMap<Category, PathBuf>,
    extensions: Vec<String>,
}

impl DirectoryPool {
    /// Each category maps to `root/<category>`.
    pub fn new(root: &Path, extensions: &[String]) -> Self {
        let dirs = Category::ALL
            .iter()
            .map(|c| (*c, root.join(c.as_str())))
            .collect();
        Self::with_dirs(dirs, extensions)
    }

    pub fn with_dirs(dirs: HashMap<Category, PathBuf>, extensions: &[String]) -> Self {
        DirectoryPool {
            dirs,
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub fn dir(&self, category: Category) -> Option<&Path> {
        self.dirs.get(&category).map(|p| p.as_path())
    }

    fn accepts(&self, path: &Path) -> bool {
        match path.extension() {
            Some(ext) => {
                let ext = ext.to_string_lossy().to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            }
            None => false,
        }
    }
}

impl AssetPool for DirectoryPool {
    fn list(&self, category: Category) -> Result<Vec<AudioAsset>> {
        let dir = self.dir(category).ok_or_else(|| AssemblyError::NotFound {
            category,
            reason: "no directory configured".to_string(),
        })?;

        let entries = std::fs::read_dir(dir).map_err(|e| AssemblyError::NotFound {
            category,
            reason: format!("cannot read '{}': {}", dir.display(), e),
        })?;

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.accepts(path))
            .collect();
        paths.sort();

        tracing::debug!(%category, dir = %dir.display(), count = paths.len(), "listed asset pool");
        Ok(paths
            .into_iter()
            .map(|p| AudioAsset::new(category, p))
            .collect())
    }
}

/// Pool held in memory, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    assets: HashMap<Category, Vec<PathBuf>>,
}

impl MemoryPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: Category, paths: &[&str]) -> Self {
        self.assets
            .entry(category)
            .or_default()
            .extend(paths.iter().map(PathBuf::from));
        self
    }
}

impl AssetPool for MemoryPool {
    fn list(&self, category: Category) -> Result<Vec<AudioAsset>> {
        Ok(self
            .assets
            .get(&category)
            .map(|paths| {
                paths
                    .iter()
                    .map(|p| AudioAsset::new(category, p.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn mp3_only() -> Vec<String> {
        vec!["mp3".to_string()]
    }

    fn make_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for c in Category::ALL {
            fs::create_dir(dir.path().join(c.as_str())).unwrap();
        }
        dir
    }

    #[test]
    fn directory_pool_lists_sorted_audio_files() {
        let root = make_tree();
        let main = root.path().join("main");
        fs::write(main.join("b.mp3"), b"fake").unwrap();
        fs::write(main.join("a.MP3"), b"fake").unwrap();
        fs::write(main.join("notes.txt"), b"text").unwrap();
        fs::create_dir(main.join("nested.mp3")).unwrap();

        let pool = DirectoryPool::new(root.path(), &mp3_only());
        let assets = pool.list(Category::Main).unwrap();
        let names: Vec<String> = assets.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["a.MP3", "b.mp3"]);
        assert!(assets.iter().all(|a| a.category == Category::Main));
    }

    #[test]
    fn directory_pool_empty_directory_lists_nothing() {
        let root = make_tree();
        let pool = DirectoryPool::new(root.path(), &mp3_only());
        assert!(pool.list(Category::Intro).unwrap().is_empty());
    }

    #[test]
    fn directory_pool_missing_directory_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let pool = DirectoryPool::new(root.path(), &mp3_only());
        let err = pool.list(Category::Outro).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::NotFound {
                category: Category::Outro,
                ..
            }
        ));
    }

    #[test]
    fn directory_pool_honours_extension_list() {
        let root = make_tree();
        let bg = root.path().join("background");
        fs::write(bg.join("rain.wav"), b"fake").unwrap();
        fs::write(bg.join("sea.mp3"), b"fake").unwrap();

        let pool = DirectoryPool::new(root.path(), &["WAV".to_string()]);
        let assets = pool.list(Category::Background).unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].name(), "rain.wav");
    }

    #[test]
    fn memory_pool_keeps_insertion_order() {
        let pool = MemoryPool::new().with(Category::Main, &["m2.mp3", "m1.mp3"]);
        let assets = pool.list(Category::Main).unwrap();
        assert_eq!(assets[0].path, PathBuf::from("m2.mp3"));
        assert_eq!(assets[1].path, PathBuf::from("m1.mp3"));
        assert!(pool.list(Category::Intro).unwrap().is_empty());
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::Background).unwrap();
        assert_eq!(json, "\"background\"");
    }
}
