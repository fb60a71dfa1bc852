//! Shared fixtures for playback tests: clip sets and scheduler configs listed
//! in `fixtures/manifest.json`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

/// Fixture name to path, relative to the fixtures directory.
#[derive(Debug, Deserialize)]
struct Manifest {
    clip_sets: HashMap<String, String>,
    configs: HashMap<String, String>,
}

impl Manifest {
    fn entry<'a>(
        section: &'a HashMap<String, String>,
        kind: &str,
        name: &str,
    ) -> Result<&'a str> {
        section
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
    }
}

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn read_fixture(rel: &str) -> Result<String> {
    let path = fixtures_dir().join(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn parse_fixture<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_fixture(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

/// One clip of a clip set, as the clip library would register it.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ClipSpec {
    pub name: String,
    pub duration: f32,
}

impl ClipSpec {
    /// Zero or negative length. The scheduler finishes these on the first tick.
    pub fn is_degenerate(&self) -> bool {
        self.duration <= 0.0
    }

    /// A spec is usable when it has a name and a finite duration. Degenerate
    /// durations are allowed; fixtures use them on purpose.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.name.trim().is_empty(), "clip spec without a name");
        ensure!(
            self.duration.is_finite(),
            "clip '{}' has a non-finite duration {}",
            self.name,
            self.duration
        );
        Ok(())
    }
}

/// A named, validated list of clips in file order.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipSet {
    pub name: String,
    pub clips: Vec<ClipSpec>,
}

impl ClipSet {
    /// Read and validate the clip set registered under `name`. Clip names
    /// must be unique within a set.
    pub fn load(name: &str) -> Result<Self> {
        let rel = Manifest::entry(&MANIFEST.clip_sets, "clip set", name)?;
        let clips: Vec<ClipSpec> = parse_fixture(rel)?;
        let mut seen = HashSet::new();
        for clip in &clips {
            clip.validate()
                .with_context(|| format!("invalid clip in set '{name}'"))?;
            if !seen.insert(clip.name.as_str()) {
                bail!("clip set '{name}' lists '{}' twice", clip.name);
            }
        }
        Ok(Self {
            name: name.to_string(),
            clips,
        })
    }

    pub fn get(&self, clip: &str) -> Option<&ClipSpec> {
        self.clips.iter().find(|c| c.name == clip)
    }

    /// Position of `clip` in the set, which is also its load order.
    pub fn position(&self, clip: &str) -> Option<usize> {
        self.clips.iter().position(|c| c.name == clip)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clips.iter().map(|c| c.name.as_str())
    }

    /// Sum of all non-degenerate clip lengths.
    pub fn total_duration(&self) -> f32 {
        self.clips
            .iter()
            .filter(|c| !c.is_degenerate())
            .map(|c| c.duration)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

pub mod clip_sets {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.clip_sets.keys().cloned().collect()
    }

    /// Raw JSON array, suitable for `ClipLibrary::load_from_json`.
    pub fn json(name: &str) -> Result<String> {
        read_fixture(Manifest::entry(&MANIFEST.clip_sets, "clip set", name)?)
    }

    pub fn load(name: &str) -> Result<ClipSet> {
        ClipSet::load(name)
    }

    /// One clip out of a set, failing with both names when it is missing.
    pub fn find(set: &str, clip: &str) -> Result<ClipSpec> {
        ClipSet::load(set)?
            .get(clip)
            .cloned()
            .ok_or_else(|| anyhow!("clip set '{set}' has no clip '{clip}'"))
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = Manifest::entry(&MANIFEST.clip_sets, "clip set", name)?;
        Ok(fixtures_dir().join(rel))
    }
}

pub mod configs {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.configs.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        read_fixture(Manifest::entry(&MANIFEST.configs, "config", name)?)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        parse_fixture(Manifest::entry(&MANIFEST.configs, "config", name)?)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = Manifest::entry(&MANIFEST.configs, "config", name)?;
        Ok(fixtures_dir().join(rel))
    }
}
