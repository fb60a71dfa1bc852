//! Read-only clip metadata and a minimal in-memory clip library.

use serde::{Deserialize, Serialize};

use crate::error::PlaybackError;
use crate::ids::{ClipId, IdAllocator};

/// An animation clip as seen by the scheduler: identity, length and a display name.
/// Keyframe data lives with the asset owner; the scheduler never mutates clips.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    pub name: String,
    /// Length in seconds.
    pub duration: f32,
}

/// Source of clip metadata.
pub trait ClipProvider {
    fn clip(&self, id: ClipId) -> Option<&Clip>;
}

/// Serialized clip description accepted by [`ClipLibrary::load_from_json`].
#[derive(Clone, Debug, Deserialize)]
struct ClipEntry {
    name: String,
    duration: f32,
}

#[derive(Default, Debug)]
pub struct ClipLibrary {
    ids: IdAllocator,
    items: Vec<Clip>,
}

impl ClipLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip and return its id.
    pub fn load_clip(&mut self, name: &str, duration: f32) -> ClipId {
        let id = self.ids.alloc_clip();
        self.items.push(Clip {
            id,
            name: name.to_string(),
            duration,
        });
        id
    }

    /// Load a JSON array of `{ "name": .., "duration": .. }` objects.
    pub fn load_from_json(&mut self, json: &str) -> Result<Vec<ClipId>, PlaybackError> {
        let entries: Vec<ClipEntry> = serde_json::from_str(json)?;
        Ok(entries
            .into_iter()
            .map(|e| self.load_clip(&e.name, e.duration))
            .collect())
    }

    pub fn unload(&mut self, id: ClipId) -> Option<Clip> {
        let pos = self.items.iter().position(|c| c.id == id)?;
        Some(self.items.swap_remove(pos))
    }

    pub fn get(&self, id: ClipId) -> Option<&Clip> {
        self.items.iter().find(|c| c.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<ClipId> {
        self.items.iter().find(|c| c.name == name).map(|c| c.id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ClipProvider for ClipLibrary {
    fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.get(id)
    }
}
