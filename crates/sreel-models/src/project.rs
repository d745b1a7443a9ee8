//! Project: the persisted single source of truth.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::block::Block;

/// A narration script broken into ordered blocks, with per-block asset state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    /// Project name; also the directory name under the projects root
    pub name: String,

    /// Visual theme hint passed through to visual prompts
    #[serde(default)]
    pub theme: String,

    /// Ordered narration blocks; indices are contiguous from 0
    pub blocks: Vec<Block>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last persisted update
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a project from pre-split narration lines.
    pub fn new(name: impl Into<String>, theme: impl Into<String>, lines: Vec<String>) -> Self {
        let now = Utc::now();
        let blocks = lines
            .into_iter()
            .enumerate()
            .map(|(i, text)| Block::new(i, text))
            .collect();
        Self {
            name: name.into(),
            theme: theme.into(),
            blocks,
            created_at: now,
            updated_at: now,
        }
    }

    /// Borrow a block by index.
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Mutably borrow a block by index.
    pub fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    /// Touch the update timestamp; call before persisting.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Check the contiguous-index invariant.
    pub fn indices_contiguous(&self) -> bool {
        self.blocks.iter().enumerate().all(|(i, b)| b.index == i)
    }
}
