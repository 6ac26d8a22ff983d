//! Users and Characters
//!
//! A user is the caller identity from the chat side. Each user owns any
//! number of named characters, and each character tracks how many of an
//! item (or skill points in a skill line) it still needs.

use crate::storage::api::StorageError;
use std::collections::BTreeMap;

/// A chat user and the characters they registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: String,
    characters: BTreeMap<String, Character>,
    /// Version read from the backend (0 = never committed)
    pub(crate) version: u64,
}

impl User {
    /// Creates an empty, never-committed user.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            characters: BTreeMap::new(),
            version: 0,
        }
    }

    /// Returns the user id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Looks up a character by exact name.
    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters.get(name)
    }

    /// Looks up a character by exact name for mutation.
    pub fn character_mut(&mut self, name: &str) -> Result<&mut Character, StorageError> {
        self.characters
            .get_mut(name)
            .ok_or_else(|| StorageError::CharacterNotFound(name.to_string()))
    }

    /// Returns all characters ordered by name.
    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    /// Returns the character names ordered by name.
    pub fn character_names(&self) -> Vec<String> {
        self.characters.keys().cloned().collect()
    }

    /// Registers a new character.
    pub fn add_character(&mut self, name: &str) -> Result<&mut Character, StorageError> {
        if self.characters.contains_key(name) {
            return Err(StorageError::CharacterExists(name.to_string()));
        }
        Ok(self
            .characters
            .entry(name.to_string())
            .or_insert_with(|| Character::new(name)))
    }

    /// Removes a character and returns it.
    pub fn remove_character(&mut self, name: &str) -> Result<Character, StorageError> {
        self.characters
            .remove(name)
            .ok_or_else(|| StorageError::CharacterNotFound(name.to_string()))
    }
}

/// A character and its outstanding needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    name: String,
    needed_items: BTreeMap<String, u64>,
    needed_skills: BTreeMap<String, u64>,
}

impl Character {
    /// Creates a character with no needs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            needed_items: BTreeMap::new(),
            needed_skills: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds `delta` to the needed count of `item`.
    ///
    /// Returns the new total.
    pub fn incr_needed_item(&mut self, item: &str, delta: u64) -> u64 {
        incr(&mut self.needed_items, item, delta)
    }

    /// Adds `delta` to the needed points in `skill`.
    ///
    /// Returns the new total.
    pub fn incr_needed_skill(&mut self, skill: &str, delta: u64) -> u64 {
        incr(&mut self.needed_skills, skill, delta)
    }

    pub fn needed_items(&self) -> &BTreeMap<String, u64> {
        &self.needed_items
    }

    pub fn needed_skills(&self) -> &BTreeMap<String, u64> {
        &self.needed_skills
    }
}

fn incr(counts: &mut BTreeMap<String, u64>, name: &str, delta: u64) -> u64 {
    let total = counts.entry(name.to_string()).or_insert(0);
    *total = total.saturating_add(delta);
    *total
}
