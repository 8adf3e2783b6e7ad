//! Token registry - the entity <-> token bijection of one run
//!
//! Numbering is explicit per-run state handed to the constructor, so two
//! documents processed side by side never share a counter unless a
//! `SharedRegistry` is introduced on purpose.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind};
use crate::mapping::{MappingEntry, MappingTable, TableMetadata};
use crate::token::Token;
use crate::{CoreError, Result};

/// How token prefixes and counters are organised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum TokenStyle {
    /// One counter shared by every kind (`ENT_0001`, `ENT_0002`, ...)
    Shared { prefix: String },
    /// One counter per kind (`PERS_0001`, `ORG_0001`, ...)
    PerKind,
}

impl Default for TokenStyle {
    fn default() -> Self {
        TokenStyle::Shared {
            prefix: "ENT".to_string(),
        }
    }
}

impl TokenStyle {
    fn prefix_for(&self, kind: EntityKind) -> &str {
        match self {
            TokenStyle::Shared { prefix } => prefix,
            TokenStyle::PerKind => kind.token_prefix(),
        }
    }
}

/// Per-run numbering state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(flatten)]
    pub style: TokenStyle,
    /// First number handed out by each counter
    pub start: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            style: TokenStyle::default(),
            start: 1,
        }
    }
}

/// One allocated token and the entity behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub token: Token,
    pub entity: Entity,
    /// Allocation order within the run, starting at 0
    pub first_seen: usize,
}

/// Anything that can hand out tokens for entities.
///
/// Implemented by the per-document `Registry` and by `SharedRegistry`.
pub trait TokenAllocator {
    /// Token for `entity`, and whether this call allocated it
    fn assign(&mut self, entity: &Entity) -> (Token, bool);
}

#[derive(Debug, Clone)]
pub struct Registry {
    config: RegistryConfig,
    /// Next number per prefix
    counters: BTreeMap<String, u32>,
    entries: Vec<Mapping>,
    by_entity: HashMap<Entity, usize>,
    by_token: HashMap<Token, usize>,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            counters: BTreeMap::new(),
            entries: Vec::new(),
            by_entity: HashMap::new(),
            by_token: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Token for `entity`, allocating a fresh one on first sight.
    pub fn get_or_create(&mut self, entity: &Entity) -> Token {
        self.assign(entity).0
    }

    fn assign(&mut self, entity: &Entity) -> (Token, bool) {
        if let Some(&idx) = self.by_entity.get(entity) {
            return (self.entries[idx].token.clone(), false);
        }

        let token = self.allocate(entity.kind);
        tracing::debug!(token = %token, kind = %entity.kind, "allocated token");
        self.insert(token.clone(), entity.clone());
        (token, true)
    }

    /// Inverse lookup; fails for tokens never allocated in this registry.
    pub fn resolve(&self, token: &Token) -> Result<&Entity> {
        self.by_token
            .get(token)
            .map(|&idx| &self.entries[idx].entity)
            .ok_or_else(|| CoreError::UnknownToken {
                token: token.to_string(),
                offset: None,
            })
    }

    pub fn resolve_str(&self, token: &str) -> Result<&Entity> {
        self.resolve(&token.parse()?)
    }

    /// Token already assigned to `entity`, without allocating.
    pub fn lookup(&self, entity: &Entity) -> Option<&Token> {
        self.by_entity.get(entity).map(|&idx| &self.entries[idx].token)
    }

    pub fn contains_token(&self, token: &Token) -> bool {
        self.by_token.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mappings in allocation order
    pub fn iter(&self) -> impl Iterator<Item = &Mapping> {
        self.entries.iter()
    }

    /// Prefixes in use, for telling tokens apart from ordinary words
    pub fn prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = self
            .entries
            .iter()
            .map(|m| m.token.prefix().to_string())
            .collect();
        prefixes.sort();
        prefixes.dedup();
        prefixes
    }

    /// Counters as they stand, keyed by prefix
    pub fn counters(&self) -> &BTreeMap<String, u32> {
        &self.counters
    }

    /// Export the registry as a mapping table.
    pub fn to_table(&self) -> MappingTable {
        MappingTable {
            metadata: TableMetadata::new(self.config.clone(), self.len()),
            entries: self
                .entries
                .iter()
                .map(|m| MappingEntry {
                    token: m.token.clone(),
                    kind: m.entity.kind,
                    canonical: m.entity.canonical.clone(),
                    surface: m.entity.surface.clone(),
                })
                .collect(),
            counters: self.counters.clone(),
        }
    }

    /// Rebuild a registry from a table, refusing anything that breaks the
    /// bijection.
    pub fn from_table(table: &MappingTable) -> Result<Self> {
        let mut registry = Registry::new(table.metadata.numbering.clone());

        for entry in &table.entries {
            let entity = Entity {
                kind: entry.kind,
                canonical: entry.canonical.clone(),
                surface: entry.surface.clone(),
            };
            if registry.by_token.contains_key(&entry.token) {
                return Err(CoreError::CorruptTable(format!(
                    "token {} appears twice",
                    entry.token
                )));
            }
            if let Some(existing) = registry.lookup(&entity) {
                return Err(CoreError::CorruptTable(format!(
                    "{} {:?} mapped to both {} and {}",
                    entity.kind, entity.canonical, existing, entry.token
                )));
            }
            registry.insert(entry.token.clone(), entity);
        }

        // Resume numbering after the highest number already present
        for entry in &table.entries {
            let next = registry
                .counters
                .entry(entry.token.prefix().to_string())
                .or_insert(0);
            *next = (*next).max(entry.token.number().saturating_add(1));
        }
        for (prefix, saved) in &table.counters {
            let next = registry.counters.entry(prefix.clone()).or_insert(0);
            *next = (*next).max(*saved);
        }

        Ok(registry)
    }

    fn allocate(&mut self, kind: EntityKind) -> Token {
        let start = self.config.start;
        let prefix = self.config.style.prefix_for(kind).to_string();
        let next = self.counters.entry(prefix.clone()).or_insert(start);
        let number = *next;
        *next = next.saturating_add(1);

        let base = Token::new(prefix, number);
        if !self.by_token.contains_key(&base) {
            return base;
        }

        // The number is held by a reloaded entry; disambiguate with a suffix.
        let mut variant = 1;
        loop {
            let candidate = base.clone().with_variant(variant);
            if !self.by_token.contains_key(&candidate) {
                return candidate;
            }
            variant += 1;
        }
    }

    fn insert(&mut self, token: Token, entity: Entity) {
        let idx = self.entries.len();
        self.by_entity.insert(entity.clone(), idx);
        self.by_token.insert(token.clone(), idx);
        self.entries.push(Mapping {
            token,
            entity,
            first_seen: idx,
        });
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl TokenAllocator for Registry {
    fn assign(&mut self, entity: &Entity) -> (Token, bool) {
        Registry::assign(self, entity)
    }
}

/// A registry shared between documents processed in parallel.
///
/// `get_or_create` is the only writer and takes the lock; everything else
/// reads a consistent view.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    pub fn get_or_create(&self, entity: &Entity) -> Token {
        self.lock().get_or_create(entity)
    }

    pub fn resolve(&self, token: &Token) -> Result<Entity> {
        self.lock().resolve(token).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the registry as it stands
    pub fn snapshot(&self) -> Registry {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // `insert` runs only after allocation, so a poisoned registry is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenAllocator for SharedRegistry {
    fn assign(&mut self, entity: &Entity) -> (Token, bool) {
        self.lock().assign(entity)
    }
}
