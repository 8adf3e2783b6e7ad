//! Core domain models and logic for pseudo
//!
//! This crate contains:
//! - The entity taxonomy and spans handed over by detectors
//! - Canonicalization of surface forms
//! - The token registry and its persisted mapping table
//! - The rewriter (pseudonymize) and its inverse (restore)

pub mod canonical;
pub mod entity;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod restore;
pub mod rewrite;
pub mod terms;
pub mod token;

pub use canonical::canonicalize;
pub use entity::{Entity, EntityKind, Span, char_spans_to_bytes};
pub use error::{CoreError, Result};
pub use mapping::{MappingEntry, MappingFormat, MappingTable, TableMetadata};
pub use registry::{Mapping, Registry, RegistryConfig, SharedRegistry, TokenAllocator, TokenStyle};
pub use restore::{Restored, UnknownTokenPolicy, restore};
pub use rewrite::{
    NumberingOrder, OverlapPolicy, Preview, PreviewEntry, Replacement, Rewrite, RewriteStats,
    Rewriter, pseudonymize,
};
pub use token::Token;
