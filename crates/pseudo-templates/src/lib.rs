//! Example phrases with entity markers
//!
//! A template such as `"{NOM} travaille chez {ORG}."` is filled from
//! bindings to produce realistic sentences, optionally annotated with the
//! spans of every filled slot.

pub mod file;
pub mod generator;
pub mod template;

pub use file::{Section, TemplateFile};
pub use generator::CorpusGenerator;
pub use template::{AnnotatedSample, Bindings, Segment, Template, instantiate};
