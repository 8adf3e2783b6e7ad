//! Entity detection collaborators
//!
//! The core only needs spans; this crate provides the ways of getting them:
//! identifier regexes, term gazetteers and spans imported from an external
//! NER tool.

pub mod detector;
pub mod external;
pub mod gazetteer;
pub mod patterns;

pub use detector::{Detector, DetectorSet};
pub use external::{OffsetUnit, parse_external_spans};
pub use gazetteer::Gazetteer;
pub use patterns::PatternDetector;
