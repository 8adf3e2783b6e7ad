pub mod inputs;
pub mod pipeline;

pub use inputs::{collect_inputs, output_path};
pub use pipeline::{Document, DocumentOutcome, Pipeline, Processed};
