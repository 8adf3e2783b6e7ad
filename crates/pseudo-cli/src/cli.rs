use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pseudo")]
#[command(about = "Pseudonymize French documents with stable entity tokens", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: the user config directory)
    #[arg(long, global = true, env = "PSEUDO_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pseudonymize files, directories or glob patterns
    Run {
        /// Input files, directories or glob patterns
        #[arg(required = true)]
        inputs: Vec<String>,

        #[command(flatten)]
        spans: SpanArgs,

        /// Write outputs here instead of next to each input
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Mapping table path (single input, or shared mode)
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// One registry for every input, so tokens agree across files
        #[arg(long)]
        shared: bool,

        /// Continue numbering from an existing mapping table (implies --shared)
        #[arg(long)]
        continue_from: Option<PathBuf>,

        /// Scan directories recursively
        #[arg(long)]
        recursive: bool,

        #[command(flatten)]
        numbering: NumberingArgs,

        /// Print per-document statistics
        #[arg(long)]
        stats: bool,
    },

    /// Put the original text back using a mapping table
    Restore {
        /// Pseudonymized file
        input: PathBuf,

        /// Mapping table written by `run`
        #[arg(long)]
        mapping: PathBuf,

        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Leave unknown tokens in place instead of failing
        #[arg(long)]
        lenient: bool,
    },

    /// Show what `run` would replace, without writing anything
    Preview {
        input: PathBuf,

        #[command(flatten)]
        spans: SpanArgs,

        /// Compare against an existing mapping table
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Only these kinds (labels or markers, comma separated)
        #[arg(long, value_delimiter = ',')]
        kinds: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fill a template file with bindings or term pools
    Instantiate {
        /// Template file (`#` lines are section headers)
        templates: PathBuf,

        /// Marker values, e.g. --bind NOM="Julie Benetti" (repeat for more slots)
        #[arg(long = "bind")]
        bindings: Vec<String>,

        /// Term pool files, e.g. --terms ORG=organisations.txt
        #[arg(long = "terms")]
        terms: Vec<String>,

        /// Samples per template when drawing from term pools
        #[arg(long, default_value = "1")]
        count: usize,

        /// Only templates of this section
        #[arg(long)]
        section: Option<String>,

        /// Output annotated samples as JSON
        #[arg(long)]
        json: bool,

        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Write a default config file
    Init {
        /// Where to write it (default: the user config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
pub struct SpanArgs {
    /// JSON spans from an external NER tool (single input only)
    #[arg(long)]
    pub spans: Option<PathBuf>,

    /// Unit of the offsets in --spans
    #[arg(long, default_value = "bytes")]
    pub offsets: String,
}

#[derive(Args)]
pub struct NumberingArgs {
    /// One counter per kind (PERS_0001, ORG_0001, ...)
    #[arg(long, conflicts_with = "prefix")]
    pub per_kind: bool,

    /// Shared token prefix (default from config: ENT)
    #[arg(long)]
    pub prefix: Option<String>,

    /// First token number
    #[arg(long)]
    pub start: Option<u32>,

    /// Number entities from the end of the document backwards
    #[arg(long)]
    pub reverse: bool,

    /// Fail on overlapping spans instead of keeping the longest
    #[arg(long)]
    pub reject_overlaps: bool,

    /// Only these kinds (labels or markers, comma separated)
    #[arg(long, value_delimiter = ',')]
    pub kinds: Vec<String>,
}
