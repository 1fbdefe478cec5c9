//! Pre-pass over preprocessor output: comment removal and line-marker
//! consumption.
//!
//! The external C preprocessor hands us text that still contains `//` and
//! `/* */` comments (we ask it to keep them, since the resource compiler's
//! comment rules are string-literal-aware in a way a C tokenizer's are not)
//! plus GCC-style `# <line> "<file>"` markers describing where each run of
//! lines originally came from.

mod comments;
mod source_mapping;

pub use comments::{remove_comments, remove_comments_in_place};
pub use source_mapping::{parse_and_remove_line_commands, SourceMapping, SourceMappings};
