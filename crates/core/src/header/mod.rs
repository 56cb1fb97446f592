//! Document header extraction and serialization.
//!
//! A header is an optional block at the very start of a document, delimited by
//! `---` lines, holding one `key: value` pair per line:
//! ```markdown
//! ---
//! type: article
//! title: "Hello"
//! draft: false
//! ---
//! # Document content
//! ```
//!
//! Keys holding a `:` or starting with `#` are written quoted (`"a:b": x`).

pub mod parser;
pub mod serializer;

pub use parser::{ExtractedHeader, HeaderError, extract_header, parse_scalar};
pub use serializer::{patch_header_values, serialize_document, serialize_header};
