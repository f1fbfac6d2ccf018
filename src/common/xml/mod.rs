//! XML text helpers shared by the reader and the writer.

mod escape;

pub use escape::{escape_xml, resolve_entity};
