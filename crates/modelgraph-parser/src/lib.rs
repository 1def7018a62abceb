pub mod dispatch_matcher;
pub mod file_collect;
pub mod language;
pub mod literal;
pub mod module_parser;
pub mod router;
pub mod serializer;
pub mod syntax;

#[cfg(test)]
mod tests;

pub use dispatch_matcher::*;
pub use file_collect::*;
pub use language::*;
pub use literal::*;
pub use module_parser::*;
pub use router::*;
pub use serializer::{apply, SourceEdit};
