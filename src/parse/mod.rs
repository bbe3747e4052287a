pub mod frontmatter;
pub mod span;
pub mod tag_scanner;

pub use frontmatter::{split_front_matter, FieldValue, FrontMatter};
pub use span::Span;
pub use tag_scanner::scan_tags;
