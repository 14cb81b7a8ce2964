pub mod batch;
pub mod consolidated;
pub mod mention;
pub mod report;
pub mod source;

pub use batch::*;
pub use consolidated::*;
pub use mention::{AuthorMention, collapse_whitespace, join_name, non_blank};
pub use report::*;
pub use source::*;
