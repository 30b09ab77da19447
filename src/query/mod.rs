pub mod input;
pub mod parser;

pub use input::{append_selection, format_keyword_for_input, QueryMemory};
pub use parser::{parse_keywords, Keyword, PALETTE_SIZE};
