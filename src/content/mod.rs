//! Content module - post models, summary formatting and rich text

mod formatter;
mod post;
pub mod richtext;

pub use formatter::{estimate_read_time, summarize, DateFormatter, WORDS_PER_MINUTE};
pub use post::{
    Banner, ContentBlock, PostDetail, PostFields, PostSummary, RawContentBlock, SiblingRef,
};
pub use richtext::{HtmlRichText, RichTextNode, RichTextTransformer};
