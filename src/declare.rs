//! Positional declarations binding names to argument-vector slots

use crate::error::CodegenResult;
use crate::template::{RenderContext, Template};

/// Render one declaration per name, binding it to `slot` at consecutive 1-based indices.
///
/// `format` sees the placeholders `name`, `slot` and `index`.
pub fn define_many<S: AsRef<str>>(
    format: &Template,
    names: &[S],
    slot: &str,
    start: usize,
) -> CodegenResult<String> {
    names
        .iter()
        .enumerate()
        .map(|(offset, name)| {
            let ctx = RenderContext::new()
                .with("name", name.as_ref())
                .with("slot", slot)
                .with("index", (start + offset).to_string());
            format.render(&ctx)
        })
        .collect()
}
