/// 模板模块 - `{{ name }}` 占位符替换
mod renderer;

pub use renderer::TemplateEngine;

/// 模板格式错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unclosed placeholder starting at byte {position}")]
    Unclosed { position: usize },

    #[error("Invalid placeholder expression: {{{{{0}}}}}")]
    InvalidExpression(String),
}
