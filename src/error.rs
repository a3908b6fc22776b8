use crate::span::Span;
use std::fmt;
use thiserror::Error;

/// Which stage of the pipeline rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Semantic,
    /// Internal-consistency fault during lowering, not a user error.
    CodeGen,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Lex => "lex error",
            ErrorKind::Parse => "parse error",
            ErrorKind::Semantic => "semantic error",
            ErrorKind::CodeGen => "codegen error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        CompileError {
            kind,
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        CompileError {
            kind,
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        Self::with_span(ErrorKind::Lex, message, span)
    }

    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        Self::with_span(ErrorKind::Parse, message, span)
    }

    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        Self::with_span(ErrorKind::Semantic, message, span)
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CodeGen, message)
    }

    /// Render the error with the offending source line and a caret under the
    /// reported column.
    pub fn display(&self, src: &str) -> String {
        let mut result = format!("{}: {}", self.kind, self.message);
        if let Some(span) = self.span {
            result.push_str(&format!("\n --> line {}, col {}", span.line, span.column));
            if let Some(line) = src.lines().nth(span.line as usize - 1) {
                result.push_str("\n   |\n");
                result.push_str(&format!("{:>2} | {}\n", span.line, line));
                result.push_str(&format!("   | {}^", " ".repeat(span.column as usize - 1)));
            }
        }
        result
    }
}
