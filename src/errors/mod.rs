// src/errors/mod.rs
//! Structured diagnostics for the inference core (E2xxx).
//!
//! Errors are never recovered: the first diagnostic aborts compilation.
//! `InferError` wraps the underlying diagnostic with the stack of call-site
//! spans that led to it (innermost call first, top-level last).

#![allow(unused_assignments)] // False positives from thiserror derive

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::frontend::Span;

/// Convert a frontend span to a miette source span.
pub fn source_span(span: Span) -> SourceSpan {
    (span.start, span.len()).into()
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum SemanticError {
    #[error("undefined local variable or method '{name}'")]
    #[diagnostic(code(E2001))]
    UndefinedVariable {
        name: String,
        #[label("not found in scope")]
        span: SourceSpan,
    },

    #[error("undefined constant '{name}'")]
    #[diagnostic(code(E2001))]
    UndefinedConstant {
        name: String,
        #[label("not found in this scope or any enclosing scope")]
        span: SourceSpan,
    },

    #[error("undefined method '{name}' for {receiver}")]
    #[diagnostic(code(E2002))]
    UndefinedMethod {
        name: String,
        receiver: String,
        #[label("no such method")]
        span: SourceSpan,
    },

    #[error("no overload of '{name}' matches ({args}) for {receiver}")]
    #[diagnostic(
        code(E2003),
        help("argument types must satisfy one overload's restrictions")
    )]
    NoOverloadMatches {
        name: String,
        receiver: String,
        args: String,
        #[label("no matching overload")]
        span: SourceSpan,
    },

    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(E2004))]
    TypeMismatch {
        expected: String,
        found: String,
        #[label("type mismatch")]
        span: SourceSpan,
    },

    #[error("abstract method '{name}' must be implemented by '{class}'")]
    #[diagnostic(
        code(E2005),
        help("concrete descendants of an abstract class must inherit or implement every dispatched method")
    )]
    AbstractMethodMissing {
        name: String,
        class: String,
        #[label("dispatch reaches '{class}' here")]
        span: SourceSpan,
    },

    #[error("method instantiation too deep (possible recursion without a base case)")]
    #[diagnostic(code(E2006))]
    InstantiationTooDeep {
        #[label("while instantiating this call")]
        span: SourceSpan,
    },

    #[error("instance variable '{name}' is written in '{subclass}' but only read in '{superclass}'")]
    #[diagnostic(
        code(E2007),
        help("assign '{name}' in '{superclass}' as well, or move the accessor down")
    )]
    InstanceVarHoistConflict {
        name: String,
        subclass: String,
        superclass: String,
        #[label("read here")]
        span: SourceSpan,
    },

    #[error("wrong number of arguments for '{name}' (given {found}, expected {expected})")]
    #[diagnostic(code(E2008))]
    WrongArgumentCount {
        name: String,
        expected: String,
        found: usize,
        #[label("wrong number of arguments")]
        span: SourceSpan,
    },

    #[error("no block given")]
    #[diagnostic(code(E2009))]
    NoBlockGiven {
        #[label("'yield' requires the enclosing method to be called with a block")]
        span: SourceSpan,
    },

    #[error("'return' outside of method")]
    #[diagnostic(code(E2010))]
    ReturnOutsideMethod {
        #[label("not inside a method body")]
        span: SourceSpan,
    },

    #[error("empty {literal} literal needs an 'of' annotation")]
    #[diagnostic(code(E2011))]
    EmptyLiteralNeedsOf {
        literal: String,
        #[label("element type cannot be inferred")]
        span: SourceSpan,
    },

    #[error("cannot infer type parameter '{param}' of '{class}'")]
    #[diagnostic(
        code(E2012),
        help("add a restriction mentioning '{param}' to 'initialize', or name the arguments explicitly")
    )]
    CannotInferTypeParam {
        param: String,
        class: String,
        #[label("type parameter unbound at this construction")]
        span: SourceSpan,
    },
}

/// An inference failure plus the trail of call sites that reached it.
#[derive(Debug, Clone)]
pub struct InferError {
    pub error: SemanticError,
    /// Call-site spans, innermost first. Empty for top-level errors.
    pub trace: Vec<Span>,
}

impl InferError {
    pub fn new(error: SemanticError) -> Self {
        Self {
            error,
            trace: Vec::new(),
        }
    }

    /// Record the call site through which this error propagated.
    pub fn in_call(mut self, span: Span) -> Self {
        self.trace.push(span);
        self
    }
}

impl std::fmt::Display for InferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        for span in &self.trace {
            write!(f, "\n  in call at line {}, column {}", span.line, span.column)?;
        }
        Ok(())
    }
}

impl std::error::Error for InferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub type InferResult<T> = Result<T, InferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_accumulates_innermost_first() {
        let inner = Span::new(10, 12, 3, 5);
        let outer = Span::new(40, 45, 9, 1);
        let err = InferError::new(SemanticError::UndefinedVariable {
            name: "x".into(),
            span: source_span(inner),
        })
        .in_call(inner)
        .in_call(outer);

        assert_eq!(err.trace, vec![inner, outer]);
        let rendered = err.to_string();
        assert!(rendered.contains("undefined local variable"));
        assert!(rendered.contains("line 3"));
        assert!(rendered.contains("line 9"));
    }
}
