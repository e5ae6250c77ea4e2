//! Diagnostic codes and helper functions for elaboration errors and
//! warnings.
//!
//! Error codes `E300`--`E399` cover fatal elaboration failures;
//! warning codes `W300`--`W303` cover non-fatal notices. All
//! elaboration errors are fatal to the current module: fallible
//! operations return [`ElabResult`], and the error carries the
//! diagnostic that the caller emits into the sink before aborting.

use veld_diagnostics::{Category, Diagnostic, DiagnosticCode, Label};
use veld_source::Span;

/// A fatal elaboration error wrapping the diagnostic to report.
#[derive(Debug)]
pub struct ElabError(pub Diagnostic);

/// The result type of all fallible elaboration operations.
pub type ElabResult<T> = Result<T, ElabError>;

impl From<ElabError> for Diagnostic {
    fn from(err: ElabError) -> Diagnostic {
        err.0
    }
}

/// Non-constant expression where a constant is required.
pub const E300: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 300,
};

/// Incompatible re-declaration of a wire.
pub const E301: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 301,
};

/// Unresolved name (defparam target, function or task name).
pub const E302: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 302,
};

/// Unsupported construct.
pub const E303: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 303,
};

/// Structurally invalid construct.
pub const E304: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 304,
};

/// Internal invariant violation (a bug in the elaborator).
pub const E399: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 399,
};

/// Memory demoted to a list of registers.
pub const W300: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 300,
};

/// Real parameter value coerced to a binary constant.
pub const W301: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 301,
};

/// Blocking assignment to a memory treated as non-blocking.
pub const W302: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 302,
};

/// Implicit wire created for an undeclared identifier.
pub const W303: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 303,
};

/// Creates a fatal error for a non-constant expression in a
/// constant-required position.
pub fn error_not_constant(what: &str, span: Span) -> ElabError {
    ElabError(Diagnostic::error(
        E300,
        format!("{what} is not constant"),
        span,
    ))
}

/// Creates a fatal error for an incompatible wire re-declaration.
pub fn error_incompatible_redecl(name: &str, span: Span, prev_span: Span) -> ElabError {
    ElabError(
        Diagnostic::error(
            E301,
            format!("incompatible re-declaration of wire `{name}`"),
            span,
        )
        .with_label(Label::secondary(prev_span, "first declared here")),
    )
}

/// Creates a fatal error for an unresolvable name.
pub fn error_unresolved(what: &str, name: &str, span: Span) -> ElabError {
    ElabError(Diagnostic::error(
        E302,
        format!("cannot resolve {what} `{name}`"),
        span,
    ))
}

/// Creates a fatal error for an unsupported construct.
pub fn error_unsupported(what: &str, span: Span) -> ElabError {
    ElabError(Diagnostic::error(E303, what.to_string(), span))
}

/// Creates a fatal error for a structurally invalid construct.
pub fn error_invalid_shape(what: &str, span: Span) -> ElabError {
    ElabError(Diagnostic::error(E304, what.to_string(), span))
}

/// Creates a fatal internal error. One of these firing is a bug in the
/// elaborator, not a problem with the input.
pub fn internal(message: &str, span: Span) -> ElabError {
    ElabError(Diagnostic::error(
        E399,
        format!("internal error: {message}"),
        span,
    ))
}

/// Creates the warning for a memory demoted to registers, listing the
/// source locations that triggered the demotion.
pub fn warn_mem2reg(name: &str, places: &[String], span: Span) -> Diagnostic {
    let mut diag = Diagnostic::warning(
        W300,
        format!("replacing memory `{name}` with a list of registers"),
        span,
    );
    if !places.is_empty() {
        diag = diag.with_note(format!("see {}", places.join(", ")));
    }
    diag
}

/// Creates the warning for a real parameter value converted to binary.
pub fn warn_real_coerced(value: f64, span: Span) -> Diagnostic {
    Diagnostic::warning(
        W301,
        format!("converting real value {value:e} to binary"),
        span,
    )
}

/// Creates the warning for a blocking assignment to a memory.
pub fn warn_blocking_memwr(span: Span) -> Diagnostic {
    Diagnostic::warning(
        W302,
        "blocking assignment to memory is handled like a non-blocking assignment",
        span,
    )
}

/// Creates the warning for an implicitly created wire.
pub fn warn_implicit_wire(name: &str, span: Span) -> Diagnostic {
    Diagnostic::warning(
        W303,
        format!("creating implicit 1-bit wire `{name}`"),
        span,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_formats() {
        assert_eq!(format!("{E300}"), "E300");
        assert_eq!(format!("{E304}"), "E304");
        assert_eq!(format!("{W300}"), "W300");
    }

    #[test]
    fn not_constant_diagnostic() {
        let err = error_not_constant("range bound", Span::DUMMY);
        assert_eq!(err.0.code, E300);
        assert!(err.0.message.contains("range bound"));
    }

    #[test]
    fn incompatible_redecl_has_secondary_label() {
        let err = error_incompatible_redecl("foo", Span::DUMMY, Span::DUMMY);
        assert_eq!(err.0.code, E301);
        assert_eq!(err.0.labels.len(), 1);
    }

    #[test]
    fn unresolved_diagnostic() {
        let err = error_unresolved("function", "f", Span::DUMMY);
        assert_eq!(err.0.code, E302);
        assert!(err.0.message.contains('f'));
    }

    #[test]
    fn mem2reg_warning_lists_places() {
        let d = warn_mem2reg("m", &["top.v:3".into(), "top.v:5".into()], Span::DUMMY);
        assert_eq!(d.code, W300);
        assert!(d.notes[0].contains("top.v:3"));
        assert!(d.notes[0].contains("top.v:5"));
    }

    #[test]
    fn blocking_memwr_warning() {
        let d = warn_blocking_memwr(Span::DUMMY);
        assert_eq!(d.code, W302);
    }

    #[test]
    fn internal_error_diagnostic() {
        let err = internal("cursor out of sync", Span::DUMMY);
        assert_eq!(err.0.code, E399);
        assert!(err.0.message.starts_with("internal error"));
    }
}
