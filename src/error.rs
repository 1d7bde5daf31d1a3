//! Presentación de diagnósticos.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

/// Conjunto de errores o advertencias con ubicación, listo para mostrarse
/// al estilo de `rustc`.
pub struct Diagnostics {
    kind: &'static str,
    errors: Vec<Box<dyn 'static + LocatedError>>,
}

impl Diagnostics {
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }

    /// Diagnósticos de advertencias.
    pub fn warnings<E: 'static + LocatedError>(warnings: Vec<E>) -> Self {
        Diagnostics::from(warnings).kind("warning")
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            errors: Default::default(),
        }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            errors: vec![Box::new(error)],
            ..Default::default()
        }
    }
}

impl<E: 'static + LocatedError> From<Vec<E>> for Diagnostics {
    fn from(errors: Vec<E>) -> Self {
        let errors = errors
            .into_iter()
            .map(|error| {
                let errors: Box<dyn LocatedError> = Box::new(error);
                errors
            })
            .collect();

        Diagnostics {
            errors,
            ..Default::default()
        }
    }
}

impl From<crate::Error> for Diagnostics {
    fn from(error: crate::Error) -> Self {
        match error {
            crate::Error::Lex(errors) => errors.into(),
            crate::Error::Parse(error) => error.into(),
            crate::Error::Translate(error) => error.into(),
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { kind, errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No {}s were reported", kind);
        }

        for error in errors {
            writeln!(fmt, "{}: {}", kind, error.source())?;

            let location = error.location();
            writeln!(fmt, " --> {}", location)?;

            // Un rango que termina en un salto de línea no abarca la siguiente
            let (start, end) = (location.start(), location.end());
            let last_line = if end.line() > start.line() && end.column() == 1 {
                end.line() - 1
            } else {
                end.line()
            };

            let digits = last_line.to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            for line_number in start.line()..=last_line {
                let line = location.source().line(line_number).unwrap_or_default();
                writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)?;
            }

            let (from, to) = if last_line == start.line() {
                (start.column(), end.column().saturating_sub(1).max(start.column()))
            } else {
                (1, end.column().saturating_sub(1).max(1))
            };

            let skip = (from - 1) as usize;
            let highlight = (to - from + 1) as usize;

            writeln!(
                fmt,
                "{:digits$} | {:skip$}{:^<highlight$}",
                "",
                "",
                "",
                digits = digits,
                skip = skip,
                highlight = highlight
            )?;

            writeln!(fmt)?;
        }

        let plural = if errors.len() == 1 { "" } else { "s" };
        match *kind {
            "warning" => writeln!(fmt, "{} warning{} emitted", errors.len(), plural),
            _ => writeln!(
                fmt,
                "Translation failed with {} {}{}",
                errors.len(),
                kind,
                plural
            ),
        }
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, source};

    #[test]
    fn renders_excerpt_and_caret() {
        let (start, stream) = source::consume("x = 1\ny = $\n", "sketch.py");
        let errors = Lexer::new(start, stream).try_exhaustive().unwrap_err();

        let rendered = Diagnostics::from(errors).to_string();
        assert!(rendered.starts_with("error: "));
        assert!(rendered.contains(" --> sketch.py:2:"));
        assert!(rendered.contains("2 | y = $"));
        assert!(rendered.contains('^'));
        assert!(rendered.ends_with("Translation failed with 1 error\n"));
    }

    #[test]
    fn warning_summary() {
        let diagnostics = Diagnostics::warnings(Vec::<Located<crate::Warning>>::new());
        assert!(diagnostics.is_empty());
        assert_eq!(diagnostics.to_string(), "No warnings were reported\n");
    }
}
