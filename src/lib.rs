//! Traductor de sketches de Arduino escritos en un subconjunto anotado de
//! un lenguaje estilo Python hacia C++ de Arduino.
//!
//! # Front end
//! Cada sketch deriva de un único archivo de código fuente. Este archivo se
//! somete primero a análisis léxico en [`lex`], de lo cual se obtiene un
//! flujo de tokens. El flujo de tokens se dispone en un AST por medio de
//! análisis sintáctico en [`parse`].
//!
//! # Traducción
//! El AST se recorre una sola vez, en orden de aparición. En cada sitio de
//! declaración se infiere un tipo estático a partir de literales,
//! anotaciones, firmas conocidas y el [`manifest`] de capacidades de la
//! plataforma. Las tablas de símbolos deciden entre declarar y reasignar,
//! y las variables locales se declaran al inicio de su función. Cada
//! `import` traduce recursivamente otro módulo como una unidad auxiliar
//! (ver [`import`]). Finalmente, el texto de cada unidad pasa por un
//! posprocesamiento puramente textual que agrega declaraciones globales,
//! prototipos y terminadores.

#[macro_use]
mod macros;

pub mod error;
pub mod import;
pub mod lex;
pub mod manifest;
pub mod parse;
pub mod source;
pub mod types;

mod emit;
mod infer;
mod postprocess;
mod scope;

pub use emit::{Translate, TranslateError, Warning};
pub use postprocess::BANNER;

use bitflags::bitflags;
use thiserror::Error;

use crate::{
    import::{ModuleLoader, NoImports, Session, Unit, UnitKind},
    lex::LexerError,
    manifest::Manifest,
    parse::ParserError,
    source::Located,
};

bitflags! {
    /// Opciones de salida.
    pub struct Options: u32 {
        /// Encabezado de procedencia al inicio de cada unidad.
        const BANNER = 0x01;

        /// Prototipos de funciones, antes de las declaraciones globales.
        const PROTOTYPES = 0x02;
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::BANNER | Options::PROTOTYPES
    }
}

/// Error fatal de una solicitud de traducción.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Lexical analysis failed with {} error(s)", .0.len())]
    Lex(Vec<Located<LexerError>>),

    #[error("Syntax error: {}", .0.val())]
    Parse(Located<ParserError>),

    #[error("Translation error: {}", .0.val())]
    Translate(Located<TranslateError>),
}

impl From<Located<TranslateError>> for Error {
    fn from(error: Located<TranslateError>) -> Self {
        Error::Translate(error)
    }
}

/// Resultado de traducir un sketch.
#[derive(Debug)]
pub struct Translation {
    /// Unidad principal, `.ino`.
    pub primary: Unit,

    /// Una unidad `.hpp` por módulo importado, en orden de finalización.
    pub auxiliary: Vec<Unit>,

    pub warnings: Vec<Located<Warning>>,
}

impl Translation {
    /// Todas las unidades, comenzando por la principal.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        std::iter::once(&self.primary).chain(&self.auxiliary)
    }
}

/// Punto de entrada de la biblioteca.
///
/// Un `Translator` no tiene estado mutable propio: cada llamada a
/// [`Translator::translate`] construye un contexto independiente, por lo
/// cual traducir la misma entrada dos veces produce el mismo resultado.
pub struct Translator<'a> {
    manifest: &'a Manifest,
    loader: &'a dyn ModuleLoader,
    options: Options,
}

impl<'a> Translator<'a> {
    pub fn new(manifest: &'a Manifest) -> Self {
        Translator {
            manifest,
            loader: &NoImports,
            options: Options::default(),
        }
    }

    pub fn with_loader(self, loader: &'a dyn ModuleLoader) -> Self {
        Translator { loader, ..self }
    }

    pub fn with_options(self, options: Options) -> Self {
        Translator { options, ..self }
    }

    /// Traduce un sketch. `name` es el nombre del módulo principal, sin
    /// extensión, y determina el nombre de la unidad `.ino`.
    pub fn translate(&self, name: &str, text: &str) -> Result<Translation, Error> {
        log::debug!("Translation of `{}` requested", name);

        let mut session = Session::new(self.manifest, self.loader, self.options);
        let (primary, _) = session.translate(name, text, UnitKind::Primary)?;
        let (auxiliary, warnings) = session.finish();

        Ok(Translation {
            primary,
            auxiliary,
            warnings,
        })
    }
}

/// Traduce un sketch sin importaciones con el manifiesto integrado de
/// Arduino y las opciones por omisión.
pub fn translate(name: &str, text: &str) -> Result<Translation, Error> {
    Translator::new(manifest::arduino()).translate(name, text)
}
