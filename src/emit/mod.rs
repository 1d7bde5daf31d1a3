//! Emisión de C++.
//!
//! El emisor recorre el árbol sintáctico de arriba hacia abajo y produce
//! texto de C++ línea por línea. Consulta [`crate::infer`] en cada sitio de
//! declaración y [`crate::scope`] para decidir entre declarar o reasignar.
//! Los cuerpos de función se emiten en un búfer aislado, que se une al
//! búfer principal solamente al cerrar la función, una vez que se conocen
//! las locales a declarar al inicio y el tipo de retorno definitivo.
//!
//! El texto emitido no incluye terminadores de sentencia ni declaraciones
//! globales; ambas cosas son responsabilidad de [`crate::postprocess`].

use std::{
    fmt::{self, Write},
    rc::Rc,
};

use crate::{
    import::{Exports, Session, Unit, UnitKind},
    infer::{self, Env},
    lex::Lexer,
    parse::{self, Ast, Expr, Statement},
    postprocess::{Parts, Postprocessor},
    scope::{Signatures, SymbolTable},
    source::{self, Located, Location},
    types::Type,
    Error,
};

mod expr;
mod stmt;

/// Error fatal de traducción.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum TranslateError {
    #[error("Unsupported syntax: {0}")]
    UnsupportedSyntax(String),

    #[error("Variable `{0}` is not declared in this scope")]
    UndeclaredVariable(String),

    #[error("Invalid container literal: {0}")]
    ContainerType(String),

    #[error("Unknown type annotation `{0}`")]
    UnknownType(String),

    #[error("`{name}` holds a `{expected}` value and cannot be assigned a `{found}`")]
    TypeMismatch {
        name: String,
        expected: Type,
        found: Type,
    },

    #[error("Cannot determine the return type of `{0}`, it is neither defined nor provided by the platform")]
    UnresolvedCall(String),

    #[error("Cyclic import: {0}")]
    CyclicImport(String),

    #[error("Module `{module}` not found: {reason}")]
    ModuleNotFound { module: String, reason: String },
}

/// Diagnóstico que no interrumpe la traducción.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Warning {
    #[error("Call to `{0}`, which is not defined at this point")]
    UndeclaredFunction(String),

    #[error("`{name}` keeps its declared type `{declared}`, the `float` value assigned to it is truncated")]
    Truncation { name: String, declared: Type },
}

pub type Translate<T> = Result<T, Located<TranslateError>>;

type Emit<T> = Result<T, Error>;

/// Texto emitido, una línea a la vez.
#[derive(Default)]
pub(crate) struct Buffer {
    lines: Vec<String>,
}

impl Buffer {
    /// Agrega una línea con indentación de `depth` niveles.
    pub fn line(&mut self, depth: usize, args: fmt::Arguments<'_>) {
        let mut line = " ".repeat(depth * 4);
        let _ = line.write_fmt(args);
        self.lines.push(line);
    }

    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Une otro búfer al final de este.
    pub fn splice(&mut self, other: Buffer) {
        self.lines.extend(other.lines);
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Contexto de traducción de un módulo.
pub(crate) struct Context<'s, 'a> {
    session: &'s mut Session<'a>,
    symbols: SymbolTable,
    signatures: Signatures,
    defined: Vec<Rc<str>>,
    includes: Vec<String>,
    prototypes: Vec<String>,
    loops: u32,
}

/// Traduce un módulo completo a una unidad.
pub(crate) fn translate_module(
    session: &mut Session<'_>,
    module: &str,
    text: &str,
    kind: UnitKind,
) -> Result<(Unit, Exports), Error> {
    log::debug!("Translating module `{}` into {:?} unit", module, kind);

    let (start, stream) = source::consume(text, format!("{}.py", module.replace('.', "/")));
    let tokens = Lexer::new(start.clone(), stream)
        .try_exhaustive()
        .map_err(Error::Lex)?;

    let ast = parse::parse(tokens.iter(), start).map_err(Error::Parse)?;

    let mut context = Context {
        session,
        symbols: SymbolTable::default(),
        signatures: Signatures::default(),
        defined: Vec::new(),
        includes: Vec::new(),
        prototypes: Vec::new(),
        loops: 0,
    };

    context.scan_signatures(&ast)?;

    let mut body = Buffer::default();
    context.block(&ast.body, &mut body, 0)?;

    Ok(context.finish(module, kind, body))
}

impl<'s, 'a> Context<'s, 'a> {
    /// Registra el tipo de retorno de cada función antes de emitir.
    ///
    /// Una anotación es definitiva. Sin anotación, se usa el tipo del primer
    /// `return` con un literal, o `void` si no lo hay.
    fn scan_signatures(&mut self, ast: &Ast) -> Translate<()> {
        for statement in &ast.body {
            if let Statement::FunctionDef(function) = statement.val() {
                let name = function.name.val().as_str();
                let (returns, annotated) = match &function.returns {
                    Some(annotation) => (annotation_type(annotation)?, true),
                    None => (literal_return(&function.body).unwrap_or(Type::Void), false),
                };

                log::trace!("Signature of `{}` starts as `{}`", name, returns);
                self.signatures.declare(name, returns, annotated);
            }
        }

        Ok(())
    }

    /// Cierra el módulo: ensambla la unidad y las exportaciones.
    fn finish(self, module: &str, kind: UnitKind, body: Buffer) -> (Unit, Exports) {
        let name = module.replace('.', "_");
        let manifest = self.session.manifest();
        let postprocessor = Postprocessor::new(self.session.options(), kind, manifest);

        let globals = self.symbols.globals();
        let code = postprocessor.run(Parts {
            includes: &self.includes,
            prototypes: &self.prototypes,
            globals: &globals,
            body: body.into_lines(),
        });

        let unit = Unit::new(name, kind, code);

        let functions = self
            .defined
            .iter()
            .filter_map(|function| {
                let returns = self.signatures.returns(function)?;
                Some((function.to_string(), returns.clone()))
            })
            .collect();

        let globals = globals
            .iter()
            .map(|global| (global.name.to_owned(), global.typ.clone()))
            .collect();

        let exports = Exports {
            header: unit.file_name(),
            functions,
            globals,
        };

        (unit, exports)
    }

    fn env(&self) -> Env<'_> {
        Env {
            symbols: &self.symbols,
            signatures: &self.signatures,
            manifest: self.session.manifest(),
        }
    }

    fn infer(&self, expr: &Located<Expr>) -> Translate<Type> {
        infer::infer(expr, &self.env())
    }
}

/// Resuelve una anotación de tipo del lenguaje fuente.
fn annotation_type(annotation: &Located<crate::lex::Identifier>) -> Translate<Type> {
    let name = annotation.val().as_str();
    Type::from_annotation(name).ok_or_else(|| {
        let error = TranslateError::UnknownType(name.to_owned());
        Located::at(error, annotation.location().clone())
    })
}

/// Tipo literal del primer `return` con valor literal en un cuerpo.
fn literal_return(body: &[Located<Statement>]) -> Option<Type> {
    body.iter().find_map(|statement| match statement.val() {
        Statement::Return(Some(value)) => infer::literal(value.val()),
        Statement::If { body, orelse, .. }
        | Statement::While { body, orelse, .. }
        | Statement::For { body, orelse, .. } => {
            literal_return(body).or_else(|| literal_return(orelse))
        }

        _ => None,
    })
}

fn unsupported<T, S: Into<String>>(location: &Location, what: S) -> Emit<T> {
    let error = TranslateError::UnsupportedSyntax(what.into());
    Err(Located::at(error, location.clone()).into())
}
