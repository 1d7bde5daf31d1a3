//! Tipos del lenguaje objetivo.
//!
//! El traductor solo conoce un conjunto cerrado de tipos de C++ para
//! Arduino. Las anotaciones del lenguaje fuente se asocian a estos tipos
//! mediante [`Type::from_annotation`], mientras que los manifiestos de
//! capacidades los escriben con su nombre en C++ (ver [`FromStr`]).

use serde::Deserialize;
use std::{
    convert::TryFrom,
    fmt::{self, Display},
    str::FromStr,
};

use thiserror::Error;

/// Un tipo de C++.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Type {
    Void,
    Boolean,
    Char,
    Byte,
    Int,
    Long,
    UnsignedLong,
    Float,

    /// Cadena constante, `const char*`.
    Str,

    /// Arreglo de tamaño fijo.
    Array(Box<Type>, usize),
}

/// Nombre de tipo desconocido.
#[derive(Error, Debug)]
#[error("Unknown type `{0}`")]
pub struct UnknownType(pub String);

const SPELLINGS: &[(&str, Type)] = &[
    ("void", Type::Void),
    ("boolean", Type::Boolean),
    ("char", Type::Char),
    ("byte", Type::Byte),
    ("int", Type::Int),
    ("long", Type::Long),
    ("unsigned long", Type::UnsignedLong),
    ("float", Type::Float),
    ("const char*", Type::Str),
];

/// Anotaciones válidas en el lenguaje fuente.
const ANNOTATIONS: &[(&str, Type)] = &[
    ("int", Type::Int),
    ("float", Type::Float),
    ("str", Type::Str),
    ("bool", Type::Boolean),
    ("None", Type::Void),
    ("char", Type::Char),
];

impl Type {
    /// Resuelve una anotación del lenguaje fuente.
    pub fn from_annotation(name: &str) -> Option<Type> {
        ANNOTATIONS
            .iter()
            .find(|(annotation, _)| *annotation == name)
            .map(|(_, typ)| typ.clone())
    }

    pub fn is_float(&self) -> bool {
        *self == Type::Float
    }

    /// Tipos entre los cuales C++ convierte implícitamente al asignar.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Byte | Type::Int | Type::Long | Type::UnsignedLong | Type::Float
        )
    }

    /// Tipo de los elementos, si se trata de un arreglo o una cadena.
    pub fn element(&self) -> Option<Type> {
        match self {
            Type::Array(element, _) => Some(element.as_ref().clone()),
            Type::Str => Some(Type::Char),
            _ => None,
        }
    }

    /// Construye un declarador de C++, como `int x` o `int xs[3]`.
    pub fn declare(&self, name: &str) -> String {
        match self {
            Type::Array(element, length) => format!("{}[{}]", element.declare(name), length),
            other => format!("{} {}", other, name),
        }
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Array(element, length) => write!(fmt, "{}[{}]", element, length),
            scalar => {
                let spelling = SPELLINGS
                    .iter()
                    .find(|(_, typ)| typ == scalar)
                    .map_or("?", |(spelling, _)| spelling);

                fmt.write_str(spelling)
            }
        }
    }
}

impl FromStr for Type {
    type Err = UnknownType;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        // Se toleran espacios adicionales como en "unsigned  long" o "const char *"
        let normalized = string.split_whitespace().collect::<Vec<_>>().join(" ");
        let normalized = normalized.replace(" *", "*");

        SPELLINGS
            .iter()
            .find(|(spelling, _)| *spelling == normalized)
            .map(|(_, typ)| typ.clone())
            .ok_or_else(|| UnknownType(string.to_owned()))
    }
}

impl TryFrom<String> for Type {
    type Error = UnknownType;

    fn try_from(string: String) -> Result<Self, Self::Error> {
        string.parse()
    }
}
