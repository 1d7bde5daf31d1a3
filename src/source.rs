//! Rastreo de ubicaciones originales en código fuente.
//!
//! Cada token, nodo sintáctico y diagnóstico lleva consigo la ubicación
//! del fragmento de código fuente que lo originó. Esto permite señalar
//! la línea exacta de un error de traducción, incluso cuando ocurre
//! dentro de un módulo importado.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Range,
    rc::Rc,
};

/// Ancho de los divisores de tabulador.
pub const TAB_STOP: u32 = 4;

/// Un flujo de entrada, carácter por carácter.
///
/// Cada carácter se acompaña de la posición que ocupa en el archivo.
pub trait InputStream: Iterator<Item = (char, Position)> {}

impl<I: Iterator<Item = (char, Position)>> InputStream for I {}

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T: Display> Display for Located<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} (line {})", self.value, self.location.line())
    }
}

/// Una ubicación está conformada por un origen y un rango de posiciones.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Construye una ubicación de un solo carácter.
    pub fn new(from: Rc<Source>, position: Position) -> Self {
        Location {
            from,
            position: position..position.advance(),
        }
    }

    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            position: from.position.start..to.position.end,
        }
    }

    /// Ubicación de un solo carácter en el mismo origen.
    pub fn at(&self, position: Position) -> Location {
        Location::new(Rc::clone(&self.from), position)
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.position.start
    }

    /// Obtiene la posición de fin (exclusiva).
    pub fn end(&self) -> Position {
        self.position.end
    }

    /// Número de línea donde inicia esta ubicación.
    pub fn line(&self) -> u32 {
        self.position.start.line
    }

    /// Origen de la ubicación.
    pub fn source(&self) -> &Source {
        &self.from
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.from.name, self.position.start)
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    /// Ajusta la posición a la siguiente columna de tabulador.
    pub fn tab(self) -> Position {
        let column = 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP;
        Position {
            line: self.line,
            column,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Nombre de módulo de origen e histórico de líneas.
#[derive(Debug)]
pub struct Source {
    name: String,
    lines: Vec<String>,
}

impl Source {
    /// Nombre del módulo o archivo.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Obtiene el texto de una línea, comenzando desde 1.
    pub fn line(&self, number: u32) -> Option<&str> {
        let index = (number as usize).checked_sub(1)?;
        self.lines.get(index).map(String::as_str)
    }
}

/// Descompone un texto fuente en un flujo de caracteres con posición.
///
/// La ubicación retornada corresponde al primer carácter del archivo. Cada
/// línea termina en `'\n'`, incluso si el texto original no lo hace, por lo
/// cual el lexer siempre observa un fin de línea antes del fin de archivo.
pub fn consume<S: Into<String>>(text: &str, name: S) -> (Location, impl InputStream) {
    let source = Rc::new(Source {
        name: name.into(),
        lines: text.lines().map(str::to_owned).collect(),
    });

    let start = Location::new(Rc::clone(&source), Position::default());

    let lines: Vec<Vec<char>> = source
        .lines
        .iter()
        .map(|line| line.chars().chain(std::iter::once('\n')).collect())
        .collect();

    let chars = lines
        .into_iter()
        .enumerate()
        .flat_map(|(index, line)| {
            let mut here = Position {
                line: index as u32 + 1,
                column: 1,
            };

            line.into_iter().map(move |c| {
                let position = here;
                here = match c {
                    '\n' => here.newline(),
                    '\t' => here.tab(),
                    _ => here.advance(),
                };

                (c, position)
            })
        })
        .fuse();

    (start, chars)
}
