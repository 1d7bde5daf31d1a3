//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del traductor. Descompone un [`InputStream`]
//! (flujo de caracteres) en unidades léxicas denominadas tokens. Los espacios
//! en blanco y los comentarios se descartan durante esta operación. Cada
//! token emitido esta asociado a una ubicación en el código fuente original,
//! lo cual permite rastrear errores en tanto los mismos como constructos
//! más elevados de fases posteriores.
//!
//! # Estructura por indentación
//! El lenguaje fuente delimita bloques por indentación en vez de llaves.
//! El lexer traduce cambios de indentación al inicio de cada línea lógica
//! en tokens [`Token::Indent`] y [`Token::Dedent`], y el fin de cada línea
//! lógica en [`Token::Newline`]. Las líneas en blanco o que solo contienen
//! comentarios no producen tokens. Dentro de paréntesis o corchetes los
//! saltos de línea se ignoran.
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por el hecho de lo
//! que son y no incluyen lexemas. Los identificadores y las cadenas incluyen
//! su contenido. Las constantes enteras se resuelven a sus valores, mientras
//! que las de punto flotante preservan su lexema para emitirlo tal cual.
//!
//! # Errores
//! El lexer es capaz de recuperarse parcialmente de condiciones de error.
//! Esto ocurre en suficiente grado como para reportar más de un error por
//! ejecución, pero no lo suficiente como para permitir el avance a las
//! demás fases de la traducción.

use crate::source::{InputStream, Located, Location, Position, TAB_STOP};
use std::{
    collections::VecDeque,
    fmt::{self, Display},
    iter::Peekable,
    num::IntErrorKind,
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Secuencia de símbolos que no forma un operador conocido.
    #[error("Unknown operator `{0}`")]
    BadOperator(String),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {}]", i64::MAX)]
    IntOverflow,

    /// Constante numérica mal formada.
    #[error("Malformed numeric literal `{0}`")]
    BadNumber(String),

    /// Una cadena llegó al fin de línea o de archivo sin cerrarse.
    #[error("Unterminated string literal")]
    UnterminatedString,

    /// La indentación de una línea no coincide con ningún bloque exterior.
    #[error("Unindent does not match any outer indentation level")]
    BadDedent,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Rc<str>);

impl Identifier {
    /// Construye un identificador a partir de su lexema.
    pub fn new(name: &str) -> Self {
        Identifier(Rc::from(name))
    }

    /// Lexema del identificador.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(fmt)
    }
}

/// Operadores aritméticos y de bits.
///
/// Todos excepto [`Operator::Tilde`] tienen además una forma de asignación
/// compuesta (`+=`, `<<=`, etc.).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Times,
    Slash,
    DoubleSlash,
    Percent,
    DoubleStar,
    Amp,
    Pipe,
    Caret,
    Tilde,
    ShiftLeft,
    ShiftRight,
}

impl Display for Operator {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Operator::*;
        let string = match self {
            Plus        => "+",
            Minus       => "-",
            Times       => "*",
            Slash       => "/",
            DoubleSlash => "//",
            Percent     => "%",
            DoubleStar  => "**",
            Amp         => "&",
            Pipe        => "|",
            Caret       => "^",
            Tilde       => "~",
            ShiftLeft   => "<<",
            ShiftRight  => ">>",
        };

        fmt.write_str(string)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal de entero.
    IntLiteral(i64),

    /// Literal de punto flotante, con su lexema original.
    FloatLiteral(Rc<str>),

    /// Literal de cadena, con escapes ya resueltos.
    StrLiteral(Rc<str>),

    /// Operador aritmético o de bits.
    Op(Operator),

    /// Asignación compuesta, como `+=`.
    AugAssign(Operator),

    /// `=`
    Assign,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `<`
    Less,

    /// `<=`
    LessEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterEqual,

    /// `->`
    Arrow,

    /// `,`
    Comma,

    /// `:`
    Colon,

    /// `;`
    Semicolon,

    /// `.`
    Period,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `[`
    OpenSquare,

    /// `]`
    CloseSquare,

    /// Fin de línea lógica.
    Newline,

    /// Aumento de indentación.
    Indent,

    /// Disminución de indentación.
    Dedent,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            FloatLiteral(float) => write!(fmt, "literal `{}`", float),
            StrLiteral(string) => write!(fmt, "string {:?}", string),
            Op(op) => write!(fmt, "`{}`", op),
            AugAssign(op) => write!(fmt, "`{}=`", op),
            Assign => fmt.write_str("`=`"),
            Equal => fmt.write_str("`==`"),
            NotEqual => fmt.write_str("`!=`"),
            Less => fmt.write_str("`<`"),
            LessEqual => fmt.write_str("`<=`"),
            Greater => fmt.write_str("`>`"),
            GreaterEqual => fmt.write_str("`>=`"),
            Arrow => fmt.write_str("`->`"),
            Comma => fmt.write_str("`,`"),
            Colon => fmt.write_str("`:`"),
            Semicolon => fmt.write_str("`;`"),
            Period => fmt.write_str("`.`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            OpenSquare => fmt.write_str("`[`"),
            CloseSquare => fmt.write_str("`]`"),
            Newline => fmt.write_str("end of line"),
            Indent => fmt.write_str("indentation"),
            Dedent => fmt.write_str("end of block"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Def,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Not,
    And,
    Or,
    Is,
    Pass,
    Break,
    Continue,
    Global,
    Import,
    True,
    False,
    None,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("def",      Keyword::Def),
    ("return",   Keyword::Return),
    ("if",       Keyword::If),
    ("elif",     Keyword::Elif),
    ("else",     Keyword::Else),
    ("while",    Keyword::While),
    ("for",      Keyword::For),
    ("in",       Keyword::In),
    ("not",      Keyword::Not),
    ("and",      Keyword::And),
    ("or",       Keyword::Or),
    ("is",       Keyword::Is),
    ("pass",     Keyword::Pass),
    ("break",    Keyword::Break),
    ("continue", Keyword::Continue),
    ("global",   Keyword::Global),
    ("import",   Keyword::Import),
    ("True",     Keyword::True),
    ("False",    Keyword::False),
    ("None",     Keyword::None),
];

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = KEYWORDS
            .iter()
            .find(|&&(_, keyword)| keyword == *self)
            .map_or("?", |&(name, _)| name);

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Tabla de operadores y puntuación de múltiples caracteres.
const PUNCTUATION: &[(&str, Token)] = &[
    ("+",   Token::Op(Operator::Plus)),
    ("-",   Token::Op(Operator::Minus)),
    ("*",   Token::Op(Operator::Times)),
    ("/",   Token::Op(Operator::Slash)),
    ("//",  Token::Op(Operator::DoubleSlash)),
    ("%",   Token::Op(Operator::Percent)),
    ("**",  Token::Op(Operator::DoubleStar)),
    ("&",   Token::Op(Operator::Amp)),
    ("|",   Token::Op(Operator::Pipe)),
    ("^",   Token::Op(Operator::Caret)),
    ("~",   Token::Op(Operator::Tilde)),
    ("<<",  Token::Op(Operator::ShiftLeft)),
    (">>",  Token::Op(Operator::ShiftRight)),
    ("+=",  Token::AugAssign(Operator::Plus)),
    ("-=",  Token::AugAssign(Operator::Minus)),
    ("*=",  Token::AugAssign(Operator::Times)),
    ("/=",  Token::AugAssign(Operator::Slash)),
    ("//=", Token::AugAssign(Operator::DoubleSlash)),
    ("%=",  Token::AugAssign(Operator::Percent)),
    ("**=", Token::AugAssign(Operator::DoubleStar)),
    ("&=",  Token::AugAssign(Operator::Amp)),
    ("|=",  Token::AugAssign(Operator::Pipe)),
    ("^=",  Token::AugAssign(Operator::Caret)),
    ("<<=", Token::AugAssign(Operator::ShiftLeft)),
    (">>=", Token::AugAssign(Operator::ShiftRight)),
    ("=",   Token::Assign),
    ("==",  Token::Equal),
    ("!=",  Token::NotEqual),
    ("<",   Token::Less),
    ("<=",  Token::LessEqual),
    (">",   Token::Greater),
    (">=",  Token::GreaterEqual),
    ("->",  Token::Arrow),
];

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<S: Iterator> {
    source: Peekable<S>,
    origin: Location,
    state: State,
    start: Position,
    last: Position,
    cursor: Position,
    indents: Vec<u32>,
    depth: u32,
    line_has_tokens: bool,
    pending: VecDeque<Located<Token>>,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Inicio de línea; se acumula el ancho de la indentación.
    Indent(u32),

    /// Estado de error.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    Comment,

    /// Constante numérica, entera o flotante.
    Number(String),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),

    /// Se encontraron una o dos comillas iguales consecutivas.
    ///
    /// Tres comillas abren una cadena de múltiples líneas, dos
    /// comillas son una cadena vacía.
    Quote(char, u8),

    /// Interior de una cadena.
    Str(Literal),

    /// Operador en construcción, por "maximal munch".
    Punct(String),
}

/// Estado interno de una cadena literal.
struct Literal {
    quote: char,
    triple: bool,
    escape: bool,
    value: String,
}

impl Literal {
    /// Acepta un carácter; retorna el token si la cadena se cerró.
    fn feed(&mut self, c: char) -> Option<Token> {
        if self.escape {
            self.escape = false;
            match c {
                'n' => self.value.push('\n'),
                't' => self.value.push('\t'),
                'r' => self.value.push('\r'),
                '0' => self.value.push('\0'),
                '\\' | '\'' | '"' => self.value.push(c),
                _ => {
                    self.value.push('\\');
                    self.value.push(c);
                }
            }

            return None;
        }

        match c {
            '\\' => self.escape = true,
            c if c == self.quote && !self.triple => {
                return Some(Token::StrLiteral(Rc::from(self.value.as_str())));
            }

            c => {
                self.value.push(c);

                let closing = [self.quote; 3].iter().collect::<String>();
                if self.triple && self.value.ends_with(&closing) {
                    self.value.truncate(self.value.len() - closing.len());
                    return Some(Token::StrLiteral(Rc::from(self.value.as_str())));
                }
            }
        }

        None
    }
}

impl<S: InputStream> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(start: Location, source: S) -> Self {
        let position = start.start();
        Lexer {
            source: source.peekable(),
            origin: start,
            state: State::Indent(0),
            start: position,
            last: position,
            cursor: position,
            indents: vec![0],
            depth: 0,
            line_has_tokens: false,
            pending: VecDeque::new(),
        }
    }

    /// Reduce la entrada a sea una secuencia conocida de tokens
    /// infalibles o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de buscar tokens exitosos y comenzará a acumular solamente
    /// errores. El propósito de esta función es permitir la
    /// recolección de múltiples errores léxicos en una misma ejecución
    /// del traductor.
    pub fn try_exhaustive(mut self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<(Token, Location)>, LexerError> {
        use State::*;

        let token = loop {
            let peeked = self.source.peek().copied();
            let next_char = peeked.map(|(c, _)| c);
            if let Some((_, position)) = peeked {
                self.cursor = position;

                // La posición de origen se mueve junto a la posición
                // siguiente siempre que no se haya encontrado una
                // frontera de token
                if let Start | Indent(_) = self.state {
                    self.start = position;
                }
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Condiciones de error: se descarta la línea donde
                // ocurrió el error. Al llegar al final de la línea
                // el lexer se recupera y reinicia.
                (Error, None) => return Ok(None),
                (Error, Some('\n')) => {
                    self.state = Start;
                    continue;
                }
                (Error, Some(_)) => (),

                // Fin de entrada: se cierra la última línea y todos los bloques abiertos
                (Start, None) | (Indent(_), None) | (Comment, None) => return Ok(self.end_of_input()),

                // Medición de indentación al inicio de una línea
                (Indent(width), Some(' ')) => *width += 1,
                (Indent(width), Some('\t')) => *width = (*width / TAB_STOP + 1) * TAB_STOP,
                (Indent(width), Some('\n')) => *width = 0,
                (Indent(_), Some('#')) => self.state = Comment,
                (Indent(width), Some(_)) => {
                    let width = *width;
                    match self.layout(width)? {
                        Some(token) => break Ok(token),
                        None => {
                            self.state = Start;
                            continue;
                        }
                    }
                }

                // Fin de línea lógica, excepto dentro de paréntesis o corchetes
                (Start, Some('\n')) => {
                    if self.depth == 0 {
                        if self.line_has_tokens {
                            self.bump();
                            break Ok(Token::Newline);
                        }

                        self.state = Indent(0);
                    }
                }

                // Delimitadores triviales
                (Start, Some('(')) => {
                    self.depth += 1;
                    self.state = Complete(Token::OpenParen);
                }
                (Start, Some('[')) => {
                    self.depth += 1;
                    self.state = Complete(Token::OpenSquare);
                }
                (Start, Some(')')) => {
                    self.depth = self.depth.saturating_sub(1);
                    self.state = Complete(Token::CloseParen);
                }
                (Start, Some(']')) => {
                    self.depth = self.depth.saturating_sub(1);
                    self.state = Complete(Token::CloseSquare);
                }
                (Start, Some(',')) => self.state = Complete(Token::Comma),
                (Start, Some(':')) => self.state = Complete(Token::Colon),
                (Start, Some(';')) => self.state = Complete(Token::Semicolon),
                (Start, Some('.')) => self.state = Complete(Token::Period),
                (Start, Some('#')) => self.state = Comment,

                // Cadenas, identificadores, palabras clave y números
                (Start, Some(c)) if c == '\'' || c == '"' => self.state = Quote(c, 1),
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }
                (Start, Some(c)) if c.is_ascii_digit() => self.state = Number(c.to_string()),

                // Espacios en blanco, operadores y caracteres inesperados
                (Start, Some(c)) if c.is_ascii_whitespace() => (),
                (Start, Some(c)) if is_punct_prefix(&c.to_string()) => {
                    self.state = Punct(c.to_string())
                }
                (Start, Some(c)) => break Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(value), _) => break Ok(std::mem::replace(value, Token::Comma)),

                // Los comentarios descartan el resto de la línea. El salto de
                // línea se reprocesa como si el comentario no existiera.
                (Comment, Some('\n')) => {
                    self.state = Start;
                    continue;
                }
                (Comment, Some(_)) => (),

                // Extensión de constantes numéricas
                (Number(text), Some(c)) if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                    text.push(c)
                }
                (Number(text), Some(c))
                    if (c == '+' || c == '-') && text.ends_with(|e: char| e == 'e' || e == 'E')
                        && !is_radix_prefixed(text) =>
                {
                    text.push(c)
                }
                (Number(text), _) => break number(text),

                // Extensión de términos
                (Word(word), Some(c)) if c.is_ascii_alphanumeric() || c == '_' => word.push(c),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => match Keyword::from_str(word) {
                    Ok(keyword) => break Ok(Token::Keyword(keyword)),
                    Err(()) => break Ok(Token::Id(Identifier::new(word))),
                },

                // Apertura de cadenas: simple, vacía o de múltiples líneas
                (Quote(quote, 1), Some(c)) if c == *quote => self.state = Quote(c, 2),
                (Quote(quote, 2), Some(c)) if c == *quote => {
                    self.state = Str(Literal {
                        quote: c,
                        triple: true,
                        escape: false,
                        value: String::new(),
                    })
                }
                (Quote(_, 2), _) => {
                    self.state = Complete(Token::StrLiteral(Rc::from("")));
                    continue;
                }
                (Quote(quote, _), _) => {
                    let quote = *quote;
                    self.state = Str(Literal {
                        quote,
                        triple: false,
                        escape: false,
                        value: String::new(),
                    });

                    continue;
                }

                // Interior de cadenas
                (Str(_), None) => break Err(LexerError::UnterminatedString),
                (Str(literal), Some('\n')) if !literal.triple => {
                    break Err(LexerError::UnterminatedString)
                }
                (Str(literal), Some(c)) => {
                    if let Some(token) = literal.feed(c) {
                        self.state = Complete(token);
                    }
                }

                // Operadores de uno o más caracteres
                (Punct(op), Some(c)) if is_punct_prefix(&format!("{}{}", op, c)) => op.push(c),
                (Punct(op), _) => {
                    break punctuation(op).ok_or_else(|| LexerError::BadOperator(op.clone()))
                }
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            self.bump();
        };

        let token = token?;
        let location = match token {
            Token::Indent | Token::Dedent => self.here(self.start),
            _ => Location::span(self.here(self.start), &self.here(self.last)),
        };

        Ok(Some((token, location)))
    }

    /// Compara la indentación de una nueva línea con la pila de bloques.
    fn layout(&mut self, width: u32) -> Result<Option<Token>, LexerError> {
        let top = self.indents.last().copied().unwrap_or(0);
        if width > top {
            self.indents.push(width);
            return Ok(Some(Token::Indent));
        }

        let mut dedents = 0;
        while self.indents.last().map_or(false, |&indent| indent > width) {
            self.indents.pop();
            dedents += 1;
        }

        if self.indents.last().copied().unwrap_or(0) != width {
            return Err(LexerError::BadDedent);
        }

        for _ in 1..dedents {
            let location = self.here(self.start);
            self.pending.push_back(Located::at(Token::Dedent, location));
        }

        Ok(if dedents > 0 { Some(Token::Dedent) } else { None })
    }

    /// Cierra la última línea y luego cada bloque abierto, uno por llamada.
    fn end_of_input(&mut self) -> Option<(Token, Location)> {
        let location = self.here(self.last);
        if self.line_has_tokens {
            Some((Token::Newline, location))
        } else if self.indents.len() > 1 {
            self.indents.pop();
            Some((Token::Dedent, location))
        } else {
            None
        }
    }

    /// Consume el carácter observado por lookahead.
    fn bump(&mut self) {
        if let Some((_, position)) = self.source.next() {
            self.last = position;
        }
    }

    /// Ubicación de una posición en el mismo archivo.
    fn here(&self, position: Position) -> Location {
        self.origin.at(position)
    }
}

impl<S: InputStream> Iterator for Lexer<S> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(token) = self.pending.pop_front() {
            return Some(Ok(token));
        }

        match self.lex() {
            Ok(None) => None,
            Ok(Some((token, location))) => {
                self.state = match token {
                    Token::Newline => State::Indent(0),
                    _ => State::Start,
                };

                match token {
                    Token::Newline => self.line_has_tokens = false,
                    Token::Indent | Token::Dedent => (),
                    _ => self.line_has_tokens = true,
                }

                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;
                Some(Err(Located::at(error, self.here(self.cursor))))
            }
        }
    }
}

/// Determina si una secuencia es prefijo de algún operador conocido.
fn is_punct_prefix(candidate: &str) -> bool {
    candidate == "!"
        || PUNCTUATION
            .iter()
            .any(|(symbol, _)| symbol.starts_with(candidate))
}

/// Busca el token que corresponde a un operador completo.
fn punctuation(symbol: &str) -> Option<Token> {
    PUNCTUATION
        .iter()
        .find(|(candidate, _)| *candidate == symbol)
        .map(|(_, token)| token.clone())
}

/// Determina si una constante usa prefijo de base (`0x`, `0b`, `0o`).
fn is_radix_prefixed(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.starts_with("0x") || lower.starts_with("0b") || lower.starts_with("0o")
}

/// Resuelve una constante numérica completa.
fn number(text: &str) -> Result<Token, LexerError> {
    let digits: String = text.chars().filter(|&c| c != '_').collect();
    let lower = digits.to_ascii_lowercase();

    let radix = match lower.get(..2) {
        Some("0x") => Some(16),
        Some("0b") => Some(2),
        Some("0o") => Some(8),
        _ => None,
    };

    let parsed = match radix {
        Some(radix) => i64::from_str_radix(&digits[2..], radix),
        None if lower.contains(|c: char| c == '.' || c == 'e') => {
            return match digits.parse::<f64>() {
                Ok(_) => Ok(Token::FloatLiteral(Rc::from(text))),
                Err(_) => Err(LexerError::BadNumber(text.to_owned())),
            };
        }

        None => digits.parse::<i64>(),
    };

    parsed.map(Token::IntLiteral).map_err(|error| match error.kind() {
        IntErrorKind::PosOverflow => LexerError::IntOverflow,
        _ => LexerError::BadNumber(text.to_owned()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source;

    fn tokens(text: &str) -> Vec<Token> {
        let (start, stream) = source::consume(text, "test");
        Lexer::new(start, stream)
            .try_exhaustive()
            .expect("lexing failed")
            .into_iter()
            .map(Located::into_inner)
            .collect()
    }

    fn errors(text: &str) -> Vec<Located<LexerError>> {
        let (start, stream) = source::consume(text, "test");
        match Lexer::new(start, stream).try_exhaustive() {
            Ok(tokens) => panic!("expected errors, got {:?}", tokens),
            Err(errors) => errors,
        }
    }

    #[test]
    fn simple_assignment() {
        assert_eq!(
            tokens("led = 13\n"),
            vec![
                Token::Id(Identifier::new("led")),
                Token::Assign,
                Token::IntLiteral(13),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn indentation_blocks() {
        let lexed = tokens("def f():\n    pass\n\n    # comment\nx = 1\n");
        assert_eq!(
            lexed,
            vec![
                Token::Keyword(Keyword::Def),
                Token::Id(Identifier::new("f")),
                Token::OpenParen,
                Token::CloseParen,
                Token::Colon,
                Token::Newline,
                Token::Indent,
                Token::Keyword(Keyword::Pass),
                Token::Newline,
                Token::Dedent,
                Token::Id(Identifier::new("x")),
                Token::Assign,
                Token::IntLiteral(1),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn closes_every_block_at_end_of_input() {
        let lexed = tokens("if a:\n    if b:\n        pass");
        let dedents = lexed.iter().filter(|t| **t == Token::Dedent).count();
        assert_eq!(dedents, 2);
        assert_eq!(lexed.last(), Some(&Token::Dedent));
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        let lexed = tokens("f(1,\n  2)\n");
        assert!(!lexed[..lexed.len() - 1].contains(&Token::Newline));
        assert!(!lexed.contains(&Token::Indent));
    }

    #[test]
    fn operators_use_longest_match() {
        assert_eq!(
            tokens("a //= 2 ** 3 -> b != c\n")[..8],
            [
                Token::Id(Identifier::new("a")),
                Token::AugAssign(Operator::DoubleSlash),
                Token::IntLiteral(2),
                Token::Op(Operator::DoubleStar),
                Token::IntLiteral(3),
                Token::Arrow,
                Token::Id(Identifier::new("b")),
                Token::NotEqual,
            ]
        );
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(
            tokens("0x1F 0b101 1.5 2e-3 1_000\n")[..5],
            [
                Token::IntLiteral(31),
                Token::IntLiteral(5),
                Token::FloatLiteral(Rc::from("1.5")),
                Token::FloatLiteral(Rc::from("2e-3")),
                Token::IntLiteral(1000),
            ]
        );
    }

    #[test]
    fn string_literals() {
        assert_eq!(
            tokens("'a' \"two\\n\" ''\n")[..3],
            [
                Token::StrLiteral(Rc::from("a")),
                Token::StrLiteral(Rc::from("two\n")),
                Token::StrLiteral(Rc::from("")),
            ]
        );
    }

    #[test]
    fn triple_quoted_docstring() {
        let lexed = tokens("'''\nBlink\n  twice\n'''\nx = 1\n");
        assert_eq!(lexed[0], Token::StrLiteral(Rc::from("\nBlink\n  twice\n")));
        assert_eq!(lexed[1], Token::Newline);
    }

    #[test]
    fn collects_errors_from_several_lines() {
        let errors = errors("a = $\nb = 'open\nc = 99999999999999999999\n");
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0].val(), LexerError::BadChar('$')));
        assert!(matches!(errors[1].val(), LexerError::UnterminatedString));
        assert!(matches!(errors[2].val(), LexerError::IntOverflow));
        assert_eq!(errors[1].location().line(), 2);
    }

    #[test]
    fn inconsistent_dedent() {
        let errors = errors("if a:\n    x = 1\n  y = 2\n");
        assert!(matches!(errors[0].val(), LexerError::BadDedent));
        assert_eq!(errors[0].location().line(), 3);
    }
}
