//! Análisis sintáctico.
//!
//! Construye un árbol de sintaxis abstracta a partir de la secuencia de
//! tokens producida por [`crate::lex`]. El parser es de descenso recursivo
//! con retroceso: cada regla puede fallar de forma débil (la regla no
//! aplica y se puede intentar otra) o estricta (error definitivo).
//!
//! La gramática cubre el subconjunto del lenguaje fuente que el traductor
//! conoce, y algunas construcciones adicionales (`for`, tuplas, asignación
//! encadenada) que se aceptan aquí únicamente para poder rechazarlas después
//! con un error de traducción preciso en vez de un error de sintaxis.

use std::{fmt, iter::Peekable, marker::PhantomData, rc::Rc};
use thiserror::Error;

use crate::{
    lex::{Identifier, Keyword, Operator, Token},
    source::{Located, Location},
};

/// Árbol de sintaxis de un módulo completo.
#[derive(Debug)]
pub struct Ast {
    pub body: Vec<Located<Statement>>,
}

/// Definición de función.
#[derive(Debug)]
pub struct FunctionDef {
    pub name: Located<Identifier>,
    pub parameters: Vec<Parameter>,
    pub returns: Option<Located<Identifier>>,
    pub body: Vec<Located<Statement>>,
}

/// Parámetro de función. La anotación es obligatoria.
#[derive(Debug)]
pub struct Parameter {
    pub name: Located<Identifier>,
    pub annotation: Located<Identifier>,
}

#[derive(Debug)]
pub enum Statement {
    FunctionDef(FunctionDef),

    /// `a = b = valor`; `targets` contiene todos los destinos.
    Assign {
        targets: Vec<Located<Expr>>,
        value: Located<Expr>,
    },

    AugAssign {
        target: Located<Expr>,
        op: BinOp,
        value: Located<Expr>,
    },

    Expr(Located<Expr>),

    /// Un `elif` se representa como un `If` anidado en `orelse`.
    If {
        test: Located<Expr>,
        body: Vec<Located<Statement>>,
        orelse: Vec<Located<Statement>>,
    },

    While {
        test: Located<Expr>,
        body: Vec<Located<Statement>>,
        orelse: Vec<Located<Statement>>,
    },

    For {
        target: Located<Expr>,
        iter: Located<Expr>,
        body: Vec<Located<Statement>>,
        orelse: Vec<Located<Statement>>,
    },

    Return(Option<Located<Expr>>),
    Import(Vec<Located<String>>),
    Global(Vec<Located<Identifier>>),
    Pass,
    Break,
    Continue,
}

impl Statement {
    /// Nombre legible de la construcción, para diagnósticos.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::FunctionDef(_) => "function definition",
            Statement::Assign { .. } => "assignment",
            Statement::AugAssign { .. } => "augmented assignment",
            Statement::Expr(_) => "expression statement",
            Statement::If { .. } => "`if` statement",
            Statement::While { .. } => "`while` loop",
            Statement::For { .. } => "`for` loop",
            Statement::Return(_) => "`return`",
            Statement::Import(_) => "`import`",
            Statement::Global(_) => "`global` declaration",
            Statement::Pass => "`pass`",
            Statement::Break => "`break`",
            Statement::Continue => "`continue`",
        }
    }
}

#[derive(Debug)]
pub enum Expr {
    Name(Identifier),
    Integer(i64),

    /// Lexema original del literal.
    Float(Rc<str>),
    Str(Rc<str>),
    Bool(bool),
    None,
    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
    Unary(UnaryOp, Box<Located<Expr>>),

    /// Cadena plana de operandos unidos por el mismo operador lógico.
    BoolOp(BoolOp, Vec<Located<Expr>>),

    Compare {
        left: Box<Located<Expr>>,
        ops: Vec<CmpOp>,
        comparators: Vec<Located<Expr>>,
    },

    Call {
        func: Box<Located<Expr>>,
        args: Vec<Located<Expr>>,
    },

    Attribute(Box<Located<Expr>>, Located<Identifier>),
    Subscript(Box<Located<Expr>>, Box<Located<Expr>>),
    List(Vec<Located<Expr>>),
    Tuple(Vec<Located<Expr>>),
}

impl Expr {
    /// Nombre legible de la construcción, para diagnósticos.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Name(_) => "name",
            Expr::Integer(_) | Expr::Float(_) | Expr::Str(_) | Expr::Bool(_) => "literal",
            Expr::None => "`None`",
            Expr::Binary(..) => "binary operation",
            Expr::Unary(..) => "unary operation",
            Expr::BoolOp(..) => "boolean operation",
            Expr::Compare { .. } => "comparison",
            Expr::Call { .. } => "function call",
            Expr::Attribute(..) => "attribute",
            Expr::Subscript(..) => "subscript",
            Expr::List(_) => "list",
            Expr::Tuple(_) => "tuple",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    fn from_operator(op: Operator) -> Option<Self> {
        let binop = match op {
            Operator::Plus => BinOp::Add,
            Operator::Minus => BinOp::Sub,
            Operator::Times => BinOp::Mul,
            Operator::Slash => BinOp::Div,
            Operator::DoubleSlash => BinOp::FloorDiv,
            Operator::Percent => BinOp::Mod,
            Operator::DoubleStar => BinOp::Pow,
            Operator::Amp => BinOp::BitAnd,
            Operator::Pipe => BinOp::BitOr,
            Operator::Caret => BinOp::BitXor,
            Operator::ShiftLeft => BinOp::Shl,
            Operator::ShiftRight => BinOp::Shr,
            Operator::Tilde => return None,
        };

        Some(binop)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    Invert,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        };

        fmt.write_str(string)
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {0}, found {1} instead")]
    UnexpectedToken(Token, Token),

    #[error("Expected {0}, none was found instead")]
    MissingToken(Token),

    #[error("Expected identifier")]
    ExpectedId,

    #[error("Expected an expression")]
    ExpectedExpr,

    #[error("Expected a type annotation")]
    ExpectedAnnotation,

    #[error("Missing type annotation for parameter `{0}`")]
    MissingParameterType(Identifier),

    #[error("Cannot assign to {0}")]
    InvalidTarget(&'static str),

    #[error("Abrupt end of program")]
    UnexpectedEof,
}

/// Flujo de tokens que el parser puede duplicar para retroceder.
pub trait TokenStream<'a>: Iterator<Item = &'a Located<Token>> + Clone {}

impl<'a, I: Iterator<Item = &'a Located<Token>> + Clone> TokenStream<'a> for I {}

/// Construye el árbol de un módulo. `start` es la ubicación de inicio
/// del archivo, usada para errores que ocurren antes del primer token.
pub fn parse<'a>(tokens: impl TokenStream<'a>, start: Location) -> Result<Ast, Located<ParserError>> {
    let mut parser = Parser {
        tokens: tokens.peekable(),
        last_known: start,
        lifetime_hack: PhantomData,
    };

    parser.program().map_err(Failure::coerce)
}

#[derive(Clone)]
struct Parser<'a, I: TokenStream<'a>> {
    tokens: Peekable<I>,
    last_known: Location,
    lifetime_hack: PhantomData<&'a ()>,
}

enum Failure {
    Weak(Located<ParserError>),
    Strict(Located<ParserError>),
}

impl Failure {
    fn weak(self) -> Self {
        Failure::Weak(self.coerce())
    }

    fn strict(self) -> Self {
        Failure::Strict(self.coerce())
    }

    fn coerce(self) -> Located<ParserError> {
        match self {
            Failure::Weak(error) => error,
            Failure::Strict(error) => error,
        }
    }
}

type Parse<T> = Result<T, Failure>;

/// Operadores de un mismo nivel de precedencia.
type Level = &'static [(Operator, BinOp)];

const BIT_OR: Level = &[(Operator::Pipe, BinOp::BitOr)];
const BIT_XOR: Level = &[(Operator::Caret, BinOp::BitXor)];
const BIT_AND: Level = &[(Operator::Amp, BinOp::BitAnd)];
const SHIFT: Level = &[
    (Operator::ShiftLeft, BinOp::Shl),
    (Operator::ShiftRight, BinOp::Shr),
];
const ARITH: Level = &[(Operator::Plus, BinOp::Add), (Operator::Minus, BinOp::Sub)];
const TERM: Level = &[
    (Operator::Times, BinOp::Mul),
    (Operator::Slash, BinOp::Div),
    (Operator::DoubleSlash, BinOp::FloorDiv),
    (Operator::Percent, BinOp::Mod),
];

impl<'a, I: TokenStream<'a>> Parser<'a, I> {
    fn program(&mut self) -> Parse<Ast> {
        let mut body = Vec::new();
        while self.peek().is_some() {
            body.extend(self.statement()?);
        }

        Ok(Ast { body })
    }

    /// Una sentencia compuesta o una línea de sentencias simples.
    fn statement(&mut self) -> Parse<Vec<Located<Statement>>> {
        let compound = match self.peek() {
            Some(Token::Keyword(Keyword::Def)) => self.function()?,
            Some(Token::Keyword(Keyword::If)) => self.conditional()?,
            Some(Token::Keyword(Keyword::While)) => self.while_loop()?,
            Some(Token::Keyword(Keyword::For)) => self.for_loop()?,
            _ => return self.simple_line(),
        };

        Ok(vec![compound])
    }

    /// Sentencias simples separadas por `;` hasta el fin de línea.
    fn simple_line(&mut self) -> Parse<Vec<Located<Statement>>> {
        let mut statements = vec![self.simple().map_err(Failure::strict)?];
        while self.peek() == Some(&Token::Semicolon) {
            self.next()?;
            if self.peek() == Some(&Token::Newline) {
                break;
            }

            statements.push(self.simple().map_err(Failure::strict)?);
        }

        self.expect(Token::Newline)?;
        Ok(statements)
    }

    fn simple(&mut self) -> Parse<Located<Statement>> {
        let start = self.location();
        let statement = match self.peek() {
            Some(Token::Keyword(Keyword::Pass)) => {
                self.next()?;
                Statement::Pass
            }

            Some(Token::Keyword(Keyword::Break)) => {
                self.next()?;
                Statement::Break
            }

            Some(Token::Keyword(Keyword::Continue)) => {
                self.next()?;
                Statement::Continue
            }

            Some(Token::Keyword(Keyword::Return)) => {
                self.next()?;
                Statement::Return(self.optional(Parser::expr_list)?)
            }

            Some(Token::Keyword(Keyword::Global)) => {
                self.next()?;
                Statement::Global(self.comma_separated(Parser::id, false)?)
            }

            Some(Token::Keyword(Keyword::Import)) => {
                self.next()?;
                Statement::Import(self.comma_separated(Parser::dotted_name, false)?)
            }

            _ => self.expression_statement()?,
        };

        Ok(Located::at(statement, self.span_from(start)))
    }

    /// Expresión suelta, asignación simple o encadenada, o asignación compuesta.
    fn expression_statement(&mut self) -> Parse<Statement> {
        let first = self.expr_list()?;

        match self.peek() {
            Some(Token::Assign) => {
                let mut chain = vec![first];
                while self.peek() == Some(&Token::Assign) {
                    self.next()?;
                    chain.push(self.expr_list().map_err(Failure::strict)?);
                }

                let value = chain.pop().ok_or_else(|| self.error(ParserError::ExpectedExpr))?;
                for target in &chain {
                    check_target(target, true)?;
                }

                Ok(Statement::Assign {
                    targets: chain,
                    value,
                })
            }

            Some(&Token::AugAssign(operator)) => {
                self.next()?;
                check_target(&first, false)?;

                let op = BinOp::from_operator(operator)
                    .ok_or_else(|| self.error(ParserError::ExpectedExpr))?;

                let value = self.expr_list().map_err(Failure::strict)?;
                Ok(Statement::AugAssign {
                    target: first,
                    op,
                    value,
                })
            }

            _ => Ok(Statement::Expr(first)),
        }
    }

    /// Bloque tras `:`, ya sea indentado o en la misma línea.
    fn suite(&mut self) -> Parse<Vec<Located<Statement>>> {
        self.expect(Token::Colon)?;
        if self.peek() != Some(&Token::Newline) {
            return self.simple_line();
        }

        self.next()?;
        self.expect(Token::Indent)?;

        let mut body = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dedent) => {
                    self.next()?;
                    break Ok(body);
                }

                // Un bloque al final del archivo se cierra implícitamente
                None => break Ok(body),
                Some(_) => body.extend(self.statement()?),
            }
        }
    }

    fn function(&mut self) -> Parse<Located<Statement>> {
        let start = self.location();
        self.keyword(Keyword::Def)?;
        let name = self.id().map_err(Failure::strict)?;

        self.expect(Token::OpenParen)?;
        let parameters = self.comma_separated(Parser::parameter, true)?;
        self.expect(Token::CloseParen)?;

        let returns = match self.peek() {
            Some(Token::Arrow) => {
                self.next()?;
                Some(self.annotation()?)
            }

            _ => None,
        };

        let location = self.span_from(start);
        let body = self.suite()?;

        let function = FunctionDef {
            name,
            parameters,
            returns,
            body,
        };

        Ok(Located::at(Statement::FunctionDef(function), location))
    }

    fn parameter(&mut self) -> Parse<Parameter> {
        let name = self.id().map_err(Failure::weak)?;
        if self.peek() != Some(&Token::Colon) {
            let error = ParserError::MissingParameterType(name.val().clone());
            return Err(Failure::Strict(Located::at(error, name.location().clone())));
        }

        self.next()?;
        let annotation = self.annotation()?;

        Ok(Parameter { name, annotation })
    }

    /// Una anotación de tipo es un nombre simple o `None`.
    fn annotation(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            Token::Keyword(Keyword::None) => Ok(Located::at(Identifier::new("None"), location)),
            _ => self.fail(ParserError::ExpectedAnnotation),
        }
    }

    /// `if` y cadenas de `elif`; cada `elif` se anida como un nuevo `If`.
    fn conditional(&mut self) -> Parse<Located<Statement>> {
        let start = self.location();
        match self.next()?.into_inner() {
            Token::Keyword(Keyword::If) | Token::Keyword(Keyword::Elif) => (),
            found => self.fail(ParserError::UnexpectedToken(Token::Keyword(Keyword::If), found))?,
        }

        let test = self.expr().map_err(Failure::strict)?;
        let location = self.span_from(start);
        let body = self.suite()?;

        let orelse = match self.peek() {
            Some(Token::Keyword(Keyword::Elif)) => vec![self.conditional()?],
            Some(Token::Keyword(Keyword::Else)) => {
                self.next()?;
                self.suite()?
            }

            _ => Vec::new(),
        };

        Ok(Located::at(Statement::If { test, body, orelse }, location))
    }

    fn while_loop(&mut self) -> Parse<Located<Statement>> {
        let start = self.location();
        self.keyword(Keyword::While)?;

        let test = self.expr().map_err(Failure::strict)?;
        let location = self.span_from(start);
        let body = self.suite()?;
        let orelse = self.else_suite()?;

        Ok(Located::at(Statement::While { test, body, orelse }, location))
    }

    fn for_loop(&mut self) -> Parse<Located<Statement>> {
        let start = self.location();
        self.keyword(Keyword::For)?;

        // El destino no puede ser una comparación, ya que `in` la terminaría
        let target = self.bit_or().map_err(Failure::strict)?;
        self.keyword(Keyword::In)?;
        let iter = self.expr_list().map_err(Failure::strict)?;

        let location = self.span_from(start);
        let body = self.suite()?;
        let orelse = self.else_suite()?;

        let statement = Statement::For {
            target,
            iter,
            body,
            orelse,
        };

        Ok(Located::at(statement, location))
    }

    fn else_suite(&mut self) -> Parse<Vec<Located<Statement>>> {
        match self.peek() {
            Some(Token::Keyword(Keyword::Else)) => {
                self.next()?;
                self.suite()
            }

            _ => Ok(Vec::new()),
        }
    }

    /// Nombre de módulo con puntos, como `lib.motors`.
    fn dotted_name(&mut self) -> Parse<Located<String>> {
        let first = self.id()?;
        let (start, first) = first.split();

        let mut name = first.to_string();
        while self.peek() == Some(&Token::Period) {
            self.next()?;
            name.push('.');
            name.push_str(self.id().map_err(Failure::strict)?.val().as_str());
        }

        Ok(Located::at(name, self.span_from(start)))
    }

    /// Una o más expresiones separadas por comas. Más de una, o una coma
    /// final, forman una tupla.
    fn expr_list(&mut self) -> Parse<Located<Expr>> {
        let start = self.location();
        let first = self.expr()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.peek() == Some(&Token::Comma) {
            self.next()?;
            match self.optional(Parser::expr)? {
                Some(item) => items.push(item),
                None => break,
            }
        }

        Ok(Located::at(Expr::Tuple(items), self.span_from(start)))
    }

    fn expr(&mut self) -> Parse<Located<Expr>> {
        self.bool_chain(BoolOp::Or, Parser::and_test)
    }

    fn and_test(&mut self) -> Parse<Located<Expr>> {
        self.bool_chain(BoolOp::And, Parser::not_test)
    }

    /// Operandos unidos por `or` o `and`, recolectados en una sola lista.
    fn bool_chain<F>(&mut self, op: BoolOp, mut operand: F) -> Parse<Located<Expr>>
    where
        F: FnMut(&mut Self) -> Parse<Located<Expr>>,
    {
        let keyword = Token::Keyword(match op {
            BoolOp::Or => Keyword::Or,
            BoolOp::And => Keyword::And,
        });

        let start = self.location();
        let first = operand(self)?;
        if self.peek() != Some(&keyword) {
            return Ok(first);
        }

        let mut values = vec![first];
        while self.peek() == Some(&keyword) {
            self.next()?;
            values.push(operand(self).map_err(Failure::strict)?);
        }

        Ok(Located::at(Expr::BoolOp(op, values), self.span_from(start)))
    }

    fn not_test(&mut self) -> Parse<Located<Expr>> {
        if self.peek() != Some(&Token::Keyword(Keyword::Not)) {
            return self.comparison();
        }

        let start = self.location();
        self.next()?;

        let operand = self.not_test().map_err(Failure::strict)?;
        let expr = Expr::Unary(UnaryOp::Not, Box::new(operand));

        Ok(Located::at(expr, self.span_from(start)))
    }

    fn comparison(&mut self) -> Parse<Located<Expr>> {
        let start = self.location();
        let left = self.bit_or()?;

        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.comparison_operator()? {
            ops.push(op);
            comparators.push(self.bit_or().map_err(Failure::strict)?);
        }

        if ops.is_empty() {
            return Ok(left);
        }

        let expr = Expr::Compare {
            left: Box::new(left),
            ops,
            comparators,
        };

        Ok(Located::at(expr, self.span_from(start)))
    }

    /// Consume un operador de comparación, si lo hay.
    fn comparison_operator(&mut self) -> Parse<Option<CmpOp>> {
        let op = match self.peek() {
            Some(Token::Equal) => CmpOp::Eq,
            Some(Token::NotEqual) => CmpOp::NotEq,
            Some(Token::Less) => CmpOp::Lt,
            Some(Token::LessEqual) => CmpOp::LtE,
            Some(Token::Greater) => CmpOp::Gt,
            Some(Token::GreaterEqual) => CmpOp::GtE,
            Some(Token::Keyword(Keyword::In)) => CmpOp::In,
            Some(Token::Keyword(Keyword::Is)) => {
                self.next()?;
                if self.peek() == Some(&Token::Keyword(Keyword::Not)) {
                    self.next()?;
                    return Ok(Some(CmpOp::IsNot));
                }

                return Ok(Some(CmpOp::Is));
            }

            Some(Token::Keyword(Keyword::Not)) => {
                let followed_by_in = self.lookahead(|s| {
                    s.next()?;
                    s.keyword(Keyword::In)
                });

                match followed_by_in {
                    Ok(()) => {
                        self.next()?;
                        CmpOp::NotIn
                    }

                    Err(_) => return Ok(None),
                }
            }

            _ => return Ok(None),
        };

        self.next()?;
        Ok(Some(op))
    }

    fn bit_or(&mut self) -> Parse<Located<Expr>> {
        self.binary(Parser::bit_xor, BIT_OR)
    }

    fn bit_xor(&mut self) -> Parse<Located<Expr>> {
        self.binary(Parser::bit_and, BIT_XOR)
    }

    fn bit_and(&mut self) -> Parse<Located<Expr>> {
        self.binary(Parser::shift, BIT_AND)
    }

    fn shift(&mut self) -> Parse<Located<Expr>> {
        self.binary(Parser::arith, SHIFT)
    }

    fn arith(&mut self) -> Parse<Located<Expr>> {
        self.binary(Parser::term, ARITH)
    }

    fn term(&mut self) -> Parse<Located<Expr>> {
        self.binary(Parser::factor, TERM)
    }

    /// Nivel genérico de operadores binarios asociativos por la izquierda.
    fn binary<F>(&mut self, mut operand: F, level: Level) -> Parse<Located<Expr>>
    where
        F: FnMut(&mut Self) -> Parse<Located<Expr>>,
    {
        let start = self.location();
        let mut left = operand(self)?;

        loop {
            let op = match self.peek() {
                Some(Token::Op(found)) => level
                    .iter()
                    .find(|(operator, _)| operator == found)
                    .map(|&(_, op)| op),

                _ => None,
            };

            let op = match op {
                Some(op) => op,
                None => break Ok(left),
            };

            self.next()?;
            let right = operand(self).map_err(Failure::strict)?;

            let expr = Expr::Binary(Box::new(left), op, Box::new(right));
            left = Located::at(expr, self.span_from(start.clone()));
        }
    }

    fn factor(&mut self) -> Parse<Located<Expr>> {
        let op = match self.peek() {
            Some(Token::Op(Operator::Minus)) => UnaryOp::Neg,
            Some(Token::Op(Operator::Plus)) => UnaryOp::Pos,
            Some(Token::Op(Operator::Tilde)) => UnaryOp::Invert,
            _ => return self.power(),
        };

        let start = self.location();
        self.next()?;

        let operand = self.factor().map_err(Failure::strict)?;
        Ok(Located::at(Expr::Unary(op, Box::new(operand)), self.span_from(start)))
    }

    /// `**` asocia por la derecha y liga más fuerte que el signo a su izquierda.
    fn power(&mut self) -> Parse<Located<Expr>> {
        let start = self.location();
        let base = self.primary()?;
        if self.peek() != Some(&Token::Op(Operator::DoubleStar)) {
            return Ok(base);
        }

        self.next()?;
        let exponent = self.factor().map_err(Failure::strict)?;

        let expr = Expr::Binary(Box::new(base), BinOp::Pow, Box::new(exponent));
        Ok(Located::at(expr, self.span_from(start)))
    }

    /// Un átomo seguido de llamadas, accesos a atributo o subíndices.
    fn primary(&mut self) -> Parse<Located<Expr>> {
        let start = self.location();
        let mut expr = self.atom()?;

        loop {
            let trailer = match self.peek() {
                Some(Token::OpenParen) => {
                    self.next()?;
                    let args = self.comma_separated(Parser::expr, true)?;
                    if self.peek() == Some(&Token::Comma) {
                        self.next()?;
                    }

                    self.expect(Token::CloseParen)?;
                    Expr::Call {
                        func: Box::new(expr),
                        args,
                    }
                }

                Some(Token::Period) => {
                    self.next()?;
                    let attribute = self.id().map_err(Failure::strict)?;
                    Expr::Attribute(Box::new(expr), attribute)
                }

                Some(Token::OpenSquare) => {
                    self.next()?;
                    let index = self.expr_list().map_err(Failure::strict)?;
                    self.expect(Token::CloseSquare)?;
                    Expr::Subscript(Box::new(expr), Box::new(index))
                }

                _ => break Ok(expr),
            };

            expr = Located::at(trailer, self.span_from(start.clone()));
        }
    }

    fn atom(&mut self) -> Parse<Located<Expr>> {
        let (location, token) = self.next()?.split();
        let expr = match token {
            Token::Id(id) => Expr::Name(id),
            Token::IntLiteral(integer) => Expr::Integer(integer),
            Token::FloatLiteral(float) => Expr::Float(float),
            Token::Keyword(Keyword::True) => Expr::Bool(true),
            Token::Keyword(Keyword::False) => Expr::Bool(false),
            Token::Keyword(Keyword::None) => Expr::None,

            // Cadenas adyacentes se concatenan
            Token::StrLiteral(first) => {
                let mut string = first.to_string();
                while let Some(Token::StrLiteral(next)) = self.peek() {
                    string.push_str(next);
                    self.next()?;
                }

                Expr::Str(Rc::from(string))
            }

            Token::OpenParen => {
                if self.peek() == Some(&Token::CloseParen) {
                    self.next()?;
                    Expr::Tuple(Vec::new())
                } else {
                    let inner = self.expr_list().map_err(Failure::strict)?;
                    self.expect(Token::CloseParen)?;
                    return Ok(inner);
                }
            }

            Token::OpenSquare => {
                let items = self.comma_separated(Parser::expr, true)?;
                if self.peek() == Some(&Token::Comma) {
                    self.next()?;
                }

                self.expect(Token::CloseSquare)?;
                Expr::List(items)
            }

            _ => return self.fail(ParserError::ExpectedExpr).map_err(Failure::weak),
        };

        Ok(Located::at(expr, self.span_from(location)))
    }

    fn optional<T, F>(&mut self, rule: F) -> Parse<Option<T>>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        match self.attempt(rule) {
            Err(Failure::Weak(_)) => Ok(None),
            result => Ok(Some(result?)),
        }
    }

    fn attempt<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        let mut fork = self.clone();

        let result = rule(&mut fork);
        if result.is_ok() {
            *self = fork;
        }

        result
    }

    fn lookahead<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        rule(&mut self.clone())
    }

    /// Lista separada por comas. Una coma final sin elemento posterior
    /// queda sin consumir, para que el llamador decida si la acepta.
    fn comma_separated<T, F>(&mut self, mut rule: F, allow_empty: bool) -> Parse<Vec<T>>
    where
        F: FnMut(&mut Self) -> Parse<T>,
    {
        let mut items = match self.attempt(|s| rule(s)) {
            Err(Failure::Weak(_)) if allow_empty => return Ok(Vec::new()),
            item => vec![item.map_err(Failure::strict)?],
        };

        loop {
            let item = self.attempt(|s| {
                s.expect(Token::Comma).map_err(Failure::weak)?;
                rule(s)
            });

            match item {
                Err(Failure::Weak(_)) => break Ok(items),
                item => items.push(item?),
            }
        }
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            _ => self.fail(ParserError::ExpectedId),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token) -> Parse<()> {
        match self.next().map(Located::into_inner) {
            Ok(found) if found == token => Ok(()),
            Ok(found) => self.fail(ParserError::UnexpectedToken(token, found)),
            Err(_) => self.fail(ParserError::MissingToken(token)),
        }
    }

    fn next(&mut self) -> Parse<Located<Token>> {
        match self.tokens.next() {
            Some(token) => {
                self.last_known = token.location().clone();
                Ok(token.clone())
            }

            None => self.fail(ParserError::UnexpectedEof),
        }
    }

    fn peek(&mut self) -> Option<&'a Token> {
        self.tokens.peek().copied().map(Located::val)
    }

    /// Ubicación del siguiente token, o la última conocida.
    fn location(&mut self) -> Location {
        match self.tokens.peek() {
            Some(token) => token.location().clone(),
            None => self.last_known.clone(),
        }
    }

    fn span_from(&self, start: Location) -> Location {
        Location::span(start, &self.last_known)
    }

    fn error(&self, error: ParserError) -> Failure {
        Failure::Strict(Located::at(error, self.last_known.clone()))
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(self.error(error))
    }
}

/// Verifica que una expresión pueda aparecer a la izquierda de `=`.
fn check_target(target: &Located<Expr>, allow_unpacking: bool) -> Parse<()> {
    match target.val() {
        Expr::Name(_) | Expr::Subscript(..) | Expr::Attribute(..) => Ok(()),
        Expr::Tuple(items) | Expr::List(items) if allow_unpacking => {
            items.iter().try_for_each(|item| check_target(item, true))
        }

        other => {
            let error = ParserError::InvalidTarget(other.kind());
            Err(Failure::Strict(Located::at(error, target.location().clone())))
        }
    }
}
