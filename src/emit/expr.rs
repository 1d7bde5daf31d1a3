//! Emisión de expresiones.
//!
//! Cada expresión se emite como un fragmento de texto junto con su nivel de
//! precedencia en C++. El padre decide si debe rodearla de paréntesis según
//! ese nivel, de modo que solo aparecen paréntesis donde hacen falta.

use super::{unsupported, Context, Emit, TranslateError, Warning};
use crate::{
    infer,
    parse::{BinOp, BoolOp, CmpOp, Expr, UnaryOp},
    source::Located,
};

const ATOM: u8 = 100;
const UNARY: u8 = 90;
const COMPARE: u8 = 50;
const AND: u8 = 20;
const OR: u8 = 10;

/// Precedencia mínima del divisor en `a / b`.
pub(super) const DIVISOR: u8 = 81;

/// Precedencia de un operador binario en C++.
fn precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Mul | BinOp::Div | BinOp::Mod => 80,
        BinOp::Add | BinOp::Sub => 70,
        BinOp::Shl | BinOp::Shr => 60,
        BinOp::BitAnd => 40,
        BinOp::BitXor => 35,
        BinOp::BitOr => 30,

        // Se emiten como llamadas
        BinOp::Pow | BinOp::FloorDiv => ATOM,
    }
}

/// Símbolo en C++ de un operador binario.
pub(super) fn symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div | BinOp::FloorDiv => "/",
        BinOp::Mod => "%",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Pow => "**",
    }
}

impl Context<'_, '_> {
    /// Emite una expresión completa.
    pub(super) fn expr(&mut self, expr: &Located<Expr>) -> Emit<String> {
        self.operand(expr).map(|(code, _)| code)
    }

    /// Emite una expresión como operando de otra cuya precedencia exige
    /// al menos `min`.
    pub(super) fn wrap(&mut self, expr: &Located<Expr>, min: u8) -> Emit<String> {
        let (code, precedence) = self.operand(expr)?;
        if precedence < min {
            Ok(format!("({})", code))
        } else {
            Ok(code)
        }
    }

    fn operand(&mut self, expr: &Located<Expr>) -> Emit<(String, u8)> {
        let location = expr.location();

        let emitted = match expr.val() {
            // Variables, funciones del módulo y nombres de la plataforma
            Expr::Name(name) => {
                let name = name.as_str();
                let known = self.symbols.lookup(name).is_some()
                    || self.signatures.returns(name).is_some()
                    || self.session.manifest().provides(name);

                if !known {
                    let error = TranslateError::UndeclaredVariable(name.to_owned());
                    return Err(Located::at(error, location.clone()).into());
                }

                (name.to_owned(), ATOM)
            }

            Expr::Integer(integer) => (integer.to_string(), ATOM),
            Expr::Float(lexeme) => (lexeme.to_string(), ATOM),
            Expr::Str(string) => (quote(string), ATOM),

            // Las grafías se corrigen en el posprocesamiento
            Expr::Bool(true) => ("True".to_owned(), ATOM),
            Expr::Bool(false) => ("False".to_owned(), ATOM),

            Expr::None => return unsupported(location, "`None` as a value"),

            Expr::Binary(left, BinOp::Pow, right) => {
                let (left, right) = (self.expr(left)?, self.expr(right)?);
                (format!("pow({}, {})", left, right), ATOM)
            }

            Expr::Binary(left, BinOp::FloorDiv, right) => {
                let left = self.wrap(left, precedence(BinOp::Div))?;
                let right = self.wrap(right, DIVISOR)?;
                (format!("int({} / {})", left, right), ATOM)
            }

            // Asociatividad izquierda: el operando derecho exige más
            Expr::Binary(left, op, right) => {
                let level = precedence(*op);
                let left = self.wrap(left, level)?;
                let right = self.wrap(right, level + 1)?;
                (format!("{} {} {}", left, symbol(*op), right), level)
            }

            Expr::Unary(op, operand) => {
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::Pos => "+",
                    UnaryOp::Invert => "~",
                };

                let mut code = self.wrap(operand, UNARY)?;
                if code.starts_with('-') || code.starts_with('+') {
                    code = format!("({})", code);
                }

                (format!("{}{}", symbol, code), UNARY)
            }

            Expr::BoolOp(op, values) => {
                let (joiner, level) = match op {
                    BoolOp::And => (" && ", AND),
                    BoolOp::Or => (" || ", OR),
                };

                let mut flat = Vec::new();
                flatten(*op, values, &mut flat);

                let operands = flat
                    .into_iter()
                    .map(|value| self.wrap(value, level + 1))
                    .collect::<Emit<Vec<_>>>()?;

                (operands.join(joiner), level)
            }

            Expr::Compare {
                left,
                ops,
                comparators,
            } => match (&ops[..], &comparators[..]) {
                ([op], [right]) => {
                    let symbol = match op {
                        CmpOp::Eq | CmpOp::Is => "==",
                        CmpOp::NotEq | CmpOp::IsNot => "!=",
                        CmpOp::Lt => "<",
                        CmpOp::LtE => "<=",
                        CmpOp::Gt => ">",
                        CmpOp::GtE => ">=",
                        CmpOp::In | CmpOp::NotIn => {
                            return unsupported(location, format!("`{}` comparison", op))
                        }
                    };

                    let left = self.wrap(left, COMPARE + 1)?;
                    let right = self.wrap(right, COMPARE + 1)?;
                    (format!("{} {} {}", left, symbol, right), COMPARE)
                }

                _ => return unsupported(location, "chained comparison"),
            },

            Expr::Call { func, args } => {
                let name = match infer::callee_name(func.val()) {
                    Some(name) => name,
                    None => return unsupported(location, "call to a computed value"),
                };

                let known = self.defined.iter().any(|defined| **defined == *name)
                    || self.session.manifest().function(&name).is_some();

                if !known {
                    log::warn!("{}: call to `{}`, which is not defined at this point", location, name);

                    let warning = Warning::UndeclaredFunction(name.clone());
                    self.session.warn(Located::at(warning, location.clone()));
                }

                let args = args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Emit<Vec<_>>>()?;

                (format!("{}({})", name, args.join(", ")), ATOM)
            }

            // Fuera de una llamada, solo constantes de la plataforma
            Expr::Attribute(..) => {
                let name = match infer::callee_name(expr.val()) {
                    Some(name) => name,
                    None => return unsupported(location, "attribute of a computed value"),
                };

                if self.session.manifest().constant(&name).is_none() {
                    let error = TranslateError::UndeclaredVariable(name);
                    return Err(Located::at(error, location.clone()).into());
                }

                (name, ATOM)
            }

            Expr::Subscript(_, index) if matches!(index.val(), Expr::Tuple(_)) => {
                return unsupported(location, "multi-dimensional subscript")
            }

            Expr::Subscript(base, index) => {
                let base = self.wrap(base, ATOM)?;
                let index = self.expr(index)?;
                (format!("{}[{}]", base, index), ATOM)
            }

            Expr::List(_) | Expr::Tuple(_) => {
                return unsupported(location, "container literal outside of an assignment")
            }
        };

        Ok(emitted)
    }
}

/// Aplana cadenas anidadas del mismo operador lógico, como `(a and b) and c`.
fn flatten<'e>(op: BoolOp, values: &'e [Located<Expr>], flat: &mut Vec<&'e Located<Expr>>) {
    for value in values {
        match value.val() {
            Expr::BoolOp(inner, nested) if *inner == op => flatten(op, nested, flat),
            _ => flat.push(value),
        }
    }
}

/// Literal de C++ para una cadena. Una cadena de un solo carácter es un
/// literal `char`, igual que su tipo inferido.
fn quote(string: &str) -> String {
    let single = string.chars().count() == 1;
    let delimiter = if single { '\'' } else { '"' };

    let mut quoted = String::with_capacity(string.len() + 2);
    quoted.push(delimiter);

    for c in string.chars() {
        match c {
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            '\0' => quoted.push_str("\\0"),
            '\\' => quoted.push_str("\\\\"),
            c if c == delimiter => {
                quoted.push('\\');
                quoted.push(c);
            }

            c => quoted.push(c),
        }
    }

    quoted.push(delimiter);
    quoted
}
