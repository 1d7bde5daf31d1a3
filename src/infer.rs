//! Inferencia de tipos.
//!
//! El lenguaje fuente no declara tipos para variables. Esta fase los
//! recupera a partir de un conjunto cerrado de pistas sintácticas:
//! literales, anotaciones de parámetros, promoción de operadores, firmas
//! de funciones conocidas y el manifiesto de capacidades. La inferencia
//! nunca modifica las tablas que consulta.

use crate::{
    emit::{Translate, TranslateError},
    manifest::Manifest,
    parse::{BinOp, Expr, UnaryOp},
    scope::{Signatures, SymbolTable},
    source::{Located, Location},
    types::Type,
};

/// Vista de solo lectura del contexto de traducción.
pub struct Env<'e> {
    pub symbols: &'e SymbolTable,
    pub signatures: &'e Signatures,
    pub manifest: &'e Manifest,
}

impl Env<'_> {
    /// Busca una variable y, en su defecto, una constante del manifiesto.
    fn lookup(&self, name: &str) -> Option<&Type> {
        self.symbols
            .lookup(name)
            .or_else(|| self.manifest.constant(name))
    }
}

/// Deduce el tipo de una expresión.
pub fn infer(expr: &Located<Expr>, env: &Env<'_>) -> Translate<Type> {
    let fail = |error| Err(Located::at(error, expr.location().clone()));

    match expr.val() {
        Expr::Integer(_) => Ok(Type::Int),
        Expr::Float(_) => Ok(Type::Float),
        Expr::Str(string) => Ok(string_type(string)),
        Expr::Bool(_) => Ok(Type::Boolean),
        Expr::None => Ok(Type::Void),

        Expr::Name(name) => match env.lookup(name.as_str()) {
            Some(typ) => Ok(typ.clone()),
            None => fail(TranslateError::UndeclaredVariable(name.to_string())),
        },

        Expr::Binary(left, op, right) => binary(left, *op, right, env),

        Expr::Unary(UnaryOp::Not, _) | Expr::BoolOp(..) | Expr::Compare { .. } => Ok(Type::Boolean),
        Expr::Unary(_, operand) => infer(operand, env),

        Expr::Call { func, .. } => {
            let name = match callee_name(func.val()) {
                Some(name) => name,
                None => return fail(TranslateError::UnsupportedSyntax(
                    "call to a computed value".to_owned(),
                )),
            };

            let returns = env
                .signatures
                .returns(&name)
                .or_else(|| env.manifest.function(&name));

            match returns {
                Some(typ) => Ok(typ.clone()),
                None => fail(TranslateError::UnresolvedCall(name)),
            }
        }

        // Los atributos sueltos solo pueden ser constantes del manifiesto
        Expr::Attribute(..) => {
            let name = callee_name(expr.val()).unwrap_or_default();
            match env.manifest.constant(&name) {
                Some(typ) => Ok(typ.clone()),
                None => fail(TranslateError::UndeclaredVariable(name)),
            }
        }

        Expr::Subscript(base, _) => match infer(base, env)?.element() {
            Some(element) => Ok(element),
            None => fail(TranslateError::UnsupportedSyntax(
                "subscript of a value that is not an array".to_owned(),
            )),
        },

        Expr::List(items) | Expr::Tuple(items) => container(items, expr.location(), env),
    }
}

/// Tipo de un literal, si la expresión es uno.
///
/// Un signo aplicado a un literal numérico también cuenta como literal.
pub fn literal(expr: &Expr) -> Option<Type> {
    match expr {
        Expr::Integer(_) => Some(Type::Int),
        Expr::Float(_) => Some(Type::Float),
        Expr::Str(string) => Some(string_type(string)),
        Expr::Bool(_) => Some(Type::Boolean),
        Expr::Unary(UnaryOp::Neg, operand) | Expr::Unary(UnaryOp::Pos, operand) => {
            literal(operand.val())
        }

        _ => None,
    }
}

/// Nombre completo de una función llamada, como `delay` o `Serial.begin`.
pub fn callee_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Name(name) => Some(name.to_string()),
        Expr::Attribute(base, attribute) => {
            let base = callee_name(base.val())?;
            Some(format!("{}.{}", base, attribute.val()))
        }

        _ => None,
    }
}

/// Una cadena de un solo carácter es un `char`.
fn string_type(string: &str) -> Type {
    if string.chars().count() == 1 {
        Type::Char
    } else {
        Type::Str
    }
}

fn binary(left: &Located<Expr>, op: BinOp, right: &Located<Expr>, env: &Env<'_>) -> Translate<Type> {
    match op {
        // La división siempre produce punto flotante, sin importar los operandos
        BinOp::Div | BinOp::Pow => Ok(Type::Float),
        BinOp::FloorDiv => Ok(Type::Int),

        _ if infer(left, env)?.is_float() || infer(right, env)?.is_float() => Ok(Type::Float),
        _ => Ok(Type::Int),
    }
}

/// Los elementos de un contenedor deben tener todos el mismo tipo.
fn container(items: &[Located<Expr>], location: &Location, env: &Env<'_>) -> Translate<Type> {
    let mut element: Option<Type> = None;
    for item in items {
        let typ = infer(item, env)?;
        let error = match &element {
            Some(first) if *first != typ => {
                format!("mixed element types `{}` and `{}`", first, typ)
            }

            _ if matches!(typ, Type::Array(..)) => "nested containers are not supported".to_owned(),
            Some(_) => continue,
            None => {
                element = Some(typ);
                continue;
            }
        };

        return Err(Located::at(TranslateError::ContainerType(error), item.location().clone()));
    }

    match element {
        Some(element) => Ok(Type::Array(Box::new(element), items.len())),
        None => {
            let error = TranslateError::ContainerType("empty containers have no element type".to_owned());
            Err(Located::at(error, location.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, manifest, parse, source};

    /// Infiere el tipo del valor de una asignación `_ = expr`.
    fn infer_text(text: &str, symbols: &SymbolTable, signatures: &Signatures) -> Translate<Type> {
        let (start, stream) = source::consume(&format!("_ = {}\n", text), "test");
        let tokens = Lexer::new(start.clone(), stream).try_exhaustive().unwrap();
        let ast = parse::parse(tokens.iter(), start).unwrap();

        let env = Env {
            symbols,
            signatures,
            manifest: manifest::arduino(),
        };

        match ast.body[0].val() {
            parse::Statement::Assign { value, .. } => infer(value, &env),
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    fn infer_simple(text: &str) -> Translate<Type> {
        let mut symbols = SymbolTable::default();
        symbols.assign("count", Type::Int);
        symbols.assign("ratio", Type::Float);
        symbols.assign("pins", Type::Array(Box::new(Type::Int), 3));

        let mut signatures = Signatures::default();
        signatures.declare("calc", Type::Int, true);
        signatures.declare("scale", Type::Float, true);

        infer_text(text, &symbols, &signatures)
    }

    #[test]
    fn literals() {
        assert_eq!(infer_simple("42").unwrap(), Type::Int);
        assert_eq!(infer_simple("4.2").unwrap(), Type::Float);
        assert_eq!(infer_simple("'x'").unwrap(), Type::Char);
        assert_eq!(infer_simple("'xy'").unwrap(), Type::Str);
        assert_eq!(infer_simple("True").unwrap(), Type::Boolean);
    }

    #[test]
    fn division_is_always_float() {
        assert_eq!(infer_simple("count / 2").unwrap(), Type::Float);
        assert_eq!(infer_simple("4 / 2").unwrap(), Type::Float);
        assert_eq!(infer_simple("count // 2").unwrap(), Type::Int);
    }

    #[test]
    fn float_operands_promote() {
        assert_eq!(infer_simple("count * 2").unwrap(), Type::Int);
        assert_eq!(infer_simple("count + ratio").unwrap(), Type::Float);
        assert_eq!(infer_simple("1 + (count - 2.5)").unwrap(), Type::Float);
        assert_eq!(infer_simple("calc(1) + scale(2)").unwrap(), Type::Float);
        assert_eq!(infer_simple("-ratio").unwrap(), Type::Float);
    }

    #[test]
    fn calls_and_manifest() {
        assert_eq!(infer_simple("calc(3)").unwrap(), Type::Int);
        assert_eq!(infer_simple("millis()").unwrap(), Type::UnsignedLong);
        assert_eq!(infer_simple("Serial.read()").unwrap(), Type::Int);
        assert_eq!(infer_simple("HIGH").unwrap(), Type::Int);
        assert_eq!(infer_simple("count > 2 and ratio < 1.0").unwrap(), Type::Boolean);
        assert_eq!(infer_simple("pins[1]").unwrap(), Type::Int);
    }

    #[test]
    fn undeclared_names_fail() {
        let error = infer_simple("missing + 1").unwrap_err();
        assert!(matches!(error.val(), TranslateError::UndeclaredVariable(name) if name == "missing"));

        let error = infer_simple("mystery()").unwrap_err();
        assert!(matches!(error.val(), TranslateError::UnresolvedCall(name) if name == "mystery"));

        // También como operando
        let error = infer_simple("mystery() + 1").unwrap_err();
        assert!(matches!(error.val(), TranslateError::UnresolvedCall(name) if name == "mystery"));

        let error = infer_simple("2.5 * mystery()").unwrap_err();
        assert!(matches!(error.val(), TranslateError::UnresolvedCall(_)));
    }

    #[test]
    fn containers() {
        assert_eq!(
            infer_simple("[1, 2, 3]").unwrap(),
            Type::Array(Box::new(Type::Int), 3)
        );

        assert_eq!(
            infer_simple("(1.0, ratio)").unwrap(),
            Type::Array(Box::new(Type::Float), 2)
        );

        let error = infer_simple("[1, 2.0]").unwrap_err();
        assert!(matches!(error.val(), TranslateError::ContainerType(_)));

        let error = infer_simple("[]").unwrap_err();
        assert!(matches!(error.val(), TranslateError::ContainerType(_)));
    }

    #[test]
    fn literal_detection() {
        assert_eq!(literal(&Expr::Integer(3)), Some(Type::Int));
        assert_eq!(literal(&Expr::Name(crate::lex::Identifier::new("x"))), None);
    }
}
