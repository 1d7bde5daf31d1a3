//! Emisión de sentencias.

use std::rc::Rc;

use super::{
    annotation_type, expr, unsupported, Buffer, Context, Emit, Translate, TranslateError, Warning,
};
use crate::{
    infer,
    lex::Identifier,
    parse::{BinOp, Expr, FunctionDef, Statement},
    scope::{Binding, ScopeId},
    source::{Located, Location},
    types::Type,
    Options,
};

impl Context<'_, '_> {
    pub(super) fn block(
        &mut self,
        body: &[Located<Statement>],
        out: &mut Buffer,
        depth: usize,
    ) -> Emit<()> {
        body.iter()
            .try_for_each(|statement| self.statement(statement, out, depth))
    }

    fn statement(&mut self, statement: &Located<Statement>, out: &mut Buffer, depth: usize) -> Emit<()> {
        let location = statement.location();
        log::trace!("{}: emitting {}", location, statement.val().kind());

        match statement.val() {
            Statement::FunctionDef(function) => self.function(function, location, out, depth),

            Statement::Assign { targets, value } => match &targets[..] {
                [target] => self.assign(target, value, out, depth),
                _ => unsupported(location, "chained assignment"),
            },

            Statement::AugAssign { target, op, value } => {
                self.aug_assign(target, *op, value, out, depth)
            }

            // Las cadenas sueltas son documentación
            Statement::Expr(expr) => match expr.val() {
                Expr::Str(text) => {
                    for line in text.trim().lines() {
                        emit!(out, depth, "// {}", line.trim_end());
                    }

                    Ok(())
                }

                _ => {
                    let code = self.expr(expr)?;
                    emit!(out, depth, "{}", code);
                    Ok(())
                }
            },

            Statement::If { test, body, orelse } => self.conditional(test, body, orelse, out, depth),

            Statement::While { test, body, orelse } => {
                let test = self.expr(test)?;
                emit!(out, depth, "while ({}) {{", test);

                self.loops += 1;
                let result = self.block(body, out, depth + 1);
                self.loops -= 1;
                result?;

                emit!(out, depth, "}}");

                // C++ no tiene `while/else`; el bloque `else` se ejecuta al
                // terminar el ciclo, por lo cual se coloca justo después
                self.block(orelse, out, depth)
            }

            Statement::Return(value) => self.return_statement(value.as_ref(), location, out, depth),
            Statement::Import(modules) => self.import(modules, location, depth),
            Statement::Global(names) => {
                for name in names {
                    self.symbols.mark_global(name.val().as_str());
                }

                Ok(())
            }

            Statement::Pass => Ok(()),

            Statement::Break | Statement::Continue if self.loops == 0 => {
                unsupported(location, format!("{} outside of a loop", statement.val().kind()))
            }

            Statement::Break => {
                emit!(out, depth, "break");
                Ok(())
            }

            Statement::Continue => {
                emit!(out, depth, "continue");
                Ok(())
            }

            Statement::For { .. } => unsupported(location, "`for` loop"),
        }
    }

    fn function(
        &mut self,
        function: &FunctionDef,
        location: &Location,
        out: &mut Buffer,
        depth: usize,
    ) -> Emit<()> {
        if depth > 0 || !self.symbols.is_global() {
            return unsupported(location, "nested function definition");
        }

        let name = function.name.val().as_str();
        log::debug!("{}: emitting function `{}`", location, name);

        let parameters = function
            .parameters
            .iter()
            .map(|parameter| {
                let typ = annotation_type(&parameter.annotation)?;
                Ok((Rc::from(parameter.name.val().as_str()), typ))
            })
            .collect::<Result<Vec<(Rc<str>, Type)>, Located<TranslateError>>>()?;

        let annotated = function.returns.is_some();
        if let Some(annotation) = &function.returns {
            self.signatures.declare(name, annotation_type(annotation)?, true);
        }

        if !self.defined.iter().any(|defined| &**defined == name) {
            self.defined.push(Rc::from(name));
        }

        // Cuerpo aislado: se une al búfer principal al cerrar la función
        self.symbols.enter(name, parameters.iter().cloned());
        let outer_loops = std::mem::replace(&mut self.loops, 0);

        let mut body = Buffer::default();
        let result = self.block(&function.body, &mut body, 1);

        self.loops = outer_loops;
        let hoisted = self.symbols.leave();
        result?;

        let returns = self.signatures.returns(name).cloned().unwrap_or(Type::Void);
        self.signatures.declare(name, returns.clone(), annotated);

        let parameters = parameters
            .iter()
            .map(|(parameter, typ)| typ.declare(parameter))
            .collect::<Vec<_>>()
            .join(", ");

        let header = format!("{} {}({})", returns, name, parameters);
        emit!(out, 0, "{} {{", header);

        for (local, typ) in hoisted {
            emit!(out, 1, "{}", typ.declare(&local));
        }

        out.splice(body);
        emit!(out, 0, "}}");
        out.blank();

        let entry_point = name == "setup" || name == "loop";
        if !entry_point && self.session.options().contains(Options::PROTOTYPES) {
            self.prototypes.push(header);
        }

        Ok(())
    }

    fn assign(
        &mut self,
        target: &Located<Expr>,
        value: &Located<Expr>,
        out: &mut Buffer,
        depth: usize,
    ) -> Emit<()> {
        match target.val() {
            Expr::Name(name) => self.bind(name, value, out, depth),

            Expr::Subscript(base, _) => {
                self.infer(base)?;
                let target = self.expr(target)?;
                let value = self.expr(value)?;

                emit!(out, depth, "{} = {}", target, value);
                Ok(())
            }

            Expr::Tuple(_) | Expr::List(_) => unsupported(target.location(), "tuple unpacking"),
            other => unsupported(target.location(), format!("assignment to {}", other.kind())),
        }
    }

    /// Asignación a un nombre simple.
    ///
    /// En el ámbito del archivo, la primera asignación de un nombre se
    /// convierte en el inicializador de su declaración global. En cualquier
    /// otro caso se emite una asignación simple, ya que las locales se
    /// declaran al inicio de la función.
    fn bind(&mut self, name: &Identifier, value: &Located<Expr>, out: &mut Buffer, depth: usize) -> Emit<()> {
        let name = name.as_str();
        let typ = match value.val() {
            Expr::None => return unsupported(value.location(), "`None` as a value"),
            _ => self.infer(value)?,
        };

        if typ == Type::Void {
            return unsupported(value.location(), "assignment of a `void` value");
        }

        let current = self.symbols.assigned(name).cloned();
        let typ = match current {
            Some(current) => self.reassigned(name, current, typ, value.location())?,
            None => typ,
        };

        let binding = self.symbols.assign(name, typ);
        let initializer = binding == Binding::Declared && depth == 0 && self.symbols.is_global();

        match value.val() {
            Expr::List(items) | Expr::Tuple(items) => {
                let elements = items
                    .iter()
                    .map(|item| self.expr(item))
                    .collect::<Emit<Vec<_>>>()?;

                if initializer {
                    let initializer = format!("{{{}}}", elements.join(", "));
                    self.symbols.initialize(name, initializer);
                } else {
                    for (index, element) in elements.iter().enumerate() {
                        emit!(out, depth, "{}[{}] = {}", name, index, element);
                    }
                }
            }

            _ => {
                let value = self.expr(value)?;
                if initializer {
                    self.symbols.initialize(name, value);
                } else {
                    emit!(out, depth, "{} = {}", name, value);
                }
            }
        }

        Ok(())
    }

    /// Asignación compuesta. Nunca declara; a lo sumo promueve el tipo
    /// registrado a `float`.
    fn aug_assign(
        &mut self,
        target: &Located<Expr>,
        op: BinOp,
        value: &Located<Expr>,
        out: &mut Buffer,
        depth: usize,
    ) -> Emit<()> {
        match target.val() {
            Expr::Name(name) => {
                let name = name.as_str();
                let current = match self.symbols.lookup(name) {
                    Some(typ) => typ.clone(),
                    None => {
                        let error = TranslateError::UndeclaredVariable(name.to_owned());
                        return Err(Located::at(error, target.location().clone()).into());
                    }
                };

                let promotes = match op {
                    BinOp::Div | BinOp::Pow => true,
                    _ => infer::literal(value.val()).map_or(false, |typ| typ.is_float()),
                };

                let promoted = self.promote(name, current.clone(), promotes, target.location());
                if promoted != current {
                    self.symbols.update(name, promoted);
                }
            }

            Expr::Subscript(..) => {
                self.infer(target)?;
            }

            other => {
                return unsupported(target.location(), format!("augmented assignment to {}", other.kind()))
            }
        }

        let target = self.expr(target)?;
        match op {
            BinOp::FloorDiv => {
                let value = self.wrap(value, expr::DIVISOR)?;
                emit!(out, depth, "{0} = int({0} / {1})", target, value);
            }

            BinOp::Pow => {
                let value = self.expr(value)?;
                emit!(out, depth, "{0} = pow({0}, {1})", target, value);
            }

            _ => {
                let value = self.expr(value)?;
                emit!(out, depth, "{} {}= {}", target, expr::symbol(op), value);
            }
        }

        Ok(())
    }

    /// Tipo de un nombre ya declarado tras asignarle un valor de tipo `typ`.
    ///
    /// Entre tipos numéricos solo se promueve a `float`. Cualquier otro
    /// cambio es un error: el texto ya emitido depende del tipo anterior.
    fn reassigned(&mut self, name: &str, current: Type, typ: Type, location: &Location) -> Translate<Type> {
        if current == typ {
            Ok(typ)
        } else if current.is_numeric() && typ.is_numeric() {
            Ok(self.promote(name, current, typ.is_float(), location))
        } else {
            let error = TranslateError::TypeMismatch {
                name: name.to_owned(),
                expected: current,
                found: typ,
            };

            Err(Located::at(error, location.clone()))
        }
    }

    /// Promueve un nombre a `float` si `promotes`. Un parámetro o una global
    /// importada conservan su tipo declarado, con una advertencia.
    fn promote(&mut self, name: &str, current: Type, promotes: bool, location: &Location) -> Type {
        if !promotes || current.is_float() {
            return current;
        }

        if self.symbols.is_fixed(name) {
            log::warn!("{}: `{}` keeps its declared type `{}`", location, name, current);

            let warning = Warning::Truncation {
                name: name.to_owned(),
                declared: current.clone(),
            };

            self.session.warn(Located::at(warning, location.clone()));
            return current;
        }

        log::trace!("{}: `{}` promoted from `{}` to `float`", location, name, current);
        Type::Float
    }

    /// `if`, cadenas `else if` y `else` final.
    ///
    /// Un `elif` llega como un `If` que es el único elemento de `orelse`; se
    /// reescribe como `else if` en vez de anidarlo dentro de un `else`.
    fn conditional(
        &mut self,
        test: &Located<Expr>,
        body: &[Located<Statement>],
        orelse: &[Located<Statement>],
        out: &mut Buffer,
        depth: usize,
    ) -> Emit<()> {
        let test = self.expr(test)?;
        emit!(out, depth, "if ({}) {{", test);
        self.block(body, out, depth + 1)?;

        let mut orelse = orelse;
        loop {
            let elif = match orelse {
                [single] => match single.val() {
                    Statement::If { test, body, orelse } => Some((test, body, orelse)),
                    _ => None,
                },

                _ => None,
            };

            match elif {
                Some((test, body, next)) => {
                    let test = self.expr(test)?;
                    emit!(out, depth, "}} else if ({}) {{", test);
                    self.block(body, out, depth + 1)?;
                    orelse = next;
                }

                None if orelse.is_empty() => break,
                None => {
                    emit!(out, depth, "}} else {{");
                    self.block(orelse, out, depth + 1)?;
                    break;
                }
            }
        }

        emit!(out, depth, "}}");
        Ok(())
    }

    /// Además de emitir el `return`, ajusta el tipo de retorno de una
    /// función sin anotación.
    fn return_statement(
        &mut self,
        value: Option<&Located<Expr>>,
        location: &Location,
        out: &mut Buffer,
        depth: usize,
    ) -> Emit<()> {
        let function = match self.symbols.current() {
            ScopeId::Function(function) => Rc::clone(function),
            ScopeId::Global => return unsupported(location, "`return` outside of a function"),
        };

        match value.filter(|value| !matches!(value.val(), Expr::None)) {
            None => emit!(out, depth, "return"),
            Some(value) => {
                let typ = self.infer(value)?;
                self.signatures.refine(&function, typ);

                let value = self.expr(value)?;
                emit!(out, depth, "return {}", value);
            }
        }

        Ok(())
    }

    /// Traduce cada módulo importado como una unidad auxiliar e incorpora
    /// sus exportaciones a este módulo.
    fn import(&mut self, modules: &[Located<String>], location: &Location, depth: usize) -> Emit<()> {
        if depth > 0 || !self.symbols.is_global() {
            return unsupported(location, "`import` inside a block");
        }

        for module in modules {
            let exports = self.session.resolve(module.val(), module.location())?;

            for (function, returns) in &exports.functions {
                self.signatures.declare(function, returns.clone(), true);
                if !self.defined.iter().any(|defined| **defined == **function) {
                    self.defined.push(Rc::from(function.as_str()));
                }
            }

            for (global, typ) in &exports.globals {
                self.symbols.import_global(global, typ.clone());
            }

            let include = format!("#include \"{}\"", exports.header);
            if !self.includes.contains(&include) {
                self.includes.push(include);
            }
        }

        Ok(())
    }
}
