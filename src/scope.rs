//! Tablas de símbolos.
//!
//! Existe un ámbito global por módulo y un ámbito local por función. La
//! búsqueda de un nombre consulta primero el ámbito actual y luego el global.
//! Una declaración `global` dentro de una función marca nombres que, para
//! esa función, se leen y escriben directamente en el ámbito global.
//!
//! Las variables locales se declaran al inicio del cuerpo de su función
//! ("hoisting"), ya que C++ requiere declarar antes de usar mientras que el
//! lenguaje fuente declara en la primera asignación.

use crate::types::Type;
use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

/// Identificador de ámbito.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeId {
    Global,
    Function(Rc<str>),
}

/// Resultado de registrar una asignación.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    /// Primera asignación de un nombre nuevo.
    Declared,

    /// El nombre ya existía en el ámbito destino.
    Reassigned,
}

#[derive(Default)]
struct Scope {
    types: HashMap<Rc<str>, Type>,
    order: Vec<Rc<str>>,
    globals: HashSet<Rc<str>>,
    parameters: HashSet<Rc<str>>,
}

impl Scope {
    fn bind(&mut self, name: &str, typ: Type) -> Binding {
        match self.types.get_mut(name) {
            Some(current) => {
                *current = typ;
                Binding::Reassigned
            }

            None => {
                let name: Rc<str> = Rc::from(name);
                self.order.push(Rc::clone(&name));
                self.types.insert(name, typ);
                Binding::Declared
            }
        }
    }
}

/// Variable global pendiente de declarar.
#[derive(Debug, PartialEq)]
pub struct GlobalVar<'a> {
    pub name: &'a str,
    pub typ: &'a Type,
    pub initializer: Option<&'a str>,
}

pub struct SymbolTable {
    scopes: HashMap<ScopeId, Scope>,
    current: ScopeId,
    initializers: HashMap<Rc<str>, String>,
    external: HashSet<Rc<str>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        let mut scopes = HashMap::new();
        scopes.insert(ScopeId::Global, Scope::default());

        SymbolTable {
            scopes,
            current: ScopeId::Global,
            initializers: HashMap::new(),
            external: HashSet::new(),
        }
    }
}

impl SymbolTable {
    pub fn current(&self) -> &ScopeId {
        &self.current
    }

    pub fn is_global(&self) -> bool {
        self.current == ScopeId::Global
    }

    /// Crea un ámbito nuevo para una función y lo activa.
    pub fn enter<I>(&mut self, function: &str, parameters: I)
    where
        I: IntoIterator<Item = (Rc<str>, Type)>,
    {
        let mut scope = Scope::default();
        for (name, typ) in parameters {
            scope.bind(&name, typ);
            scope.parameters.insert(name);
        }

        let id = ScopeId::Function(Rc::from(function));
        self.scopes.insert(id.clone(), scope);
        self.current = id;
    }

    /// Abandona la función actual y retorna las locales que deben
    /// declararse al inicio de su cuerpo, agrupadas por tipo en orden de
    /// primera aparición.
    pub fn leave(&mut self) -> Vec<(Rc<str>, Type)> {
        let id = std::mem::replace(&mut self.current, ScopeId::Global);
        let scope = match self.scopes.get(&id) {
            Some(scope) if id != ScopeId::Global => scope,
            _ => return Vec::new(),
        };

        let mut groups: Vec<(&Type, Vec<Rc<str>>)> = Vec::new();
        let locals = scope
            .order
            .iter()
            .filter(|name| !scope.parameters.contains(*name) && !scope.globals.contains(*name));

        for name in locals {
            let typ = &scope.types[name];
            match groups.iter_mut().find(|(group, _)| *group == typ) {
                Some((_, names)) => names.push(Rc::clone(name)),
                None => groups.push((typ, vec![Rc::clone(name)])),
            }
        }

        groups
            .into_iter()
            .flat_map(|(typ, names)| names.into_iter().map(move |name| (name, typ.clone())))
            .collect()
    }

    /// Busca el tipo de un nombre en el ámbito actual y luego en el global.
    pub fn lookup(&self, name: &str) -> Option<&Type> {
        let local = self.scopes.get(&self.current).filter(|_| !self.is_global());
        match local {
            Some(scope) if scope.globals.contains(name) => self.global().types.get(name),
            Some(scope) => scope
                .types
                .get(name)
                .or_else(|| self.global().types.get(name)),

            None => self.global().types.get(name),
        }
    }

    /// Tipo de un nombre en el ámbito donde se registraría una asignación
    /// simple, si ya existe ahí.
    pub fn assigned(&self, name: &str) -> Option<&Type> {
        match self.scopes.get(&self.current) {
            Some(scope) if !scope.globals.contains(name) => scope.types.get(name),
            _ => self.global().types.get(name),
        }
    }

    /// Los parámetros y las globales importadas ya tienen una declaración
    /// emitida fuera del cuerpo actual; su tipo no puede cambiar.
    pub fn is_fixed(&self, name: &str) -> bool {
        let local = self.scopes.get(&self.current).filter(|_| !self.is_global());
        match local {
            Some(scope) if !scope.globals.contains(name) && scope.types.contains_key(name) => {
                scope.parameters.contains(name)
            }

            _ => self.external.contains(name),
        }
    }

    /// Registra una asignación simple en el ámbito que corresponda.
    pub fn assign(&mut self, name: &str, typ: Type) -> Binding {
        self.target_scope(name).bind(name, typ)
    }

    /// Actualiza el tipo de un nombre ya existente. Retorna `false` si
    /// el nombre no se encuentra en ningún ámbito visible.
    pub fn update(&mut self, name: &str, typ: Type) -> bool {
        let visible = self.target_scope(name).types.contains_key(name);
        let scope = if visible {
            self.target_scope(name)
        } else {
            self.global_mut()
        };

        match scope.types.get_mut(name) {
            Some(current) => {
                *current = typ;
                true
            }

            None => false,
        }
    }

    /// Marca un nombre como referencia al ámbito global dentro de la
    /// función actual. No tiene efecto en el ámbito global.
    pub fn mark_global(&mut self, name: &str) {
        if !self.is_global() {
            let scope = self.current_mut();
            scope.globals.insert(Rc::from(name));
        }
    }

    /// Asocia un inicializador a una global recién declarada.
    pub fn initialize(&mut self, name: &str, initializer: String) {
        self.initializers.entry(Rc::from(name)).or_insert(initializer);
    }

    /// Registra una global que otro módulo declara. Se puede consultar,
    /// pero no se vuelve a declarar en este módulo.
    pub fn import_global(&mut self, name: &str, typ: Type) {
        self.global_mut().bind(name, typ);
        self.external.insert(Rc::from(name));
    }

    /// Globales propias del módulo, en orden de primera asignación.
    pub fn globals(&self) -> Vec<GlobalVar<'_>> {
        let global = self.global();
        global
            .order
            .iter()
            .filter(|name| !self.external.contains(*name))
            .map(|name| GlobalVar {
                name,
                typ: &global.types[name],
                initializer: self.initializers.get(name).map(String::as_str),
            })
            .collect()
    }

    fn target_scope(&mut self, name: &str) -> &mut Scope {
        let pass_through = self.current_mut().globals.contains(name);
        if pass_through {
            self.global_mut()
        } else {
            self.current_mut()
        }
    }

    fn current_mut(&mut self) -> &mut Scope {
        self.scopes.entry(self.current.clone()).or_default()
    }

    fn global(&self) -> &Scope {
        &self.scopes[&ScopeId::Global]
    }

    fn global_mut(&mut self) -> &mut Scope {
        self.scopes.entry(ScopeId::Global).or_default()
    }
}

/// Firma conocida de una función.
#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    pub returns: Type,

    /// Una anotación explícita nunca se sobrescribe por inferencia.
    pub annotated: bool,
}

/// Tabla de tipos de retorno por función.
#[derive(Default)]
pub struct Signatures {
    table: HashMap<Rc<str>, Signature>,
}

impl Signatures {
    pub fn declare(&mut self, name: &str, returns: Type, annotated: bool) {
        self.table
            .insert(Rc::from(name), Signature { returns, annotated });
    }

    /// Ajusta el tipo de retorno inferido de una función sin anotación.
    pub fn refine(&mut self, name: &str, returns: Type) {
        match self.table.get_mut(name) {
            Some(signature) if signature.annotated => (),
            Some(signature) => signature.returns = returns,
            None => self.declare(name, returns, false),
        }
    }

    pub fn returns(&self, name: &str) -> Option<&Type> {
        self.table.get(name).map(|signature| &signature.returns)
    }
}
