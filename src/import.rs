//! Resolución de importaciones y unidades de traducción.
//!
//! Cada módulo importado se traduce una sola vez por solicitud, como una
//! unidad auxiliar independiente. El módulo que importa recibe a cambio
//! las exportaciones de la unidad: firmas de funciones, nombres de funciones
//! emitidas y tipos de variables globales.

use std::{
    collections::HashMap,
    fs, io,
    path::PathBuf,
    rc::Rc,
};

use crate::{
    emit::{self, TranslateError, Warning},
    manifest::Manifest,
    source::{Located, Location},
    types::Type,
    Error, Options,
};

/// Fuente de texto de módulos importables.
pub trait ModuleLoader {
    /// Obtiene el código fuente de un módulo, como `utils` o `drivers.motor`.
    fn load(&self, module: &str) -> io::Result<String>;
}

/// Carga módulos desde el sistema de archivos. El módulo `a.b` corresponde
/// a `<root>/a/b.py`.
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        FsLoader { root: root.into() }
    }
}

impl ModuleLoader for FsLoader {
    fn load(&self, module: &str) -> io::Result<String> {
        let mut path = self.root.clone();
        path.extend(module.split('.'));
        path.set_extension("py");

        log::debug!("Loading module `{}` from {}", module, path.display());
        fs::read_to_string(&path)
    }
}

/// Módulos en memoria, útil para pruebas y para incrustar bibliotecas.
#[derive(Default)]
pub struct MemoryLoader {
    modules: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn insert<M, T>(&mut self, module: M, text: T) -> &mut Self
    where
        M: Into<String>,
        T: Into<String>,
    {
        self.modules.insert(module.into(), text.into());
        self
    }
}

impl ModuleLoader for MemoryLoader {
    fn load(&self, module: &str) -> io::Result<String> {
        self.modules.get(module).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no such module in memory")
        })
    }
}

/// Rechaza toda importación.
pub struct NoImports;

impl ModuleLoader for NoImports {
    fn load(&self, _module: &str) -> io::Result<String> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            "no module loader configured",
        ))
    }
}

/// Clase de unidad de traducción.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnitKind {
    /// El sketch principal, `.ino`.
    Primary,

    /// Un módulo importado, `.hpp`.
    Auxiliary,
}

impl UnitKind {
    pub fn extension(self) -> &'static str {
        match self {
            UnitKind::Primary => "ino",
            UnitKind::Auxiliary => "hpp",
        }
    }
}

/// Una unidad de traducción terminada.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unit {
    name: String,
    kind: UnitKind,
    code: String,
}

impl Unit {
    pub(crate) fn new(name: String, kind: UnitKind, code: String) -> Self {
        Unit { name, kind, code }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Nombre de archivo de la unidad, como `blink.ino` o `utils.hpp`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.kind.extension())
    }
}

/// Lo que un módulo traducido ofrece a quien lo importa.
pub(crate) struct Exports {
    pub header: String,
    pub functions: Vec<(String, Type)>,
    pub globals: Vec<(String, Type)>,
}

/// Estado de una solicitud de traducción completa.
pub(crate) struct Session<'a> {
    manifest: &'a Manifest,
    loader: &'a dyn ModuleLoader,
    options: Options,
    in_progress: Vec<String>,
    modules: HashMap<String, Rc<Exports>>,
    units: Vec<Unit>,
    warnings: Vec<Located<Warning>>,
}

impl<'a> Session<'a> {
    pub fn new(manifest: &'a Manifest, loader: &'a dyn ModuleLoader, options: Options) -> Self {
        Session {
            manifest,
            loader,
            options,
            in_progress: Vec::new(),
            modules: HashMap::new(),
            units: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn manifest(&self) -> &'a Manifest {
        self.manifest
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn warn(&mut self, warning: Located<Warning>) {
        self.warnings.push(warning);
    }

    /// Traduce un módulo. Mientras dura la traducción, el módulo se
    /// considera en curso para efectos de detección de ciclos.
    pub fn translate(&mut self, module: &str, text: &str, kind: UnitKind) -> Result<(Unit, Exports), Error> {
        self.in_progress.push(module.to_owned());
        let result = emit::translate_module(self, module, text, kind);
        self.in_progress.pop();

        result
    }

    /// Obtiene las exportaciones de un módulo importado, traduciéndolo
    /// si es la primera vez que se solicita.
    pub fn resolve(&mut self, module: &str, location: &Location) -> Result<Rc<Exports>, Error> {
        if let Some(exports) = self.modules.get(module) {
            log::debug!("Module `{}` already translated", module);
            return Ok(Rc::clone(exports));
        }

        if let Some(start) = self.in_progress.iter().position(|open| open == module) {
            let mut chain = self.in_progress[start..].to_vec();
            chain.push(module.to_owned());

            let error = TranslateError::CyclicImport(chain.join(" -> "));
            return Err(Located::at(error, location.clone()).into());
        }

        let text = self.loader.load(module).map_err(|error| {
            let error = TranslateError::ModuleNotFound {
                module: module.to_owned(),
                reason: error.to_string(),
            };

            Located::at(error, location.clone())
        })?;

        let (unit, exports) = self.translate(module, &text, UnitKind::Auxiliary)?;
        log::debug!("Module `{}` translated into {}", module, unit.file_name());

        let exports = Rc::new(exports);
        self.units.push(unit);
        self.modules.insert(module.to_owned(), Rc::clone(&exports));

        Ok(exports)
    }

    /// Unidades auxiliares en orden de finalización y advertencias acumuladas.
    pub fn finish(self) -> (Vec<Unit>, Vec<Located<Warning>>) {
        (self.units, self.warnings)
    }
}
