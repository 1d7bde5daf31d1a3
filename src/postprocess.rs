//! Posprocesamiento textual de una unidad.
//!
//! Esta fase recibe el texto ya emitido y lo completa sin tocar su
//! estructura de llaves ni su indentación: corrige las grafías de literales
//! booleanos, antepone los prototipos y las declaraciones globales y agrega
//! terminadores de sentencia.

use crate::{import::UnitKind, manifest::Manifest, scope::GlobalVar, Options};

/// Encabezado de procedencia.
pub const BANNER: &str = "\
// Auto-generated by ardpy from a Python-like source.
// Edit the original sketch instead: changes made here are overwritten.";

/// Secciones de una unidad, en el orden en que se ensamblan.
pub struct Parts<'p> {
    pub includes: &'p [String],
    pub prototypes: &'p [String],
    pub globals: &'p [GlobalVar<'p>],
    pub body: Vec<String>,
}

pub struct Postprocessor<'m> {
    options: Options,
    kind: UnitKind,
    manifest: &'m Manifest,
}

impl<'m> Postprocessor<'m> {
    pub fn new(options: Options, kind: UnitKind, manifest: &'m Manifest) -> Self {
        Postprocessor {
            options,
            kind,
            manifest,
        }
    }

    /// Ensambla el texto final de la unidad.
    pub fn run(&self, parts: Parts<'_>) -> String {
        let mut lines: Vec<String> = Vec::new();

        if self.options.contains(Options::BANNER) {
            lines.extend(BANNER.lines().map(str::to_owned));
            lines.push(String::new());
        }

        if self.kind == UnitKind::Auxiliary {
            lines.push("#pragma once".to_owned());
            lines.push(String::new());
        }

        lines.extend(parts.includes.iter().cloned());
        lines.push(String::new());

        // Los inicializadores de globales pueden llamar funciones del módulo
        lines.extend(parts.prototypes.iter().map(|prototype| format!("{};", prototype)));
        lines.push(String::new());

        // Las constantes del manifiesto ya están declaradas por la plataforma
        let globals = parts
            .globals
            .iter()
            .filter(|global| self.manifest.constant(global.name).is_none());

        for global in globals {
            let declaration = global.typ.declare(global.name);
            match global.initializer {
                Some(initializer) => lines.push(format!("{} = {};", declaration, initializer)),
                None => lines.push(format!("{};", declaration)),
            }
        }

        lines.push(String::new());
        lines.extend(parts.body);

        let mut output = String::new();
        let mut previous_blank = true;

        for line in lines {
            let line = terminate(&normalize_literals(&line));
            let blank = line.is_empty();

            if !(blank && previous_blank) {
                output.push_str(&line);
                output.push('\n');
            }

            previous_blank = blank;
        }

        while output.ends_with("\n\n") {
            output.pop();
        }

        output
    }
}

/// Reemplaza `True` y `False` por `true` y `false`, excepto dentro de
/// literales y comentarios.
fn normalize_literals(line: &str) -> String {
    let mut output = String::with_capacity(line.len());
    let mut word = String::new();
    let mut quote = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(delimiter) = quote {
            output.push(c);
            if c == '\\' {
                output.extend(chars.next());
            } else if c == delimiter {
                quote = None;
            }

            continue;
        }

        if c.is_ascii_alphanumeric() || c == '_' {
            word.push(c);
            continue;
        }

        flush(&mut word, &mut output);
        match c {
            '"' | '\'' => {
                quote = Some(c);
                output.push(c);
            }

            '/' if chars.peek() == Some(&'/') => {
                output.push(c);
                output.extend(chars.by_ref());
            }

            c => output.push(c),
        }
    }

    flush(&mut word, &mut output);
    output
}

fn flush(word: &mut String, output: &mut String) {
    let replacement = match word.as_str() {
        "True" => "true",
        "False" => "false",
        other => other,
    };

    output.push_str(replacement);
    word.clear();
}

/// Agrega `;` a una línea que no sea vacía, delimitador de bloque,
/// directiva, comentario o sentencia ya terminada.
fn terminate(line: &str) -> String {
    let trimmed = line.trim();
    let complete = trimmed.is_empty()
        || trimmed.ends_with('{')
        || trimmed.ends_with('}')
        || trimmed.ends_with(';')
        || trimmed.starts_with('#')
        || trimmed.starts_with("//");

    if complete {
        line.trim_end().to_owned()
    } else {
        format!("{};", line.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{manifest, types::Type};
    use pretty_assertions::assert_eq;

    #[test]
    fn literal_spellings() {
        assert_eq!(normalize_literals("while (True) {"), "while (true) {");
        assert_eq!(normalize_literals("done = False"), "done = false");
        assert_eq!(normalize_literals("Trueish = True"), "Trueish = true");
        assert_eq!(
            normalize_literals("Serial.println(\"True or False\")"),
            "Serial.println(\"True or False\")"
        );

        assert_eq!(normalize_literals("// True story"), "// True story");
        assert_eq!(normalize_literals("c = '\\''"), "c = '\\''");
    }

    #[test]
    fn terminators() {
        assert_eq!(terminate("    x = 1"), "    x = 1;");
        assert_eq!(terminate("if (x) {"), "if (x) {");
        assert_eq!(terminate("} else {"), "} else {");
        assert_eq!(terminate("}"), "}");
        assert_eq!(terminate("#include \"utils.hpp\""), "#include \"utils.hpp\"");
        assert_eq!(terminate("// note"), "// note");
        assert_eq!(terminate("return;"), "return;");
        assert_eq!(terminate(""), "");
    }

    #[test]
    fn assembles_sections() {
        let int = Type::Int;
        let pins = Type::Array(Box::new(Type::Int), 2);

        let globals = [
            GlobalVar {
                name: "led",
                typ: &int,
                initializer: Some("13"),
            },
            GlobalVar {
                name: "pins",
                typ: &pins,
                initializer: Some("{2, 3}"),
            },
            GlobalVar {
                name: "HIGH",
                typ: &int,
                initializer: None,
            },
        ];

        let postprocessor = Postprocessor::new(Options::empty(), UnitKind::Auxiliary, manifest::arduino());
        let code = postprocessor.run(Parts {
            includes: &["#include \"other.hpp\"".to_owned()],
            globals: &globals,
            prototypes: &["int twice(int x)".to_owned()],
            body: vec![
                "int twice(int x) {".to_owned(),
                "    return x * 2".to_owned(),
                "}".to_owned(),
                String::new(),
            ],
        });

        assert_eq!(
            code,
            "#pragma once\n\
             \n\
             #include \"other.hpp\"\n\
             \n\
             int twice(int x);\n\
             \n\
             int led = 13;\n\
             int pins[2] = {2, 3};\n\
             \n\
             int twice(int x) {\n\
             \x20   return x * 2;\n\
             }\n"
        );
    }

    #[test]
    fn banner_comes_first() {
        let postprocessor = Postprocessor::new(Options::BANNER, UnitKind::Primary, manifest::arduino());
        let code = postprocessor.run(Parts {
            includes: &[],
            globals: &[],
            prototypes: &[],
            body: vec!["void setup() {".to_owned(), "}".to_owned()],
        });

        assert!(code.starts_with(BANNER));
        assert!(code.ends_with("\n\nvoid setup() {\n}\n"));
        assert!(!code.contains("#pragma once"));
    }
}
