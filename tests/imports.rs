use ardpy::{
    import::{MemoryLoader, UnitKind},
    manifest, Error, Options, TranslateError, Translation, Translator,
};

use indoc::indoc;
use pretty_assertions::assert_eq;

fn translate(loader: &MemoryLoader, text: &str) -> Result<Translation, Error> {
    Translator::new(manifest::arduino())
        .with_loader(loader)
        .with_options(Options::empty())
        .translate("main", text)
}

fn utils() -> MemoryLoader {
    let mut loader = MemoryLoader::default();
    loader.insert(
        "utils",
        indoc! {"
            speed = 3

            def twice(x: int) -> int:
                return x * 2
        "},
    );

    loader
}

#[test]
fn imported_module_becomes_header() {
    let loader = utils();
    let translation = translate(
        &loader,
        indoc! {"
            import utils

            def setup():
                global speed
                speed = twice(speed)
        "},
    )
    .unwrap();

    assert!(translation.warnings.is_empty());
    assert_eq!(
        translation.primary.code(),
        indoc! {r#"
            #include "utils.hpp"

            void setup() {
                speed = twice(speed);
            }
        "#}
    );

    assert_eq!(translation.auxiliary.len(), 1);

    let header = &translation.auxiliary[0];
    assert_eq!(header.kind(), UnitKind::Auxiliary);
    assert_eq!(header.file_name(), "utils.hpp");
    assert_eq!(
        header.code(),
        indoc! {"
            #pragma once

            int speed = 3;

            int twice(int x) {
                return x * 2;
            }
        "}
    );
}

#[test]
fn modules_are_translated_once() {
    let mut loader = utils();
    loader
        .insert("motor", "import utils\n\ndef run() -> int:\n    return twice(speed)\n")
        .insert("led", "import utils\n\nlevel = 1\n");

    let translation = translate(&loader, "import motor, led\nimport utils\n\nx = run() + level\n").unwrap();

    let names: Vec<&str> = translation.auxiliary.iter().map(|unit| unit.name()).collect();
    assert_eq!(names, vec!["utils", "motor", "led"]);

    let code = translation.primary.code();
    assert!(code.starts_with("#include \"motor.hpp\"\n#include \"led.hpp\"\n#include \"utils.hpp\"\n"));
    assert_eq!(code.matches("#include").count(), 3);
    assert!(code.contains("int x = run() + level;"));

    let motor = &translation.auxiliary[1];
    assert!(motor.code().contains("#include \"utils.hpp\""));
    assert!(motor.code().contains("int run() {\n    return twice(speed);\n}"));
    assert!(!motor.code().contains("int speed"));
}

#[test]
fn dotted_modules() {
    let mut loader = MemoryLoader::default();
    loader.insert("drivers.motor", "def stop():\n    digitalWrite(4, LOW)\n");

    let translation = translate(&loader, "import drivers.motor\n\ndef loop():\n    stop()\n").unwrap();

    assert_eq!(translation.auxiliary[0].file_name(), "drivers_motor.hpp");
    assert!(translation.primary.code().starts_with("#include \"drivers_motor.hpp\""));
    assert!(translation.warnings.is_empty());
}

#[test]
fn cyclic_imports_fail() {
    let mut loader = MemoryLoader::default();
    loader
        .insert("a", "import b\n")
        .insert("b", "import a\n");

    match translate(&loader, "import a\n") {
        Err(Error::Translate(error)) => {
            assert_eq!(error.location().source().name(), "b.py");
            match error.into_inner() {
                TranslateError::CyclicImport(chain) => assert_eq!(chain, "a -> b -> a"),
                other => panic!("unexpected error: {:?}", other),
            }
        }

        other => panic!("expected a cyclic import, got {:?}", other.map(|t| t.primary)),
    }

    let mut loader = MemoryLoader::default();
    loader.insert("main", "x = 1\n");
    assert!(matches!(
        translate(&loader, "import main\n"),
        Err(Error::Translate(error)) if matches!(error.val(), TranslateError::CyclicImport(_))
    ));
}

#[test]
fn missing_modules_fail() {
    let loader = MemoryLoader::default();
    match translate(&loader, "x = 1\nimport servo\n") {
        Err(Error::Translate(error)) => {
            assert_eq!(error.location().line(), 2);
            assert!(matches!(
                error.val(),
                TranslateError::ModuleNotFound { module, .. } if module == "servo"
            ));
        }

        other => panic!("expected a missing module, got {:?}", other.map(|t| t.primary)),
    }

    // Sin cargador, toda importación falla
    let result = ardpy::translate("main", "import utils\n");
    assert!(matches!(
        result,
        Err(Error::Translate(error)) if matches!(error.val(), TranslateError::ModuleNotFound { .. })
    ));
}

#[test]
fn errors_inside_imports_keep_their_location() {
    let mut loader = MemoryLoader::default();
    loader.insert("broken", "x = 1\ny = missing\n");

    match translate(&loader, "import broken\n") {
        Err(Error::Translate(error)) => {
            assert_eq!(error.location().source().name(), "broken.py");
            assert_eq!(error.location().line(), 2);
        }

        other => panic!("expected an error, got {:?}", other.map(|t| t.primary)),
    }
}
