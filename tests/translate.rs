use ardpy::{
    manifest, types::Type, Error, Options, TranslateError, Translation, Translator, Warning, BANNER,
};
use indoc::indoc;
use pretty_assertions::assert_eq;

fn translate_with(options: Options, text: &str) -> Result<Translation, Error> {
    Translator::new(manifest::arduino())
        .with_options(options)
        .translate("sketch", text)
}

/// Unidad principal sin encabezado ni prototipos.
fn code(text: &str) -> String {
    translate_with(Options::empty(), text)
        .unwrap()
        .primary
        .code()
        .to_owned()
}

fn translate_error(text: &str) -> TranslateError {
    match translate_with(Options::empty(), text) {
        Err(Error::Translate(error)) => error.into_inner(),
        Err(other) => panic!("expected a translation error, got {:?}", other),
        Ok(translation) => panic!("expected an error, got:\n{}", translation.primary.code()),
    }
}

#[test]
fn annotated_function_and_call() {
    let code = code(indoc! {"
        def calc(x: int) -> int:
            return x * 2

        calc(5)
    "});

    assert_eq!(
        code,
        indoc! {"
            int calc(int x) {
                return x * 2;
            }

            calc(5);
        "}
    );
}

#[test]
fn globals_are_declared_once() {
    let code = code(indoc! {"
        led = 13

        def setup():
            pinMode(led, OUTPUT)
    "});

    assert_eq!(
        code,
        indoc! {"
            int led = 13;

            void setup() {
                pinMode(led, OUTPUT);
            }
        "}
    );

    assert_eq!(code.matches("int led").count(), 1);
}

#[test]
fn global_initializers_follow_prototypes() {
    let translation = translate_with(Options::PROTOTYPES, indoc! {"
        def calc(x: int) -> int:
            return x * 2

        y = calc(5)
    "})
    .unwrap();

    let code = translation.primary.code();
    assert_eq!(
        code,
        indoc! {"
            int calc(int x);

            int y = calc(5);

            int calc(int x) {
                return x * 2;
            }
        "}
    );

    assert_eq!(code.matches("int y").count(), 1);
}

#[test]
fn infinite_loop() {
    let code = code(indoc! {"
        def loop():
            while True:
                continue
    "});

    assert_eq!(
        code,
        indoc! {"
            void loop() {
                while (true) {
                    continue;
                }
            }
        "}
    );

    assert!(!code.contains("else"));
}

#[test]
fn elif_chains_are_flat() {
    let code = code(indoc! {"
        x = 3

        def loop():
            if x == 1:
                pass
            elif x == 2:
                delay(2)
            elif x == 3:
                delay(3)
            else:
                delay(4)
    "});

    let trimmed: Vec<&str> = code.lines().map(str::trim).collect();
    assert_eq!(trimmed.iter().filter(|line| line.starts_with("if (")).count(), 1);
    assert_eq!(code.matches("} else if (").count(), 2);
    assert_eq!(code.matches("} else {").count(), 1);
    assert!(code.contains("    } else if (x == 3) {\n        delay(3);\n"));
}

#[test]
fn else_with_nested_block_is_kept() {
    let code = code(indoc! {"
        def loop():
            if millis() > 10:
                delay(1)
            else:
                delay(2)
                if millis() > 20:
                    delay(3)
    "});

    assert!(code.contains("    } else {\n        delay(2);\n        if (millis() > 20) {\n"));
    assert!(!code.contains("else if"));
}

#[test]
fn boolean_chains_are_flat() {
    let code = code(indoc! {"
        a = True
        b = False
        c = True

        def loop():
            if a and b and c:
                pass

            if (a or b) or c:
                pass

            if a or b and not c:
                pass
    "});

    assert!(code.contains("if (a && b && c) {"));
    assert!(code.contains("if (a || b || c) {"));
    assert!(code.contains("if (a || b && !c) {"));
    assert!(code.contains("boolean a = true;"));
    assert!(code.contains("boolean b = false;"));
}

#[test]
fn division_is_float() {
    let code = code(indoc! {"
        def setup():
            a = 4
            b = 2
            ratio = a / b
            half = a // b
    "});

    assert_eq!(
        code,
        indoc! {"
            void setup() {
                int a;
                int b;
                int half;
                float ratio;
                a = 4;
                b = 2;
                ratio = a / b;
                half = int(a / b);
            }
        "}
    );
}

#[test]
fn return_types_are_inferred() {
    let code = code(indoc! {"
        def setup():
            y = twice(3)

        def twice(x: int):
            return 2 * x
            return 2

        def half(x: float):
            return x / 2

        def loop():
            h = half(3.0)
    "});

    assert!(code.contains("int twice(int x) {"));
    assert!(code.contains("void setup() {\n    int y;\n"));
    assert!(code.contains("float half(float x) {"));
    assert!(code.contains("void loop() {\n    float h;\n"));
}

#[test]
fn annotations_win_over_returns() {
    let code = code(indoc! {"
        def scale(x: int) -> float:
            return x

        def nothing() -> None:
            return
    "});

    assert!(code.contains("float scale(int x) {\n    return x;\n}"));
    assert!(code.contains("void nothing() {\n    return;\n}"));
}

#[test]
fn calls_before_definitions_warn() {
    let translation = translate_with(Options::default(), indoc! {"
        def setup():
            blink()
            blink()

        def blink():
            digitalWrite(LED_BUILTIN, HIGH)

        def loop():
            blink()
    "})
    .unwrap();

    let warnings: Vec<_> = translation
        .warnings
        .iter()
        .map(|warning| (warning.location().line(), warning.val().to_string()))
        .collect();

    let expected = Warning::UndeclaredFunction("blink".to_owned()).to_string();
    assert_eq!(warnings, vec![(2, expected.clone()), (3, expected)]);

    let code = translation.primary.code();
    assert!(code.contains("\nvoid blink();\n"));
    assert!(!code.contains("void setup();"));
    assert!(!code.contains("void loop();"));
}

#[test]
fn translation_is_deterministic() {
    let text = include_str!("fixtures/remote.py");

    let first = ardpy::translate("remote", text).unwrap();
    let second = ardpy::translate("remote", text).unwrap();
    assert_eq!(first.primary, second.primary);
}

#[test]
fn banner_and_prototypes() {
    let text = indoc! {"
        def setup():
            calc(1)

        def calc(x: int) -> int:
            return x + 1
    "};

    let full = translate_with(Options::default(), text).unwrap();
    let full = full.primary.code();
    assert!(full.starts_with(BANNER));
    assert!(full.contains("\nint calc(int x);\n"));

    let bare = code(text);
    assert!(!bare.contains("Auto-generated"));
    assert!(!bare.contains("int calc(int x);"));

    let prototypes = translate_with(Options::PROTOTYPES, text).unwrap();
    assert!(prototypes.primary.code().starts_with("int calc(int x);\n\nvoid setup() {"));
}

#[test]
fn docstrings_become_comments() {
    let code = code(indoc! {r#"
        """
        Blink
          Turns an LED on and off.
        """

        def setup():
            """Runs once."""
            pinMode(LED_BUILTIN, OUTPUT)
    "#});

    assert!(code.starts_with("// Blink\n//   Turns an LED on and off.\n"));
    assert!(code.contains("void setup() {\n    // Runs once.\n    pinMode(LED_BUILTIN, OUTPUT);\n}"));
}

#[test]
fn containers() {
    let code = code(indoc! {"
        pins = [2, 3, 4]

        def setup():
            levels = (1.5, 2.5)
            pinMode(pins[0], OUTPUT)
            pins[1] = 5
    "});

    assert_eq!(
        code,
        indoc! {"
            int pins[3] = {2, 3, 4};

            void setup() {
                float levels[2];
                levels[0] = 1.5;
                levels[1] = 2.5;
                pinMode(pins[0], OUTPUT);
                pins[1] = 5;
            }
        "}
    );
}

#[test]
fn scalar_types() {
    let code = code(indoc! {"
        greeting = 'hello'
        initial = 'h'
        ratio = 0.5
        ready = False
        started = millis()
    "});

    assert_eq!(
        code,
        indoc! {r#"
            const char* greeting = "hello";
            char initial = 'h';
            float ratio = 0.5;
            boolean ready = false;
            unsigned long started = millis();
        "#}
    );
}

#[test]
fn file_scope_reassignment() {
    let code = code(indoc! {"
        x = 1
        x = 2
    "});

    assert_eq!(code, "int x = 1;\n\nx = 2;\n");
}

#[test]
fn augmented_assignment() {
    let code = code(indoc! {"
        def loop():
            total = 0
            total += 0.5
            total //= 2
            total **= 2
            count = 0
            count <<= 1
    "});

    assert_eq!(
        code,
        indoc! {"
            void loop() {
                float total;
                int count;
                total = 0;
                total += 0.5;
                total = int(total / 2);
                total = pow(total, 2);
                count = 0;
                count <<= 1;
            }
        "}
    );
}

#[test]
fn numeric_reassignment_widens() {
    let code = code(indoc! {"
        level = 1

        def loop():
            global level
            level = 2.5
            t = millis()
            t = 0
    "});

    assert_eq!(
        code,
        indoc! {"
            float level = 1;

            void loop() {
                unsigned long t;
                level = 2.5;
                t = millis();
                t = 0;
            }
        "}
    );
}

#[test]
fn reassignment_cannot_change_kind() {
    let error = translate_error("x = 1\nx = 'hi'\n");
    assert!(matches!(
        error,
        TranslateError::TypeMismatch { name, expected: Type::Int, found: Type::Str } if name == "x"
    ));

    let error = translate_error(indoc! {"
        def loop():
            s = 'a'
            s = 'bc'
    "});

    assert!(matches!(
        error,
        TranslateError::TypeMismatch { name, expected: Type::Char, found: Type::Str } if name == "s"
    ));

    let error = translate_error("xs = [1, 2]\nxs = [1, 2, 3]\n");
    assert!(matches!(error, TranslateError::TypeMismatch { .. }));

    let error = translate_error("ready = False\nready = 1\n");
    assert!(matches!(error, TranslateError::TypeMismatch { .. }));
}

#[test]
fn parameters_keep_their_type() {
    let translation = translate_with(Options::empty(), indoc! {"
        def scale(x: int) -> int:
            x += 1.5
            x = x / 2
            return x
    "})
    .unwrap();

    assert_eq!(
        translation.primary.code(),
        indoc! {"
            int scale(int x) {
                x += 1.5;
                x = x / 2;
                return x;
            }
        "}
    );

    let warnings: Vec<_> = translation
        .warnings
        .iter()
        .map(|warning| (warning.location().line(), warning.val().to_string()))
        .collect();

    let expected = Warning::Truncation {
        name: "x".to_owned(),
        declared: Type::Int,
    }
    .to_string();

    assert_eq!(warnings, vec![(2, expected.clone()), (3, expected)]);
}

#[test]
fn global_pass_through() {
    let code = code(include_str!("fixtures/fade.py"));

    assert!(code.contains("int led;\nint brightness;\nint fadeAmount;\n"));
    assert!(code.contains("    brightness = brightness + fadeAmount;\n"));
    assert!(code.contains("    if (brightness == 0 || brightness == 255) {\n        fadeAmount = -fadeAmount;\n"));
    assert!(!code.contains("    int "));
}

#[test]
fn local_shadows_global() {
    let code = code(indoc! {"
        led = 13

        def setup():
            led = 12
    "});

    assert!(code.contains("int led = 13;"));
    assert!(code.contains("void setup() {\n    int led;\n    led = 12;\n}"));
}

#[test]
fn while_else_runs_after_the_loop() {
    let code = code(indoc! {"
        def loop():
            while Serial.available() > 0:
                Serial.read()
                if Serial.peek() == 10:
                    break
            else:
                delay(10)
    "});

    assert_eq!(
        code,
        indoc! {"
            void loop() {
                while (Serial.available() > 0) {
                    Serial.read();
                    if (Serial.peek() == 10) {
                        break;
                    }
                }
                delay(10);
            }
        "}
    );
}

#[test]
fn operator_precedence() {
    let code = code(indoc! {"
        x = (1 + 2) * 3
        y = 1 - (2 - 3)
        z = (x & 1) == 0
        w = -(-3)
        p = 2 ** 3
        n = not (z and x > 1)
        m = x % 2 is not 0
    "});

    assert_eq!(
        code,
        indoc! {"
            int x = (1 + 2) * 3;
            int y = 1 - (2 - 3);
            boolean z = (x & 1) == 0;
            int w = -(-3);
            float p = pow(2, 3);
            boolean n = !(z && x > 1);
            boolean m = x % 2 != 0;
        "}
    );
}

#[test]
fn undeclared_variable() {
    let error = translate_error("x = y + 1\n");
    assert!(matches!(error, TranslateError::UndeclaredVariable(name) if name == "y"));

    let error = translate_error(indoc! {"
        def loop():
            count += 1
    "});

    assert!(matches!(error, TranslateError::UndeclaredVariable(name) if name == "count"));

    let error = translate_error(indoc! {"
        def setup():
            pinMode(ledd, OUTPUT)
    "});

    assert!(matches!(error, TranslateError::UndeclaredVariable(name) if name == "ledd"));

    let error = translate_error("def loop():\n    if ready:\n        pass\n");
    assert!(matches!(error, TranslateError::UndeclaredVariable(name) if name == "ready"));

    let error = translate_error("def loop():\n    delay(Serial.timeout)\n");
    assert!(matches!(error, TranslateError::UndeclaredVariable(name) if name == "Serial.timeout"));
}

#[test]
fn functions_are_valid_names() {
    let code = code(indoc! {"
        def blink():
            pass

        def setup():
            attachInterrupt(digitalPinToInterrupt(2), blink, RISING)
    "});

    assert!(code.contains("    attachInterrupt(digitalPinToInterrupt(2), blink, RISING);\n"));
}

#[test]
fn unresolved_calls_inside_operands() {
    let error = translate_error("x = mystery()\n");
    assert!(matches!(error, TranslateError::UnresolvedCall(name) if name == "mystery"));

    let error = translate_error("x = mystery() + 1\n");
    assert!(matches!(error, TranslateError::UnresolvedCall(name) if name == "mystery"));
}

#[test]
fn container_errors() {
    let error = translate_error("xs = [1, 2.5]\n");
    assert!(matches!(error, TranslateError::ContainerType(_)));

    let error = translate_error("xs = []\n");
    assert!(matches!(error, TranslateError::ContainerType(_)));

    let error = translate_error("delay([1, 2])\n");
    assert!(matches!(error, TranslateError::UnsupportedSyntax(_)));
}

#[test]
fn unsupported_syntax() {
    let cases = [
        "def loop():\n    if 1 < 2 < 3:\n        pass\n",
        "def loop():\n    for x in y:\n        pass\n",
        "def loop():\n    break\n",
        "return 1\n",
        "a = b = 1\n",
        "a, b = 1, 2\n",
        "x = None\n",
        "def outer():\n    def inner():\n        pass\n",
        "def loop():\n    import utils\n",
        "ok = 1 in 2\n",
    ];

    for case in cases.iter() {
        let error = translate_error(case);
        assert!(
            matches!(error, TranslateError::UnsupportedSyntax(_)),
            "{:?} gave {:?}",
            case,
            error
        );
    }
}

#[test]
fn errors_carry_lines() {
    let result = translate_with(Options::empty(), "x = 1\n\ndef loop():\n    if 1 < 2 < 3:\n        pass\n");
    match result {
        Err(Error::Translate(error)) => assert_eq!(error.location().line(), 4),
        other => panic!("unexpected result: {:?}", other.map(|translation| translation.primary)),
    }
}

#[test]
fn unknown_annotation() {
    let error = translate_error("def f(x: list):\n    pass\n");
    assert!(matches!(error, TranslateError::UnknownType(name) if name == "list"));
}

#[test]
fn front_end_errors() {
    let lex = translate_with(Options::empty(), "x = 1 $ 2\ny = 3 ?\n");
    match lex {
        Err(Error::Lex(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected lexer errors, got {:?}", other.map(|t| t.primary)),
    }

    let parse = translate_with(Options::empty(), "def f(x):\n    pass\n");
    assert!(matches!(parse, Err(Error::Parse(_))));
}
