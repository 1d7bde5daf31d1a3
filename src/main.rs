//! Punto de entrada ("driver").
//!
//! Este módulo lee un sketch, lo traduce y escribe las unidades
//! resultantes. Expone una CLI.

use anyhow::{self, bail, Context};
use clap::{self, crate_version, Arg, Command};
use ardpy::{
    error::Diagnostics,
    import::FsLoader,
    manifest::{self, Manifest},
    Options, Translation, Translator,
};

use std::{
    fs,
    io::{self, Write},
    path::Path,
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("ardpy")
        .version(crate_version!())
        .about("Translates annotated Python-style sketches into Arduino C++")
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("FILE")
                .help("Sketch to translate"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("DIR")
                .default_value(".")
                .help("Output directory ('-' for stdout, only without imports)"),
        )
        .arg(
            Arg::new("manifest")
                .short('m')
                .long("manifest")
                .takes_value(true)
                .value_name("MANIFEST")
                .help("Platform capability manifest, replaces the built-in Arduino one"),
        )
        .arg(Arg::new("quiet").short('w').help("Suppress warnings"))
        .arg(
            Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Increase log verbosity"),
        )
        .arg(
            Arg::new("no-banner")
                .long("no-banner")
                .help("Omit the provenance banner"),
        )
        .arg(
            Arg::new("no-prototypes")
                .long("no-prototypes")
                .help("Omit function prototypes"),
        )
        .get_matches();

    let level = match args.occurrences_of("verbose") {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Se extraen argumentos necesarios
    let input = args.value_of("input").context("No input file given")?;
    let output = args.value_of("output").unwrap_or(".");

    let mut options = Options::default();
    if args.is_present("no-banner") {
        options.remove(Options::BANNER);
    }

    if args.is_present("no-prototypes") {
        options.remove(Options::PROTOTYPES);
    }

    let custom;
    let manifest = match args.value_of("manifest") {
        Some(path) => {
            custom = Manifest::load(Path::new(path))
                .with_context(|| format!("Failed to load manifest: {}", path))?;

            &custom
        }

        None => manifest::arduino(),
    };

    let path = Path::new(input);
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read sketch: {}", input))?;

    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("Invalid sketch file name: {}", input))?;

    // Las importaciones se resuelven junto al sketch
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let loader = FsLoader::new(root);
    let translator = Translator::new(manifest)
        .with_loader(&loader)
        .with_options(options);

    let Translation {
        primary,
        auxiliary,
        warnings,
    } = match translator.translate(name, &text) {
        Ok(translation) => translation,
        Err(error) => {
            eprint!("{}", Diagnostics::from(error));
            bail!("Failed to translate {}", input);
        }
    };

    if !warnings.is_empty() && !args.is_present("quiet") {
        eprint!("{}", Diagnostics::warnings(warnings));
    }

    match output {
        // Salida a stdout
        "-" => {
            if !auxiliary.is_empty() {
                bail!(
                    "Refusing to write {} auxiliary unit(s) to stdout, use an output directory",
                    auxiliary.len()
                );
            }

            io::stdout()
                .write_all(primary.code().as_bytes())
                .context("Failed to write to stdout")?;
        }

        // Salida a directorio
        directory => {
            let directory = Path::new(directory);
            fs::create_dir_all(directory)
                .with_context(|| format!("Failed to create directory: {}", directory.display()))?;

            for unit in std::iter::once(&primary).chain(&auxiliary) {
                let path = directory.join(unit.file_name());
                fs::write(&path, unit.code())
                    .with_context(|| format!("Failed to write unit: {}", path.display()))?;

                log::info!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}
