//! Manifiesto de capacidades.
//!
//! Un manifiesto describe qué funciones y constantes ofrece la plataforma
//! objetivo, junto con sus tipos. Se lee una vez y luego es de solo lectura:
//! cada traducción recibe una referencia compartida y nunca lo modifica.
//!
//! El formato es TOML:
//!
//! ```toml
//! version = 1
//!
//! [functions]
//! millis = "unsigned long"
//! "Serial.begin" = "void"
//!
//! [constants]
//! HIGH = "int"
//! ```

use crate::types::Type;
use serde::Deserialize;
use std::{collections::BTreeMap, fs, io, path::Path};
use thiserror::Error;

/// Versión de formato que este traductor entiende.
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unsupported manifest version {0}, expected {}", MANIFEST_VERSION)]
    Version(u32),
}

/// Descripción de capacidades de una plataforma.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    version: u32,

    #[serde(default)]
    functions: BTreeMap<String, Type>,

    #[serde(default)]
    constants: BTreeMap<String, Type>,
}

lazy_static::lazy_static! {
    static ref ARDUINO: Manifest = Manifest::from_toml(include_str!("../manifest/arduino.toml"))
        .expect("built-in manifest is malformed");
}

/// Manifiesto integrado del núcleo de Arduino.
pub fn arduino() -> &'static Manifest {
    &ARDUINO
}

impl Manifest {
    pub fn from_toml(text: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(text)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ManifestError::Version(manifest.version));
        }

        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path)?;
        Manifest::from_toml(&text)
    }

    /// Tipo de retorno de una función o miembro estático (`Serial.read`).
    pub fn function(&self, name: &str) -> Option<&Type> {
        self.functions.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&Type> {
        self.constants.get(name)
    }

    /// Determina si un nombre es provisto por la plataforma, ya sea
    /// como función o como constante.
    pub fn provides(&self, name: &str) -> bool {
        self.functions.contains_key(name) || self.constants.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn builtin_manifest_is_valid() {
        let manifest = arduino();
        assert_eq!(manifest.function("millis"), Some(&Type::UnsignedLong));
        assert_eq!(manifest.function("Serial.available"), Some(&Type::Int));
        assert_eq!(manifest.constant("HIGH"), Some(&Type::Int));
        assert_eq!(manifest.constant("PI"), Some(&Type::Float));
        assert!(manifest.provides("pinMode"));
        assert!(!manifest.provides("calc"));
    }

    #[test]
    fn custom_manifest() {
        let manifest = Manifest::from_toml(indoc! {r#"
            version = 1

            [functions]
            "Wire.read" = "byte"
        "#})
        .unwrap();

        assert_eq!(manifest.function("Wire.read"), Some(&Type::Byte));
        assert_eq!(manifest.constant("HIGH"), None);
    }

    #[test]
    fn rejects_unknown_types_and_versions() {
        let bad_type = Manifest::from_toml("version = 1\n[constants]\nX = \"string\"\n");
        assert!(matches!(bad_type, Err(ManifestError::Parse(_))));

        let bad_version = Manifest::from_toml("version = 7\n");
        assert!(matches!(bad_version, Err(ManifestError::Version(7))));

        let unknown_table = Manifest::from_toml("version = 1\n[types]\n");
        assert!(matches!(unknown_table, Err(ManifestError::Parse(_))));
    }
}
