//!
//! # Database Dump Utilities
//!
//! Serde-based dumping and loading of technology data to and from JSON and YAML files.
//! These are debugging and interchange aids; the vendor text formats live in their own crates.
//!

// Standard Lib Imports
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

// Crates.io Imports
use serde::de::DeserializeOwned;
use serde::Serialize;
use textwrap::dedent;

/// # Supported Dump Formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationFormat {
    Json,
    Yaml,
}
impl SerializationFormat {
    /// Infer a format from the extension of `fname`. Anything other than `.json` is YAML.
    pub fn from_path(fname: impl AsRef<Path>) -> Self {
        match fname.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
    /// Convert any [serde::Serialize] data to a serialized string
    pub fn to_string(&self, data: &impl Serialize) -> Result<String, Error> {
        match *self {
            Self::Json => Ok(serde_json::to_string_pretty(data)?),
            Self::Yaml => Ok(serde_yaml::to_string(data)?),
        }
    }
    /// Parse string `s`. Leading indentation common to all lines is removed first,
    /// so that test sources can be written inline.
    pub fn from_str<T: DeserializeOwned>(&self, s: &str) -> Result<T, Error> {
        let s = dedent(s);
        match *self {
            Self::Json => Ok(serde_json::from_str(&s)?),
            Self::Yaml => Ok(serde_yaml::from_str(&s)?),
        }
    }
    /// Save `data` to file `fname`
    pub fn save(&self, data: &impl Serialize, fname: impl AsRef<Path>) -> Result<(), Error> {
        let mut file = BufWriter::new(std::fs::File::create(fname)?);
        let s = self.to_string(data)?;
        file.write_all(s.as_bytes())?;
        file.flush()?;
        Ok(())
    }
    /// Load from file at path `fname`
    pub fn open<T: DeserializeOwned>(&self, fname: impl AsRef<Path>) -> Result<T, Error> {
        let file = BufReader::new(std::fs::File::open(&fname)?);
        let rv: T = match *self {
            Self::Json => serde_json::from_reader(file)?,
            Self::Yaml => serde_yaml::from_reader(file)?,
        };
        Ok(rv)
    }
}

/// Serialization to & from file trait.
/// Fully default-implemented; implementers need only be serde-compatible.
pub trait SerdeFile: Serialize + DeserializeOwned {
    /// Save in `fmt`-format to file `fname`
    fn save(&self, fmt: SerializationFormat, fname: impl AsRef<Path>) -> Result<(), Error> {
        fmt.save(self, fname)
    }
    /// Open from `fmt`-format file `fname`
    fn open(fname: impl AsRef<Path>, fmt: SerializationFormat) -> Result<Self, Error> {
        fmt.open(fname)
    }
}

/// Wrapper over serialization and IO errors
#[derive(Debug)]
pub struct Error(Box<dyn std::error::Error + Send + Sync>);
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for Error {}
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self(Box::new(e))
    }
}
impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self(Box::new(e))
    }
}
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_path() {
        assert_eq!(SerializationFormat::from_path("db.json"), SerializationFormat::Json);
        assert_eq!(SerializationFormat::from_path("db.JSON"), SerializationFormat::Json);
        assert_eq!(SerializationFormat::from_path("db.yaml"), SerializationFormat::Yaml);
        assert_eq!(SerializationFormat::from_path("db"), SerializationFormat::Yaml);
    }
    #[test]
    fn dedented_yaml() -> Result<(), Error> {
        let v: Vec<i32> = SerializationFormat::Yaml.from_str(
            r#"
            - 1
            - 2
            "#,
        )?;
        assert_eq!(v, vec![1, 2]);
        Ok(())
    }
}
