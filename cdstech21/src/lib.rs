//!
//! # Cdstech21
//!
//! Readers for the Cadence technology dialects, built as handler sets over [sexp21]:
//!
//! * [tech], the ASCII technology file
//! * [drf], the display-resource file
//! * [cdb], the legacy CDB-era technology file
//!
//! and the inverse path, [write], producing technology, display-resource and
//! GDS layer-map files from a [TechDb]. Layer maps are also read by [layermap].
//!
//! Readers are lenient: malformed forms are logged to the database's diagnostics and skipped.
//! Only I/O failures and syntax errors abort a read.
//!

// Std-Lib
use std::path::{Path, PathBuf};

// Crates.io
use derive_builder::Builder;

// Workspace
pub use techdb21::{TechDb, TechError, TechResult};

pub mod cdb;
pub mod drf;
pub mod layermap;
pub mod session;
pub mod tech;
pub mod write;

pub use layermap::{read_layer_map, read_layer_map_str};
pub use write::{output_path, write, write_all, OutputFormat};

/// Default display-device name selected from display-resource files
pub const DEFAULT_DISPLAY: &str = "display";

/// # Reader Options
#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned", setter(into))]
pub struct ReadOptions {
    /// Report unknown forms as warnings, rather than debug logs
    #[builder(default)]
    pub verbose: bool,
    /// Abort on the first malformed form
    #[builder(default)]
    pub stop_on_error: bool,
    /// Display-device whose resources are applied
    #[builder(default = "DEFAULT_DISPLAY.into()")]
    pub display: String,
    /// Directories searched by `include`
    #[builder(default)]
    pub search_path: Vec<PathBuf>,
}
impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            stop_on_error: false,
            display: DEFAULT_DISPLAY.into(),
            search_path: Vec::new(),
        }
    }
}

/// Read Cadence ASCII technology file `path` into `db`
pub fn read_tech(db: &mut TechDb, path: impl AsRef<Path>, opts: &ReadOptions) -> TechResult<()> {
    tech::read(db, session::Source::File(path.as_ref()), opts)
}
/// Read Cadence ASCII technology content from string `src` into `db`
pub fn read_tech_str(db: &mut TechDb, src: &str, opts: &ReadOptions) -> TechResult<()> {
    tech::read(db, session::Source::Text(src), opts)
}
/// Read Cadence display-resource file `path` into `db`
pub fn read_drf(db: &mut TechDb, path: impl AsRef<Path>, opts: &ReadOptions) -> TechResult<()> {
    drf::read(db, session::Source::File(path.as_ref()), opts)
}
/// Read Cadence display-resource content from string `src` into `db`
pub fn read_drf_str(db: &mut TechDb, src: &str, opts: &ReadOptions) -> TechResult<()> {
    drf::read(db, session::Source::Text(src), opts)
}
/// Read legacy CDB technology file `path` into `db`
pub fn read_cdb(db: &mut TechDb, path: impl AsRef<Path>, opts: &ReadOptions) -> TechResult<()> {
    cdb::read(db, session::Source::File(path.as_ref()), opts)
}
/// Read legacy CDB technology content from string `src` into `db`
pub fn read_cdb_str(db: &mut TechDb, src: &str, opts: &ReadOptions) -> TechResult<()> {
    cdb::read(db, session::Source::Text(src), opts)
}
