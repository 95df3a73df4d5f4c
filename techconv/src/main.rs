//! # techconv
//!
//! Technology-File Format Converter
//!
//! Reads any combination of keyword-language, legacy CDB, Cadence technology,
//! display-resource and layer-map files into one database,
//! then writes Cadence outputs and/or a YAML or JSON dump of it.
//!

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

use cdstech21::ReadOptionsBuilder;
use tech21utils::{EnumStr, SerializationFormat};
use techdb21::{DiagCategory, TechDb};
use techdsl21::DslOptionsBuilder;

// => The doc-comment on `ProgramOptions` here is displayed by the `clap`-generated help docs =>

/// Technology-File Format Converter
#[derive(Parser)]
struct ProgramOptions {
    /// Cadence ASCII Technology Input File
    #[clap(long, default_value = "")]
    tech: String,
    /// Cadence Display-Resource Input File
    #[clap(long, default_value = "")]
    drf: String,
    /// Legacy CDB Technology Input File
    #[clap(long, default_value = "")]
    cdb: String,
    /// Keyword-Language Technology Input File
    #[clap(long, default_value = "")]
    dsl: String,
    /// GDS Layer-Map Input File
    #[clap(long, default_value = "")]
    map: String,
    /// Output Basename, for `.txt`, `.drf` and `.gdsmap` files
    #[clap(short = 'o', long, default_value = "")]
    out: String,
    /// Database Dump File, JSON for `.json` paths and YAML otherwise
    #[clap(long, default_value = "")]
    yaml: String,
    /// Display Device Selected from Display-Resource Files
    #[clap(long, default_value = cdstech21::DEFAULT_DISPLAY)]
    display: String,
    /// Include Search Directory
    #[clap(short = 'I', long = "include")]
    include: Vec<PathBuf>,
    /// Abort on the first malformed entry
    #[clap(long)]
    stop_on_error: bool,
    /// Verbose Output Mode
    #[clap(short, long)]
    verbose: bool,
}

/// The main entry point.
/// All logic is offloaded to `_main` for sake of testing.
fn main() -> Result<(), Box<dyn Error>> {
    let options = ProgramOptions::parse();
    let level = match options.verbose {
        true => log::LevelFilter::Info,
        false => log::LevelFilter::Warn,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
    _main(&options)?;
    Ok(())
}

/// All the real logic, with `ProgramOptions` argument for sake of testing
fn _main(options: &ProgramOptions) -> Result<TechDb, Box<dyn Error>> {
    let inputs = [
        &options.dsl,
        &options.cdb,
        &options.tech,
        &options.drf,
        &options.map,
    ];
    if inputs.iter().all(|s| s.is_empty()) {
        return Err("No input files given".into());
    }
    let read_opts = ReadOptionsBuilder::default()
        .verbose(options.verbose)
        .stop_on_error(options.stop_on_error)
        .display(options.display.clone())
        .search_path(options.include.clone())
        .build()?;
    let dsl_opts = DslOptionsBuilder::default()
        .verbose(options.verbose)
        .stop_on_error(options.stop_on_error)
        .search_path(options.include.clone())
        .build()?;

    // Read everything into one database, keyword language first
    let mut db = TechDb::new();
    if !options.dsl.is_empty() {
        techdsl21::read_dsl(&mut db, &options.dsl, &dsl_opts)?;
    }
    if !options.cdb.is_empty() {
        cdstech21::read_cdb(&mut db, &options.cdb, &read_opts)?;
    }
    if !options.tech.is_empty() {
        cdstech21::read_tech(&mut db, &options.tech, &read_opts)?;
    }
    if !options.drf.is_empty() {
        cdstech21::read_drf(&mut db, &options.drf, &read_opts)?;
    }
    if !options.map.is_empty() {
        cdstech21::read_layer_map(&mut db, &options.map)?;
    }
    if let Some(report) = db.drain_deferred() {
        db.diag.warn(DiagCategory::Unresolved, report);
    }
    summarize(&db);

    if !options.out.is_empty() {
        cdstech21::write_all(&db, &options.out)?;
        if options.verbose {
            for format in cdstech21::OutputFormat::variants() {
                println!("wrote {:?}", cdstech21::output_path(&options.out, *format));
            }
        }
    }
    if !options.yaml.is_empty() {
        SerializationFormat::from_path(&options.yaml).save(&db, &options.yaml)?;
        if options.verbose {
            println!("wrote {:?}", &options.yaml);
        }
    }
    Ok(db)
}

/// Log database totals and per-category diagnostic counts
fn summarize(db: &TechDb) {
    log::info!(
        "{} layers, {} layer-purpose pairs, {} rules, {} spacing tables, {} vias",
        db.layers.layers().filter(|(_, l)| !l.reserved).count(),
        db.layers.lpps().count(),
        db.rules.rules().len(),
        db.rules.tables().len(),
        db.vias.std_vias().len() + db.vias.custom_vias().len(),
    );
    for category in DiagCategory::variants() {
        let count = db.diag.count(*category);
        if count > 0 {
            log::warn!("{} {} diagnostics", count, category);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdstech21::{OutputFormat, ReadOptions};
    use techdb21::{Rgb, DRAWING};

    /// Options reading nothing and writing nothing
    fn options() -> ProgramOptions {
        ProgramOptions {
            tech: String::new(),
            drf: String::new(),
            cdb: String::new(),
            dsl: String::new(),
            map: String::new(),
            out: String::new(),
            yaml: String::new(),
            display: cdstech21::DEFAULT_DISPLAY.into(),
            include: Vec::new(),
            stop_on_error: false,
            verbose: false,
        }
    }

    #[test]
    fn convert_demo() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("demo").display().to_string();
        let yaml = dir.path().join("demo.yaml").display().to_string();
        let options = ProgramOptions {
            dsl: resource("demo.tech"),
            drf: resource("demo.drf"),
            map: resource("demo.map"),
            out: out.clone(),
            yaml: yaml.clone(),
            verbose: true,
            ..options()
        };
        let db = _main(&options)?;
        assert!(db.diag.is_empty(), "{:?}", db.diag.entries());

        // Packets named in the keyword file resolve once the display resources are read
        let m1 = db.layers.find_lpp("M1", DRAWING).and_then(|k| db.layers.lpp(k)).unwrap();
        assert_eq!(m1.display.color, Some(Rgb::new(0, 0, 255)));
        assert_eq!(m1.attrs.gds, Some((31, 0)));

        // Read back the Cadence outputs
        let mut readback = TechDb::new();
        let opts = ReadOptions::default();
        cdstech21::read_tech(&mut readback, cdstech21::output_path(&out, OutputFormat::Tech), &opts)?;
        cdstech21::read_drf(&mut readback, cdstech21::output_path(&out, OutputFormat::Drf), &opts)?;
        cdstech21::read_layer_map(&mut readback, cdstech21::output_path(&out, OutputFormat::LayerMap))?;
        for name in ["M1", "M2"] {
            let orig = db.layers.find_lpp(name, DRAWING).and_then(|k| db.layers.lpp(k)).unwrap();
            let back = readback
                .layers
                .find_lpp(name, DRAWING)
                .and_then(|k| readback.layers.lpp(k))
                .unwrap();
            assert_eq!(back.display.color, orig.display.color);
            assert_eq!(back.display.fill, orig.display.fill);
            assert_eq!(back.attrs.gds, orig.attrs.gds);
        }
        assert_eq!(
            readback.rules.find_rule("minWidth", "M2", None).map(|r| r.value),
            db.rules.find_rule("minWidth", "M2", None).map(|r| r.value)
        );

        // And the dump
        let loaded = TechDb::load(&yaml)?;
        assert_eq!(loaded.layers.lpps().count(), db.layers.lpps().count());
        assert_eq!(loaded.layers.find_layer_num(13), loaded.layers.find_layer("M2"));
        Ok(())
    }

    #[test]
    fn requires_input() {
        assert!(_main(&options()).is_err());
    }

    #[test]
    fn missing_input() {
        let options = ProgramOptions {
            tech: resource("nonexistent.tf"),
            ..options()
        };
        assert!(_main(&options).is_err());
    }

    /// Grab the full path of resource-file `fname`
    fn resource(rname: &str) -> String {
        format!("{}/resources/{}", env!("CARGO_MANIFEST_DIR"), rname)
    }
}
