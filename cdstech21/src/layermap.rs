//!
//! # GDS Layer Maps
//!
//! Reads `layer purpose stream-layer stream-datatype` lines, with `#` comments,
//! assigning stream numbers to the named lpps. Writing lives with the other formats in [crate::write].
//!

// Std-Lib
use std::path::Path;

// Workspace
use techdb21::{DiagCategory, TechDb, TechError, TechResult};

/// Read layer-map file `path` into `db`
pub fn read_layer_map(db: &mut TechDb, path: impl AsRef<Path>) -> TechResult<()> {
    let path = path.as_ref();
    let src = std::fs::read_to_string(path).map_err(|e| TechError::io(path, e))?;
    let file = path.display().to_string();
    read_lines(db, &src, Some(&file));
    Ok(())
}

/// Read layer-map content `src` into `db`
pub fn read_layer_map_str(db: &mut TechDb, src: &str) -> TechResult<()> {
    read_lines(db, src, None);
    Ok(())
}

/// Apply each line, reporting malformed lines and unknown layers to the diagnostics
fn read_lines(db: &mut TechDb, src: &str, file: Option<&str>) {
    db.layers.seed_reserved_purposes();
    let mut mapped = 0;
    for (idx, raw) in src.lines().enumerate() {
        let line = idx + 1;
        let content = match raw.split_once('#') {
            Some((before, _)) => before,
            None => raw,
        };
        let fields: Vec<&str> = content.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let nums = match fields.as_slice() {
            [_, _, l, d] => l.parse::<i32>().ok().zip(d.parse::<i32>().ok()),
            _ => None,
        };
        let gds = match nums {
            Some(gds) => gds,
            None => {
                let msg = format!("Malformed layer-map line `{}`", raw.trim());
                db.diag.warn_at(DiagCategory::Malformed, file, Some(line), msg);
                continue;
            }
        };
        let (layer, purpose) = (fields[0], fields[1]);
        let key = match db.layers.add_lpp_named(layer, purpose) {
            Ok(key) => key,
            Err(_) => {
                let msg = format!("Unresolved layer-purpose `{} {}`", layer, purpose);
                db.diag.warn_at(DiagCategory::Unresolved, file, Some(line), msg);
                continue;
            }
        };
        if let Some(lpp) = db.layers.lpp_mut(key) {
            lpp.attrs.gds = Some(gds);
            mapped += 1;
        }
    }
    log::info!("Mapped {} layer-purpose pairs to stream numbers", mapped);
}
