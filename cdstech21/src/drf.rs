//!
//! # Cadence Display-Resource (DRF) Grammar
//!
//! Colors, stipples, line styles and packets, for the display device selected by
//! [crate::ReadOptions::display]. Entries for other devices are skipped.
//! Packet references saved while reading technology files are resolved once the read completes.
//!

// Workspace
use sexp21::{Node, SexpResult, Value};
use techdb21::{fill_style, ColorDef, DiagCategory, LineStyle, Packet, Pixmap, Rgb, TechDb, TechResult};

// Local
use crate::session::{self, flag, for_entries, int, opt, stub, text, CdsEnv, CdsSession, Source};
use crate::ReadOptions;

/// Accepted and ignored
const STUBS: &[&str] = &[
    "drDefineColorAlias",
    "drDefineStippleAlias",
    "drDefineLineStyleAlias",
    "drDefineFont",
];

/// Read display resources from `src` into `db`, then resolve saved packet references
pub(crate) fn read(db: &mut TechDb, src: Source, opts: &ReadOptions) -> TechResult<()> {
    let rv = session::run(db, src, opts, register);
    if let Some(report) = db.drain_deferred() {
        db.diag.warn(DiagCategory::Unresolved, report);
        db.resolver.clear_unresolved();
    }
    rv
}

/// Register the display-resource handler set
pub fn register(env: &mut CdsEnv) {
    env.register_handler("drDefineDisplay", define_display);
    env.register_handler("drDefineColor", define_color);
    env.register_handler("drDefineStipple", define_stipple);
    env.register_handler("drDefineLineStyle", define_line_style);
    env.register_handler("drDefinePacket", define_packet);
    env.register_handler("drDefinePacketAlias", define_packet_alias);
    for name in STUBS {
        env.register_handler(*name, stub);
    }
}

/// Whether an entry's leading display name selects it
fn selected(s: &CdsSession, vals: &[Value]) -> Option<bool> {
    Some(text(&vals[0])? == s.opts.display)
}

/// A `0`/`1` bit list
fn bits(v: &Value) -> Option<Vec<bool>> {
    v.as_list()?
        .iter()
        .map(|b| match int(b)? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        })
        .collect()
}

/// `drDefineDisplay( (name) ... )`
fn define_display(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 1, "display", |s, _, vals| {
        let name = text(&vals[0])?;
        if !s.db.display.displays.contains(&name) {
            s.db.display.displays.push(name);
        }
        Some(())
    })
}

/// `drDefineColor( (display name red green blue [blink]) ... )`
fn define_color(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 5, "color", |s, _, vals| {
        let name = text(&vals[1])?;
        let channel = |v: &Value| u8::try_from(int(v)?).ok();
        let rgb = Rgb::new(channel(&vals[2])?, channel(&vals[3])?, channel(&vals[4])?);
        let blink = opt(vals.get(5), flag)?.unwrap_or(false);
        if selected(s, vals)? {
            s.db.display.add_color(name, ColorDef { rgb, blink });
        }
        Some(())
    })
}

/// `drDefineStipple( (display name ((bits...) (bits...) ...)) ... )`
fn define_stipple(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 3, "stipple", |s, pos, vals| {
        let name = text(&vals[1])?;
        let rows = vals[2]
            .as_list()?
            .iter()
            .map(bits)
            .collect::<Option<Vec<_>>>()?;
        let map = match Pixmap::from_rows(&rows) {
            Ok(map) => map,
            Err(e) => {
                let msg = format!("Stipple {}: {}", name, e);
                s.warn(pos, DiagCategory::Malformed, msg);
                return Some(());
            }
        };
        if selected(s, vals)? {
            s.db.display.add_stipple(name, map);
        }
        Some(())
    })
}

/// `drDefineLineStyle( (display name size (bits...)) ... )`
fn define_line_style(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 4, "line style", |s, _, vals| {
        let name = text(&vals[1])?;
        let size = u32::try_from(int(&vals[2])?).ok()?;
        let pattern = bits(&vals[3])?;
        if selected(s, vals)? {
            s.db.display.add_line_style(name, LineStyle { size, pattern });
        }
        Some(())
    })
}

/// `drDefinePacket( (display name stipple lineStyle fill outline [fillStyle]) ... )`
fn define_packet(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 6, "packet", |s, pos, vals| {
        let name = text(&vals[1])?;
        let stipple = text(&vals[2])?;
        let line_style = text(&vals[3])?;
        let fill = text(&vals[4])?;
        let outline = text(&vals[5])?;
        let style = opt(vals.get(6), text)?;
        let fill_style = match style.as_deref() {
            None => None,
            Some(txt) => match fill_style(txt) {
                Some(f) => Some(f),
                None => {
                    let msg = format!("Packet {}: unknown fill style `{}`", name, txt);
                    s.warn(pos, DiagCategory::Unsupported, msg);
                    None
                }
            },
        };
        if selected(s, vals)? {
            s.db.display.add_packet(Packet {
                name,
                stipple,
                line_style,
                fill,
                outline,
                fill_style,
            });
        }
        Some(())
    })
}

/// `drDefinePacketAlias( (display alias packet) ... )`
fn define_packet_alias(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 3, "packet alias", |s, _, vals| {
        let alias = text(&vals[1])?;
        let packet = text(&vals[2])?;
        if selected(s, vals)? {
            s.db.display.add_packet_alias(alias, packet);
        }
        Some(())
    })
}
