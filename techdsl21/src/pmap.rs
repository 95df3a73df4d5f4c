//!
//! # Pixel-Map and Fill Text
//!
//! Fill patterns are written in one of three encodings:
//!
//! * `|...|` masks, one per row, with `.` or space for clear pixels and anything else for set ones
//! * hex rows, each `0x`-prefixed or at least two digits, four pixels per digit, leftmost pixel in the high bit
//! * `x=W y=H` followed by `H` hex rows, each truncated to `W` pixels
//!
//! Encodings may not be mixed within one map, and rows must agree in length.
//! Fill specifications ([get_filled]) add the single-letter option suffixes
//! `O` (outline), `F` (fat outline), `C` (cut) and `N` (no outline), in any case.
//!

// Workspace
use techdb21::{Fill, Outline, Pixmap, TechError, TechResult};

/// Pixel-map text tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tok<'a> {
    Mask(&'a str),
    Word(&'a str),
}

/// Split `text` into masks and whitespace-separated words
fn scan(text: &str) -> Result<Vec<Tok>, String> {
    let mut toks = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('|') {
            let end = after
                .find('|')
                .ok_or_else(|| format!("Unterminated mask row `|{}`", after))?;
            toks.push(Tok::Mask(&after[..end]));
            rest = after[end + 1..].trim_start();
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            toks.push(Tok::Word(&rest[..end]));
            rest = rest[end..].trim_start();
        }
    }
    Ok(toks)
}

/// Digits of a hex row, if `word` is one
fn hex_row(word: &str) -> Option<&str> {
    let digits = match word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        Some(d) => d,
        None if word.len() >= 2 => word,
        None => return None,
    };
    let is_hex = !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit());
    is_hex.then(|| digits)
}

/// Value of `axis=N` token `word`, if it is one
fn dim<'a>(word: &'a str, axis: &str) -> Option<&'a str> {
    let (key, val) = word.split_once('=')?;
    key.eq_ignore_ascii_case(axis).then(|| val)
}

fn hex_bits(digits: &str) -> Vec<bool> {
    digits
        .chars()
        .filter_map(|c| c.to_digit(16))
        .flat_map(|d| (0..4).rev().map(move |bit| d & (1 << bit) != 0))
        .collect()
}

fn mask_bits(mask: &str) -> Vec<bool> {
    mask.chars().map(|c| c != '.' && c != ' ').collect()
}

fn mixed() -> String {
    String::from("Pixel-map encodings may not be mixed")
}

/// Whether `tok` begins a pixel-map encoding
fn is_geometry(tok: &Tok) -> bool {
    match tok {
        Tok::Mask(_) => true,
        Tok::Word(w) => hex_row(w).is_some() || dim(w, "x").is_some() || dim(w, "y").is_some(),
    }
}

/// Parse a pixel map from the start of `text`, returning it and the trailing words
fn parse_pmap(text: &str) -> Result<(Pixmap, Vec<&str>), String> {
    let toks = scan(text)?;
    let mut rows: Vec<Vec<bool>> = Vec::new();
    let mut pos = 0;
    match toks.as_slice() {
        [Tok::Word(x), Tok::Word(y), ..] if dim(x, "x").is_some() && dim(y, "y").is_some() => {
            let parse = |v: Option<&str>| v.and_then(|v| v.parse::<usize>().ok());
            let (width, height) = match (parse(dim(x, "x")), parse(dim(y, "y"))) {
                (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
                _ => return Err(format!("Invalid pixel-map size `{} {}`", x, y)),
            };
            pos = 2;
            for _ in 0..height {
                let digits = match toks.get(pos) {
                    Some(Tok::Word(w)) => w
                        .strip_prefix("0x")
                        .or_else(|| w.strip_prefix("0X"))
                        .unwrap_or(*w),
                    Some(Tok::Mask(_)) => return Err(mixed()),
                    None => return Err(format!("Pixel map needs {} rows", height)),
                };
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(format!("Invalid hex row `{}`", digits));
                }
                let mut bits = hex_bits(digits);
                if bits.len() < width {
                    return Err(format!("Hex row `{}` is narrower than {}", digits, width));
                }
                bits.truncate(width);
                rows.push(bits);
                pos += 1;
            }
        }
        [Tok::Mask(_), ..] => {
            while let Some(Tok::Mask(m)) = toks.get(pos) {
                rows.push(mask_bits(m));
                pos += 1;
            }
        }
        [Tok::Word(w), ..] if hex_row(w).is_some() => {
            while let Some(digits) = toks.get(pos).and_then(|t| match t {
                Tok::Word(w) => hex_row(w),
                Tok::Mask(_) => None,
            }) {
                rows.push(hex_bits(digits));
                pos += 1;
            }
        }
        _ => return Err(format!("Expected a pixel map, got `{}`", text.trim())),
    }
    let mut rest = Vec::new();
    for tok in toks[pos..].iter() {
        match tok {
            t if is_geometry(t) => return Err(mixed()),
            Tok::Word(w) => rest.push(*w),
            Tok::Mask(_) => return Err(mixed()),
        }
    }
    if rows.iter().any(|r| r.len() != rows[0].len()) {
        return Err("Pixel-map rows differ in length".into());
    }
    let map = Pixmap::from_rows(&rows).map_err(|e| e.to_string())?;
    Ok((map, rest))
}

/// Parse pixel-map text `text`, which must hold nothing else
pub fn get_pmap(text: &str) -> TechResult<Pixmap> {
    let (map, rest) = parse_pmap(text).map_err(TechError::Str)?;
    match rest.first() {
        None => Ok(map),
        Some(w) => TechError::fail(format!("Unexpected `{}` after pixel map", w)),
    }
}

/// Parse a fill specification: `y`, `n` or a pixel map, then option letters.
///
/// `y` is a solid fill without outline; `n` is unfilled, outlined unless `N` is given;
/// a pixel map fills with that pattern.
pub fn get_filled(text: &str) -> TechResult<Fill> {
    let text = text.trim();
    let (first, tail) = match text.split_once(char::is_whitespace) {
        Some((first, tail)) => (first, tail),
        None => (text, ""),
    };
    let (mut fill, opts) = match first.to_ascii_lowercase().as_str() {
        "" => return TechError::fail("Missing fill specification"),
        "y" | "yes" | "t" | "true" => (Fill::solid(), tail.split_whitespace().collect()),
        "n" | "no" | "nil" | "false" => {
            let fill = Fill {
                outline: Outline::Plain,
                ..Default::default()
            };
            (fill, tail.split_whitespace().collect())
        }
        _ => {
            let (map, rest) = parse_pmap(text).map_err(TechError::Str)?;
            (Fill::stippled(map), rest)
        }
    };
    for opt in opts {
        match opt.to_ascii_uppercase().as_str() {
            "O" => fill.outline = Outline::Plain,
            "F" => fill.outline = Outline::Fat,
            "C" => fill.cut = true,
            "N" => fill.outline = Outline::Off,
            _ => return TechError::fail(format!("Unknown fill option `{}`", opt)),
        }
    }
    Ok(fill)
}
