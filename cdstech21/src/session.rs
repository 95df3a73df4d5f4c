//!
//! # Read Sessions
//!
//! State shared by the handlers of one read, plus the helpers they share
//! for evaluating arguments and reporting problems.
//!

// Std-Lib
use std::path::Path;
use std::rc::Rc;

// Workspace
use sexp21::{Environment, Node, SexpError, SexpResult, SourcePos, Value};
use techdb21::{
    DiagCategory, LayerKey, LppKey, PurposeKey, TechDb, TechDecimal, TechError, TechResult, XyPair,
    FOUNDRY,
};

// Local
use crate::ReadOptions;

/// Environment type shared by the Cadence grammars
pub type CdsEnv = Environment<CdsSession>;

/// Input to a read
pub enum Source<'a> {
    File(&'a Path),
    Text(&'a str),
}

/// # Cadence Read Session
/// Owns the database for the duration of a read.
#[derive(Debug)]
pub struct CdsSession {
    pub db: TechDb,
    pub opts: ReadOptions,
    /// Constraint group of the forms being read
    pub group: String,
}
impl CdsSession {
    /// Record a diagnostic at `pos`
    pub fn warn(&mut self, pos: &SourcePos, category: DiagCategory, msg: impl Into<String>) {
        self.db
            .diag
            .warn_at(category, pos.file.as_deref(), Some(pos.line), msg)
    }
    /// Report malformed `form`, including a dump of it
    pub fn malformed(&mut self, pos: &SourcePos, form: &Node, what: &str) {
        let msg = format!("Malformed {}, skipped:\n{}", what, form.pretty(100));
        self.warn(pos, DiagCategory::Malformed, msg)
    }
    /// Report a reference to an undefined `kind` named `name`
    pub fn unresolved(&mut self, pos: &SourcePos, kind: &str, name: &str) {
        let msg = format!("Unresolved {} `{}`", kind, name);
        self.warn(pos, DiagCategory::Unresolved, msg)
    }
    /// Find layer `name`, reporting it if undefined
    pub fn layer(&mut self, pos: &SourcePos, name: &str) -> Option<LayerKey> {
        let key = self.db.layers.find_layer(name);
        if key.is_none() {
            self.unresolved(pos, "layer", name);
        }
        key
    }
    /// Find purpose `name`, reporting it if undefined
    pub fn purpose(&mut self, pos: &SourcePos, name: &str) -> Option<PurposeKey> {
        let key = self.db.layers.find_purpose(name);
        if key.is_none() {
            self.unresolved(pos, "purpose", name);
        }
        key
    }
    /// Check that all of `names` are defined layers, reporting those that are not
    pub fn layers_defined(&mut self, pos: &SourcePos, names: &[&str]) -> bool {
        let mut ok = true;
        for name in names {
            ok &= self.layer(pos, name).is_some();
        }
        ok
    }
    /// Get or create the drawing lpp of layer `name`
    pub fn drawing_lpp(&mut self, pos: &SourcePos, name: &str) -> Option<LppKey> {
        let layer = self.layer(pos, name)?;
        let rv = self
            .db
            .layers
            .drawing()
            .and_then(|drawing| self.db.layers.add_lpp(layer, drawing));
        match rv {
            Ok(key) => Some(key),
            Err(e) => {
                self.warn(pos, DiagCategory::Internal, e.to_string());
                None
            }
        }
    }
}

/// Run a read of `src` into `db` with the handlers installed by `register`
pub(crate) fn run(
    db: &mut TechDb,
    src: Source,
    opts: &ReadOptions,
    register: fn(&mut CdsEnv),
) -> TechResult<()> {
    if let Source::File(path) = src {
        std::fs::metadata(path).map_err(|e| TechError::io(path, e))?;
    }
    let mut session = CdsSession {
        db: std::mem::take(db),
        opts: opts.clone(),
        group: FOUNDRY.into(),
    };
    let mut env = CdsEnv::new();
    env.verbose = opts.verbose;
    env.set_warn_sink(Rc::new(warn_sink));
    for dir in opts.search_path.iter() {
        env.add_search_path(dir.clone());
    }
    register(&mut env);
    let (rv, file) = match src {
        Source::File(path) => (
            env.read_eval_file(&mut session, path, opts.stop_on_error),
            Some(path.display().to_string()),
        ),
        Source::Text(text) => (
            env.read_eval(&mut session, text, &opts.search_path, opts.stop_on_error),
            None,
        ),
    };
    *db = session.db;
    rv.map_err(|e| tech_error(e, file))
}

/// Environment warnings: handler failures, and unknown forms in verbose mode
fn warn_sink(s: &mut CdsSession, pos: &SourcePos, msg: &str) {
    let category = if msg.starts_with("Unknown form") {
        DiagCategory::UnknownKeyword
    } else {
        DiagCategory::Malformed
    };
    s.warn(pos, category, msg)
}

/// Convert reader errors, keeping location for syntax errors
pub(crate) fn tech_error(e: SexpError, file: Option<String>) -> TechError {
    if e.is_syntax() {
        return TechError::Syntax {
            file,
            line: e.line(),
            msg: e.to_string(),
        };
    }
    match e {
        SexpError::Str(msg) | SexpError::Eval { msg, .. } => TechError::Str(msg),
        other => TechError::Boxed(Box::new(other)),
    }
}

/// Evaluate all arguments of `entry`.
/// Reports `entry` as malformed and returns `None` when fewer than `required` are present,
/// or when evaluating any of them fails. Only stopping on errors passes a failure along.
pub fn entry_args(
    env: &mut CdsEnv,
    s: &mut CdsSession,
    entry: &Node,
    required: usize,
    what: &str,
) -> SexpResult<Option<Vec<Value>>> {
    if !entry.is_list() {
        s.malformed(env.pos(), entry, what);
        return Ok(None);
    }
    let vals = match env.eval_list(s, entry, usize::MAX) {
        Ok(vals) => vals,
        Err(e) => {
            env.handle_error(s, e)?;
            return Ok(None);
        }
    };
    if vals.len() < required {
        s.malformed(env.pos(), entry, what);
        return Ok(None);
    }
    Ok(Some(vals))
}

/// Apply `each` to the evaluated arguments of every entry of `form`.
/// `each` validates before mutating anything, and returns `None` for malformed entries,
/// which are reported here. Entries with fewer than `required` arguments never reach `each`.
pub fn for_entries(
    env: &mut CdsEnv,
    s: &mut CdsSession,
    form: &Node,
    required: usize,
    what: &str,
    each: impl Fn(&mut CdsSession, &SourcePos, &[Value]) -> Option<()>,
) -> SexpResult<Value> {
    for entry in form.args() {
        let vals = match entry_args(env, s, entry, required, what)? {
            Some(vals) => vals,
            None => continue,
        };
        let pos = env.pos().clone();
        if each(s, &pos, &vals).is_none() {
            s.malformed(&pos, entry, what);
        }
    }
    Ok(Value::Nil)
}

/// Optional trailing argument: `Some(None)` when absent or nil.
/// Present arguments failing `conv` are malformed, returning `None`.
pub fn opt<T>(v: Option<&Value>, conv: impl Fn(&Value) -> Option<T>) -> Option<Option<T>> {
    match v {
        None | Some(Value::Nil) => Some(None),
        Some(v) => conv(v).map(Some),
    }
}

/// No-op handler for accepted but unsupported forms
pub fn stub(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    let name = form.name().unwrap_or("?");
    if s.opts.verbose {
        s.warn(
            env.pos(),
            DiagCategory::Unsupported,
            format!("`{}` is not supported, ignored", name),
        );
    } else {
        log::debug!("{}: ignoring unsupported `{}`", env.pos(), name);
    }
    Ok(Value::Nil)
}

/// Text of a string or symbol
pub fn text(v: &Value) -> Option<String> {
    v.as_str().map(String::from)
}
pub fn num(v: &Value) -> Option<TechDecimal> {
    v.as_number()
}
pub fn int(v: &Value) -> Option<i32> {
    v.as_int().and_then(|i| i32::try_from(i).ok())
}
/// Boolean of `t`/`nil`
pub fn flag(v: &Value) -> Option<bool> {
    v.as_bool()
}
/// Two-number list, e.g. an enclosure `(x y)`
pub fn pair(v: &Value) -> Option<XyPair> {
    match v.as_list()? {
        [x, y] => Some(XyPair::new(x.as_number()?, y.as_number()?)),
        _ => None,
    }
}
/// Strings of a list of names
pub fn names(v: &Value) -> Option<Vec<String>> {
    v.as_list()?.iter().map(text).collect()
}
