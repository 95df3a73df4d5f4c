//!
//! # Keyword-Language Reader
//!
//! [DslReader] drives the per-line pipeline and the layer-block state machine.
//! A layer block opens with a layer keyword and closes at the next one, or at the end of input.
//! Each closing block is validated, along with any application-supplied finalization check.
//!

// Std-Lib
use std::path::{Path, PathBuf};

// Crates.io
use tech21utils::EnumStr;

// Workspace
use techdb21::{DiagCategory, LppKey, TechDb, TechError, TechResult};

// Local
use crate::ext::{DrcKeywords, ScriptBlocks, StdViaKeywords};
use crate::layer::{self, BlockKey, LayerOpener, PreambleKey};
use crate::preproc::{Directive, DirectiveKind, Preproc};
use crate::{eval, DslOptions, LineStatus, TechVars};

/// Maximum `#include` nesting
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// # Keyword Dispatcher
///
/// Extension point for keywords beyond the preamble and layer blocks.
/// Dispatchers are tried in registration order; the first to return other than
/// [LineStatus::NoMatch] handles the line.
///
/// A dispatcher may also claim raw lines while it is [KeywordDispatch::capturing],
/// e.g. for the body of a multi-line block.
pub trait KeywordDispatch {
    /// Handle `keyword` with its (substituted) argument text
    fn dispatch(&mut self, s: &mut DslSession, keyword: &str, args: &str) -> LineStatus;
    /// Whether subsequent raw lines go to [KeywordDispatch::capture]
    fn capturing(&self) -> bool {
        false
    }
    fn capture(&mut self, _s: &mut DslSession, _line: &str) -> LineStatus {
        LineStatus::NoMatch
    }
    /// Called at the end of input
    fn finish(&mut self, _s: &mut DslSession) -> LineStatus {
        LineStatus::Matched
    }
}

/// Application-supplied check run on each layer block as it closes
pub type FinalizeFn = Box<dyn FnMut(&TechDb, LppKey) -> Result<(), String>>;

/// # Keyword-Language Read Session
/// State visible to keyword handlers.
#[derive(Debug)]
pub struct DslSession {
    pub db: TechDb,
    pub opts: DslOptions,
    pub vars: TechVars,
    /// Lpp of the open layer block
    pub current: Option<LppKey>,
    /// Source file, if reading one
    pub file: Option<String>,
    /// One-based line of the line being dispatched
    pub line: usize,
}
impl DslSession {
    /// Record a diagnostic at the current line
    pub fn warn(&mut self, category: DiagCategory, msg: impl Into<String>) {
        self.db
            .diag
            .warn_at(category, self.file.as_deref(), Some(self.line), msg)
    }
    /// Layer name of the open layer block
    pub fn current_layer(&self) -> Option<String> {
        let (layer, _) = self.db.layers.lpp_names(self.current?)?;
        Some(layer.to_string())
    }
}

/// # Keyword-Language Reader
pub struct DslReader {
    session: DslSession,
    extensions: Vec<Box<dyn KeywordDispatch>>,
    finalize: Option<FinalizeFn>,
    preproc: Preproc,
    /// Canonical paths of the files being read, outermost first
    includes: Vec<PathBuf>,
}
impl DslReader {
    /// Create a reader into `db`, with the built-in DRC, standard-via and script extensions
    pub fn new(db: TechDb, opts: DslOptions) -> Self {
        let mut reader = Self::bare(db, opts);
        reader.add_dispatcher(DrcKeywords);
        reader.add_dispatcher(StdViaKeywords);
        reader.add_dispatcher(ScriptBlocks::default());
        reader
    }
    /// Create a reader into `db` without extensions
    pub fn bare(mut db: TechDb, opts: DslOptions) -> Self {
        db.layers.seed_reserved_purposes();
        let vars = TechVars::new(opts.use_env);
        Self {
            session: DslSession {
                db,
                opts,
                vars,
                current: None,
                file: None,
                line: 0,
            },
            extensions: Vec::new(),
            finalize: None,
            preproc: Preproc::default(),
            includes: Vec::new(),
        }
    }
    /// Append an extension dispatcher
    pub fn add_dispatcher(&mut self, dispatcher: impl KeywordDispatch + 'static) {
        self.extensions.push(Box::new(dispatcher));
    }
    /// Install the layer-block finalization check
    pub fn set_finalize(
        &mut self,
        f: impl FnMut(&TechDb, LppKey) -> Result<(), String> + 'static,
    ) {
        self.finalize = Some(Box::new(f));
    }
    pub fn session(&self) -> &DslSession {
        &self.session
    }
    pub fn vars_mut(&mut self) -> &mut TechVars {
        &mut self.session.vars
    }
    pub fn preproc_mut(&mut self) -> &mut Preproc {
        &mut self.preproc
    }
    pub fn db(&self) -> &TechDb {
        &self.session.db
    }
    pub fn into_db(self) -> TechDb {
        self.session.db
    }
    /// Read file `path`, then [DslReader::close]
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> TechResult<()> {
        self.read_path(path.as_ref())?;
        self.close()
    }
    /// Read multi-line content `src`, then [DslReader::close]
    pub fn read_str(&mut self, src: &str) -> TechResult<()> {
        self.session.file = None;
        self.read_text(src, None)?;
        self.close()
    }
    /// Close any open layer block and finish all extensions
    pub fn close(&mut self) -> TechResult<()> {
        self.finalize_current();
        let mut rv = Ok(());
        for idx in 0..self.extensions.len() {
            let status = self.extensions[idx].finish(&mut self.session);
            if let Err(e) = self.report(status) {
                rv = rv.and(Err(e));
            }
        }
        rv
    }
    /// Dispatch a single line, outside of any file.
    /// Block conditionals and includes are rejected.
    /// Unrecognized keywords return [LineStatus::NoMatch], and errors carry the line number.
    pub fn dispatch_line(&mut self, text: &str) -> LineStatus {
        self.session.line += 1;
        match self.dispatch_single(text) {
            LineStatus::Error(msg) => {
                LineStatus::Error(format!("line {}: {}", self.session.line, msg))
            }
            status => status,
        }
    }
    fn dispatch_single(&mut self, text: &str) -> LineStatus {
        if let Some(ext) = self.extensions.iter_mut().find(|e| e.capturing()) {
            return ext.capture(&mut self.session, text);
        }
        let text = text.trim();
        if text.is_empty() {
            return LineStatus::Matched;
        }
        if text.starts_with('#') {
            return match Directive::parse(text) {
                None => LineStatus::Matched,
                Some(dir) if dir.kind.is_block() => {
                    LineStatus::error(format!("{} requires file input", dir.kind))
                }
                Some(dir) => self.preproc.apply(&dir).into(),
            };
        }
        self.dispatch_text(text)
    }
    /// Read the file at `path`, guarding against cycles and runaway nesting
    fn read_path(&mut self, path: &Path) -> TechResult<()> {
        let canon = path.canonicalize().map_err(|e| TechError::io(path, e))?;
        if self.includes.contains(&canon) {
            let msg = format!("Include cycle through {}", path.display());
            return Err(self.syntax(msg));
        }
        if self.includes.len() >= MAX_INCLUDE_DEPTH {
            let msg = format!("Includes nested deeper than {}", MAX_INCLUDE_DEPTH);
            return Err(self.syntax(msg));
        }
        let src = std::fs::read_to_string(&canon).map_err(|e| TechError::io(path, e))?;
        log::info!("Reading {}", path.display());
        let saved = (self.session.file.take(), self.session.line);
        self.session.file = Some(path.display().to_string());
        self.includes.push(canon.clone());
        let rv = self.read_text(&src, canon.parent());
        self.includes.pop();
        (self.session.file, self.session.line) = saved;
        rv
    }
    /// Join continued lines of `src` and process each logical line
    fn read_text(&mut self, src: &str, base: Option<&Path>) -> TechResult<()> {
        let depth = self.preproc.depth();
        let mut pending = String::new();
        let mut start = 0;
        for (idx, raw) in src.lines().enumerate() {
            if pending.is_empty() {
                start = idx + 1;
            }
            if let Some(head) = raw.trim_end().strip_suffix('\\') {
                pending.push_str(head);
                pending.push(' ');
                continue;
            }
            pending.push_str(raw);
            let text = std::mem::take(&mut pending);
            self.process(&text, start, base)?;
        }
        if !pending.is_empty() {
            let text = std::mem::take(&mut pending);
            self.process(&text, start, base)?;
        }
        if self.preproc.unwind(depth) {
            return Err(self.syntax("Conditional block is not closed by #endif"));
        }
        Ok(())
    }
    /// Process logical line `text`, starting at source line `line`
    fn process(&mut self, text: &str, line: usize, base: Option<&Path>) -> TechResult<()> {
        self.session.line = line;
        if let Some(ext) = self.extensions.iter_mut().find(|e| e.capturing()) {
            let status = ext.capture(&mut self.session, text);
            return self.report(status);
        }
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if text.starts_with('#') {
            let dir = match Directive::parse(text) {
                Some(dir) => dir,
                None => return Ok(()),
            };
            if dir.kind != DirectiveKind::Include {
                return self.preproc.apply(&dir).map_err(|e| self.syntax(e));
            }
            if !self.preproc.active() {
                return Ok(());
            }
            return match self.session.vars.substitute(dir.args) {
                Ok(args) => self.include(&args, base),
                Err(e) => self.report(LineStatus::Error(e)),
            };
        }
        if !self.preproc.active() {
            return Ok(());
        }
        match self.dispatch_text(text) {
            LineStatus::NoMatch => {
                let keyword = split_keyword(text).0;
                let msg = format!("Unknown keyword `{}`", keyword);
                self.session.warn(DiagCategory::UnknownKeyword, msg);
                Ok(())
            }
            status => self.report(status),
        }
    }
    /// Apply `#include FILE [name=value ...]`.
    /// Bindings are visible, as local variables, only while reading FILE.
    fn include(&mut self, args: &str, base: Option<&Path>) -> TechResult<()> {
        let mut words = args.split_whitespace();
        let name = match words.next() {
            Some(w) => w.trim_matches(|c| c == '"' || c == '<' || c == '>'),
            None => return self.report(LineStatus::error("#include requires a file name")),
        };
        let mut bindings = Vec::new();
        for word in words {
            match word.split_once('=') {
                Some((k, v)) if !k.is_empty() => bindings.push((k, v)),
                _ => {
                    let msg = format!("Invalid #include binding `{}`", word);
                    return self.report(LineStatus::Error(msg));
                }
            }
        }
        let path = match self.resolve(name, base) {
            Some(path) => path,
            None => {
                let err = std::io::Error::new(std::io::ErrorKind::NotFound, "Include file not found");
                return Err(TechError::io(name, err));
            }
        };
        self.session.vars.push_scope();
        for (k, v) in bindings {
            self.session.vars.set_local(k, v);
        }
        let rv = self.read_path(&path);
        self.session.vars.pop_scope();
        rv
    }
    /// Find include file `name`: beside the including file, then along the search path, then as given
    fn resolve(&self, name: &str, base: Option<&Path>) -> Option<PathBuf> {
        let given = Path::new(name);
        if given.is_absolute() {
            return given.exists().then(|| given.to_path_buf());
        }
        base.into_iter()
            .chain(self.session.opts.search_path.iter().map(|p| p.as_path()))
            .map(|dir| dir.join(given))
            .chain(std::iter::once(given.to_path_buf()))
            .find(|p| p.exists())
    }
    /// Expand, substitute and splice `text`, then dispatch it
    fn dispatch_text(&mut self, text: &str) -> LineStatus {
        let expanded = self.preproc.expand(text);
        let text = match self.session.vars.substitute(&expanded) {
            Ok(text) => text,
            Err(e) => return LineStatus::Error(e),
        };
        let (keyword, args) = split_keyword(&text);
        let args = if self.session.opts.is_verbatim(keyword) {
            args.to_string()
        } else {
            match eval::splice(args) {
                Ok(args) => args,
                Err(e) => return LineStatus::Error(e),
            }
        };
        if self.session.opts.verbose {
            log::info!("{} {}", keyword, args);
        } else {
            log::debug!("{} {}", keyword, args);
        }
        self.dispatch(keyword, &args)
    }
    /// Dispatch `keyword`: preamble, layer blocks, then extensions
    fn dispatch(&mut self, keyword: &str, args: &str) -> LineStatus {
        if let Some(key) = PreambleKey::from_str_nocase(keyword) {
            return layer::preamble(&mut self.session, key, args);
        }
        if let Some(opener) = LayerOpener::from_str_nocase(keyword) {
            self.finalize_current();
            return layer::open(&mut self.session, opener, args);
        }
        if let Some(key) = BlockKey::from_str_nocase(keyword) {
            return match self.session.current {
                Some(lpp) => layer::attribute(&mut self.session, lpp, key, args),
                None => LineStatus::error(format!("`{}` outside a layer block", keyword)),
            };
        }
        for ext in self.extensions.iter_mut() {
            match ext.dispatch(&mut self.session, keyword, args) {
                LineStatus::NoMatch => continue,
                status => return status,
            }
        }
        LineStatus::NoMatch
    }
    /// Close the open layer block, reporting validation failures
    fn finalize_current(&mut self) {
        let lpp = match self.session.current.take() {
            Some(lpp) => lpp,
            None => return,
        };
        let mut problems = layer::validate(&self.session.db, lpp);
        if let Some(f) = self.finalize.as_mut() {
            if let Err(e) = f(&self.session.db, lpp) {
                problems.push(e);
            }
        }
        for msg in problems {
            self.session.warn(DiagCategory::Validation, msg);
        }
    }
    /// Record a line error, or convert it to a [TechError] when stopping on errors
    fn report(&mut self, status: LineStatus) -> TechResult<()> {
        match status {
            LineStatus::Error(msg) if self.session.opts.stop_on_error => Err(self.syntax(msg)),
            LineStatus::Error(msg) => {
                self.session.warn(DiagCategory::Malformed, msg);
                Ok(())
            }
            _ => Ok(()),
        }
    }
    fn syntax(&self, msg: impl Into<String>) -> TechError {
        TechError::Syntax {
            file: self.session.file.clone(),
            line: Some(self.session.line),
            msg: msg.into(),
        }
    }
}

/// Split `text` into its leading keyword and the remaining argument text
pub fn split_keyword(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((keyword, args)) => (keyword, args.trim()),
        None => (text, ""),
    }
}
