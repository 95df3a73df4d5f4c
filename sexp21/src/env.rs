//!
//! # Evaluation Environment
//!
//! Owns the global variables, the name-to-handler dispatch tables, user-defined procedures,
//! the local-variable scope stack and the node [Arena].
//!
//! Handlers receive the [Environment], a caller-supplied context `C`, and the form being handled.
//! Each vendor grammar builds its own environment over its own context type.
//!

// Std-Lib
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

// Local
use crate::arena::{Arena, ArenaMark, NodeKey};
use crate::error::{SexpError, SexpResult};
use crate::node::{Node, Value};
use crate::read::SexpParser;

/// Maximum `include` nesting
pub const MAX_INCLUDE_DEPTH: usize = 32;
/// Maximum procedure-call nesting
pub const MAX_CALL_DEPTH: usize = 256;

/// # Form Handler
///
/// Implemented for all closures and functions of the matching signature.
///
pub trait Handler<C> {
    fn handle(&self, env: &mut Environment<C>, ctx: &mut C, form: &Node) -> SexpResult<Value>;
}
impl<C, F> Handler<C> for F
where
    F: Fn(&mut Environment<C>, &mut C, &Node) -> SexpResult<Value>,
{
    fn handle(&self, env: &mut Environment<C>, ctx: &mut C, form: &Node) -> SexpResult<Value> {
        self(env, ctx, form)
    }
}

/// Warning callback: receives the context, the current source position, and a message
pub type WarnSink<C> = Rc<dyn Fn(&mut C, &SourcePos, &str)>;

/// # Source Position
/// File and line of the top-level form being evaluated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePos {
    pub file: Option<String>,
    pub line: usize,
}
impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}", file, self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

/// # User-Defined Procedure
#[derive(Debug, Clone)]
pub struct UserNode {
    pub params: Vec<String>,
    /// Unnamed list of body forms, persisted in the arena
    pub body: NodeKey,
}

/// # Evaluation Environment
pub struct Environment<C> {
    globals: HashMap<String, Value>,
    handlers: HashMap<String, Rc<dyn Handler<C>>>,
    functions: HashMap<String, Rc<dyn Handler<C>>>,
    user_nodes: HashMap<String, UserNode>,
    locals: Vec<HashMap<String, Value>>,
    arena: Arena,
    search_path: Vec<PathBuf>,
    /// Canonical paths of the files being read, outermost first
    include_stack: Vec<PathBuf>,
    warn_sink: Option<WarnSink<C>>,
    pos: SourcePos,
    stop_on_error: bool,
    /// Report unknown forms as warnings, rather than debug logs
    pub verbose: bool,
}
impl<C: 'static> Default for Environment<C> {
    fn default() -> Self {
        Self::new()
    }
}
impl<C: 'static> Environment<C> {
    /// Create a new [Environment], with the built-in forms registered
    pub fn new() -> Self {
        let mut env = Self {
            globals: HashMap::new(),
            handlers: HashMap::new(),
            functions: HashMap::new(),
            user_nodes: HashMap::new(),
            locals: Vec::new(),
            arena: Arena::default(),
            search_path: Vec::new(),
            include_stack: Vec::new(),
            warn_sink: None,
            pos: SourcePos::default(),
            stop_on_error: false,
            verbose: false,
        };
        env.register_handler("procedure", builtin_procedure::<C>);
        env.register_handler("let", builtin_let::<C>);
        env.register_handler("include", builtin_include::<C>);
        env
    }
    /// Register form-handler `handler` under `name`, replacing any existing one
    pub fn register_handler(&mut self, name: impl Into<String>, handler: impl Handler<C> + 'static) {
        self.handlers.insert(name.into(), Rc::new(handler));
    }
    /// Register a dispatcher form `name`, which redispatches each of its children
    pub fn register_dispatcher(&mut self, name: impl Into<String>) {
        self.register_handler(name, dispatcher::<C>);
    }
    /// Register value-function `handler` under `name`.
    /// Value functions are invoked when their forms appear as arguments.
    pub fn register_function(&mut self, name: impl Into<String>, handler: impl Handler<C> + 'static) {
        self.functions.insert(name.into(), Rc::new(handler));
    }
    pub fn find_handler(&self, name: &str) -> Option<Rc<dyn Handler<C>>> {
        self.handlers.get(name).cloned()
    }
    pub fn find_function(&self, name: &str) -> Option<Rc<dyn Handler<C>>> {
        self.functions.get(name).cloned()
    }
    pub fn find_user_node(&self, name: &str) -> Option<&UserNode> {
        self.user_nodes.get(name)
    }
    /// Route warnings to `sink` instead of the log
    pub fn set_warn_sink(&mut self, sink: WarnSink<C>) {
        self.warn_sink = Some(sink);
    }
    /// Issue a warning at the current source position
    pub fn warn(&self, ctx: &mut C, msg: &str) {
        match &self.warn_sink {
            Some(sink) => sink(ctx, &self.pos, msg),
            None => log::warn!("{}: {}", self.pos, msg),
        }
    }
    /// Position of the top-level form being evaluated
    pub fn pos(&self) -> &SourcePos {
        &self.pos
    }
    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error
    }
    /// Add `dir` to the include search path
    pub fn add_search_path(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.search_path.contains(&dir) {
            self.search_path.push(dir);
        }
    }
    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }
    /// Read and evaluate every top-level form of `text`.
    ///
    /// Syntax errors abort, returning the error.
    /// Handler errors abort when `stop_on_error` is set, and are otherwise warned and skipped.
    pub fn read_eval(
        &mut self,
        ctx: &mut C,
        text: &str,
        search_path: &[PathBuf],
        stop_on_error: bool,
    ) -> SexpResult<()> {
        for dir in search_path {
            self.add_search_path(dir.clone());
        }
        let prev = std::mem::replace(&mut self.stop_on_error, stop_on_error);
        let rv = self.eval_text(ctx, text);
        self.stop_on_error = prev;
        rv
    }
    /// Read and evaluate file `path`, with its directory added to the search path
    pub fn read_eval_file(
        &mut self,
        ctx: &mut C,
        path: impl AsRef<Path>,
        stop_on_error: bool,
    ) -> SexpResult<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            self.add_search_path(dir.to_path_buf());
        }
        let prev = std::mem::replace(&mut self.stop_on_error, stop_on_error);
        let rv = self.eval_file(ctx, path);
        self.stop_on_error = prev;
        rv
    }
    fn eval_text(&mut self, ctx: &mut C, text: &str) -> SexpResult<()> {
        let mut parser = SexpParser::new(text)?;
        while let Some((line, form)) = parser.parse_form()? {
            self.pos.line = line;
            let mark = self.arena.mark();
            let key = self.arena.new_temp_node(form);
            let rv = match self.arena.get(key) {
                Some(form) => self.eval_form(ctx, &form).map(|_| ()),
                None => Ok(()),
            };
            self.arena.recycle(mark);
            if let Err(e) = rv {
                self.handle_error(ctx, e)?;
            }
        }
        Ok(())
    }
    fn eval_file(&mut self, ctx: &mut C, path: &Path) -> SexpResult<()> {
        let canon = std::fs::canonicalize(path)?;
        if self.include_stack.contains(&canon) {
            return self.fail(format!("Include cycle through {}", path.display()));
        }
        if self.include_stack.len() >= MAX_INCLUDE_DEPTH {
            return self.fail(format!(
                "Include depth exceeds {} at {}",
                MAX_INCLUDE_DEPTH,
                path.display()
            ));
        }
        let text = std::fs::read_to_string(&canon)?;
        log::info!("Reading {}", path.display());
        self.include_stack.push(canon);
        let outer = std::mem::replace(
            &mut self.pos,
            SourcePos {
                file: Some(path.display().to_string()),
                line: 0,
            },
        );
        let rv = self.eval_text(ctx, &text);
        self.pos = outer;
        self.include_stack.pop();
        rv
    }
    /// Warn and continue, or pass along `e` when stopping on errors
    pub fn handle_error(&mut self, ctx: &mut C, e: SexpError) -> SexpResult<()> {
        if self.stop_on_error {
            return Err(e);
        }
        let msg = match &e {
            SexpError::Eval { msg, .. } | SexpError::Str(msg) => msg.clone(),
            other => other.to_string(),
        };
        self.warn(ctx, &msg);
        Ok(())
    }
    /// Evaluate a top-level or dispatched form
    pub fn eval_form(&mut self, ctx: &mut C, form: &Node) -> SexpResult<Value> {
        match form {
            Node::List { name: Some(name), .. } => self.call_named(ctx, name, form),
            Node::Operator { .. } => self.assign(ctx, form),
            _ => self.eval(ctx, form),
        }
    }
    /// Invoke the handler, procedure or value-function registered for `name`
    fn call_named(&mut self, ctx: &mut C, name: &str, form: &Node) -> SexpResult<Value> {
        if let Some(h) = self.find_handler(name) {
            return h.handle(self, ctx, form);
        }
        if self.user_nodes.contains_key(name) {
            return self.call_user_node(ctx, name, form);
        }
        if let Some(h) = self.find_function(name) {
            return h.handle(self, ctx, form);
        }
        if self.verbose {
            self.warn(ctx, &format!("Unknown form `{}`, skipped", name));
        } else {
            log::debug!("{}: unknown form `{}`, skipped", self.pos, name);
        }
        Ok(Value::Nil)
    }
    /// Redispatch each named child of `form` by name.
    /// Handler failures are warned and skipped unless stopping on errors.
    pub fn dispatch_children(&mut self, ctx: &mut C, form: &Node) -> SexpResult<()> {
        for child in form.args() {
            let rv = match child {
                Node::List { name: Some(name), .. } => self.call_named(ctx, name, child),
                Node::Operator { .. } => self.assign(ctx, child),
                other => {
                    log::debug!("{}: skipping unnamed child {}", self.pos, other);
                    continue;
                }
            };
            if let Err(e) = rv {
                self.handle_error(ctx, e)?;
            }
        }
        Ok(())
    }
    /// Evaluate `node` to a [Value]
    pub fn eval(&mut self, ctx: &mut C, node: &Node) -> SexpResult<Value> {
        match node {
            Node::Number(d) => Ok(Value::Number(*d)),
            Node::QuotedString(s) => Ok(Value::Str(s.clone())),
            Node::Identifier(s) => Ok(match s.as_str() {
                "nil" => Value::Nil,
                "t" => Value::True,
                _ => self
                    .lookup(s)
                    .cloned()
                    .unwrap_or_else(|| Value::Symbol(s.clone())),
            }),
            Node::List { name: None, args } => {
                if args.is_empty() {
                    return Ok(Value::Nil);
                }
                let mut vals = Vec::with_capacity(args.len());
                for arg in args {
                    vals.push(self.eval(ctx, arg)?);
                }
                Ok(Value::List(vals))
            }
            Node::List { name: Some(name), .. } => {
                if let Some(h) = self.find_function(name) {
                    return h.handle(self, ctx, node);
                }
                if self.user_nodes.contains_key(name) {
                    return self.call_user_node(ctx, name, node);
                }
                Ok(Value::Form(node.clone()))
            }
            Node::Operator { .. } => Ok(Value::Form(node.clone())),
        }
    }
    /// Evaluate up to `expected` leading arguments of `node`.
    /// Returns the values actually produced; callers treat a short result as malformed.
    pub fn eval_list(&mut self, ctx: &mut C, node: &Node, expected: usize) -> SexpResult<Vec<Value>> {
        let args = node.args();
        let n = expected.min(args.len());
        let mut vals = Vec::with_capacity(n);
        for arg in &args[..n] {
            vals.push(self.eval(ctx, arg)?);
        }
        Ok(vals)
    }
    /// Evaluate an `lhs = value` assignment.
    /// Updates the innermost local binding of `lhs` if one exists, otherwise the global.
    fn assign(&mut self, ctx: &mut C, node: &Node) -> SexpResult<Value> {
        let (lhs, rhs) = match node {
            Node::Operator { lhs, args, .. } if args.len() == 1 => (lhs, &args[0]),
            _ => return self.fail(format!("Malformed assignment `{}`", node)),
        };
        let name = match lhs.as_ref() {
            Node::Identifier(s) => s.clone(),
            other => return self.fail(format!("Cannot assign to `{}`", other)),
        };
        let val = self.eval(ctx, rhs)?;
        match self.locals.iter_mut().rev().find(|s| s.contains_key(&name)) {
            Some(scope) => {
                scope.insert(name, val.clone());
            }
            None => {
                self.globals.insert(name, val.clone());
            }
        }
        Ok(val)
    }
    /// Open a new local scope with `vars`
    pub fn push_local_vars(&mut self, vars: HashMap<String, Value>) {
        self.locals.push(vars);
    }
    /// Close the innermost local scope
    pub fn pop_local_vars(&mut self) {
        self.locals.pop();
    }
    /// Look up `name` in local scopes, innermost first, then globals
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        for scope in self.locals.iter().rev() {
            if let Some(v) = scope.get(name) {
                return Some(v);
            }
        }
        self.globals.get(name)
    }
    pub fn set_global(&mut self, name: impl Into<String>, val: Value) {
        self.globals.insert(name.into(), val);
    }
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }
    /// Define or replace procedure `name`
    pub fn define_user_node(&mut self, name: impl Into<String>, params: Vec<String>, body: Vec<Node>) {
        let key = self.arena.new_temp_node(Node::unnamed(body));
        self.arena.persist(key);
        if let Some(old) = self.user_nodes.insert(name.into(), UserNode { params, body: key }) {
            self.arena.free(old.body);
        }
    }
    fn call_user_node(&mut self, ctx: &mut C, name: &str, form: &Node) -> SexpResult<Value> {
        let unode = match self.user_nodes.get(name) {
            Some(u) => u.clone(),
            None => return self.fail(format!("No procedure `{}`", name)),
        };
        if self.locals.len() >= MAX_CALL_DEPTH {
            return self.fail(format!("Call depth exceeds {} in `{}`", MAX_CALL_DEPTH, name));
        }
        let actuals = self.eval_list(ctx, form, unode.params.len())?;
        if actuals.len() < unode.params.len() {
            return self.fail(format!(
                "`{}` takes {} arguments, got {}",
                name,
                unode.params.len(),
                actuals.len()
            ));
        }
        let body = match self.arena.get(unode.body) {
            Some(b) => b,
            None => return self.fail(format!("Procedure `{}` has no body", name)),
        };
        let vars = unode.params.iter().cloned().zip(actuals).collect();
        self.eval_scoped(ctx, vars, body.args())
    }
    /// Evaluate `body` in a new local scope of `vars`, returning the last value
    fn eval_scoped(
        &mut self,
        ctx: &mut C,
        vars: HashMap<String, Value>,
        body: &[Node],
    ) -> SexpResult<Value> {
        self.push_local_vars(vars);
        let mut rv = Ok(Value::Nil);
        for form in body {
            rv = self.eval_form(ctx, form);
            if rv.is_err() {
                break;
            }
        }
        self.pop_local_vars();
        rv
    }
    /// Allocate a temporary node, released when the current top-level form completes
    pub fn new_temp_node(&mut self, node: Node) -> NodeKey {
        self.arena.new_temp_node(node)
    }
    /// Allocate a temporary deep copy of `node`
    pub fn new_temp_copy(&mut self, node: &Node) -> NodeKey {
        self.arena.new_temp_copy(node)
    }
    pub fn temp(&self, key: NodeKey) -> Option<Rc<Node>> {
        self.arena.get(key)
    }
    pub fn mark(&self) -> ArenaMark {
        self.arena.mark()
    }
    /// Release temporaries allocated since `mark`
    pub fn recycle(&mut self, mark: ArenaMark) -> usize {
        self.arena.recycle(mark)
    }
    pub fn arena(&self) -> &Arena {
        &self.arena
    }
    /// Create an evaluation error at the current line
    pub fn error(&self, msg: impl Into<String>) -> SexpError {
        SexpError::Eval {
            msg: msg.into(),
            line: self.pos.line,
        }
    }
    /// Return an evaluation error at the current line
    pub fn fail<T>(&self, msg: impl Into<String>) -> SexpResult<T> {
        Err(self.error(msg))
    }
}

/// Dispatcher handler: redispatches each child of a grouping form
pub fn dispatcher<C: 'static>(env: &mut Environment<C>, ctx: &mut C, form: &Node) -> SexpResult<Value> {
    env.dispatch_children(ctx, form)?;
    Ok(Value::Nil)
}

/// `procedure( name(params...) body... )`
fn builtin_procedure<C: 'static>(env: &mut Environment<C>, _ctx: &mut C, form: &Node) -> SexpResult<Value> {
    let args = form.args();
    let (name, params) = match args.first() {
        Some(Node::List { name: Some(n), args: p }) => (n.clone(), p),
        _ => return env.fail(format!("Malformed procedure definition `{}`", form)),
    };
    let mut names = Vec::with_capacity(params.len());
    for p in params {
        match p {
            Node::Identifier(s) => names.push(s.clone()),
            other => return env.fail(format!("Invalid parameter `{}` in procedure {}", other, name)),
        }
    }
    env.define_user_node(name, names, args[1..].to_vec());
    Ok(Value::Nil)
}

/// `let( (bindings...) body... )`, bindings being `var` or `(var value)`
fn builtin_let<C: 'static>(env: &mut Environment<C>, ctx: &mut C, form: &Node) -> SexpResult<Value> {
    let args = form.args();
    let bindings = match args.first() {
        Some(b @ Node::List { name: None, .. }) => b.args(),
        _ => return env.fail(format!("Malformed let `{}`", form)),
    };
    let mut vars = HashMap::new();
    for b in bindings {
        match b {
            Node::Identifier(s) => {
                vars.insert(s.clone(), Value::Nil);
            }
            Node::List { name: None, args } if args.len() == 2 => {
                let name = match &args[0] {
                    Node::Identifier(s) => s.clone(),
                    other => return env.fail(format!("Invalid let binding `{}`", other)),
                };
                let val = env.eval(ctx, &args[1])?;
                vars.insert(name, val);
            }
            other => return env.fail(format!("Invalid let binding `{}`", other)),
        }
    }
    env.eval_scoped(ctx, vars, &args[1..])
}

/// `include( "file" )`
fn builtin_include<C: 'static>(env: &mut Environment<C>, ctx: &mut C, form: &Node) -> SexpResult<Value> {
    let vals = env.eval_list(ctx, form, 1)?;
    let fname = match vals.first().and_then(|v| v.as_str()) {
        Some(f) => f.to_string(),
        None => return env.fail(format!("Malformed include `{}`", form)),
    };
    let path = resolve_include(env, &fname)
        .ok_or_else(|| env.error(format!("Cannot find include file {}", fname)))?;
    env.eval_file(ctx, &path)?;
    Ok(Value::Nil)
}

/// Locate include-file `fname`: absolute, then relative to the including file, then the search path
fn resolve_include<C: 'static>(env: &Environment<C>, fname: &str) -> Option<PathBuf> {
    let p = Path::new(fname);
    if p.is_absolute() {
        return p.exists().then(|| p.to_path_buf());
    }
    let current_dir = env.include_stack.last().and_then(|f| f.parent().map(Path::to_path_buf));
    current_dir
        .iter()
        .chain(env.search_path.iter())
        .map(|dir| dir.join(p))
        .find(|candidate| candidate.exists())
        .or_else(|| p.exists().then(|| p.to_path_buf()))
}
