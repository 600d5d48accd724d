//! The directive-resolution pipeline of the Sigil Preprocessor.
// Copyright (C) 2024  Frankie Baffa
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use {
    crate::{
        context::{
            is_truthy,
            render_value,
            Context,
            FlatContext,
            SRC,
        },
        dialect::{
            Dialect,
            DialectTable,
        },
        error::{
            Error,
            Result,
        },
        eval::evaluate,
        file::{
            extension_of,
            DiskFs,
            FileSystem,
        },
        path::resolve_reference,
    },
    std::{
        env::current_dir,
        mem::take,
        path::{
            Path,
            PathBuf,
        },
        sync::Arc,
    },
    once_cell::sync::Lazy,
    regex::{
        escape as regex_escape,
        Captures,
        NoExpand,
        Regex,
    },
    serde_json::{
        from_str as from_json_str,
        Map as JsonMap,
        Value as JsonValue,
    },
    tracing::{
        debug,
        error,
        trace,
    },
};

/// The context key that both enables the component pass and anchors
/// component lookup.
const COMPONENT_BASE: &str = "componentBase";

/// Extra-context keys consumed by the engine rather than injected.
const GATE_KEY: &str = "@if";
const LOOP_KEY: &str = "@loop";

const DATA_CONTEXT: &str = "data-context";

/// Iteration cap for the quote-matching scan over a `data-context`
/// attribute value.
const SCAN_LIMIT: usize = 100;

// identifier-shaped leftovers stripped by the outermost cleanup pass
static UNRESOLVED_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{[A-Za-z0-9_.]+\}\}").expect("cleanup pattern")
});

/// Hook run on every successfully expanded inclusion body:
/// `(body, resolved_path, working_dir) -> body`.
pub type InclusionProcessor = Arc<dyn Fn(&str, &Path, &Path) -> String + Send + Sync>;

/// Content-approval gate consulted in read-only verification mode.
pub type Verifier = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Final transform applied once to the outermost result.
pub type Finalizer = Arc<dyn Fn(String) -> String + Send + Sync>;

/// How the component pass treats inclusion bodies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub
enum InclusionRule {
    /// Expand inclusions in place.
    #[default]
    Expand,
    /// Leave component directives untouched in the output; with a
    /// [`Verifier`] supplied, every inclusion target is still read,
    /// verified and descended into so unapproved content anywhere in the
    /// tree aborts the run.
    ReadOnly,
}

/// Per-invocation engine options.
#[derive(Clone, Default)]
pub
struct Options {
    /// Skip the plain-include pass.
    pub ignore_include: bool,
    pub inclusion_processor: Option<InclusionProcessor>,
    pub inclusion_rule: InclusionRule,
    pub read_only_verify: Option<Verifier>,
    /// Keep `{{identifier}}`-shaped tokens that survive component
    /// expansion. Off by default: the outermost call strips them as
    /// cleanup for downstream templating syntaxes sharing the token
    /// shape. Set when literal `{{...}}` content belongs in the output.
    pub keep_unresolved_tokens: bool,
    pub finalize: Option<Finalizer>,
}

/// The directive-resolution engine: an immutable dialect table plus the
/// I/O capability inclusions resolve through.
pub
struct Engine {
    dialects: DialectTable,
    fs: Arc<dyn FileSystem>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine over the built-in dialect table and the on-disk file
    /// system.
    pub
    fn new() -> Self {
        Self::with_dialects(DialectTable::builtin())
    }

    /// An engine over an externally supplied dialect table.
    pub
    fn with_dialects(dialects: DialectTable) -> Self {
        Self {
            dialects,
            fs: Arc::new(DiskFs),
        }
    }

    /// Swap the file-system capability.
    pub
    fn with_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Resolve every directive in `text` against `context`, using the
    /// dialect registered for `type_tag`. An unrecognized tag falls back
    /// to the html dialect.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sigil_core::{Context, Engine, Options};
    ///
    /// let mut ctx = Context::new();
    /// ctx.set("name", "World");
    ///
    /// let out = Engine::new()
    ///     .process("Hello <!-- @echo name -->!", &ctx, "html", &Options::default())
    ///     .unwrap();
    /// assert_eq!("Hello World!", out);
    /// ```
    pub
    fn process<S: AsRef<str>>(
        &self,
        text: S,
        context: &Context,
        type_tag: &str,
        options: &Options,
    ) -> Result<String> {
        let (tag, dialect) = self.dialects.resolve(type_tag);
        debug!(type_tag = %tag, "processing document");

        let context = context.clone();
        let chain = context.get(SRC)
            .and_then(JsonValue::as_str)
            .map(|src| vec![PathBuf::from(src)])
            .unwrap_or_default();

        let flat = context.flatten();
        let mut render = Render {
            engine: self,
            options,
            dialect,
            type_tag: tag,
            context,
            flat,
            depth: 0,
            chain,
        };

        let mut output = render.render(text.as_ref())?;

        // cleanup and the final hook belong to the outermost call only
        if !options.keep_unresolved_tokens {
            output = UNRESOLVED_TOKEN.replace_all(&output, "").into_owned();
        }

        if let Some(finalize) = &options.finalize {
            output = finalize(output);
        }

        Ok(output)
    }

    /// Read `src`, resolve directives with the dialect derived from its
    /// extension, and write the result to `dest`.
    pub
    fn process_file<P, Q>(
        &self,
        src: P,
        dest: Q,
        context: &Context,
        options: &Options,
    ) -> Result<()>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let src = resolve_reference(None, src.as_ref())?;

        let mut context = context.clone();
        context.set_src(&src);

        let text = self.fs.read(&src)?;
        let tag = extension_of(&src);
        let output = self.process(&text, &context, &tag, options)?;

        self.fs.write(dest.as_ref(), &output)
    }

    /// Callback-completion variant of [`Engine::process_file`]. The
    /// inner inclusion chain still resolves through blocking reads so
    /// splice order stays deterministic.
    pub
    fn process_file_with<P, Q, F>(&self, src: P, dest: Q, context: &Context, on_complete: F)
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        F: FnOnce(Result<()>),
    {
        on_complete(self.process_file(src, dest, context, &Options::default()));
    }
}

/// One document's trip through the pass pipeline. Recursive inclusion
/// spawns a child renderer over a deep-cloned context; the chain of
/// in-flight paths travels with it to refuse cycles.
struct Render<'e> {
    engine: &'e Engine,
    options: &'e Options,
    dialect: &'e Dialect,
    type_tag: String,
    context: Context,
    flat: FlatContext,
    depth: usize,
    chain: Vec<PathBuf>,
}

impl Render<'_> {
    fn render(&mut self, text: &str) -> Result<String> {
        let dialect = self.dialect;
        let mut rv = text.to_owned();

        if !self.options.ignore_include {
            if let Some(re) = &dialect.include {
                rv = self.include_pass(re, &rv)?;
            }
        }

        if let Some(re) = &dialect.exclude {
            rv = self.exclude_pass(re, &rv)?;
        }

        if let Some(re) = &dialect.ifdef {
            rv = self.ifdef_pass(re, &rv, false)?;
        }

        if let Some(re) = &dialect.component {
            rv = self.component_pass(re, &rv)?;
        }

        if let Some(re) = &dialect.ifndef {
            rv = self.ifdef_pass(re, &rv, true)?;
        }

        if let Some(re) = &dialect.if_test {
            rv = self.if_pass(re, &rv)?;
        }

        if let Some(re) = &dialect.echo {
            rv = self.echo_pass(re, &rv)?;
        }

        if let Some(re) = &dialect.exec {
            rv = self.exec_pass(re, &rv)?;
        }

        Ok(rv)
    }

    /// Replace every match of `re` with the expansion the callback
    /// produces, left to right, single pass. Matching is non-overlapping
    /// and the lazy body captures make same-kind nesting resolve
    /// leftmost-shortest: an outer opener pairs with the first closer.
    /// With `swallow_empty_line` set, an empty expansion also consumes
    /// the newline that followed the directive.
    fn splice<F>(re: &Regex, text: &str, swallow_empty_line: bool, mut expand: F) -> Result<String>
    where
        F: FnMut(&Captures) -> Result<String>,
    {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in re.captures_iter(text) {
            let whole = caps.get(0).expect("whole match");
            out.push_str(&text[last..whole.start()]);
            last = whole.end();

            let replacement = expand(&caps)?;
            if swallow_empty_line && replacement.is_empty() {
                if text[last..].starts_with("\r\n") {
                    last += 2;
                }
                else if text[last..].starts_with('\n') {
                    last += 1;
                }
            }

            out.push_str(&replacement);
        }

        out.push_str(&text[last..]);
        Ok(out)
    }

    fn include_pass(&mut self, re: &Regex, text: &str) -> Result<String> {
        Self::splice(re, text, true, |caps| {
            let line = group(caps, 1);
            let reference = group(caps, 2).trim();

            let base = self.context.src_dir().map(PathBuf::from);
            let target = resolve_reference(base.as_deref(), Path::new(reference))?;

            if !self.engine.fs.exists(&target) {
                debug!(path = %target.display(), "inclusion target not found");
                return Ok(format!("{} not found", target.display()));
            }

            let source = self.engine.fs.read(&target)?;
            let body = self.descend(&target, source, None)?;
            if body.is_empty() {
                return Ok(String::new());
            }

            let body = reindent(&body, &indent_image(line));
            let body = self.run_inclusion_processor(&body, &target)?;

            Ok(format!("{line}{body}"))
        })
    }

    fn exclude_pass(&self, re: &Regex, text: &str) -> Result<String> {
        let flat = &self.flat;
        Self::splice(re, text, false, |caps| {
            if evaluate(group(caps, 1), flat)? {
                Ok(String::new())
            }
            else {
                Ok(group(caps, 2).to_owned())
            }
        })
    }

    fn ifdef_pass(&self, re: &Regex, text: &str, inverse: bool) -> Result<String> {
        let flat = &self.flat;
        Self::splice(re, text, false, |caps| {
            let name = group(caps, 1).trim();
            // presence is the test; a falsy value still counts as defined
            if flat.contains(name) != inverse {
                Ok(group(caps, 2).to_owned())
            }
            else {
                Ok(String::new())
            }
        })
    }

    fn if_pass(&self, re: &Regex, text: &str) -> Result<String> {
        let flat = &self.flat;
        Self::splice(re, text, false, |caps| {
            if evaluate(group(caps, 1), flat)? {
                Ok(group(caps, 2).to_owned())
            }
            else {
                Ok(String::new())
            }
        })
    }

    fn component_pass(&mut self, re: &Regex, text: &str) -> Result<String> {
        let base = match self.flat.get(COMPONENT_BASE).and_then(JsonValue::as_str) {
            Some(base) => base.to_owned(),
            None => return Ok(text.to_owned()),
        };

        let options = self.options;

        Self::splice(re, text, true, |caps| {
            let whole = caps.get(0).expect("whole match").as_str();
            let line = group(caps, 1);
            let name = group(caps, 2).trim();

            let extra = parse_extra_context(whole)?;

            // the gate comes before everything, including existence
            if let Some(gate) = extra.get(GATE_KEY).and_then(JsonValue::as_str) {
                if !self.gate_open(gate) {
                    trace!(component = name, gate, "component gated off");
                    return Ok(format!("<!-- {name} if-excluded: {gate} -->"));
                }
            }

            let file_name = format!("{}.{}", name, self.type_tag);
            let target = resolve_reference(Some(Path::new(&base)), Path::new(&file_name))?;

            if !self.engine.fs.exists(&target) {
                debug!(path = %target.display(), "component target not found");
                return Ok(format!("{} not found", target.display()));
            }

            let source = self.engine.fs.read(&target)?;

            if options.inclusion_rule == InclusionRule::ReadOnly {
                if let Some(verify) = options.read_only_verify.clone() {
                    if !verify(&source) {
                        error!(path = %target.display(), "read-only verification rejected content");
                        return Err(Error::Verification(target));
                    }

                    // descend so nested inclusions are verified too, but
                    // leave the directive itself untouched in the output
                    self.descend(&target, source, Some(&extra))?;
                    return Ok(whole.to_owned());
                }
            }

            let body = self.descend(&target, source, Some(&extra))?;
            if body.is_empty() {
                return Ok(String::new());
            }

            let body = reindent(&body, &indent_image(line));
            let body = self.run_inclusion_processor(&body, &target)?;
            let mut body = format!("{line}{body}");

            for (key, value) in &extra {
                if key.starts_with('@') {
                    continue;
                }

                let token = Regex::new(&format!("(?i){}", regex_escape(&format!("{{{{{key}}}}}"))))
                    .map_err(|e| Error::Pattern(e, key.to_owned()))?;
                let rendered = render_value(value);
                body = token.replace_all(&body, NoExpand(&rendered)).into_owned();
            }

            let count = loop_count(extra.get(LOOP_KEY));
            if count <= 0 {
                return Ok(String::new());
            }

            Ok(body.repeat(count as usize))
        })
    }

    fn echo_pass(&self, re: &Regex, text: &str) -> Result<String> {
        let flat = &self.flat;
        Self::splice(re, text, false, |caps| {
            let reference = group(caps, 1).trim();

            // a quoted reference forces the literal through
            if let Some(literal) = quoted_literal(reference) {
                return Ok(literal.to_owned());
            }

            Ok(flat.get(reference).map(render_value).unwrap_or_default())
        })
    }

    fn exec_pass(&self, re: &Regex, text: &str) -> Result<String> {
        let flat = &self.flat;
        Self::splice(re, text, false, |caps| {
            let name = group(caps, 1).trim();

            let params = group(caps, 2)
                .split(',')
                .map(|token| {
                    let token = token.trim();
                    if let Some(literal) = quoted_literal(token) {
                        JsonValue::String(literal.to_owned())
                    }
                    else if let Some(value) = flat.get(token) {
                        value.clone()
                    }
                    else {
                        JsonValue::String(token.to_owned())
                    }
                })
                .collect::<Vec<JsonValue>>();

            // an absent or non-callable name resolves to nothing
            match flat.macro_fn(name) {
                Some(f) => Ok(f(&params)),
                None => Ok(String::new()),
            }
        })
    }

    /// Recursively run the whole pipeline over an inclusion target with
    /// an independently owned copy of the context.
    fn descend(
        &mut self,
        target: &Path,
        source: String,
        extra: Option<&JsonMap<String, JsonValue>>,
    ) -> Result<String> {
        if self.chain.iter().any(|p| p == target) {
            return Err(Error::Circular(target.to_owned()));
        }

        debug!(path = %target.display(), depth = self.depth + 1, "expanding inclusion");

        let mut context = self.context.clone();
        context.set_src(target);
        if let Some(extra) = extra {
            for (key, value) in extra {
                if !key.starts_with('@') {
                    context.set(key, value.clone());
                }
            }
        }

        let flat = context.flatten();
        let mut child = Render {
            engine: self.engine,
            options: self.options,
            dialect: self.dialect,
            type_tag: self.type_tag.clone(),
            context,
            flat,
            depth: self.depth + 1,
            chain: take(&mut self.chain),
        };

        child.chain.push(target.to_owned());
        let result = child.render(&source);
        child.chain.pop();

        // place the chain back into this renderer
        self.chain = child.chain;

        result
    }

    fn run_inclusion_processor(&self, body: &str, target: &Path) -> Result<String> {
        match &self.options.inclusion_processor {
            Some(hook) => {
                let cwd = current_dir().map_err(|e| Error::IO(e, target.into()))?;
                Ok(hook(body, target, &cwd))
            },
            None => Ok(body.to_owned()),
        }
    }

    fn gate_open(&self, gate: &str) -> bool {
        let gate = gate.trim();
        let (negated, name) = match gate.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, gate),
        };

        let on = self.flat.get(name).map(is_truthy).unwrap_or(false);
        if negated {
            !on
        }
        else {
            on
        }
    }
}

fn group<'t>(caps: &Captures<'t>, idx: usize) -> &'t str {
    caps.get(idx).map(|m| m.as_str()).unwrap_or("")
}

/// The whitespace image of a line prefix: whitespace survives, anything
/// else becomes a space.
fn indent_image(line: &str) -> String {
    line.chars()
        .map(|c| if c.is_whitespace() { c } else { ' ' })
        .collect()
}

fn reindent(body: &str, indent: &str) -> String {
    if indent.is_empty() {
        return body.to_owned();
    }

    body.replace("\r\n", "\n").replace('\n', &format!("\n{indent}"))
}

fn quoted_literal(token: &str) -> Option<&str> {
    let first = token.chars().next()?;
    if (first == '\'' || first == '"') && token.len() >= 2 && token.ends_with(first) {
        Some(&token[1..token.len() - first.len_utf8()])
    }
    else {
        None
    }
}

fn loop_count(value: Option<&JsonValue>) -> i64 {
    match value {
        None => 1,
        Some(JsonValue::Number(n)) => n.as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(1),
        Some(JsonValue::String(s)) => s.trim().parse::<i64>().unwrap_or(1),
        Some(_) => 1,
    }
}

/// Locate and parse the inline `data-context` attribute of a component
/// directive. The value is bounded by the quote character that opens it;
/// a candidate closing quote that leaves braces unbalanced is skipped,
/// up to [`SCAN_LIMIT`] iterations. Escaped quotes inside the value are
/// a known limitation.
fn parse_extra_context(raw: &str) -> Result<JsonMap<String, JsonValue>> {
    let Some(at) = raw.find(DATA_CONTEXT) else {
        return Ok(JsonMap::new());
    };

    // step past the assignment character to the opening quote
    let rest = &raw[at + DATA_CONTEXT.len()..];
    let mut chars = rest.chars();
    if chars.next().is_none() {
        return Ok(JsonMap::new());
    }

    let Some(quote) = chars.next() else {
        return Ok(JsonMap::new());
    };
    if quote != '\'' && quote != '"' {
        return Ok(JsonMap::new());
    }

    let value_area = chars.as_str();
    let mut end = None;
    let mut from = 0;
    for _ in 0..SCAN_LIMIT {
        let Some(idx) = value_area[from..].find(quote) else {
            break;
        };

        let candidate = &value_area[..from + idx];
        if balanced_braces(candidate) {
            end = Some(from + idx);
            break;
        }

        from += idx + quote.len_utf8();
    }

    let Some(end) = end else {
        return Ok(JsonMap::new());
    };

    let blob = value_area[..end].trim();
    if !blob.starts_with('{') {
        return Ok(JsonMap::new());
    }

    let normalized = blob.replace('\'', "\"");
    match from_json_str::<JsonValue>(&normalized) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(_) => Ok(JsonMap::new()),
        Err(e) => Err(Error::ExtraContext(e, blob.to_owned())),
    }
}

fn balanced_braces(text: &str) -> bool {
    let mut depth = 0i64;
    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {},
        }
    }

    depth == 0
}
