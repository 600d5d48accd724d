//! The context logic of the Sigil Preprocessor.
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
// along with this program.  If not, see <https://www.gnu.org/licenses/>

use {
    crate::{
        error::{
            Error,
            Result,
        },
        file::read_file,
    },
    std::{
        collections::HashMap,
        env::vars,
        path::Path,
        sync::Arc,
    },
    serde_json::{
        from_str as from_json_str,
        Map as JsonMap,
        Value as JsonValue,
    },
};

const SCOPESEP: char = '.';

pub(crate) const SRC: &str = "src";
pub(crate) const SRC_DIR: &str = "srcDir";

/// A callable exposed to exec directives. Parameters arrive already
/// resolved; the returned text is spliced into the output verbatim.
pub type MacroFn = Arc<dyn Fn(&[JsonValue]) -> String + Send + Sync>;

/// The key/value environment directives read from.
///
/// Values are json data (strings, numbers, booleans, nested mappings);
/// callables for the exec directive live beside the data. Cloning a
/// context deep-copies the data and shares the callables, which is what
/// recursive inclusion relies on for isolation.
#[derive(Clone, Default)]
pub
struct Context {
    values: JsonMap<String, JsonValue>,
    macros: HashMap<String, MacroFn>,
}

impl Context {
    /// An empty context.
    pub
    fn new() -> Self {
        Self::default()
    }

    /// The default-context provider over the ambient process environment:
    /// every environment variable becomes a string entry.
    pub
    fn from_env() -> Self {
        let mut values = JsonMap::new();
        for (key, value) in vars() {
            values.insert(key, JsonValue::String(value));
        }

        Self {
            values,
            macros: HashMap::new(),
        }
    }

    /// Read a context from a json file. The document must be a json
    /// object.
    pub
    fn read<P: AsRef<Path>>(p: P) -> Result<Self> {
        let text = read_file(&p)?;

        let properties = from_json_str::<JsonValue>(&text)
            .map_err(|e| Error::JsonParse(e, p.as_ref().into()))?;

        match properties {
            JsonValue::Object(values) => Ok(Self {
                values,
                macros: HashMap::new(),
            }),
            _ => Err(Error::NotAMap(p.as_ref().into())),
        }
    }

    /// Read a context file into this context, overwriting colliding keys.
    pub
    fn read_in<P: AsRef<Path>>(&mut self, p: P) -> Result<()> {
        let other = Self::read(p)?;
        for (key, value) in other.values {
            self.values.insert(key, value);
        }

        Ok(())
    }

    pub
    fn set<K, V>(&mut self, key: K, value: V)
    where
        K: AsRef<str>,
        V: Into<JsonValue>
    {
        self.values.insert(key.as_ref().to_owned(), value.into());
    }

    /// Register a callable for the exec directive.
    pub
    fn set_macro<K: AsRef<str>>(&mut self, name: K, f: MacroFn) {
        self.macros.insert(name.as_ref().to_owned(), f);
    }

    pub
    fn get<K: AsRef<str>>(&self, key: K) -> Option<&JsonValue> {
        self.values.get(key.as_ref())
    }

    /// Point `src`/`srcDir` at the document about to be processed.
    pub(crate)
    fn set_src(&mut self, path: &Path) {
        let dir = path.parent().unwrap_or(Path::new("."));
        self.values.insert(
            SRC.to_owned(),
            JsonValue::String(path.display().to_string()),
        );
        self.values.insert(
            SRC_DIR.to_owned(),
            JsonValue::String(dir.display().to_string()),
        );
    }

    pub(crate)
    fn src_dir(&self) -> Option<&str> {
        self.values.get(SRC_DIR).and_then(JsonValue::as_str)
    }

    /// Derive the flat view: every nested mapping is also exposed under
    /// dotted-path keys, at every intermediate prefix.
    pub
    fn flatten(&self) -> FlatContext {
        let mut entries = HashMap::new();
        flatten_into(&self.values, None, &mut entries);

        FlatContext {
            entries,
            macros: self.macros.clone(),
        }
    }
}

fn flatten_into(
    map: &JsonMap<String, JsonValue>,
    prefix: Option<&str>,
    out: &mut HashMap<String, JsonValue>,
) {
    for (key, value) in map {
        let scoped = match prefix {
            Some(prefix) => format!("{prefix}{SCOPESEP}{key}"),
            None => key.to_owned(),
        };

        if let JsonValue::Object(inner) = value {
            flatten_into(inner, Some(&scoped), out);
        }

        out.insert(scoped, value.clone());
    }
}

/// The read-only flattened view of a [`Context`], rebuilt once per engine
/// entry and once per recursive re-entry.
pub
struct FlatContext {
    entries: HashMap<String, JsonValue>,
    macros: HashMap<String, MacroFn>,
}

impl FlatContext {
    pub
    fn get<K: AsRef<str>>(&self, key: K) -> Option<&JsonValue> {
        self.entries.get(key.as_ref())
    }

    pub
    fn contains<K: AsRef<str>>(&self, key: K) -> bool {
        self.entries.contains_key(key.as_ref())
    }

    pub(crate)
    fn macro_fn(&self, name: &str) -> Option<&MacroFn> {
        self.macros.get(name)
    }
}

/// Truthiness of a context value as directive tests see it.
pub(crate)
fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

/// Render a context value the way a directive splices it into text.
pub(crate)
fn render_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.to_owned(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        value => value.to_string(),
    }
}
