//! Directive dialects: the per-file-type pattern table.
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

mod builtin;

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
        path::{
            Path,
            PathBuf,
        },
    },
    once_cell::sync::Lazy,
    regex::Regex,
    serde::Deserialize,
    serde_json::from_str as from_json_str,
};

const FALLBACK: &str = "html";

/// A directive pattern as configured: either a finished expression or a
/// start/end delimiter pair wrapped around an arbitrary body capture.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub
enum PatternSpec {
    Ready(String),
    Delimited {
        start: String,
        end: String,
    },
}

impl PatternSpec {
    fn compile(&self) -> Result<Regex> {
        let source = match self {
            Self::Ready(src) => format!("(?im){src}"),
            Self::Delimited { start, end } => {
                format!("(?im){start}((?:.|\\n|\\r)*?){end}")
            },
        };

        Regex::new(&source).map_err(|e| Error::Pattern(e, source))
    }
}

/// The configured directive set for one file-type tag. A directive left
/// unset here is skipped entirely for documents of that type.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub
struct DialectSpec {
    pub include: Option<PatternSpec>,
    pub exclude: Option<PatternSpec>,
    pub ifdef: Option<PatternSpec>,
    pub ifndef: Option<PatternSpec>,
    #[serde(rename = "if")]
    pub if_test: Option<PatternSpec>,
    pub echo: Option<PatternSpec>,
    pub exec: Option<PatternSpec>,
    pub component: Option<PatternSpec>,
}

impl DialectSpec {
    fn compile(&self) -> Result<Dialect> {
        Ok(Dialect {
            include: self.include.as_ref().map(PatternSpec::compile).transpose()?,
            exclude: self.exclude.as_ref().map(PatternSpec::compile).transpose()?,
            ifdef: self.ifdef.as_ref().map(PatternSpec::compile).transpose()?,
            ifndef: self.ifndef.as_ref().map(PatternSpec::compile).transpose()?,
            if_test: self.if_test.as_ref().map(PatternSpec::compile).transpose()?,
            echo: self.echo.as_ref().map(PatternSpec::compile).transpose()?,
            exec: self.exec.as_ref().map(PatternSpec::compile).transpose()?,
            component: self.component.as_ref().map(PatternSpec::compile).transpose()?,
        })
    }
}

/// One file-type's compiled directive set.
#[derive(Clone, Debug, Default)]
pub
struct Dialect {
    pub(crate) include: Option<Regex>,
    pub(crate) exclude: Option<Regex>,
    pub(crate) ifdef: Option<Regex>,
    pub(crate) ifndef: Option<Regex>,
    pub(crate) if_test: Option<Regex>,
    pub(crate) echo: Option<Regex>,
    pub(crate) exec: Option<Regex>,
    pub(crate) component: Option<Regex>,
}

static EMPTY: Lazy<Dialect> = Lazy::new(Dialect::default);

/// The mapping from file-type tag to directive dialect. Loaded once at
/// startup and shared read-only afterwards.
#[derive(Clone, Debug)]
pub
struct DialectTable {
    entries: HashMap<String, Dialect>,
}

impl Default for DialectTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DialectTable {
    /// The built-in table: html, js, css and coffee.
    pub
    fn builtin() -> Self {
        builtin::table().clone()
    }

    /// A table with no dialects registered.
    pub
    fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register or replace the dialect for a file-type tag.
    pub
    fn insert<S: AsRef<str>>(&mut self, tag: S, spec: DialectSpec) -> Result<()> {
        self.entries.insert(tag.as_ref().to_ascii_lowercase(), spec.compile()?);
        Ok(())
    }

    /// Load a table from its json configuration form: an object mapping
    /// file-type tags to directive-pattern objects.
    pub
    fn from_json<S: AsRef<str>>(json: S) -> Result<Self> {
        let specs = from_json_str::<HashMap<String, DialectSpec>>(json.as_ref())
            .map_err(|e| Error::JsonParse(e, PathBuf::new()))?;

        let mut table = Self::empty();
        for (tag, spec) in specs {
            table.insert(tag, spec)?;
        }

        Ok(table)
    }

    /// Load a table from a json configuration file.
    pub
    fn read<P: AsRef<Path>>(p: P) -> Result<Self> {
        let text = read_file(&p)?;
        match Self::from_json(text) {
            Err(Error::JsonParse(e, _)) => Err(Error::JsonParse(e, p.as_ref().into())),
            other => other,
        }
    }

    /// The dialect for a tag. An unrecognized tag silently falls back to
    /// the html dialect.
    pub(crate)
    fn resolve(&self, tag: &str) -> (String, &Dialect) {
        let lowered = tag.to_ascii_lowercase();

        if let Some(dialect) = self.entries.get(&lowered) {
            return (lowered, dialect);
        }

        if let Some(dialect) = self.entries.get(FALLBACK) {
            return (FALLBACK.to_owned(), dialect);
        }

        (lowered, &EMPTY)
    }
}
