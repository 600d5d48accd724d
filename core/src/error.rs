//! Error types for the Sigil Preprocessor.
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
    std::{
        error::Error as StdError,
        fmt::{
            Display,
            Formatter,
            Result as FmtResult,
        },
        io::Error as IOError,
        path::PathBuf,
        result::Result as StdResult,
    },
    regex::Error as RegexError,
    serde_json::Error as JsonError,
};

/// The error type for the Sigil Preprocessor.
///
/// Missing inclusion targets are not errors; they degrade to an inline
/// marker in the output and processing continues.
#[derive(Debug)]
pub enum Error {
    IO(IOError, PathBuf),
    JsonParse(JsonError, PathBuf),
    NotAMap(PathBuf),
    Pattern(RegexError, String),
    Evaluation(String, String),
    ExtraContext(JsonError, String),
    Circular(PathBuf),
    Verification(PathBuf),
}

impl Display for Error {
    fn fmt(&self, fmtr: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::IO(e, p) => fmtr.write_fmt(format_args!("IO error in {:?} {:?}", p, e)),
            Self::JsonParse(e, p) => fmtr.write_fmt(format_args!("Json error in {:?} {:?}", p, e)),
            Self::NotAMap(p) => fmtr.write_fmt(
                format_args!("Context at {:?} was not a json object", p)
            ),
            Self::Pattern(e, src) => fmtr.write_fmt(
                format_args!("Directive pattern {:?} failed to compile {:?}", src, e)
            ),
            Self::Evaluation(detail, expr) => fmtr.write_fmt(
                format_args!("{} in test expression {:?}", detail, expr)
            ),
            Self::ExtraContext(e, blob) => fmtr.write_fmt(
                format_args!("Inline context {:?} failed to parse {:?}", blob, e)
            ),
            Self::Circular(p) => fmtr.write_fmt(
                format_args!("Inclusion of {:?} re-enters a file already being expanded", p)
            ),
            Self::Verification(p) => fmtr.write_fmt(
                format_args!("Content of {:?} was rejected by read-only verification", p)
            ),
        }
    }
}

impl StdError for Error {}

/// The result type for the Sigil Preprocessor.
pub type Result<T> = StdResult<T, Error>;
