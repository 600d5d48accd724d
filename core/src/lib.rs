//! The directive-resolution engine for the Sigil Preprocessor.
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

mod context;
mod dialect;
mod engine;
mod error;
mod eval;
mod file;
mod path;
#[cfg(test)]
mod test;

pub use {
    context::{
        Context,
        FlatContext,
        MacroFn,
    },
    dialect::{
        Dialect,
        DialectSpec,
        DialectTable,
        PatternSpec,
    },
    engine::{
        Engine,
        Finalizer,
        InclusionProcessor,
        InclusionRule,
        Options,
        Verifier,
    },
    error::{
        Error,
        Result,
    },
    eval::evaluate,
    file::{
        DiskFs,
        FileSystem,
    },
};
