//! File handling utilities for the Sigil Preprocessor.
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
    crate::error::{
        Error,
        Result,
    },
    std::{
        fs::{
            read_to_string,
            write as write_bytes,
        },
        path::Path,
    },
};

/// Read a file into memory with line endings normalized to `\n` and no
/// trailing line break.
pub(crate)
fn read_file<P: AsRef<Path>>(p: P) -> Result<String> {
    let content = read_to_string(&p).map_err(|e| Error::IO(e, p.as_ref().into()))?;

    let mut output = String::with_capacity(content.len());
    let mut dlim = "";
    for line in content.lines() {
        output.push_str(dlim);
        output.push_str(line);
        dlim = "\n";
    }

    Ok(output)
}

/// The file-type tag of a path: its final extension, lowercased. A path
/// with no extension yields an empty tag, which falls back to the html
/// dialect at lookup.
pub(crate)
fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// The I/O capability the engine resolves inclusions through. Swapping
/// the implementation keeps the engine itself free of file-system state.
pub
trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, contents: &str) -> Result<()>;
}

/// The on-disk file system.
#[derive(Clone, Copy, Debug, Default)]
pub
struct DiskFs;

impl FileSystem for DiskFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> Result<String> {
        read_file(path)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        write_bytes(path, contents).map_err(|e| Error::IO(e, path.into()))
    }
}
