//! Path resolution for inclusion references.
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
        env::current_dir,
        path::{
            Component,
            Path,
            PathBuf,
        },
    },
};

/// Strip `.` segments and fold `..` into the preceding segment where one
/// exists.
pub(crate)
fn clean_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();

    for comp in path.as_ref().components() {
        match comp {
            Component::CurDir => {},
            Component::ParentDir => match out.last() {
                Some(Component::RootDir) => {},
                Some(Component::Normal(_)) => {
                    out.pop();
                },
                _ => out.push(comp),
            },
            comp => out.push(comp),
        }
    }

    if out.is_empty() {
        PathBuf::from(".")
    }
    else {
        out.iter().collect()
    }
}

/// Resolve an inclusion reference against its base directory into an
/// absolute, cleaned path. A missing base and a still-relative result
/// both anchor at the process working directory.
pub(crate)
fn resolve_reference(base: Option<&Path>, reference: &Path) -> Result<PathBuf> {
    let mut joined = if reference.is_absolute() {
        reference.to_owned()
    }
    else {
        let mut joined = base.map(Path::to_owned).unwrap_or_default();
        joined.push(reference);
        joined
    };

    if joined.is_relative() {
        let cwd = current_dir().map_err(|e| Error::IO(e, reference.into()))?;
        joined = cwd.join(joined);
    }

    Ok(clean_path(joined))
}
