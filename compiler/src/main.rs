//! The command-line driver for the Sigil Preprocessor.
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
    clap::Parser,
    std::{
        path::PathBuf,
        process::exit as pexit,
    },
    sigil_core::{
        Context,
        DialectTable,
        Engine,
        Error,
        Options,
        Result,
    },
    tracing_subscriber::EnvFilter,
};

/// Resolve text directives in a source document ahead of a build step.
#[derive(Parser)]
#[command(name = "sigc", version)]
struct Cli {
    /// Source document.
    src: PathBuf,

    /// Destination path for the expanded output.
    dest: PathBuf,

    /// Json file holding the initial context object.
    #[arg(long)]
    context: Option<PathBuf>,

    /// Seed the context from the process environment.
    #[arg(long)]
    env: bool,

    /// Extra context entries.
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE")]
    defines: Vec<String>,

    /// Json file holding a custom dialect table.
    #[arg(long)]
    dialects: Option<PathBuf>,

    /// Skip the plain-include pass.
    #[arg(long)]
    ignore_include: bool,

    /// Keep unresolved {{token}} text in the output.
    #[arg(long)]
    keep_tokens: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("{e}");
        match e {
            // verification rejection carries its own exit status so
            // content gates can be told apart from plain failures
            Error::Verification(_) => pexit(2),
            _ => pexit(1),
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut context = if cli.env {
        Context::from_env()
    }
    else {
        Context::new()
    };

    if let Some(path) = &cli.context {
        context.read_in(path)?;
    }

    for define in &cli.defines {
        let (key, value) = define.split_once('=').unwrap_or((define.as_str(), ""));
        context.set(key, value);
    }

    let engine = match &cli.dialects {
        Some(path) => Engine::with_dialects(DialectTable::read(path)?),
        None => Engine::new(),
    };

    let options = Options {
        ignore_include: cli.ignore_include,
        keep_unresolved_tokens: cli.keep_tokens,
        ..Options::default()
    };

    engine.process_file(&cli.src, &cli.dest, &context, &options)
}
