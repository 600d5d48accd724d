//! Constant patterns for the built-in directive dialects.
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
    super::{
        DialectSpec,
        DialectTable,
        PatternSpec,
    },
    once_cell::sync::Lazy,
};

fn ready(src: &str) -> Option<PatternSpec> {
    Some(PatternSpec::Ready(src.to_owned()))
}

fn delimited(start: &str, end: &str) -> Option<PatternSpec> {
    Some(PatternSpec::Delimited {
        start: start.to_owned(),
        end: end.to_owned(),
    })
}

fn html() -> DialectSpec {
    DialectSpec {
        include: ready(r"(.*)<!--[ \t]*@include[ \t]*(\S*?)[ \t]*-->"),
        exclude: delimited(
            r"[ \t]*<!--[ \t]*@exclude[ \t]*(.*?)[ \t]*-->[ \t]*\r?\n?",
            r"[ \t]*<!--[ \t]*@endexclude[ \t]*-->[ \t]*\r?\n?",
        ),
        ifdef: delimited(
            r"[ \t]*<!--[ \t]*@ifdef[ \t]*(.*?)[ \t]*-->[ \t]*\r?\n?",
            r"[ \t]*<!--[ \t]*@endif[ \t]*-->[ \t]*\r?\n?",
        ),
        ifndef: delimited(
            r"[ \t]*<!--[ \t]*@ifndef[ \t]*(.*?)[ \t]*-->[ \t]*\r?\n?",
            r"[ \t]*<!--[ \t]*@endif[ \t]*-->[ \t]*\r?\n?",
        ),
        if_test: delimited(
            r"[ \t]*<!--[ \t]*@if[ \t]*(.*?)[ \t]*-->[ \t]*\r?\n?",
            r"[ \t]*<!--[ \t]*@endif[ \t]*-->[ \t]*\r?\n?",
        ),
        echo: ready(r"<!--[ \t]*@echo[ \t]*([^\n]*?)[ \t]*-->"),
        exec: ready(r"<!--[ \t]*@exec[ \t]*(\S+?)\(([^\n]*?)\)[ \t]*-->"),
        component: ready(r"(.*)<!--[ \t]*@component[ \t]+([\w.-]+)[ \t]*((?:.|\n|\r)*?)-->"),
    }
}

// js and css share the block-comment forms; the closing `*/` is what
// bounds the lazy test capture.
fn block_comment() -> DialectSpec {
    DialectSpec {
        include: ready(r"(.*)/\*[ \t]*@include[ \t]*(\S*?)[ \t]*\*/"),
        exclude: delimited(
            r"[ \t]*/\*[ \t]*@exclude[ \t]*(.*?)[ \t]*\*/[ \t]*\r?\n?",
            r"[ \t]*/\*[ \t]*@endexclude[ \t]*\*/[ \t]*\r?\n?",
        ),
        ifdef: delimited(
            r"[ \t]*/\*[ \t]*@ifdef[ \t]*(.*?)[ \t]*\*/[ \t]*\r?\n?",
            r"[ \t]*/\*[ \t]*@endif[ \t]*\*/[ \t]*\r?\n?",
        ),
        ifndef: delimited(
            r"[ \t]*/\*[ \t]*@ifndef[ \t]*(.*?)[ \t]*\*/[ \t]*\r?\n?",
            r"[ \t]*/\*[ \t]*@endif[ \t]*\*/[ \t]*\r?\n?",
        ),
        if_test: delimited(
            r"[ \t]*/\*[ \t]*@if[ \t]*(.*?)[ \t]*\*/[ \t]*\r?\n?",
            r"[ \t]*/\*[ \t]*@endif[ \t]*\*/[ \t]*\r?\n?",
        ),
        echo: ready(r"/\*[ \t]*@echo[ \t]*([^\n]*?)[ \t]*\*/"),
        exec: ready(r"/\*[ \t]*@exec[ \t]*(\S+?)\(([^\n]*?)\)[ \t]*\*/"),
        component: None,
    }
}

// line comments carry no closing delimiter, so the test capture runs
// greedily to end-of-line and block openers must sit on their own line
fn coffee() -> DialectSpec {
    DialectSpec {
        include: ready(r"(.*)#+[ \t]*@include[ \t]*(\S*?)[ \t]*$"),
        exclude: delimited(
            r"[ \t]*#+[ \t]*@exclude[ \t]*([^\n]*)\r?\n",
            r"[ \t]*#+[ \t]*@endexclude[ \t]*\r?\n?",
        ),
        ifdef: delimited(
            r"[ \t]*#+[ \t]*@ifdef[ \t]*([^\n]*)\r?\n",
            r"[ \t]*#+[ \t]*@endif[ \t]*\r?\n?",
        ),
        ifndef: delimited(
            r"[ \t]*#+[ \t]*@ifndef[ \t]*([^\n]*)\r?\n",
            r"[ \t]*#+[ \t]*@endif[ \t]*\r?\n?",
        ),
        if_test: delimited(
            r"[ \t]*#+[ \t]*@if[ \t]*([^\n]*)\r?\n",
            r"[ \t]*#+[ \t]*@endif[ \t]*\r?\n?",
        ),
        echo: ready(r"#+[ \t]*@echo[ \t]*([^\n]*?)[ \t]*$"),
        exec: ready(r"#+[ \t]*@exec[ \t]*(\S+?)\(([^\n]*?)\)[ \t]*$"),
        component: None,
    }
}

static TABLE: Lazy<DialectTable> = Lazy::new(|| {
    let mut table = DialectTable::empty();
    table.insert("html", html()).expect("built-in html dialect");
    table.insert("js", block_comment()).expect("built-in js dialect");
    table.insert("css", block_comment()).expect("built-in css dialect");
    table.insert("coffee", coffee()).expect("built-in coffee dialect");
    table
});

pub(super)
fn table() -> &'static DialectTable {
    &TABLE
}
