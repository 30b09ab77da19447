//! Terminal rendering of display entries for the CLI host

use crate::config::{FilterSource, ScopeFilterStatus};
use crate::format::DisplayEntry;
use crate::navigator::QueryResults;
use crate::query::PALETTE_SIZE;
use serde_json::json;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Keyword colors, indexed by palette position
const PALETTE: [Color; PALETTE_SIZE] = [
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::White,
];

pub fn palette_color(color_index: usize) -> Color {
    PALETTE[color_index % PALETTE_SIZE]
}

/// Print entries to stdout.
pub fn print_entries(entries: &[DisplayEntry], choice: ColorChoice) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(choice);
    write_entries(&mut stdout, entries)
}

/// One line per entry: header, then the text with matches colored.
pub fn write_entries<W: WriteColor>(out: &mut W, entries: &[DisplayEntry]) -> io::Result<()> {
    for entry in entries {
        write_header(out, entry)?;
        write_text(out, entry)?;
        if entry.hidden_spans > 0 {
            out.set_color(ColorSpec::new().set_dimmed(true))?;
            write!(out, "  (+{} hidden)", entry.hidden_spans)?;
            out.reset()?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_header<W: WriteColor>(out: &mut W, entry: &DisplayEntry) -> io::Result<()> {
    let header = &entry.header;
    if let Some(line) = header.line_number {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "{:>5}", line)?;
        out.reset()?;
        write!(out, " ")?;
    }
    out.set_color(ColorSpec::new().set_dimmed(true))?;
    write!(out, "#{:<3}", header.index)?;
    out.reset()?;
    if let Some(name) = &header.file_name {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(out, " {}", name)?;
        out.reset()?;
    }
    write!(out, "  ")
}

fn write_text<W: WriteColor>(out: &mut W, entry: &DisplayEntry) -> io::Result<()> {
    let text = &entry.text;
    let mut pos = 0;
    for span in &entry.spans {
        // Spans are sorted; guard against an overlap from a clipped span
        let start = span.start.max(pos).min(text.len());
        let end = span.end.min(text.len());
        if start >= end {
            continue;
        }
        write!(out, "{}", &text[pos..start])?;
        out.set_color(
            ColorSpec::new()
                .set_fg(Some(palette_color(span.color_index)))
                .set_bold(true),
        )?;
        write!(out, "{}", &text[start..end])?;
        out.reset()?;
        pos = end;
    }
    write!(out, "{}", &text[pos..])
}

/// Full results as a single JSON document.
pub fn write_json<W: Write>(out: &mut W, results: &QueryResults) -> io::Result<()> {
    let outcome = &results.outcome;
    let warnings: Vec<_> = outcome
        .warnings
        .iter()
        .map(|w| {
            json!({
                "path": w.path,
                "kind": w.kind.label(),
                "message": w.message,
            })
        })
        .collect();

    let document = json!({
        "scope": outcome.scope.name(),
        "keywords": outcome.keywords,
        "strategy": outcome.strategy(),
        "files": outcome.candidates,
        "cached": outcome.from_cache,
        "elapsed_ms": outcome.elapsed.as_millis() as u64,
        "entries": results.entries,
        "warnings": warnings,
    });
    serde_json::to_writer_pretty(&mut *out, &document)?;
    writeln!(out)
}

/// Effective extension filter state per scope.
pub fn write_filter_status<W: WriteColor>(out: &mut W, statuses: &[ScopeFilterStatus]) -> io::Result<()> {
    for status in statuses {
        write!(out, "{:<11}", status.scope.name())?;
        let (label, color) = if status.enabled {
            ("on", Color::Green)
        } else {
            ("off", Color::Red)
        };
        out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(out, "{:<4}", label)?;
        out.reset()?;
        let source = match status.source {
            FilterSource::Session => "session override",
            FilterSource::Scope => "scope setting",
            FilterSource::Inherited => "inherited from extension_filters",
            FilterSource::Never => "always searched unfiltered",
        };
        writeln!(out, "({})", source)?;
    }
    Ok(())
}
