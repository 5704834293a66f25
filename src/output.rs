//! Terminal formatting for search results and index statistics

use crate::engine::SearchResult;
use crate::index::StoreStats;
use crate::ontology::EntityKind;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Print search results, one entity per line.
pub fn print_results(results: &[SearchResult], color: bool) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);

    for result in results {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
        write!(stdout, "{}", result.display_name)?;
        stdout.reset()?;

        if let Some(kind) = result.kind {
            stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
            write!(stdout, "  [{}]", kind_tag(kind))?;
            stdout.reset()?;
        }

        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(stdout, "  {}", result.iri)?;
        stdout.reset()?;
        writeln!(stdout)?;

        if let Some(excerpt) = &result.excerpt {
            writeln!(stdout, "    {}", excerpt)?;
        }
    }

    if results.is_empty() {
        writeln!(stdout, "no matches")?;
    }

    Ok(())
}

/// Print live document counts by category.
pub fn print_stats(stats: &StoreStats) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    let rows = [
        ("declarations", stats.declarations),
        ("annotations", stats.annotations),
        ("restrictions", stats.restrictions),
        ("logical axioms", stats.logical),
    ];

    for (name, count) in rows {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(stdout, "{name:>16}")?;
        stdout.reset()?;
        write!(stdout, ": ")?;
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        writeln!(stdout, "{count}")?;
        stdout.reset()?;
    }

    stdout.set_color(ColorSpec::new().set_bold(true))?;
    write!(stdout, "{:>16}", "total")?;
    stdout.reset()?;
    write!(stdout, ": ")?;
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    writeln!(stdout, "{}", stats.total)?;
    stdout.reset()?;

    Ok(())
}

fn kind_tag(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Class => "class",
        EntityKind::ObjectProperty => "object property",
        EntityKind::DataProperty => "data property",
        EntityKind::AnnotationProperty => "annotation property",
        EntityKind::NamedIndividual => "individual",
        EntityKind::Datatype => "datatype",
    }
}
