use std::fmt::Write as _;
use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::app::Workspace;
use crate::repo::NoteId;
use crate::text;

#[derive(Args, Debug, Clone)]
pub struct CategoryArgs {
    #[command(subcommand)]
    pub command: CategoryCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    /// Create an empty category
    Add(CategoryNameArgs),
    /// Delete a category together with all of its notes
    Rm(CategoryRmArgs),
    /// List categories with their note counts
    List,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryNameArgs {
    /// Category name (whitespace trimmed)
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryRmArgs {
    pub name: String,
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NoteArgs {
    #[command(subcommand)]
    pub command: NoteCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum NoteCommand {
    /// Create a note with the default name in a category
    New(NoteNewArgs),
    /// Delete a note
    Rm(NoteRmArgs),
    /// List notes, optionally restricted to one category
    List(NoteListArgs),
    /// Print a note as plain text
    Show(NoteShowArgs),
    /// Replace a note's body; the note is renamed after its first line
    Edit(NoteEditArgs),
}

#[derive(Args, Debug, Clone)]
pub struct NoteNewArgs {
    pub category: String,
}

#[derive(Args, Debug, Clone)]
pub struct NoteRefArgs {
    pub category: String,
    pub name: String,
}

impl NoteRefArgs {
    fn id(&self) -> NoteId {
        NoteId::new(self.category.as_str(), self.name.as_str())
    }
}

#[derive(Args, Debug, Clone)]
pub struct NoteRmArgs {
    #[command(flatten)]
    pub note: NoteRefArgs,
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NoteListArgs {
    pub category: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct NoteShowArgs {
    #[command(flatten)]
    pub note: NoteRefArgs,
    /// Print the stored HTML instead of the rendered text
    #[arg(long)]
    pub html: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NoteEditArgs {
    #[command(flatten)]
    pub note: NoteRefArgs,
    /// New HTML body. If omitted, reads from stdin.
    #[arg(long)]
    pub body: Option<String>,
}

pub fn handle_category_command(workspace: &mut Workspace, args: CategoryArgs) -> Result<()> {
    let output = match args.command {
        CategoryCommand::Add(args) => category_add(workspace, &args.name)?,
        CategoryCommand::Rm(args) => {
            let count = workspace
                .list_notes_in(&args.name)
                .map(<[String]>::len)
                .unwrap_or_default();
            if !args.yes
                && !confirm(&format!(
                    "Delete category '{}' and its {count} note{}?",
                    args.name,
                    plural(count)
                ))?
            {
                println!("Aborted.");
                return Ok(());
            }
            category_rm(workspace, &args.name)?
        }
        CategoryCommand::List => category_list(workspace),
    };
    print!("{output}");
    Ok(())
}

pub fn handle_note_command(workspace: &mut Workspace, args: NoteArgs) -> Result<()> {
    let output = match args.command {
        NoteCommand::New(args) => note_new(workspace, &args.category)?,
        NoteCommand::Rm(args) => {
            let id = args.note.id();
            if !args.yes && !confirm(&format!("Delete note '{id}'?"))? {
                println!("Aborted.");
                return Ok(());
            }
            note_rm(workspace, &id)?
        }
        NoteCommand::List(args) => note_list(workspace, args.category.as_deref())?,
        NoteCommand::Show(args) => note_show(workspace, &args.note.id(), args.html)?,
        NoteCommand::Edit(args) => {
            let body = match args.body {
                Some(body) => body,
                None => match read_stdin()? {
                    Some(body) => body,
                    None => bail!("no body given: pass --body or pipe HTML on stdin"),
                },
            };
            note_edit(workspace, &args.note.id(), &body)?
        }
    };
    print!("{output}");
    Ok(())
}

fn category_add(workspace: &mut Workspace, name: &str) -> Result<String> {
    workspace
        .create_category(name)
        .with_context(|| format!("creating category '{name}'"))?;
    Ok(format!("Created category '{}'\n", name.trim()))
}

fn category_rm(workspace: &mut Workspace, name: &str) -> Result<String> {
    let removed = workspace
        .delete_category(name)
        .with_context(|| format!("deleting category '{name}'"))?;
    Ok(format!(
        "Deleted category '{name}' (removed {} note{})\n",
        removed.len(),
        plural(removed.len())
    ))
}

fn category_list(workspace: &Workspace) -> String {
    let categories = workspace.list_categories();
    if categories.is_empty() {
        return "(no categories)\n".to_string();
    }
    let mut out = String::new();
    for name in categories {
        let count = workspace
            .list_notes_in(name)
            .map(<[String]>::len)
            .unwrap_or_default();
        let _ = writeln!(&mut out, "{name}  ({count} note{})", plural(count));
    }
    out
}

fn note_new(workspace: &mut Workspace, category: &str) -> Result<String> {
    let id = workspace
        .create_note(category)
        .with_context(|| format!("creating note in '{category}'"))?;
    Ok(format!("Created note '{id}'\n"))
}

fn note_rm(workspace: &mut Workspace, id: &NoteId) -> Result<String> {
    workspace
        .delete_note(id)
        .with_context(|| format!("deleting note '{id}'"))?;
    Ok(format!("Deleted note '{id}'\n"))
}

fn note_list(workspace: &Workspace, category: Option<&str>) -> Result<String> {
    let categories = match category {
        Some(name) => {
            if workspace.list_notes_in(name).is_none() {
                bail!("category '{name}' not found");
            }
            vec![name]
        }
        None => workspace.list_categories(),
    };
    let mut out = String::new();
    for name in categories {
        let _ = writeln!(&mut out, "{name}");
        let notes = workspace.list_notes_in(name).unwrap_or_default();
        if notes.is_empty() {
            let _ = writeln!(&mut out, "    (empty)");
        }
        for note in notes {
            let id = NoteId::new(name, note.as_str());
            let created = workspace
                .created_at(&id)
                .map(format_timestamp)
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(&mut out, "    {note}  [{created}]");
        }
    }
    Ok(out)
}

fn note_show(workspace: &Workspace, id: &NoteId, html: bool) -> Result<String> {
    let Some(body) = workspace.body(id) else {
        bail!("note '{id}' not found");
    };
    let mut out = String::new();
    let _ = writeln!(&mut out, "# {id}");
    if let Some(created) = workspace.created_at(id) {
        let _ = writeln!(&mut out, "created {}", format_timestamp(created));
    }
    if let Some(stats) = workspace.stats(id) {
        let _ = writeln!(
            &mut out,
            "{} character{}, {} line{}",
            stats.chars,
            plural(stats.chars),
            stats.lines,
            plural(stats.lines)
        );
    }
    out.push('\n');
    if html {
        let _ = writeln!(&mut out, "{body}");
    } else {
        for line in text::plain_text(body).lines() {
            let _ = writeln!(&mut out, "{line}");
        }
    }
    Ok(out)
}

/// Stores `body` and settles the rename right away instead of waiting out the
/// quiet period.
fn note_edit(workspace: &mut Workspace, id: &NoteId, body: &str) -> Result<String> {
    workspace
        .open(id)
        .with_context(|| format!("opening note '{id}'"))?;
    workspace.edit_active(body)?;
    let report = workspace.flush().context("saving edited note")?;
    Ok(match report.renamed {
        Some((from, to)) => format!("Updated '{from}', renamed to '{to}'\n"),
        None => format!("Updated '{id}'\n"),
    })
}

fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{question} [y/N]"))?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

pub(crate) fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

pub(crate) fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
