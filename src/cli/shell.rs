//! Line-oriented interactive session. It is the render layer for a
//! [`Workspace`]: every command reads a fresh snapshot and prints from it.

use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::time::Instant;

use anyhow::{bail, Context, Result};

use crate::app::{TickReport, Workspace, WorkspaceSnapshot};
use crate::repo::NoteId;
use crate::text;

use super::commands::{format_timestamp, plural};

const HELP: &str = "\
commands:
  ls              list categories and numbered notes
  mkcat <name>    create a category
  rmcat <name>    delete a category and its notes (asks first)
  new <category>  create a note and open it
  rm <n>          delete note number n (asks first)
  open <n>        open note number n in a tab
  close <t>       close tab t
  switch <t>      activate tab t
  type <html>     replace the active note's body
  show            print the active note
  tabs            print the tab strip
  help            show this help
  quit            save pending changes and exit
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// A deletion waiting for the user's answer on the next line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingDelete {
    Category(String),
    Note(NoteId),
}

pub struct Shell<'a> {
    workspace: &'a mut Workspace,
    pending_delete: Option<PendingDelete>,
}

impl<'a> Shell<'a> {
    pub fn new(workspace: &'a mut Workspace) -> Self {
        Self {
            workspace,
            pending_delete: None,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &*self.workspace
    }

    pub fn execute(&mut self, line: &str) -> Result<(Flow, String)> {
        self.execute_at(line, Instant::now())
    }

    /// Fires due debounced work, then runs one command line.
    pub fn execute_at(&mut self, line: &str, now: Instant) -> Result<(Flow, String)> {
        let mut out = String::new();
        let report = self.workspace.tick_at(now)?;
        describe_tick(&mut out, &report);

        let line = line.trim();
        if let Some(pending) = self.pending_delete.take() {
            if matches!(line, "y" | "Y" | "yes" | "YES") {
                self.delete(pending, &mut out)?;
            } else {
                out.push_str("not deleted\n");
            }
            return Ok((Flow::Continue, out));
        }

        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        match command {
            "" => {}
            "ls" => out.push_str(&render_tree(&self.workspace.snapshot())),
            "mkcat" => {
                require_arg("mkcat <name>", rest)?;
                self.workspace.create_category(rest)?;
                let _ = writeln!(&mut out, "created category '{rest}'");
            }
            "rmcat" => {
                require_arg("rmcat <name>", rest)?;
                let Some(notes) = self.workspace.list_notes_in(rest) else {
                    bail!("category '{rest}' not found");
                };
                let _ = writeln!(
                    &mut out,
                    "delete category '{rest}' and its {} note{}? [y/N]",
                    notes.len(),
                    plural(notes.len())
                );
                self.pending_delete = Some(PendingDelete::Category(rest.to_string()));
            }
            "new" => {
                require_arg("new <category>", rest)?;
                let id = self.workspace.create_note(rest)?;
                let _ = writeln!(&mut out, "created '{id}'");
            }
            "rm" => {
                let id = self.note_by_number(rest)?;
                let _ = writeln!(&mut out, "delete '{id}'? [y/N]");
                self.pending_delete = Some(PendingDelete::Note(id));
            }
            "open" => {
                let id = self.note_by_number(rest)?;
                self.workspace.open(&id)?;
            }
            "close" => {
                let id = self.tab_by_number(rest)?;
                self.workspace.close(&id);
            }
            "switch" => {
                let id = self.tab_by_number(rest)?;
                self.workspace.activate(&id)?;
            }
            "type" => {
                require_arg("type <html>", rest)?;
                if !self.workspace.edit_active_at(rest, now)? {
                    out.push_str("no active tab; open a note first\n");
                }
            }
            "show" => out.push_str(&render_editor(&self.workspace.snapshot())),
            "tabs" => {}
            "help" | "?" => out.push_str(HELP),
            "quit" | "exit" | "q" => {
                out.push_str(&self.finish()?);
                return Ok((Flow::Quit, out));
            }
            other => bail!("unknown command '{other}' (try 'help')"),
        }
        Ok((Flow::Continue, out))
    }

    /// Drops an unanswered deletion and runs all pending debounced work.
    pub fn finish(&mut self) -> Result<String> {
        self.pending_delete = None;
        let mut out = String::new();
        let report = self.workspace.flush()?;
        describe_tick(&mut out, &report);
        Ok(out)
    }

    fn delete(&mut self, pending: PendingDelete, out: &mut String) -> Result<()> {
        match pending {
            PendingDelete::Category(name) => {
                let removed = self.workspace.delete_category(&name)?;
                let _ = writeln!(
                    out,
                    "deleted category '{name}' ({} note{})",
                    removed.len(),
                    plural(removed.len())
                );
            }
            PendingDelete::Note(id) => {
                self.workspace.delete_note(&id)?;
                let _ = writeln!(out, "deleted '{id}'");
            }
        }
        Ok(())
    }

    fn note_by_number(&self, arg: &str) -> Result<NoteId> {
        let notes = self.workspace.snapshot().note_ids();
        let index = parse_number(arg, notes.len(), "note")?;
        Ok(notes[index].clone())
    }

    fn tab_by_number(&self, arg: &str) -> Result<NoteId> {
        let tabs = self.workspace.list_open_tabs();
        let index = parse_number(arg, tabs.len(), "tab")?;
        Ok(tabs[index].clone())
    }
}

pub fn run_interactive(workspace: &mut Workspace) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut shell = Shell::new(workspace);
    writeln!(stdout, "type 'help' for commands")?;

    let mut line = String::new();
    loop {
        write!(stdout, "journal> ")?;
        stdout.flush()?;
        line.clear();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("reading command")?;
        if read == 0 {
            // EOF behaves like quit so piped sessions still save.
            write!(stdout, "{}", shell.finish()?)?;
            return Ok(());
        }
        match shell.execute(&line) {
            Ok((Flow::Quit, out)) => {
                write!(stdout, "{out}")?;
                return Ok(());
            }
            Ok((Flow::Continue, out)) => write!(stdout, "{out}")?,
            Err(err) => writeln!(stdout, "error: {err:#}")?,
        }
        writeln!(stdout, "{}", render_tabs(&shell.workspace().snapshot()))?;
    }
}

/// One line with every open tab; the active one is bracketed.
pub fn render_tabs(snapshot: &WorkspaceSnapshot) -> String {
    if snapshot.tabs.is_empty() {
        return "(no open tabs)".to_string();
    }
    snapshot
        .tabs
        .iter()
        .enumerate()
        .map(|(index, tab)| {
            if tab.active {
                format!("[{}:{}]", index + 1, tab.title())
            } else {
                format!(" {}:{} ", index + 1, tab.title())
            }
        })
        .collect::<Vec<_>>()
        .join("|")
}

pub fn render_tree(snapshot: &WorkspaceSnapshot) -> String {
    if snapshot.tree.is_empty() {
        return "(no categories)\n".to_string();
    }
    let mut out = String::new();
    let mut number = 0;
    for category in &snapshot.tree {
        let _ = writeln!(&mut out, "{}", category.name);
        if category.notes.is_empty() {
            let _ = writeln!(&mut out, "    (empty)");
        }
        for note in &category.notes {
            number += 1;
            let _ = writeln!(&mut out, "  {number:>2}. {note}");
        }
    }
    out
}

pub fn render_editor(snapshot: &WorkspaceSnapshot) -> String {
    let Some(editor) = &snapshot.editor else {
        return "(no active note)\n".to_string();
    };
    let mut out = String::new();
    let _ = writeln!(&mut out, "# {}", editor.id);
    if let Some(created) = editor.created_at {
        let _ = writeln!(&mut out, "created {}", format_timestamp(created));
    }
    let _ = writeln!(
        &mut out,
        "{} character{}, {} line{}",
        editor.stats.chars,
        plural(editor.stats.chars),
        editor.stats.lines,
        plural(editor.stats.lines)
    );
    out.push('\n');
    for line in text::plain_text(&editor.body).lines() {
        let _ = writeln!(&mut out, "{line}");
    }
    out
}

fn describe_tick(out: &mut String, report: &TickReport) {
    if let Some((from, to)) = &report.renamed {
        let _ = writeln!(out, "renamed '{from}' to '{to}'");
    }
}

fn require_arg(usage: &str, arg: &str) -> Result<()> {
    if arg.is_empty() {
        bail!("usage: {usage}");
    }
    Ok(())
}

/// Parses a 1-based number shown to the user into an index below `len`.
fn parse_number(arg: &str, len: usize, what: &str) -> Result<usize> {
    let number: usize = arg
        .parse()
        .with_context(|| format!("expected a {what} number, got '{arg}'"))?;
    if number == 0 || number > len {
        bail!("no {what} numbered {number}");
    }
    Ok(number - 1)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::DebounceConfig;
    use crate::storage::MemoryStore;

    fn workspace() -> Workspace {
        Workspace::load(Box::new(MemoryStore::new()), &DebounceConfig::default())
    }

    fn run(shell: &mut Shell<'_>, line: &str, now: Instant) -> String {
        match shell.execute_at(line, now) {
            Ok((_, out)) => out,
            Err(err) => panic!("'{line}' failed: {err:#}"),
        }
    }

    #[test]
    fn typing_renames_active_tab_once_quiet() {
        let mut ws = workspace();
        let mut shell = Shell::new(&mut ws);
        let start = Instant::now();
        run(&mut shell, "mkcat Work", start);
        assert_eq!(run(&mut shell, "new Work", start), "created 'Work/Untitled 1'\n");
        run(&mut shell, "type <h1>Project Plan</h1><p>Milestones</p>", start);

        let early = run(&mut shell, "tabs", start + Duration::from_millis(100));
        assert_eq!(early, "");
        assert_eq!(render_tabs(&shell.workspace().snapshot()), "[1:Untitled 1]");

        let later = run(&mut shell, "show", start + Duration::from_millis(600));
        assert!(later.starts_with("renamed 'Work/Untitled 1' to 'Work/Project Plan'\n"));
        assert!(later.contains("# Work/Project Plan\n"));
        assert!(later.ends_with("\nProject Plan\nMilestones\n"));
        assert_eq!(render_tabs(&shell.workspace().snapshot()), "[1:Project Plan]");
    }

    #[test]
    fn numbered_notes_follow_tree_order() {
        let mut ws = workspace();
        let mut shell = Shell::new(&mut ws);
        let now = Instant::now();
        run(&mut shell, "mkcat Work", now);
        run(&mut shell, "mkcat Home", now);
        run(&mut shell, "new Home", now);
        run(&mut shell, "new Work", now);

        let tree = run(&mut shell, "ls", now);
        assert_eq!(tree, "Work\n   1. Untitled 1\nHome\n   2. Untitled 1\n");

        run(&mut shell, "close 1", now);
        run(&mut shell, "open 2", now);
        assert_eq!(shell.workspace().active(), Some(&NoteId::new("Home", "Untitled 1")));
    }

    #[test]
    fn switch_and_close_address_tabs_by_position() {
        let mut ws = workspace();
        let mut shell = Shell::new(&mut ws);
        let now = Instant::now();
        run(&mut shell, "mkcat Work", now);
        run(&mut shell, "new Work", now);
        run(&mut shell, "new Work", now);
        run(&mut shell, "new Work", now);
        assert_eq!(
            render_tabs(&shell.workspace().snapshot()),
            " 1:Untitled 1 | 2:Untitled 2 |[3:Untitled 3]"
        );

        run(&mut shell, "switch 2", now);
        run(&mut shell, "close 2", now);
        assert_eq!(
            render_tabs(&shell.workspace().snapshot()),
            "[1:Untitled 1]| 2:Untitled 3 "
        );
    }

    #[test]
    fn deletions_wait_for_confirmation() {
        let mut ws = workspace();
        let mut shell = Shell::new(&mut ws);
        let now = Instant::now();
        run(&mut shell, "mkcat Work", now);
        run(&mut shell, "new Work", now);
        run(&mut shell, "new Work", now);

        assert_eq!(run(&mut shell, "rm 1", now), "delete 'Work/Untitled 1'? [y/N]\n");
        assert_eq!(run(&mut shell, "ls", now), "not deleted\n");
        assert!(shell.workspace().contains(&NoteId::new("Work", "Untitled 1")));

        run(&mut shell, "rm 1", now);
        assert_eq!(run(&mut shell, "y", now), "deleted 'Work/Untitled 1'\n");
        assert!(!shell.workspace().contains(&NoteId::new("Work", "Untitled 1")));

        assert_eq!(
            run(&mut shell, "rmcat Work", now),
            "delete category 'Work' and its 1 note? [y/N]\n"
        );
        assert_eq!(run(&mut shell, "yes", now), "deleted category 'Work' (1 note)\n");
        assert_eq!(render_tabs(&shell.workspace().snapshot()), "(no open tabs)");
        assert!(shell.execute_at("rmcat Work", now).is_err());
    }

    #[test]
    fn finishing_discards_unanswered_deletion() {
        let mut ws = workspace();
        {
            let mut shell = Shell::new(&mut ws);
            let now = Instant::now();
            run(&mut shell, "mkcat Work", now);
            run(&mut shell, "rmcat Work", now);
            assert_eq!(shell.finish().expect("finish"), "");
        }
        assert_eq!(ws.list_categories(), vec!["Work"]);
    }

    #[test]
    fn bad_input_is_reported_not_fatal() {
        let mut ws = workspace();
        let mut shell = Shell::new(&mut ws);
        let now = Instant::now();
        assert!(shell.execute_at("frobnicate", now).is_err());
        assert!(shell.execute_at("open 1", now).is_err());
        assert!(shell.execute_at("switch x", now).is_err());
        assert!(shell.execute_at("mkcat", now).is_err());
        assert_eq!(
            run(&mut shell, "type <p>hello</p>", now),
            "no active tab; open a note first\n"
        );
        assert_eq!(run(&mut shell, "show", now), "(no active note)\n");
    }

    #[test]
    fn quit_flushes_pending_rename() {
        let mut ws = workspace();
        {
            let mut shell = Shell::new(&mut ws);
            let now = Instant::now();
            run(&mut shell, "mkcat Work", now);
            run(&mut shell, "new Work", now);
            run(&mut shell, "type <h1>Quick</h1>", now);
            let (flow, out) = shell.execute_at("quit", now).expect("quit");
            assert_eq!(flow, Flow::Quit);
            assert_eq!(out, "renamed 'Work/Untitled 1' to 'Work/Quick'\n");
        }
        assert!(!ws.has_pending_rename());
        assert!(!ws.has_pending_save());
    }
}
