//! CLI - reedline-based REPL interface
//!
//! Each `p` is one render tick; `u` (or `pause` on an attached process) is
//! an update tick. Rows changed on the last tick print bold, recently
//! changed rows print dim yellow while their highlight fades.

use anyhow::Result;
use colored::Colorize;
use reedline::{Prompt, PromptHistorySearch, PromptHistorySearchStatus, Reedline, Signal};
use std::borrow::Cow;
use std::time::Instant;

use crate::app::{parse_command, WatchCommand, WatchSession};
use crate::core::{Debugger, TargetState};
use crate::present::{highlight, RecordingSurface, Row};

/// Prompt showing the target state and the render tick count
pub struct WatchPrompt {
    state: TargetState,
    ticks: u64,
}

impl WatchPrompt {
    pub fn new() -> Self {
        Self {
            state: TargetState::Detached,
            ticks: 0,
        }
    }

    pub fn set_state(&mut self, state: TargetState) {
        self.state = state;
    }

    pub fn set_ticks(&mut self, ticks: u64) {
        self.ticks = ticks;
    }
}

impl Default for WatchPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompt for WatchPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        let status = match self.state {
            TargetState::Detached => "---",
            TargetState::Stopped => "stp",
            TargetState::Running => "run",
        };
        Cow::Owned(format!("[{}:{}]", status, self.ticks))
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "(failed) ",
        };
        Cow::Owned(format!("(search: {}{}) ", prefix, history_search.term))
    }
}

/// REPL state: the session plus what the REPL owns around it
pub struct Repl {
    session: WatchSession,
    surface: RecordingSurface,
    debugger: Option<Debugger>,
    clock: Instant,
    ticks: u64,
}

impl Repl {
    pub fn new(session: WatchSession, debugger: Option<Debugger>) -> Self {
        Self {
            session,
            surface: RecordingSurface::new(),
            debugger,
            clock: Instant::now(),
            ticks: 0,
        }
    }

    fn now(&self) -> u64 {
        self.clock.elapsed().as_millis() as u64
    }

    fn target_state(&self) -> TargetState {
        self.debugger
            .as_ref()
            .map_or(TargetState::Detached, Debugger::state)
    }

    /// One render tick, returning the captured rows
    pub fn render(&mut self) -> Vec<Row> {
        let now = self.now();
        self.session.render_tick(now, &mut self.surface);
        self.ticks += 1;
        self.surface.take_rows()
    }

    /// Execute one command; returns false when the REPL should exit
    pub fn execute(&mut self, cmd: WatchCommand) -> bool {
        match cmd {
            WatchCommand::Print => {
                if self.session.schema().is_none() {
                    println!("{} No schema loaded (use --binary)", "[!]".red());
                    return true;
                }
                let rows = self.render();
                print_rows(&rows, self.session.config().fade_secs);
            }
            WatchCommand::Update => {
                self.session.update_tick();
                println!("[*] Update tick");
            }
            WatchCommand::Pause => match self.debugger.as_mut() {
                Some(debugger) => match debugger.pause() {
                    Ok(()) => {
                        self.session.update_tick();
                        println!("[*] Target stopped");
                    }
                    Err(e) => println!("{} {}", "[!]".red(), e),
                },
                None => println!("{} No process attached", "[!]".red()),
            },
            WatchCommand::Continue => match self.debugger.as_mut() {
                Some(debugger) => match debugger.resume() {
                    Ok(()) => println!("[*] Target running"),
                    Err(e) => println!("{} {}", "[!]".red(), e),
                },
                None => println!("{} No process attached", "[!]".red()),
            },
            WatchCommand::Filter(text) => {
                self.surface.set_global_filter(&text);
                if text.is_empty() {
                    println!("[*] Filter cleared");
                } else {
                    println!("[*] Filter: {}", text.green());
                }
            }
            WatchCommand::Toggle(path) => {
                let expanded = self.surface.toggle(&path);
                println!(
                    "[*] {} {}",
                    if expanded { "Expanded" } else { "Collapsed" },
                    path
                );
            }
            WatchCommand::ExpandAll => {
                let on = !self.session.expand_all();
                self.session.set_expand_all(on);
                println!("[*] Expand all: {}", if on { "on" } else { "off" });
            }
            WatchCommand::Retype {
                path,
                member,
                type_name,
            } => match self.session.retype(&path, &member, &type_name) {
                Ok(()) => println!("[*] {}/{} is now {}", path, member, type_name.green()),
                Err(e) => println!("{} {}", "[!]".red(), e),
            },
            WatchCommand::ClearDirectives(path) => {
                self.session.clear_directives(&path);
                println!("[*] Directives on {} cleared", path);
            }
            WatchCommand::Stats => print_stats(&self.session),
            WatchCommand::Help => print_help(),
            WatchCommand::Quit => {
                println!("[*] Shutting down...");
                return false;
            }
            WatchCommand::Unknown(input) => {
                println!("{} Unknown command: '{}'", "[!]".red(), input);
                println!("    Type '?' for help");
            }
        }
        true
    }

    pub fn session(&self) -> &WatchSession {
        &self.session
    }

    /// Detach from the target, leaving it running
    pub fn shutdown(&mut self) {
        if let Some(debugger) = self.debugger.as_mut() {
            if let Err(e) = debugger.detach() {
                log::warn!("{}", e);
            }
        }
    }
}

/// Print captured rows as an indented tree
pub fn print_rows(rows: &[Row], fade_secs: f32) {
    for row in rows {
        let marker = match (row.container, row.expanded) {
            (true, true) => "v ",
            (true, false) => "> ",
            _ => "  ",
        };
        let line = format!(
            "{}{}{} = {}",
            "  ".repeat(row.depth),
            marker,
            row.label,
            row.value
        );
        let line = if row.fresh {
            line.yellow().bold()
        } else if highlight(row.age, fade_secs) > 0.0 {
            line.yellow()
        } else {
            line.normal()
        };
        println!("{}  {}", line, format!("{} @ {:#x}", row.type_name, row.address).dimmed());
    }
}

fn print_stats(session: &WatchSession) {
    let stats = session.cache_stats();
    println!("{}", "Cache".bold().yellow());
    println!("  resident pages   {}", session.resident_pages());
    println!("  reader calls     {}", stats.reader_calls);
    println!("  pages fetched    {}", stats.pages_fetched);
    println!("  swaps            {}", stats.swaps);
    println!("  read errors      {}", stats.read_errors);
    println!("{}", "History".bold().yellow());
    println!("  records          {}", session.history_len());
}

/// Print the help message
fn print_help() {
    println!("{}", "memwatch Commands".bold().cyan());
    println!("{}", "═".repeat(50).cyan());

    println!("\n{}", "Watching:".bold().yellow());
    println!("  {}               Render tick (print the tree)", "p".green());
    println!("  {}               Update tick (target changed)", "u".green());
    println!("  {}        Filter names (no text clears)", "f <text>".green());
    println!("  {}        Collapse/expand a container", "x <path>".green());
    println!("  {}              Toggle expand-all", "ea".green());

    println!("\n{}", "Target:".bold().yellow());
    println!("  {}           Stop the process and update", "pause".green());
    println!("  {}               Resume the process", "c".green());

    println!("\n{}", "Types:".bold().yellow());
    println!(
        "  {}  Retype a struct member",
        "retype <path> <member> <type>".green()
    );
    println!("  {}  Drop retypes on a path", "unretype <path>".green());

    println!("\n{}", "Other:".bold().yellow());
    println!("  {}           Cache and history counters", "stats".green());
    println!("  {}               Show this help", "?".green());
    println!("  {}               Quit", "q".green());
}

/// Run the CLI REPL
pub fn run_cli(session: WatchSession, debugger: Option<Debugger>) -> Result<()> {
    let mut line_editor = Reedline::create();
    let mut prompt = WatchPrompt::new();
    let mut repl = Repl::new(session, debugger);

    println!(
        "{}",
        "╔══════════════════════════════════════════════════════════════╗".cyan()
    );
    println!(
        "{}",
        "║  memwatch - Type '?' for help, 'q' to quit                   ║".cyan()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════════════╝".cyan()
    );

    loop {
        prompt.set_state(repl.target_state());
        prompt.set_ticks(repl.ticks);

        let sig = line_editor.read_line(&prompt)?;
        match sig {
            Signal::Success(buffer) => {
                let input = buffer.trim();
                if input.is_empty() {
                    continue;
                }
                if !repl.execute(parse_command(input)) {
                    break;
                }
            }
            Signal::CtrlD | Signal::CtrlC => {
                println!("\n[*] Interrupted");
                break;
            }
        }
    }

    repl.shutdown();
    Ok(())
}
