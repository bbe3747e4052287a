use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::tty::IsTty;

use crate::model::tag::TagError;
use crate::ops::batch::Progress;
use crate::ops::rename::{MergeWarning, RenameUi};
use crate::util::unicode::truncate_to_width;

/// Set by the SIGINT handler while a progress line is shown
static CANCEL_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Terminal adapter for the rename flow: prompts on stderr, reads stdin.
pub struct TerminalUi {
    /// First answer to the name prompt, from the command line
    preset: Option<String>,
    assume_yes: bool,
    interactive: bool,
    show_progress: bool,
    /// Notices go to stderr so stdout stays machine-readable
    notices_to_stderr: bool,
}

impl TerminalUi {
    pub fn new(preset: Option<String>, assume_yes: bool, json: bool) -> Self {
        let interactive = io::stdin().is_tty();
        TerminalUi {
            preset,
            assume_yes,
            interactive,
            show_progress: io::stderr().is_tty(),
            notices_to_stderr: json,
        }
    }

    fn read_answer(&self, prompt: &str) -> Option<String> {
        eprint!("{}", prompt);
        let _ = io::stderr().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => {
                eprintln!();
                None
            }
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

impl RenameUi for TerminalUi {
    type Progress = TerminalProgress;

    fn prompt_new_name(&mut self, current: &str, rejected: Option<&TagError>) -> Option<String> {
        if let Some(reason) = rejected {
            eprintln!("invalid tag name: {}", reason);
        }
        if let Some(answer) = self.preset.take() {
            return Some(answer);
        }
        if !self.interactive {
            if rejected.is_none() {
                eprintln!("no new name given and stdin is not a terminal");
            }
            return None;
        }
        // An empty answer keeps the current name
        self.read_answer(&format!("New name for #{} [{}]: ", current, current))
            .map(|answer| if answer.trim().is_empty() { current.to_string() } else { answer })
    }

    fn confirm_irreversible_merge(&mut self, warning: &MergeWarning) -> bool {
        eprintln!("{}", warning);
        if self.assume_yes {
            return true;
        }
        if !self.interactive {
            eprintln!("re-run with --yes to merge");
            return false;
        }
        self.read_answer("Proceed? [y/N] ")
            .is_some_and(|a| matches!(a.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    fn show_progress(&mut self, title: &str, message: &str) -> TerminalProgress {
        TerminalProgress::start(title, message, self.show_progress)
    }

    fn notice(&mut self, text: &str) {
        if self.notices_to_stderr {
            eprintln!("{}", text);
        } else {
            println!("{}", text);
        }
    }
}

/// A single redrawn status line on stderr. Ctrl-C while it is shown
/// requests cancellation instead of killing the process.
pub struct TerminalProgress {
    title: String,
    visible: bool,
    closed: bool,
    previous_handler: Option<libc::sighandler_t>,
}

impl TerminalProgress {
    pub fn start(title: &str, message: &str, visible: bool) -> Self {
        CANCEL_REQUESTED.store(false, Ordering::SeqCst);
        let mut progress = TerminalProgress {
            title: title.to_string(),
            visible,
            closed: false,
            previous_handler: install_sigint_handler(),
        };
        progress.update_message(message);
        progress
    }

    fn draw(&self, text: &str) -> io::Result<()> {
        let width = terminal::size().map(|(w, _)| w as usize).unwrap_or(80);
        let line = truncate_to_width(text, width.saturating_sub(1));
        crossterm::execute!(
            io::stderr(),
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        )
    }
}

impl Progress for TerminalProgress {
    fn update_message(&mut self, text: &str) {
        if self.visible {
            let _ = self.draw(&format!("{}: {}", self.title, text));
        }
    }

    fn is_cancelled(&self) -> bool {
        CANCEL_REQUESTED.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.visible {
            let _ = crossterm::execute!(io::stderr(), MoveToColumn(0), Clear(ClearType::CurrentLine));
        }
        if let Some(previous) = self.previous_handler.take() {
            restore_sigint_handler(previous);
        }
    }
}

impl Drop for TerminalProgress {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(unix)]
extern "C" fn on_sigint(_signal: libc::c_int) {
    CANCEL_REQUESTED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_sigint_handler() -> Option<libc::sighandler_t> {
    let handler = on_sigint as extern "C" fn(libc::c_int);
    let previous = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
    if previous == libc::SIG_ERR {
        tracing::debug!("could not install SIGINT handler");
        None
    } else {
        Some(previous)
    }
}

#[cfg(unix)]
fn restore_sigint_handler(previous: libc::sighandler_t) {
    unsafe {
        libc::signal(libc::SIGINT, previous);
    }
}

#[cfg(not(unix))]
fn install_sigint_handler() -> Option<libc::sighandler_t> {
    None
}

#[cfg(not(unix))]
fn restore_sigint_handler(_previous: libc::sighandler_t) {}
