use crate::app::ByteSource;
use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// How long a lone ESC waits for the rest of an escape sequence.
const ESCAPE_GRACE: Duration = Duration::from_millis(30);

static RAW_MODE: AtomicBool = AtomicBool::new(false);
static ALT_SCREEN: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),
}

pub fn enter_raw_mode() -> io::Result<()> {
    enable_raw_mode()?;
    RAW_MODE.store(true, Ordering::SeqCst);
    Ok(())
}

pub fn leave_raw_mode() -> io::Result<()> {
    if RAW_MODE.swap(false, Ordering::SeqCst) {
        disable_raw_mode()?;
    }
    Ok(())
}

fn enter_alt_screen(out: &mut impl Write) -> io::Result<()> {
    execute!(out, EnterAlternateScreen, Hide)?;
    ALT_SCREEN.store(true, Ordering::SeqCst);
    Ok(())
}

fn leave_alt_screen(out: &mut impl Write) -> io::Result<()> {
    if ALT_SCREEN.swap(false, Ordering::SeqCst) {
        execute!(out, LeaveAlternateScreen)?;
    }
    execute!(out, Show)?;
    Ok(())
}

/// Puts the terminal back the way the shell expects it. Safe to call any
/// number of times from any exit path.
pub fn restore_terminal_state() -> io::Result<()> {
    let raw = leave_raw_mode();
    let screen = leave_alt_screen(&mut io::stdout());
    raw.and(screen)
}

/// Reports a restore failure to stderr and the log; nothing else can be done.
pub fn report_restore_error(error: &io::Error) {
    error!(%error, "failed to restore terminal");
    let mut err = io::stderr().lock();
    let _ = writeln!(err, "gitdeck: failed to restore terminal: {error}");
}

/// Restores the terminal before the default panic message is printed.
pub fn install_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if let Err(error) = restore_terminal_state() {
            report_restore_error(&error);
        }
        default_hook(info);
    }));
}

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Owns raw mode and the alternate screen for the console's lifetime.
pub struct TerminalSession {
    terminal: Tui,
}

impl TerminalSession {
    pub fn enter() -> Result<Self, TerminalError> {
        enter_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(error) = enter_alt_screen(&mut stdout) {
            let _ = restore_terminal_state();
            return Err(error.into());
        }
        let terminal = match Terminal::new(CrosstermBackend::new(stdout)) {
            Ok(terminal) => terminal,
            Err(error) => {
                let _ = restore_terminal_state();
                return Err(error.into());
            }
        };
        Ok(Self { terminal })
    }

    pub fn draw(&mut self, render: impl FnOnce(&mut Frame)) -> Result<(), TerminalError> {
        self.terminal.draw(render)?;
        Ok(())
    }

    /// Hands the terminal back to the shell until the guard is dropped.
    pub fn suspend(&mut self) -> Result<SuspendGuard<'_>, TerminalError> {
        leave_alt_screen(self.terminal.backend_mut())?;
        leave_raw_mode()?;
        Ok(SuspendGuard { session: self })
    }

    pub fn restore(&mut self) -> Result<(), TerminalError> {
        restore_terminal_state()?;
        Ok(())
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if let Err(error) = restore_terminal_state() {
            report_restore_error(&error);
        }
    }
}

pub struct SuspendGuard<'a> {
    session: &'a mut TerminalSession,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        let terminal = &mut self.session.terminal;
        if let Err(error) = enter_raw_mode() {
            error!(%error, "failed to re-enter raw mode");
        }
        if let Err(error) = enter_alt_screen(terminal.backend_mut()) {
            error!(%error, "failed to re-enter alternate screen");
        }
        let _ = terminal.clear();
    }
}

/// Raw stdin, one byte per read.
#[derive(Debug)]
pub struct StdinSource {
    fd: RawFd,
    pushed: Option<u8>,
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            fd: io::stdin().as_raw_fd(),
            pushed: None,
        }
    }

    /// Waits up to `timeout` for input. `Ok(false)` means the wait timed out.
    pub fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        if self.pushed.is_some() {
            return Ok(true);
        }
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let mut poll_fd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let ready = unsafe { libc::poll(&mut poll_fd as *mut libc::pollfd, 1, millis) };
        if ready < 0 {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(error);
        }
        Ok(ready > 0 && poll_fd.revents & (libc::POLLIN | libc::POLLHUP) != 0)
    }
}

impl ByteSource for StdinSource {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(byte) = self.pushed.take() {
            return Ok(Some(byte));
        }
        let mut byte = 0u8;
        loop {
            let n = unsafe { libc::read(self.fd, (&mut byte as *mut u8).cast(), 1) };
            if n < 0 {
                let error = io::Error::last_os_error();
                if error.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(error);
            }
            return Ok((n > 0).then_some(byte));
        }
    }

    fn has_pending(&mut self) -> bool {
        self.wait_readable(ESCAPE_GRACE).unwrap_or(false)
    }

    fn unread(&mut self, byte: u8) {
        self.pushed = Some(byte);
    }
}
