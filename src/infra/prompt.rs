use crate::app::{
    ByteSource, Decoded, Edit, KeyDecoder, LineEditor, PromptError, PromptReply, Prompter, TermOp,
};
use crate::domain::{Action, Context, ContextualKeyBindingMap, KeyStroke};
use crate::infra::terminal::{enter_raw_mode, leave_raw_mode};
use crossterm::cursor::{MoveLeft, MoveRight};
use crossterm::queue;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::error;

/// Reads placeholder values with the same line editor and bindings as the
/// search box.
pub struct TerminalPrompter<'a, W: Write> {
    source: &'a mut dyn ByteSource,
    decoder: KeyDecoder,
    bindings: Arc<ContextualKeyBindingMap>,
    out: W,
    echo: bool,
    manage_raw_mode: bool,
}

impl<'a, W: Write> TerminalPrompter<'a, W> {
    pub fn new(
        source: &'a mut dyn ByteSource,
        decoder: KeyDecoder,
        bindings: Arc<ContextualKeyBindingMap>,
        out: W,
    ) -> Self {
        Self {
            source,
            decoder,
            bindings,
            out,
            echo: true,
            manage_raw_mode: false,
        }
    }

    /// Switch the terminal to raw mode for the duration of each prompt.
    pub fn with_raw_mode(mut self) -> Self {
        self.manage_raw_mode = true;
        self
    }

    /// Leave echoing to the terminal (cooked or piped input).
    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Waits for Enter (or Esc) so output stays readable before the UI returns.
    pub fn wait_for_continue(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        write!(self.out, "{}", "Press Enter to return".dim())?;
        self.out.flush()?;
        loop {
            match self.decoder.next_key(self.source)? {
                Decoded::Eof => break,
                Decoded::Key(KeyStroke::Ctrl('m' | 'j' | 'c') | KeyStroke::Escape) => break,
                _ => {}
            }
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn read_value(&mut self, name: &str) -> Result<PromptReply, PromptError> {
        let mut editor = LineEditor::new();
        write!(self.out, "{} ", format!("{name}:").bold())?;
        self.out.flush()?;

        loop {
            let stroke = match self.decoder.next_key(self.source)? {
                Decoded::Eof => return Err(PromptError::Closed(name.to_string())),
                Decoded::Nothing => continue,
                Decoded::Key(stroke) => stroke,
            };

            if stroke == KeyStroke::Ctrl('c') {
                self.finish_line()?;
                return Ok(PromptReply::Cancelled);
            }

            let action = self.bindings.action_for(Context::Input, &stroke);
            let edit = match action {
                Some(Action::Submit) => {
                    self.finish_line()?;
                    return Ok(PromptReply::Value(editor.text().trim().to_string()));
                }
                Some(Action::SoftCancel) => {
                    self.finish_line()?;
                    return Ok(PromptReply::Cancelled);
                }
                Some(action) => match edit_for(action) {
                    Some(edit) => edit(&mut editor),
                    None => continue,
                },
                None => match stroke.printable_char() {
                    Some(ch) => editor.insert_char(ch),
                    None => continue,
                },
            };
            self.paint(&editor, &edit)?;
        }
    }

    fn paint(&mut self, editor: &LineEditor, edit: &Edit) -> io::Result<()> {
        if !self.echo || edit.is_noop() {
            return Ok(());
        }
        for op in editor.repaint(edit) {
            match op {
                TermOp::Left(columns) => queue!(self.out, MoveLeft(columns))?,
                TermOp::Right(columns) => queue!(self.out, MoveRight(columns))?,
                TermOp::Print(text) => queue!(self.out, Print(text))?,
                TermOp::ClearToEnd => queue!(self.out, Clear(ClearType::UntilNewLine))?,
            }
        }
        self.out.flush()
    }

    fn finish_line(&mut self) -> io::Result<()> {
        if self.echo {
            write!(self.out, "\r\n")?;
        }
        self.out.flush()
    }
}

fn edit_for(action: Action) -> Option<fn(&mut LineEditor) -> Edit> {
    let edit: fn(&mut LineEditor) -> Edit = match action {
        Action::MoveLeft => LineEditor::move_left,
        Action::MoveRight => LineEditor::move_right,
        Action::MoveWordLeft => LineEditor::move_word_left,
        Action::MoveWordRight => LineEditor::move_word_right,
        Action::MoveToBeginning => LineEditor::move_home,
        Action::MoveToEnd => LineEditor::move_end,
        Action::DeleteBackward => LineEditor::backspace,
        Action::DeleteWord => LineEditor::delete_word_left,
        Action::DeleteToEnd => LineEditor::delete_to_end,
        Action::ClearLine => LineEditor::clear,
        _ => return None,
    };
    Some(edit)
}

impl<W: Write> Prompter for TerminalPrompter<'_, W> {
    fn prompt(&mut self, name: &str) -> Result<PromptReply, PromptError> {
        if !self.manage_raw_mode {
            return self.read_value(name);
        }
        enter_raw_mode()?;
        let reply = self.read_value(name);
        if let Err(error) = leave_raw_mode() {
            error!(%error, "failed to leave raw mode after prompt");
        }
        reply
    }
}
