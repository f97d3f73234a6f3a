//! Colored terminal output for errors and warnings
//!
//! Progress lines are plain `println!`; only the messages the operator must
//! not miss go through the [`Reporter`].

use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Error color of the release messages (rgb 255,99,99)
const ERROR_COLOR: Color = Color::Rgb(255, 99, 99);

/// Writes emphasized messages to the terminal
#[derive(Debug)]
pub struct Reporter {
    stdout: BufferWriter,
    stderr: BufferWriter,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(ColorChoice::Auto)
    }
}

impl Reporter {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: BufferWriter::stdout(choice),
            stderr: BufferWriter::stderr(choice),
        }
    }

    /// Print an error message to stderr
    pub fn error(&self, message: &str) {
        let mut buffer = self.stderr.buffer();
        if write_error(&mut buffer, message).is_err() || self.stderr.print(&buffer).is_err() {
            eprintln!("❌ {}", message);
        }
    }

    /// Print a warning to stdout
    pub fn warn(&self, message: &str) {
        let mut buffer = self.stdout.buffer();
        if write_warning(&mut buffer, message).is_err() || self.stdout.print(&buffer).is_err() {
            println!("⚠️  {}", message);
        }
    }

    /// Print suggested follow-up actions
    pub fn suggestions(&self, actions: &[String]) {
        if actions.is_empty() {
            return;
        }
        println!("\n💡 Suggested actions:");
        for action in actions {
            println!("  - {}", action);
        }
    }
}

pub fn write_error<W: WriteColor>(out: &mut W, message: &str) -> std::io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(ERROR_COLOR)).set_bold(true))?;
    write!(out, "❌")?;
    out.set_color(ColorSpec::new().set_fg(Some(ERROR_COLOR)))?;
    writeln!(out, " {}", message)?;
    out.reset()
}

pub fn write_warning<W: WriteColor>(out: &mut W, message: &str) -> std::io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    write!(out, "⚠️ ")?;
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
    writeln!(out, " {}", message)?;
    out.reset()
}
