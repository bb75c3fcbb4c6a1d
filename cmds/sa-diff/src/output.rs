//! Report rendering.
//!
//! Every section is a `name :` header followed by the indented document and a
//! blank line. Documents are rendered as pretty JSON or YAML, the patch is
//! always compact JSON.

use std::io::{self, ErrorKind, IsTerminal, Write};

use clap::ValueEnum;
use nu_ansi_term::{Color, Style};
use sa_reconcile::Reconciliation;
use serde::Deserialize;
use serde_json::Value;
use similar::TextDiff;
use thiserror::Error;
use tracing::instrument;

const INDENT: &str = "    ";

#[derive(Debug, Error)]
pub enum OutputError {
	#[error("writing report")]
	Write(#[from] io::Error),

	#[error("rendering document as json")]
	Json(#[from] serde_json::Error),

	#[error("rendering document as yaml")]
	Yaml(#[from] serde_yaml::Error),
}

/// When to use ANSI colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
	/// Only when stdout is a terminal
	#[default]
	Auto,
	Always,
	Never,
}

impl ColorMode {
	pub fn should_colorize(self) -> bool {
		match self {
			ColorMode::Auto => std::io::stdout().is_terminal(),
			ColorMode::Always => true,
			ColorMode::Never => false,
		}
	}
}

/// How documents are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
	#[default]
	Json,
	Yaml,
}

pub struct ReportWriter<W: Write> {
	writer: W,
	use_color: bool,
	format: OutputFormat,
}

impl<W: Write> ReportWriter<W> {
	pub fn new(writer: W, color_mode: ColorMode, format: OutputFormat) -> Self {
		Self {
			writer,
			use_color: color_mode.should_colorize(),
			format,
		}
	}

	/// Write both normalized objects, the comparison result, and the desired
	/// object if there is one. With `show_diff` the desired object is followed
	/// by a unified diff against the in-cluster one.
	#[instrument(skip_all, fields(equal = reconciliation.equal))]
	pub fn write_comparison(
		&mut self,
		reconciliation: &Reconciliation,
		show_diff: bool,
	) -> Result<(), OutputError> {
		self.write_document("incluster", &reconciliation.incluster)?;
		self.write_document("backup", &reconciliation.backup)?;

		writeln!(
			self.writer,
			"In-cluster and backup are equal: {}",
			reconciliation.equal
		)?;
		writeln!(self.writer)?;

		if let Some(desired) = &reconciliation.desired {
			self.write_document("desired", desired)?;
			if show_diff {
				self.write_diff(&reconciliation.incluster, desired)?;
			}
		}

		Ok(())
	}

	pub fn write_patch(&mut self, patch: &Value) -> Result<(), OutputError> {
		self.write_header("three-way merge patch")?;
		writeln!(self.writer, "{INDENT}{}", serde_json::to_string(patch)?)?;
		writeln!(self.writer)?;
		Ok(())
	}

	fn render(&self, value: &Value) -> Result<String, OutputError> {
		Ok(match self.format {
			OutputFormat::Json => serde_json::to_string_pretty(value)?,
			OutputFormat::Yaml => serde_yaml::to_string(value)?,
		})
	}

	fn write_header(&mut self, name: &str) -> Result<(), OutputError> {
		let header = format!("{name} :");
		if self.use_color {
			writeln!(self.writer, "{}", Style::new().bold().paint(header))?;
		} else {
			writeln!(self.writer, "{header}")?;
		}
		Ok(())
	}

	fn write_document(&mut self, name: &str, value: &Value) -> Result<(), OutputError> {
		let rendered = self.render(value)?;
		self.write_header(name)?;
		for line in rendered.lines() {
			writeln!(self.writer, "{INDENT}{line}")?;
		}
		writeln!(self.writer)?;
		Ok(())
	}

	fn write_diff(&mut self, incluster: &Value, desired: &Value) -> Result<(), OutputError> {
		let old = self.render(incluster)?;
		let new = self.render(desired)?;
		let diff = TextDiff::from_lines(&old, &new)
			.unified_diff()
			.context_radius(3)
			.header("a/incluster", "b/desired")
			.to_string();

		self.write_header("diff")?;
		for line in diff.lines() {
			if !self.use_color {
				writeln!(self.writer, "{line}")?;
				continue;
			}
			let style = if line.starts_with("---") || line.starts_with("+++") {
				Style::new().bold()
			} else if line.starts_with("@@") {
				Style::new().fg(Color::Cyan)
			} else if line.starts_with('-') {
				Style::new().fg(Color::Red)
			} else if line.starts_with('+') {
				Style::new().fg(Color::Green)
			} else {
				Style::new()
			};
			writeln!(self.writer, "{}", style.paint(line))?;
		}
		writeln!(self.writer)?;
		Ok(())
	}
}

/// A writer wrapper that silently handles broken pipe errors, so that
/// `sa-diff | head` exits cleanly.
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.inner.write(buf) {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(buf.len()),
			other => other,
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self.inner.flush() {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
			other => other,
		}
	}
}
