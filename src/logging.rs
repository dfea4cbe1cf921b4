//! Logging prelude and subscriber setup.
//!
//! Every line goes to two sinks at once, stderr and an append-only log file,
//! formatted as `<timestamp> - <message>`.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Copying file: {} to {}", src.display(), dst.display());
//! error!("Error copying {}: {}", path.display(), err);
//! ```

pub use tracing::{debug, error, info, warn};

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::MirrorError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// `<timestamp> - <message>` line format shared by both sinks
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
	S: Subscriber + for<'a> LookupSpan<'a>,
	N: for<'a> FormatFields<'a> + 'static,
{
	fn format_event(
		&self,
		ctx: &FmtContext<'_, S, N>,
		mut writer: Writer<'_>,
		event: &Event<'_>,
	) -> fmt::Result {
		write!(writer, "{} - ", chrono::Local::now().format(TIMESTAMP_FORMAT))?;
		ctx.field_format().format_fields(writer.by_ref(), event)?;
		writeln!(writer)
	}
}

fn env_filter(level: &str) -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber.
///
/// `level` is the default filter; `RUST_LOG` overrides it:
///
/// ```bash
/// RUST_LOG=debug syncmirror --source a --replica b
/// RUST_LOG=syncmirror::reconcile=trace syncmirror --source a --replica b
/// ```
pub fn init_logging(log_file: Option<&Path>, level: &str) -> Result<(), MirrorError> {
	let stderr_layer = tracing_subscriber::fmt::layer()
		.event_format(LineFormat)
		.with_ansi(false)
		.with_writer(std::io::stderr);

	let file_layer = match log_file {
		Some(path) => {
			let file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(path)
				.map_err(|e| MirrorError::io(path, e))?;
			Some(
				tracing_subscriber::fmt::layer()
					.event_format(LineFormat)
					.with_ansi(false)
					.with_writer(Mutex::new(file)),
			)
		}
		None => None,
	};

	tracing_subscriber::registry()
		.with(env_filter(level))
		.with(stderr_layer)
		.with(file_layer)
		.try_init()
		.map_err(|e| MirrorError::config(format!("cannot install logger: {}", e)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io;
	use std::sync::Arc;
	use tracing_subscriber::fmt::MakeWriter;

	#[derive(Clone, Default)]
	struct Capture(Arc<Mutex<Vec<u8>>>);

	impl io::Write for Capture {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	impl<'a> MakeWriter<'a> for Capture {
		type Writer = Capture;

		fn make_writer(&'a self) -> Self::Writer {
			self.clone()
		}
	}

	#[test]
	fn test_line_format() {
		let capture = Capture::default();
		let subscriber = tracing_subscriber::registry().with(
			tracing_subscriber::fmt::layer()
				.event_format(LineFormat)
				.with_ansi(false)
				.with_writer(capture.clone()),
		);

		tracing::subscriber::with_default(subscriber, || {
			info!("Removing file: {}", "/replica/old.txt");
		});

		let out = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
		let line = out.lines().next().unwrap();
		let (ts, msg) = line.split_once(" - ").unwrap();
		assert_eq!(msg, "Removing file: /replica/old.txt");
		assert!(chrono::NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).is_ok(), "{}", ts);
		assert_eq!(out.lines().count(), 1);
	}
}

// vim: ts=4
