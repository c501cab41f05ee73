//! Stream route
//!
//! Writes the text transcript to stdout, stderr or a file as entries are
//! logged. Entries recorded before the stream opened are not replayed.

use super::text::TextFormatter;
use crate::core::{
    BootstrapContext, ConsoleError, EventKind, LogEntry, OutputContext, RenderScope, Result,
    Route, RouteBase, RouteConfig, Subscription, TimestampFormat,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamTarget {
    #[default]
    Stdout,
    Stderr,
    File(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    pub route: RouteConfig,
    pub target: StreamTarget,
    pub use_colors: bool,
}

impl StreamConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: StreamTarget::File(path.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.route = route;
        self
    }

    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
}

enum StreamWriter {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    File(File),
}

impl StreamWriter {
    fn open(target: &StreamTarget) -> Result<Self> {
        Ok(match target {
            StreamTarget::Stdout => StreamWriter::Stdout(io::stdout()),
            StreamTarget::Stderr => StreamWriter::Stderr(io::stderr()),
            StreamTarget::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| {
                        ConsoleError::io_operation(
                            "opening stream",
                            format!("cannot open {}", path.display()),
                            e,
                        )
                    })?;
                StreamWriter::File(file)
            }
        })
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        match self {
            StreamWriter::Stdout(out) => out.lock().write_all(buf.as_bytes())?,
            StreamWriter::Stderr(err) => err.lock().write_all(buf.as_bytes())?,
            StreamWriter::File(file) => write_locked(file, buf.as_bytes())?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            StreamWriter::Stdout(out) => out.flush()?,
            StreamWriter::Stderr(err) => err.flush()?,
            StreamWriter::File(file) => file.flush()?,
        }
        Ok(())
    }
}

/// Append under an exclusive lock so concurrent processes don't interleave lines
#[cfg(feature = "file")]
fn write_locked(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    use fs2::FileExt;

    file.lock_exclusive()?;
    let result = file.write_all(bytes);
    let unlocked = FileExt::unlock(&*file);
    result.and(unlocked)
}

#[cfg(not(feature = "file"))]
fn write_locked(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)
}

pub struct StreamRoute {
    base: RouteBase,
    target: StreamTarget,
    formatter: TextFormatter,
    writer: Option<StreamWriter>,
    request_line: Option<String>,
}

impl StreamRoute {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            base: RouteBase::new("stream", &config.route),
            target: config.target,
            formatter: TextFormatter::new(config.use_colors),
            writer: None,
            request_line: None,
        }
    }

    pub fn target(&self) -> &StreamTarget {
        &self.target
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Switch targets, reopening when it actually changed
    pub fn set_target(&mut self, target: StreamTarget) -> Result<()> {
        if target == self.target && self.writer.is_some() {
            return Ok(());
        }
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        self.target = target;
        self.open()
    }

    fn open(&mut self) -> Result<()> {
        let mut writer = StreamWriter::open(&self.target)?;
        if matches!(self.target, StreamTarget::File(_)) {
            let banner = match &self.request_line {
                Some(request) => {
                    format!("==== {} {} ====", TimestampFormat::Rfc3339.now(), request)
                }
                None => format!("==== {} ====", TimestampFormat::Rfc3339.now()),
            };
            writer.write_line(&banner)?;
        }
        self.formatter.reset();
        self.writer = Some(writer);
        Ok(())
    }

    fn writer(&mut self) -> Result<&mut StreamWriter> {
        if self.writer.is_none() {
            self.open()?;
        }
        self.writer
            .as_mut()
            .ok_or_else(|| ConsoleError::writer("stream not open"))
    }
}

impl Route for StreamRoute {
    fn base(&self) -> &RouteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RouteBase {
        &mut self.base
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![
            Subscription::new(EventKind::Bootstrap, 0),
            Subscription::new(EventKind::Log, 0),
            Subscription::output(),
        ]
    }

    fn on_bootstrap(&mut self, ctx: &BootstrapContext<'_>) -> Result<()> {
        self.request_line = Some(ctx.env.request_line());
        if self.writer.is_none() {
            self.open()?;
        }
        Ok(())
    }

    fn on_log(&mut self, entry: &LogEntry, scope: &RenderScope<'_>) -> Result<()> {
        // open before rendering so the banner precedes the first line
        self.writer()?;
        if let Some(line) = self.render_entry(entry, scope) {
            self.writer()?.write_line(&line)?;
        }
        Ok(())
    }

    fn process_log_entries(&mut self, _ctx: &mut OutputContext<'_>) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn process_log_entry(&mut self, entry: &LogEntry) -> Result<Option<String>> {
        Ok(self.formatter.format(entry))
    }
}

impl Drop for StreamRoute {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Console, StaticEnvironment, Value};
    use tempfile::TempDir;

    #[test]
    fn test_streams_in_real_time_with_banner() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("debug.log");

        let mut console = Console::builder()
            .environment(StaticEnvironment::http("POST", "/orders"))
            .route(StreamRoute::new(StreamConfig::file(&path)))
            .build();
        console.bootstrap();
        console.group(vec![Value::from("checkout")]);
        console.info(vec![Value::from("charged")]);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert!(lines[0].starts_with("==== "));
        assert!(lines[0].ends_with(" POST /orders ===="));
        assert_eq!(lines[1], "▸ checkout");
        assert_eq!(lines[2], "    ℹ charged");
    }

    #[test]
    fn test_unclosed_group_does_not_indent_next_pass() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("passes.log");

        let mut console = Console::builder()
            .route(StreamRoute::new(StreamConfig::file(&path)))
            .build();
        console.bootstrap();
        console.group(vec![Value::from("first")]);
        console.output();
        console.log(vec![Value::from("second request entry")]);
        console.output();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[lines.len() - 2], "▸ first");
        assert_eq!(lines[lines.len() - 1], "second request entry");
    }

    #[test]
    fn test_no_replay_of_earlier_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.log");

        let mut console = Console::new();
        console.log(vec![Value::from("before")]);
        console.add_route(Box::new(StreamRoute::new(StreamConfig::file(&path))));
        console.log(vec![Value::from("after")]);
        console.output();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("before"));
        assert!(contents.contains("after"));
    }

    #[test]
    fn test_reopen_on_target_change() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.log");
        let second = dir.path().join("b.log");

        let mut route = StreamRoute::new(StreamConfig::file(&first));
        route.set_target(StreamTarget::File(first.clone())).unwrap();
        route.set_target(StreamTarget::File(first.clone())).unwrap();
        route.set_target(StreamTarget::File(second.clone())).unwrap();

        let banners = std::fs::read_to_string(&first)
            .unwrap()
            .lines()
            .filter(|line| line.starts_with("===="))
            .count();
        assert_eq!(banners, 1);
        assert!(std::fs::read_to_string(&second).unwrap().starts_with("===="));
        assert_eq!(route.target(), &StreamTarget::File(second));
    }
}
