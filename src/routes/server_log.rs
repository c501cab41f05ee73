//! ServerLog route
//!
//! Writes the ChromeLogger document to a file under `log_dir` and points the
//! client at it with `X-ServerLog-Location`. Old files are garbage collected
//! with probability `gc_probability` per pass.

use super::chrome_logger::{chrome_document, chrome_row};
use super::{encode_json, render_section, JSON_TOKENS};
use crate::core::{
    ConsoleError, LogEntry, OutputContext, Result, Route, RouteBase, RouteConfig, Subscription,
    TimestampFormat,
};
use serde_json::Value as Json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const SERVER_LOG_HEADER: &str = "X-ServerLog-Location";

#[derive(Debug, Clone)]
pub struct ServerLogConfig {
    pub route: RouteConfig,
    pub log_dir: PathBuf,
    pub file_prefix: String,
    /// Chance (0.0 to 1.0) that a pass first removes expired files
    pub gc_probability: f64,
    /// Age in seconds after which files are removed
    pub lifetime: u64,
    /// Retrieval URL; `{filename}` is replaced
    pub url_template: String,
}

impl Default for ServerLogConfig {
    fn default() -> Self {
        Self {
            route: RouteConfig::default(),
            log_dir: std::env::temp_dir().join("debug-console"),
            file_prefix: "serverLog_".to_string(),
            gc_probability: 0.10,
            lifetime: 60,
            url_template: "/debug/serverLog/{filename}".to_string(),
        }
    }
}

impl ServerLogConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.route = route;
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_gc(mut self, probability: f64, lifetime: u64) -> Self {
        self.gc_probability = probability.clamp(0.0, 1.0);
        self.lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }
}

pub struct ServerLogRoute {
    base: RouteBase,
    config: ServerLogConfig,
    rows: Vec<Json>,
}

impl ServerLogRoute {
    pub fn new(config: ServerLogConfig) -> Self {
        Self {
            base: RouteBase::new("serverLog", &config.route),
            config,
            rows: Vec::new(),
        }
    }

    pub fn config(&self) -> &ServerLogConfig {
        &self.config
    }

    /// Remove prefixed files last modified more than `lifetime` seconds before `now`
    pub fn collect_garbage(&self, now: SystemTime) -> Result<usize> {
        let cutoff = now
            .checked_sub(Duration::from_secs(self.config.lifetime))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let entries = match fs::read_dir(&self.config.log_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(&self.config.file_prefix) {
                continue;
            }
            let expired = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .map(|modified| modified < cutoff)
                .unwrap_or(false);
            if expired && fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn write(&self, filename: &str, contents: &str) -> Result<PathBuf> {
        let dir: &Path = &self.config.log_dir;
        fs::create_dir_all(dir).map_err(|e| {
            ConsoleError::io_operation("creating log directory", dir.display().to_string(), e)
        })?;
        let path = dir.join(filename);
        fs::write(&path, contents).map_err(|e| {
            ConsoleError::io_operation("writing server log", path.display().to_string(), e)
        })?;
        Ok(path)
    }
}

impl Route for ServerLogRoute {
    fn base(&self) -> &RouteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RouteBase {
        &mut self.base
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![Subscription::output()]
    }

    fn process_log_entries(&mut self, ctx: &mut OutputContext<'_>) -> Result<()> {
        let snapshot = ctx.snapshot;
        let scope = ctx.scope;
        self.rows.clear();
        render_section(self, snapshot.alerts().iter(), &scope);
        render_section(self, snapshot.summary_entries(), &scope);
        render_section(self, snapshot.log().iter(), &scope);

        if rand::random::<f64>() < self.config.gc_probability {
            match self.collect_garbage(SystemTime::now()) {
                Ok(removed) => tracing::debug!(route = self.name(), removed, "server logs collected"),
                Err(e) => tracing::warn!(route = self.name(), error = %e, "server log gc failed"),
            }
        }

        let document = chrome_document(&ctx.env.request_line(), std::mem::take(&mut self.rows));
        let contents = encode_json(&document, &JSON_TOKENS)?;
        let filename = format!(
            "{}{}_{}.json",
            self.config.file_prefix,
            TimestampFormat::Compact.now(),
            ctx.env.request_id()
        );

        match self.write(&filename, &contents) {
            Ok(_) => {
                let url = self.config.url_template.replace("{filename}", &filename);
                ctx.add_header(SERVER_LOG_HEADER, url);
            }
            Err(e) => {
                tracing::warn!(route = self.name(), error = %e, "server log not written");
                ctx.warn(format!(
                    "serverLog: unable to write to {}",
                    self.config.log_dir.display()
                ));
            }
        }
        Ok(())
    }

    fn process_log_entry(&mut self, entry: &LogEntry) -> Result<Option<String>> {
        if let Some(row) = chrome_row(entry) {
            self.rows.push(row);
        }
        Ok(None)
    }
}
