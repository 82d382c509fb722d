use crate::migrate::WorkspaceResult;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Success,
    Warn,
    Error,
}

/// Sink for everything the migration wants to tell the user.
/// The core never prints on its own.
pub trait Reporter {
    fn report(&self, level: Level, message: &str);

    fn workspace_started(&self, _name: &str) {}

    fn workspace_finished(&self, _result: &WorkspaceResult) {}

    fn debug(&self, message: &str) {
        self.report(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.report(Level::Info, message);
    }

    fn success(&self, message: &str) {
        self.report(Level::Success, message);
    }

    fn warn(&self, message: &str) {
        self.report(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.report(Level::Error, message);
    }
}

/// Terminal reporter: a progress bar over the workspaces, messages printed above it.
pub struct ConsoleReporter {
    pb: ProgressBar,
    verbose: bool,
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(total: u64, verbose: bool, quiet: bool) -> Self {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        };
        Self { pb, verbose, quiet }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }

    fn wants(&self, level: Level) -> bool {
        match level {
            Level::Debug => self.verbose && !self.quiet,
            Level::Info | Level::Success => !self.quiet,
            Level::Warn | Level::Error => true,
        }
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, level: Level, message: &str) {
        if !self.wants(level) {
            return;
        }
        let line = match level {
            Level::Debug => format!("  {}", message),
            Level::Info => message.to_string(),
            Level::Success => format!("  ✔ {}", message),
            Level::Warn => format!("  Warning: {}", message),
            Level::Error => format!("  Error: {}", message),
        };
        if self.pb.is_hidden() {
            eprintln!("{}", line);
        } else {
            self.pb.println(line);
        }
    }

    fn workspace_started(&self, name: &str) {
        self.pb.set_message(format!("Processing {}...", name));
    }

    fn workspace_finished(&self, _result: &WorkspaceResult) {
        self.pb.inc(1);
    }
}
