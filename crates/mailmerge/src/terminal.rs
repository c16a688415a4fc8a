//! Terminal side of a merge run.

use console::{Term, style};
use mailmerge_core::{Credentials, MergeReport, Operator, Outcome, Progress, Secret};
use std::io;
use tracing::warn;

/// Talks to the person at the terminal.
pub struct ConsoleOperator {
    term: Term,
    username: Option<String>,
    password: Option<Secret>,
}

impl ConsoleOperator {
    /// Creates an operator; missing credentials are prompted for.
    pub fn new(username: Option<String>, password: Option<Secret>) -> Self {
        Self {
            term: Term::stdout(),
            username,
            password,
        }
    }

    /// Prints the final tally.
    pub fn summary(&self, report: &MergeReport) -> io::Result<()> {
        let line = style(summary_line(report)).bold();
        if report.failed() == 0 {
            self.term.write_line(&line.to_string())
        } else {
            self.term.write_line(&line.yellow().to_string())
        }
    }

    fn ask(&self, prompt: &str) -> io::Result<String> {
        self.term.write_str(prompt)?;
        self.term.read_line()
    }
}

impl Operator for ConsoleOperator {
    fn show_preview(&mut self, message: &str) -> io::Result<()> {
        let rule = style("-".repeat(60)).dim().to_string();
        self.term.write_line(&rule)?;
        for line in message.split("\r\n") {
            self.term.write_line(line)?;
        }
        self.term.write_line(&rule)
    }

    fn confirm(&mut self, question: &str) -> io::Result<String> {
        self.ask(question)
    }

    fn credentials(&mut self) -> io::Result<Credentials> {
        let username = match self.username.take() {
            Some(username) => username,
            None => self.ask("Username: ")?.trim().to_string(),
        };
        let password = match self.password.take() {
            Some(password) => password,
            None => {
                self.term.write_str("Password: ")?;
                Secret::from(self.term.read_secure_line()?)
            }
        };
        Ok(Credentials { username, password })
    }

    fn progress(&mut self, progress: &Progress<'_>) {
        let tag = status_tag(progress.outcome);
        let tag = if progress.outcome.is_sent() {
            style(tag).green()
        } else {
            style(tag).red()
        };
        let line = format!("{} {tag}", progress_prefix(progress));
        if let Err(e) = self.term.write_line(&line) {
            warn!(error = %e, "cannot write progress");
        }
    }
}

/// `(i/n) address...`
fn progress_prefix(progress: &Progress<'_>) -> String {
    format!(
        "({}/{}) {}...",
        progress.index, progress.total, progress.recipient
    )
}

fn status_tag(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Sent => "[ok]".to_string(),
        Outcome::Failed(failure) if failure.is_transient() => {
            format!("[failed, try again later: {failure}]")
        }
        Outcome::Failed(failure) => format!("[failed: {failure}]"),
    }
}

fn summary_line(report: &MergeReport) -> String {
    let totals = format!(
        "{} attempted, {} sent, {} failed",
        report.attempted(),
        report.sent(),
        report.failed()
    );
    match report.transient_failures() {
        0 => totals,
        temporary => format!("{totals} ({temporary} temporary)"),
    }
}
