//! The merge run: preview, confirmation, delivery, report.
//!
//! Run-fatal problems (no recipients, bad templates, declined confirmation,
//! connection or login failures) surface as [`Error`] before any mail is
//! sent. Everything that goes wrong for a single recipient is recorded in
//! the [`MergeReport`] and the run moves on to the next one.

use crate::config::{Credentials, DeliveryMode, MergeConfig};
use crate::delivery::{Connector, DeliveryError, Mailer, Stage};
use crate::error::{Error, Result};
use crate::message::{Envelope, check_header_value, preview};
use crate::recipient::{Recipient, RecipientSet};
use crate::template::{RenderError, Rendered, TemplateKind, TemplatePair};
use mailmerge_smtp::Address;
use std::io;
use tracing::{debug, info, warn};

/// Question asked after the preview.
pub const CONFIRMATION_PROMPT: &str = "Do you want to continue? (yes/no): ";

/// The person running the merge.
///
/// Console interaction is kept behind this trait so the pipeline never
/// touches a terminal itself.
pub trait Operator {
    /// Shows the message that is about to be sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be displayed.
    fn show_preview(&mut self, message: &str) -> io::Result<()>;

    /// Asks `question` and returns the raw answer.
    ///
    /// # Errors
    ///
    /// Returns an error if no answer can be read.
    fn confirm(&mut self, question: &str) -> io::Result<String>;

    /// Supplies the login for the submission server.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials cannot be obtained.
    fn credentials(&mut self) -> io::Result<Credentials>;

    /// Reports the outcome for one recipient.
    fn progress(&mut self, progress: &Progress<'_>);
}

/// Progress notification for one recipient.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// Position of the recipient, starting at 1.
    pub index: usize,
    /// Number of recipients in the run.
    pub total: usize,
    /// Recipient address as given in the source.
    pub recipient: &'a str,
    /// What happened.
    pub outcome: &'a Outcome,
}

/// Why a recipient was not sent to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    /// The templates could not be rendered for the recipient.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// The server or the address refused delivery.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl Failure {
    /// Returns true if the server asked to try again later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Delivery(DeliveryError { transient: true, .. }))
    }
}

/// Result of processing one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The server accepted the message.
    Sent,
    /// The recipient was skipped or refused.
    Failed(Failure),
}

impl Outcome {
    /// Returns true if the message was accepted.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Recipient address as given in the source.
    pub recipient: String,
    /// What happened.
    pub outcome: Outcome,
}

/// Per-recipient outcomes of a run, in recipient order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    entries: Vec<ReportEntry>,
}

impl MergeReport {
    /// All entries.
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Number of recipients processed.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.entries.len()
    }

    /// Number of messages accepted by the server.
    #[must_use]
    pub fn sent(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_sent()).count()
    }

    /// Number of recipients not sent to.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.attempted() - self.sent()
    }

    /// Number of failures the server marked as temporary.
    #[must_use]
    pub fn transient_failures(&self) -> usize {
        self.failures().filter(|(_, f)| f.is_transient()).count()
    }

    /// Entries that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Failure)> {
        self.entries.iter().filter_map(|e| match &e.outcome {
            Outcome::Failed(failure) => Some((e.recipient.as_str(), failure)),
            Outcome::Sent => None,
        })
    }
}

impl FromIterator<ReportEntry> for MergeReport {
    fn from_iter<I: IntoIterator<Item = ReportEntry>>(entries: I) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

/// Run options that do not come from the recipient or template sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Show the first message and ask before sending.
    pub preview: bool,
    /// Envelope grouping.
    pub mode: DeliveryMode,
    /// Envelope sender; the login name when unset.
    pub sender: Option<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            preview: true,
            mode: DeliveryMode::default(),
            sender: None,
        }
    }
}

impl From<&MergeConfig> for MergeOptions {
    fn from(config: &MergeConfig) -> Self {
        Self {
            preview: config.preview,
            mode: config.mode,
            sender: config.sender.clone(),
        }
    }
}

impl MergeOptions {
    /// Envelope sender for a session logged in as `username`.
    #[must_use]
    pub fn sender_for<'a>(&'a self, username: &'a str) -> &'a str {
        self.sender.as_deref().unwrap_or(username)
    }
}

/// Returns true for `y` or `yes` in any case, surrounding whitespace ignored.
#[must_use]
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

/// A merge ready to run: recipients loaded, templates compiled.
#[derive(Debug)]
pub struct Merge {
    recipients: RecipientSet,
    templates: TemplatePair,
    options: MergeOptions,
}

impl Merge {
    /// Prepares a merge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecipients`] for an empty recipient set and
    /// [`Error::TemplateSyntax`] if either template does not compile.
    pub fn new(
        recipients: RecipientSet,
        subject: &str,
        body: &str,
        options: MergeOptions,
    ) -> Result<Self> {
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }
        let templates = TemplatePair::compile(subject, body)?;
        Ok(Self {
            recipients,
            templates,
            options,
        })
    }

    /// Recipients of the run.
    #[must_use]
    pub const fn recipients(&self) -> &RecipientSet {
        &self.recipients
    }

    /// The first message of the run, as shown before confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Preview`] if the first recipient cannot be rendered.
    pub fn preview(&self) -> Result<String> {
        let first = self.recipients.first().ok_or(Error::NoRecipients)?;
        let rendered = render(&self.templates, first).map_err(Error::Preview)?;
        let text = match self.options.mode {
            DeliveryMode::PerRecipient => {
                preview(&[first.email()], &rendered.subject, &rendered.body)
            }
            DeliveryMode::Batch => {
                let to: Vec<&str> = self.recipients.iter().map(Recipient::email).collect();
                preview(&to, &rendered.subject, &rendered.body)
            }
        };
        Ok(text)
    }

    /// Runs the merge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aborted`] if the operator declines, [`Error::Config`]
    /// for an invalid sender address, and whatever `connector` returns if
    /// the session cannot be opened. Per-recipient failures are not errors;
    /// they are in the report.
    pub async fn run<C, O>(&self, connector: &C, operator: &mut O) -> Result<MergeReport>
    where
        C: Connector,
        O: Operator,
    {
        if self.options.preview {
            operator.show_preview(&self.preview()?)?;
            let answer = operator.confirm(CONFIRMATION_PROMPT)?;
            if !is_affirmative(&answer) {
                info!("operator declined, nothing sent");
                return Err(Error::Aborted(format!("answered {:?}", answer.trim())));
            }
        }

        let credentials = operator.credentials()?;
        let sender_text = self.options.sender_for(&credentials.username);
        let sender = Address::new(sender_text)
            .map_err(|e| Error::Config(format!("sender {sender_text:?}: {e}")))?;

        let mut session = connector.connect(&credentials).await?;
        let mut envelope = Envelope::new(sender);

        info!(
            recipients = self.recipients.len(),
            mode = ?self.options.mode,
            "starting delivery"
        );
        let report = match self.options.mode {
            DeliveryMode::PerRecipient => {
                self.deliver_each(&mut session, &mut envelope, operator)
                    .await
            }
            DeliveryMode::Batch => {
                self.deliver_batch(&mut session, &mut envelope, operator)
                    .await
            }
        };
        session.close().await;

        info!(
            sent = report.sent(),
            failed = report.failed(),
            "delivery finished"
        );
        Ok(report)
    }

    async fn deliver_each<M, O>(
        &self,
        session: &mut M,
        envelope: &mut Envelope,
        operator: &mut O,
    ) -> MergeReport
    where
        M: Mailer,
        O: Operator,
    {
        let total = self.recipients.len();
        let mut report = MergeReport::default();

        for (index, recipient) in self.recipients.iter().enumerate() {
            let outcome = self.deliver_one(recipient, session, envelope).await;
            let entry = ReportEntry {
                recipient: recipient.email().to_string(),
                outcome,
            };
            notify(operator, index + 1, total, &entry);
            report.entries.push(entry);
        }

        report
    }

    async fn deliver_one<M: Mailer>(
        &self,
        recipient: &Recipient,
        session: &mut M,
        envelope: &mut Envelope,
    ) -> Outcome {
        let address = match address_of(recipient) {
            Ok(address) => address,
            Err(failure) => return Outcome::Failed(failure.into()),
        };
        let rendered = match render(&self.templates, recipient) {
            Ok(rendered) => rendered,
            Err(failure) => return Outcome::Failed(failure.into()),
        };

        envelope.load(vec![address], rendered.subject, rendered.body);
        match session.send(envelope).await.into_iter().next() {
            Some(Ok(())) => Outcome::Sent,
            Some(Err(failure)) => Outcome::Failed(failure.into()),
            None => Outcome::Failed(
                DeliveryError::new(Stage::Session, recipient.email(), "no outcome reported")
                    .into(),
            ),
        }
    }

    async fn deliver_batch<M, O>(
        &self,
        session: &mut M,
        envelope: &mut Envelope,
        operator: &mut O,
    ) -> MergeReport
    where
        M: Mailer,
        O: Operator,
    {
        let mut outcomes: Vec<Option<Outcome>> = vec![None; self.recipients.len()];
        let mut pending = Vec::new();
        for (index, recipient) in self.recipients.iter().enumerate() {
            match address_of(recipient) {
                Ok(address) => pending.push((index, address)),
                Err(failure) => outcomes[index] = Some(Outcome::Failed(failure.into())),
            }
        }

        if !pending.is_empty() {
            // The batch message is personalized for the first recipient only
            let first = self.recipients.iter().next();
            let rendered = first.map_or_else(
                || Err(RenderError {
                    kind: TemplateKind::Body,
                    message: "no recipient to render for".into(),
                }),
                |first| render(&self.templates, first),
            );

            match rendered {
                Ok(rendered) => {
                    let (indices, addresses): (Vec<usize>, Vec<Address>) =
                        pending.into_iter().unzip();
                    envelope.load(addresses, rendered.subject, rendered.body);
                    let results = session.send(envelope).await;
                    for (index, result) in indices.into_iter().zip(results) {
                        outcomes[index] = Some(match result {
                            Ok(()) => Outcome::Sent,
                            Err(failure) => Outcome::Failed(failure.into()),
                        });
                    }
                }
                Err(failure) => {
                    for (index, _) in pending {
                        outcomes[index] = Some(Outcome::Failed(failure.clone().into()));
                    }
                }
            }
        }

        let total = self.recipients.len();
        self.recipients
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (recipient, outcome))| {
                let outcome = outcome.unwrap_or_else(|| {
                    Outcome::Failed(
                        DeliveryError::new(
                            Stage::Session,
                            recipient.email(),
                            "no outcome reported",
                        )
                        .into(),
                    )
                });
                let entry = ReportEntry {
                    recipient: recipient.email().to_string(),
                    outcome,
                };
                notify(operator, index + 1, total, &entry);
                entry
            })
            .collect()
    }
}

/// Renders both templates and checks the subject fits on one header line.
fn render(
    templates: &TemplatePair,
    recipient: &Recipient,
) -> std::result::Result<Rendered, RenderError> {
    let rendered = templates.render(recipient)?;
    check_header_value(&rendered.subject).map_err(|message| RenderError {
        kind: TemplateKind::Subject,
        message,
    })?;
    Ok(rendered)
}

fn address_of(recipient: &Recipient) -> std::result::Result<Address, DeliveryError> {
    if !recipient.has_email() {
        return Err(DeliveryError::new(
            Stage::Address,
            recipient.email(),
            "recipient has no email address",
        ));
    }
    Address::new(recipient.email().trim())
        .map_err(|e| DeliveryError::new(Stage::Address, recipient.email(), e))
}

fn notify<O: Operator>(operator: &mut O, index: usize, total: usize, entry: &ReportEntry) {
    match &entry.outcome {
        Outcome::Sent => debug!(recipient = %entry.recipient, "sent"),
        Outcome::Failed(failure) => {
            warn!(recipient = %entry.recipient, error = %failure, "not sent");
        }
    }
    operator.progress(&Progress {
        index,
        total,
        recipient: &entry.recipient,
        outcome: &entry.outcome,
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::recipient::Schema;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Records envelopes and refuses the addresses it was told to.
    #[derive(Default)]
    struct FakeConnector {
        connects: Cell<usize>,
        refuse: Vec<&'static str>,
        sent: Rc<RefCell<Vec<Envelope>>>,
        closed: Rc<Cell<bool>>,
    }

    struct FakeSession {
        refuse: Vec<&'static str>,
        sent: Rc<RefCell<Vec<Envelope>>>,
        closed: Rc<Cell<bool>>,
    }

    impl Connector for FakeConnector {
        type Session = FakeSession;

        async fn connect(&self, _credentials: &Credentials) -> Result<FakeSession> {
            self.connects.set(self.connects.get() + 1);
            Ok(FakeSession {
                refuse: self.refuse.clone(),
                sent: Rc::clone(&self.sent),
                closed: Rc::clone(&self.closed),
            })
        }
    }

    impl Mailer for FakeSession {
        async fn send(&mut self, envelope: &Envelope) -> crate::delivery::Outcomes {
            self.sent.borrow_mut().push(envelope.clone());
            envelope
                .recipients()
                .iter()
                .map(|address| {
                    if self.refuse.contains(&address.as_str()) {
                        Err(DeliveryError::new(
                            Stage::RcptTo,
                            address.as_str(),
                            "SMTP error 550: no such user",
                        ))
                    } else {
                        Ok(())
                    }
                })
                .collect()
        }

        async fn close(self) {
            self.closed.set(true);
        }
    }

    struct ScriptedOperator {
        answers: VecDeque<&'static str>,
        previews: Vec<String>,
        progress: Vec<String>,
    }

    impl ScriptedOperator {
        fn answering(answers: &[&'static str]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                previews: Vec::new(),
                progress: Vec::new(),
            }
        }
    }

    impl Operator for ScriptedOperator {
        fn show_preview(&mut self, message: &str) -> io::Result<()> {
            self.previews.push(message.to_string());
            Ok(())
        }

        fn confirm(&mut self, _question: &str) -> io::Result<String> {
            self.answers
                .pop_front()
                .map(str::to_string)
                .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
        }

        fn credentials(&mut self) -> io::Result<Credentials> {
            Ok(Credentials::new("news@example.org", "secret"))
        }

        fn progress(&mut self, progress: &Progress<'_>) {
            self.progress.push(format!(
                "({}/{}) {} {}",
                progress.index,
                progress.total,
                progress.recipient,
                if progress.outcome.is_sent() { "ok" } else { "failed" }
            ));
        }
    }

    fn three() -> RecipientSet {
        let rows = vec![
            ["First", "Last", "Email", "Country"],
            ["Ana", "Ruiz", "a@x.com", "ES"],
            ["Bo", "Lind", "b@x.com", "SE"],
            ["Cy", "Park", "c@x.com", "KR"],
        ];
        RecipientSet::from_rows(&Schema::basic(), rows).unwrap()
    }

    fn merge(recipients: RecipientSet, options: MergeOptions) -> Merge {
        Merge::new(
            recipients,
            "Hello {{Firstname}}",
            "Dear {{Firstname}} {{Lastname}}",
            options,
        )
        .unwrap()
    }

    #[test]
    fn affirmative_answers() {
        for answer in ["y", "Y", "yes", "YES", " Yes \n"] {
            assert!(is_affirmative(answer), "{answer:?}");
        }
        for answer in ["", "n", "no", "yep", "sure", "y e s"] {
            assert!(!is_affirmative(answer), "{answer:?}");
        }
    }

    #[test]
    fn sender_defaults_to_login_name() {
        let mut options = MergeOptions::default();
        assert_eq!(options.sender_for("me@x.com"), "me@x.com");
        options.sender = Some("news@x.com".into());
        assert_eq!(options.sender_for("me@x.com"), "news@x.com");
    }

    #[test]
    fn temporary_refusals_are_counted() {
        let failed = |recipient: &str, transient| ReportEntry {
            recipient: recipient.to_string(),
            outcome: Outcome::Failed(Failure::Delivery(DeliveryError {
                transient,
                ..DeliveryError::new(Stage::RcptTo, recipient, "refused")
            })),
        };
        let report: MergeReport = [
            failed("a@x.com", true),
            ReportEntry {
                recipient: "b@x.com".into(),
                outcome: Outcome::Sent,
            },
            failed("c@x.com", false),
        ]
        .into_iter()
        .collect();
        assert_eq!(report.failed(), 2);
        assert_eq!(report.transient_failures(), 1);
    }

    #[test]
    fn preview_shows_first_recipient() {
        let shown = merge(three(), MergeOptions::default()).preview().unwrap();
        assert_eq!(
            shown,
            "From: ...\r\nTo: a@x.com\r\nSubject: Hello Ana\r\n\r\nDear Ana Ruiz"
        );
    }

    #[test]
    fn empty_recipient_set_is_fatal() {
        let err = Merge::new(RecipientSet::default(), "s", "b", MergeOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::NoRecipients));
    }

    #[test]
    fn compile_failure_happens_before_connecting() {
        let result = Merge::new(three(), "Hello {{Firstname", "body", MergeOptions::default());
        assert!(matches!(result, Err(Error::TemplateSyntax { .. })));
        let result = Merge::new(three(), "Hello", "{{ Lastname | }}", MergeOptions::default());
        assert!(matches!(
            result,
            Err(Error::TemplateSyntax {
                kind: TemplateKind::Body,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn declined_confirmation_opens_nothing() {
        for answer in ["no", "", "maybe"] {
            let connector = FakeConnector::default();
            let mut operator = ScriptedOperator::answering(&[answer]);
            let err = merge(three(), MergeOptions::default())
                .run(&connector, &mut operator)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Aborted(_)));
            assert_eq!(connector.connects.get(), 0);
            assert!(connector.sent.borrow().is_empty());
            assert_eq!(operator.previews.len(), 1);
        }
    }

    #[tokio::test]
    async fn sends_one_envelope_per_recipient() {
        let connector = FakeConnector::default();
        let mut operator = ScriptedOperator::answering(&["yes"]);
        let report = merge(three(), MergeOptions::default())
            .run(&connector, &mut operator)
            .await
            .unwrap();

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.sent(), 3);
        assert_eq!(connector.connects.get(), 1);
        assert!(connector.closed.get());

        let sent = connector.sent.borrow();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].subject(), "Hello Bo");
        assert_eq!(sent[1].body(), "Dear Bo Lind");
        assert_eq!(sent[1].recipients()[0].as_str(), "b@x.com");
        assert_eq!(sent[1].sender().as_str(), "news@example.org");
        assert_eq!(
            operator.progress,
            ["(1/3) a@x.com ok", "(2/3) b@x.com ok", "(3/3) c@x.com ok"]
        );
    }

    #[tokio::test]
    async fn refused_recipient_does_not_stop_the_run() {
        let connector = FakeConnector {
            refuse: vec!["b@x.com"],
            ..FakeConnector::default()
        };
        let options = MergeOptions {
            preview: false,
            ..MergeOptions::default()
        };
        let report = merge(three(), options)
            .run(&connector, &mut ScriptedOperator::answering(&[]))
            .await
            .unwrap();

        assert_eq!(report.sent(), 2);
        assert_eq!(report.failed(), 1);
        let (recipient, failure) = report.failures().next().unwrap();
        assert_eq!(recipient, "b@x.com");
        assert!(matches!(
            failure,
            Failure::Delivery(DeliveryError {
                stage: Stage::RcptTo,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn bad_recipients_are_skipped_without_an_envelope() {
        let recipients = RecipientSet::from_rows(
            &Schema::basic(),
            vec![
                ["First", "Last", "Email", "Country"],
                ["Ana", "Ruiz", "a@x.com", "ES"],
                ["Nobody", "", "", ""],
                ["Bad", "", "not an address", ""],
                ["Bo\r\nBcc: evil@x.com", "", "b@x.com", ""],
                ["Cy", "Park", "c@x.com", "KR"],
            ],
        )
        .unwrap();
        let connector = FakeConnector::default();
        let options = MergeOptions {
            preview: false,
            ..MergeOptions::default()
        };
        let report = merge(recipients, options)
            .run(&connector, &mut ScriptedOperator::answering(&[]))
            .await
            .unwrap();

        assert_eq!(report.attempted(), 5);
        assert_eq!(report.sent(), 2);
        let stages: Vec<_> = report.failures().map(|(_, f)| f.clone()).collect();
        assert!(matches!(
            &stages[0],
            Failure::Delivery(DeliveryError {
                stage: Stage::Address,
                ..
            })
        ));
        assert!(matches!(
            &stages[1],
            Failure::Delivery(DeliveryError {
                stage: Stage::Address,
                ..
            })
        ));
        assert!(matches!(
            &stages[2],
            Failure::Render(RenderError {
                kind: TemplateKind::Subject,
                ..
            })
        ));

        let sent = connector.sent.borrow();
        let to: Vec<&str> = sent.iter().map(|e| e.recipients()[0].as_str()).collect();
        assert_eq!(to, ["a@x.com", "c@x.com"]);
    }

    #[tokio::test]
    async fn invalid_sender_is_a_configuration_error() {
        let connector = FakeConnector::default();
        let options = MergeOptions {
            preview: false,
            sender: Some("not a sender".into()),
            ..MergeOptions::default()
        };
        let err = merge(three(), options)
            .run(&connector, &mut ScriptedOperator::answering(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(connector.connects.get(), 0);
    }

    #[tokio::test]
    async fn batch_sends_a_single_envelope() {
        let connector = FakeConnector {
            refuse: vec!["b@x.com"],
            ..FakeConnector::default()
        };
        let options = MergeOptions {
            mode: DeliveryMode::Batch,
            ..MergeOptions::default()
        };
        let mut operator = ScriptedOperator::answering(&["y"]);
        let report = merge(three(), options)
            .run(&connector, &mut operator)
            .await
            .unwrap();

        assert!(operator.previews[0].contains("To: a@x.com;b@x.com;c@x.com\r\n"));
        let sent = connector.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipients().len(), 3);
        assert_eq!(sent[0].subject(), "Hello Ana");
        assert!(sent[0].message().contains("To: a@x.com;b@x.com;c@x.com\r\n"));

        assert_eq!(report.sent(), 2);
        assert_eq!(report.failures().next().unwrap().0, "b@x.com");
    }

    #[test]
    fn report_counts() {
        let report = MergeReport {
            entries: vec![
                ReportEntry {
                    recipient: "a@x.com".into(),
                    outcome: Outcome::Sent,
                },
                ReportEntry {
                    recipient: String::new(),
                    outcome: Outcome::Failed(
                        DeliveryError::new(Stage::Address, "", "missing").into(),
                    ),
                },
            ],
        };
        assert_eq!(report.attempted(), 2);
        assert_eq!(report.sent(), 1);
        assert_eq!(report.failed(), 1);
    }
}
