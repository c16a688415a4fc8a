//! End-to-end merge runs: CSV in, scripted SMTP server out.

#![allow(clippy::unwrap_used)]

use mailmerge_core::{
    Connector, Credentials, DeliverySession, Error, Failure, Merge, MergeOptions, Operator,
    Progress, RecipientSet, Result, Schema, ServerConfig, Stage,
};
use mailmerge_smtp::SmtpStream;
use std::cell::{Cell, RefCell};
use std::io;
use tokio_test::io::{Builder, Mock};

const RECIPIENTS: &str = "\
Firstname1,Lastname1,Email,Country
Ana,Ruiz,a@x.com,ES
Bo,Lind,b@x.com,SE
Cy,Park,c@x.com,KR
";

/// Hands out one scripted server connection.
struct ScriptedServer {
    script: RefCell<Option<Mock>>,
    connects: Cell<usize>,
}

impl ScriptedServer {
    fn new(script: &mut Builder) -> Self {
        Self {
            script: RefCell::new(Some(script.build())),
            connects: Cell::new(0),
        }
    }

    fn unused() -> Self {
        Self {
            script: RefCell::new(None),
            connects: Cell::new(0),
        }
    }
}

impl Connector for ScriptedServer {
    type Session = DeliverySession;

    async fn connect(&self, credentials: &Credentials) -> Result<DeliverySession> {
        self.connects.set(self.connects.get() + 1);
        let mock = self
            .script
            .borrow_mut()
            .take()
            .ok_or_else(|| Error::Connection("no server scripted".into()))?;
        DeliverySession::open(SmtpStream::custom(mock), &ServerConfig::default(), credentials)
            .await
    }
}

/// Answers the confirmation with a fixed reply and logs progress lines.
struct Console {
    answer: &'static str,
    lines: Vec<String>,
}

impl Console {
    fn answering(answer: &'static str) -> Self {
        Self {
            answer,
            lines: Vec::new(),
        }
    }
}

impl Operator for Console {
    fn show_preview(&mut self, message: &str) -> io::Result<()> {
        self.lines.push(message.to_string());
        Ok(())
    }

    fn confirm(&mut self, _question: &str) -> io::Result<String> {
        Ok(self.answer.to_string())
    }

    fn credentials(&mut self) -> io::Result<Credentials> {
        Ok(Credentials::new("news@example.org", "secret"))
    }

    fn progress(&mut self, progress: &Progress<'_>) {
        let status = if progress.outcome.is_sent() {
            "ok"
        } else {
            "failed"
        };
        self.lines.push(format!(
            "({}/{}) {}... [{status}]",
            progress.index, progress.total, progress.recipient
        ));
    }
}

fn envelope(script: &mut Builder, to: &str, first: &str, last: &str) {
    let payload = format!(
        "From: news@example.org\r\nTo: {to}\r\nSubject: Hello {first}\r\n\r\n\
         Dear {first} {last}\r\n.\r\n"
    );
    script
        .write(b"MAIL FROM:<news@example.org>\r\n")
        .read(b"250 OK\r\n")
        .write(format!("RCPT TO:<{to}>\r\n").as_bytes())
        .read(b"250 OK\r\n")
        .write(b"DATA\r\n")
        .read(b"354 Go ahead\r\n")
        .write(payload.as_bytes())
        .read(b"250 2.0.0 queued\r\n");
}

fn handshake() -> Builder {
    let mut script = Builder::new();
    script
        .read(b"220 smtp.example.com ESMTP\r\n")
        .write(b"EHLO localhost\r\n")
        .read(b"250-smtp.example.com\r\n250 AUTH PLAIN\r\n")
        .write(b"AUTH PLAIN AG5ld3NAZXhhbXBsZS5vcmcAc2VjcmV0\r\n")
        .read(b"235 OK\r\n");
    script
}

fn merge() -> Merge {
    let recipients = RecipientSet::from_csv(&Schema::basic(), RECIPIENTS.as_bytes()).unwrap();
    Merge::new(
        recipients,
        "Hello {{Firstname}}",
        "Dear {{Firstname}} {{Lastname}}",
        MergeOptions::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn second_recipient_refused_others_delivered() {
    let mut script = handshake();
    envelope(&mut script, "a@x.com", "Ana", "Ruiz");
    script
        .write(b"MAIL FROM:<news@example.org>\r\n")
        .read(b"250 OK\r\n")
        .write(b"RCPT TO:<b@x.com>\r\n")
        .read(b"550 5.1.1 No such user\r\n")
        .write(b"RSET\r\n")
        .read(b"250 OK\r\n");
    envelope(&mut script, "c@x.com", "Cy", "Park");
    script.write(b"QUIT\r\n").read(b"221 Bye\r\n");

    let server = ScriptedServer::new(&mut script);
    let mut console = Console::answering("yes");
    let report = merge().run(&server, &mut console).await.unwrap();

    assert_eq!(server.connects.get(), 1);
    assert_eq!(report.attempted(), 3);
    assert_eq!(report.sent(), 2);
    assert_eq!(report.failed(), 1);

    let (recipient, failure) = report.failures().next().unwrap();
    assert_eq!(recipient, "b@x.com");
    let Failure::Delivery(failure) = failure else {
        panic!("expected a delivery failure, got {failure:?}");
    };
    assert_eq!(failure.stage, Stage::RcptTo);

    assert_eq!(
        console.lines,
        [
            "From: ...\r\nTo: a@x.com\r\nSubject: Hello Ana\r\n\r\nDear Ana Ruiz",
            "(1/3) a@x.com... [ok]",
            "(2/3) b@x.com... [failed]",
            "(3/3) c@x.com... [ok]",
        ]
    );
}

#[tokio::test]
async fn anything_but_yes_aborts_before_connecting() {
    let server = ScriptedServer::unused();
    let mut console = Console::answering("nope");
    let err = merge().run(&server, &mut console).await.unwrap_err();

    assert!(matches!(err, Error::Aborted(_)));
    assert_eq!(server.connects.get(), 0);
    assert_eq!(console.lines.len(), 1);
}

#[tokio::test]
async fn failed_login_sends_nothing_and_quits() {
    let mut script = Builder::new();
    script
        .read(b"220 smtp.example.com ESMTP\r\n")
        .write(b"EHLO localhost\r\n")
        .read(b"250-smtp.example.com\r\n250 AUTH PLAIN\r\n")
        .write(b"AUTH PLAIN AG5ld3NAZXhhbXBsZS5vcmcAc2VjcmV0\r\n")
        .read(b"535 5.7.8 Bad credentials\r\n")
        .write(b"QUIT\r\n")
        .read(b"221 Bye\r\n");

    let server = ScriptedServer::new(&mut script);
    let mut console = Console::answering("y");
    let err = merge().run(&server, &mut console).await.unwrap_err();

    assert!(matches!(err, Error::Auth(_)));
    assert_eq!(console.lines.len(), 1);
}
