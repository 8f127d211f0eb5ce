use std::{net::SocketAddr, sync::Arc};

use burner_common::{
    Signal, error::SessionError, incoming, internal, outgoing, policy::DomainPolicy,
    status::Status,
};
use burner_store::MailboxStore;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    sync::broadcast,
};

use crate::{
    command::{Command, HeloVariant},
    config::SmtpConfig,
    delivery::{Delivery, Phase},
    error::DeliveryError,
};

/// Longest command line accepted. RFC 5321 asks for 512 octets; clients
/// sending parameters regularly go over that.
const MAX_COMMAND_LINE: u64 = 4096;

/// Read granularity while receiving message content. Longer lines are
/// accepted, they just arrive in several pieces.
const MAX_DATA_LINE: u64 = 64 * 1024;

/// Everything a session needs that outlives it.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub domain: String,
    pub limits: SmtpConfig,
    pub policy: Arc<DomainPolicy>,
    pub store: Arc<dyn MailboxStore>,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

pub struct Session<Stream> {
    peer: SocketAddr,
    connection: BufReader<Stream>,
    config: Arc<SessionConfig>,
    delivery: Delivery,
    greeted: bool,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Session<Stream> {
    pub fn new(stream: Stream, peer: SocketAddr, config: Arc<SessionConfig>) -> Self {
        let delivery = Delivery::new(Arc::clone(&config.policy), Arc::clone(&config.store));

        Self {
            peer,
            connection: BufReader::new(stream),
            config,
            delivery,
            greeted: false,
        }
    }

    /// Converse with the client until it quits, hangs up, times out or the
    /// server shuts down.
    ///
    /// # Errors
    ///
    /// [`SessionError::Shutdown`] if the session was cut short by `signal`,
    /// otherwise whatever ended the conversation early.
    #[tracing::instrument(level = "debug", skip_all, fields(peer = %self.peer))]
    pub async fn run(mut self, mut signal: broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        internal!("Connected");

        let greeting = format!("{} ESMTP burner", self.config.domain);
        self.reply(Status::ServiceReady, &greeting).await?;

        let result = loop {
            let flow = tokio::select! {
                _ = signal.recv() => {
                    internal!(level = DEBUG, "Shutdown received, closing connection");
                    let _ = self.reply(Status::Unavailable, "Server shutting down").await;
                    break Err(SessionError::Shutdown);
                }
                line = self.read_line(MAX_COMMAND_LINE) => match line {
                    Ok(Some(line)) => self.handle(&line).await,
                    Ok(None) => Ok(Flow::Close),
                    Err(err) => Err(err),
                },
            };

            match flow {
                Ok(Flow::Continue) => {}
                Ok(Flow::Close) => break Ok(()),
                Err(err @ SessionError::Timeout(_)) => {
                    let text = format!("4.4.2 {} Timeout, closing connection", self.config.domain);
                    let _ = self.reply(Status::Unavailable, &text).await;
                    break Err(err);
                }
                Err(err) => break Err(err),
            }
        };

        self.delivery.on_logout();
        internal!("Connection closed");

        result
    }

    /// Read one line, newline included. `None` once the client has hung up.
    async fn read_line(&mut self, limit: u64) -> Result<Option<Vec<u8>>, SessionError> {
        let timeout = self.config.limits.timeout();
        let mut line = Vec::new();

        let read = tokio::time::timeout(
            timeout,
            (&mut self.connection).take(limit).read_until(b'\n', &mut line),
        )
        .await
        .map_err(|_| SessionError::Timeout(timeout.as_secs()))??;

        Ok((read > 0).then_some(line))
    }

    async fn reply(&mut self, status: Status, text: &str) -> Result<(), SessionError> {
        outgoing!("{status} {text}");

        let stream = self.connection.get_mut();
        stream
            .write_all(format!("{status} {text}\r\n").as_bytes())
            .await?;
        stream.flush().await?;

        Ok(())
    }

    /// A multiline reply: every line but the last continues with `-`.
    async fn reply_lines(&mut self, status: Status, lines: &[&str]) -> Result<(), SessionError> {
        let mut response = String::new();
        for (idx, line) in lines.iter().enumerate() {
            let separator = if idx + 1 == lines.len() { ' ' } else { '-' };
            outgoing!("{status}{separator}{line}");
            response.push_str(&format!("{status}{separator}{line}\r\n"));
        }

        let stream = self.connection.get_mut();
        stream.write_all(response.as_bytes()).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn reply_error(&mut self, err: &DeliveryError) -> Result<(), SessionError> {
        internal!(level = DEBUG, "{err}");
        self.reply(err.status(), &err.reply()).await
    }

    async fn handle(&mut self, line: &[u8]) -> Result<Flow, SessionError> {
        if !line.ends_with(b"\n") && line.len() as u64 >= MAX_COMMAND_LINE {
            incoming!(level = DEBUG, "Command line over {MAX_COMMAND_LINE} bytes");
            self.reply(Status::SyntaxError, "5.5.2 Line too long").await?;
            return Ok(Flow::Close);
        }

        match Command::try_from(line) {
            Ok(command) => {
                incoming!("{command}");
                self.dispatch(command).await
            }
            Err(invalid) => {
                incoming!("{invalid}");
                let (status, text) = if has_known_verb(line) {
                    (Status::ParameterError, "5.5.4 Syntax error in parameters or arguments")
                } else {
                    (Status::SyntaxError, "5.5.2 Syntax error, command unrecognized")
                };
                self.reply(status, text).await?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Flow, SessionError> {
        match command {
            Command::Helo(variant) => {
                self.delivery.on_reset();
                self.greeted = true;

                let hello = format!("{} Hello {}", self.config.domain, variant.host());
                match variant {
                    HeloVariant::Helo(_) => self.reply(Status::Ok, &hello).await?,
                    HeloVariant::Ehlo(_) => {
                        let size = format!("SIZE {}", self.config.limits.max_message_size);
                        self.reply_lines(
                            Status::Ok,
                            &[&hello, &size, "8BITMIME", "SMTPUTF8", "PIPELINING"],
                        )
                        .await?;
                    }
                }
            }
            Command::MailFrom(sender, params) => {
                if !self.greeted {
                    self.reply(
                        Status::InvalidCommandSequence,
                        "5.5.1 Please introduce yourself first",
                    )
                    .await?;
                } else if params
                    .size()
                    .is_some_and(|size| size > self.config.limits.max_message_size)
                {
                    self.reply(
                        Status::ExceededStorage,
                        "5.3.4 Message size exceeds fixed maximum message size",
                    )
                    .await?;
                } else {
                    self.delivery.on_sender(sender);
                    self.reply(Status::Ok, "2.1.0 Ok").await?;
                }
            }
            Command::RcptTo(recipient) => {
                if !self.delivery.phase().in_transaction() {
                    self.reply(Status::InvalidCommandSequence, "5.5.1 Missing MAIL FROM")
                        .await?;
                } else if self.delivery.envelope().recipients.len()
                    >= self.config.limits.max_recipients
                {
                    self.reply(Status::InsufficientStorage, "4.5.3 Too many recipients")
                        .await?;
                } else {
                    match self.delivery.on_recipient(recipient) {
                        Ok(()) => self.reply(Status::Ok, "2.1.5 Ok").await?,
                        Err(err) => self.reply_error(&err).await?,
                    }
                }
            }
            Command::Data => self.data().await?,
            Command::Rset => {
                self.delivery.on_reset();
                self.reply(Status::Ok, "2.0.0 Ok").await?;
            }
            Command::Noop => self.reply(Status::Ok, "2.0.0 Ok").await?,
            Command::Help => {
                self.reply(Status::HelpMessage, "2.0.0 See RFC 5321")
                    .await?;
            }
            Command::Quit => {
                self.reply(Status::GoodBye, "2.0.0 Bye").await?;
                return Ok(Flow::Close);
            }
            Command::Auth => {
                self.reply(Status::NotImplemented, "5.5.1 Authentication not supported")
                    .await?;
            }
            Command::StartTls => {
                self.reply(Status::NotImplemented, "5.5.1 TLS not supported")
                    .await?;
            }
            Command::Invalid(_) => {
                self.reply(Status::SyntaxError, "5.5.2 Syntax error, command unrecognized")
                    .await?;
            }
        }

        Ok(Flow::Continue)
    }

    async fn data(&mut self) -> Result<(), SessionError> {
        if self.delivery.phase() != Phase::Recipients {
            return self.reply_error(&DeliveryError::NoRecipients).await;
        }

        self.reply(Status::StartMailInput, "End data with <CR><LF>.<CR><LF>")
            .await?;

        match self.receive_content().await? {
            None => {
                self.reply(
                    Status::ExceededStorage,
                    "5.3.4 Message size exceeds fixed maximum message size",
                )
                .await?;
            }
            Some(content) => match self.delivery.on_data(content.as_slice()).await {
                Ok(Some(id)) => {
                    self.reply(Status::Ok, &format!("2.0.0 Ok: queued as {id}"))
                        .await?;
                }
                Ok(None) => self.reply(Status::Ok, "2.0.0 Ok: queued").await?,
                Err(err) => self.reply_error(&err).await?,
            },
        }

        // Every transaction ends with the message, whatever became of it.
        self.delivery.on_reset();

        Ok(())
    }

    /// Read message content up to the lone `.` line, undoing dot-stuffing.
    ///
    /// Returns `None` if the content was larger than allowed. It is still
    /// read to the end so the conversation stays in step.
    async fn receive_content(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        let limit = self.config.limits.max_message_size;
        let mut content = Vec::new();
        let mut oversized = false;
        let mut at_line_start = true;

        loop {
            let Some(chunk) = self.read_line(MAX_DATA_LINE).await? else {
                return Err(SessionError::Protocol(
                    "Connection closed during DATA".to_string(),
                ));
            };

            let mut piece = chunk.as_slice();
            if at_line_start {
                if piece == b".\r\n" || piece == b".\n" {
                    break;
                }
                if let Some(unstuffed) = piece.strip_prefix(b".") {
                    piece = unstuffed;
                }
            }
            at_line_start = chunk.ends_with(b"\n");

            if oversized || content.len() + piece.len() > limit {
                oversized = true;
                content.clear();
            } else {
                content.extend_from_slice(piece);
            }
        }

        if oversized {
            internal!(level = DEBUG, "Discarded message over {limit} bytes");
        }

        Ok((!oversized).then_some(content))
    }
}

/// Checks if `line` starts with a verb we understand, so a parse failure
/// means bad arguments rather than an unknown command.
fn has_known_verb(line: &[u8]) -> bool {
    ["MAIL", "RCPT", "HELO", "EHLO"].iter().any(|verb| {
        line.get(..verb.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(verb.as_bytes()))
    })
}
