//! IMAP mailbox — fetches unseen messages from the configured inbox.
//!
//! Raw IMAP4rev1 over rustls. Sessions run on a blocking thread
//! (`spawn_blocking`). Fetching uses `BODY.PEEK[]` and leaves flags alone;
//! only acknowledged messages are flagged `\Seen`.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::channels::email_text::{strip_html, strip_quoted_text};
use crate::config::AgentConfig;
use crate::error::MailboxError;
use crate::pipeline::types::{Email, MailboxSource};

const IMAP_PORT: u16 = 993;
const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolve the IMAP host for an `emailProvider` value.
///
/// Known names map to their public hosts; anything containing a dot is
/// taken as a host name.
pub fn imap_host(provider: &str) -> Result<String, MailboxError> {
    let provider = provider.trim().to_lowercase();
    match provider.as_str() {
        "gmail" => Ok("imap.gmail.com".into()),
        "outlook" | "hotmail" | "office365" => Ok("outlook.office365.com".into()),
        "yahoo" => Ok("imap.mail.yahoo.com".into()),
        host if host.contains('.') => Ok(host.to_string()),
        other => Err(MailboxError::UnsupportedProvider(other.to_string())),
    }
}

/// Mailbox source backed by a real IMAP account.
pub struct ImapMailbox {
    batch_limit: usize,
    /// Email id → UID for the last fetched batch.
    uids: Mutex<HashMap<String, u32>>,
}

impl ImapMailbox {
    pub fn new(batch_limit: usize) -> Self {
        Self {
            batch_limit,
            uids: Mutex::new(HashMap::new()),
        }
    }
}

struct Credentials {
    host: String,
    user: String,
    password: String,
}

impl Credentials {
    fn from_config(config: &AgentConfig) -> Result<Self, MailboxError> {
        Ok(Self {
            host: imap_host(&config.email_provider)?,
            user: config.email.clone(),
            password: config.email_password.expose_secret().to_string(),
        })
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, MailboxError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, MailboxError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MailboxError::Protocol(format!("mailbox task failed: {e}")))?
}

#[async_trait]
impl MailboxSource for ImapMailbox {
    async fn fetch_emails(&self, config: &AgentConfig) -> Result<Vec<Email>, MailboxError> {
        let creds = Credentials::from_config(config)?;
        let limit = self.batch_limit;

        info!(host = %creds.host, user = %creds.user, "Checking mailbox");
        let fetched = run_blocking(move || {
            let stream = connect_tls(&creds.host)?;
            fetch_unseen(stream, &creds.user, &creds.password, limit)
        })
        .await?;

        let mut uids = self.uids.lock().await;
        *uids = fetched.iter().map(|(uid, email)| (email.id.clone(), *uid)).collect();
        Ok(fetched.into_iter().map(|(_, email)| email).collect())
    }

    async fn acknowledge(&self, config: &AgentConfig, ids: &[String]) -> Result<(), MailboxError> {
        let uids: Vec<u32> = {
            let mut known = self.uids.lock().await;
            ids.iter().filter_map(|id| known.remove(id)).collect()
        };
        if uids.is_empty() {
            return Ok(());
        }

        let creds = Credentials::from_config(config)?;
        run_blocking(move || {
            let stream = connect_tls(&creds.host)?;
            flag_seen(stream, &creds.user, &creds.password, &uids)
        })
        .await
    }
}

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

fn connect_tls(host: &str) -> Result<TlsStream, MailboxError> {
    let connect_err = |reason: String| MailboxError::Connect {
        host: host.to_string(),
        reason,
    };

    let tcp = TcpStream::connect((host, IMAP_PORT)).map_err(|e| connect_err(e.to_string()))?;
    tcp.set_read_timeout(Some(IO_TIMEOUT))
        .and_then(|()| tcp.set_write_timeout(Some(IO_TIMEOUT)))
        .map_err(|e| connect_err(e.to_string()))?;

    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| connect_err(e.to_string()))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    let server_name =
        ServerName::try_from(host.to_string()).map_err(|e| connect_err(e.to_string()))?;
    let conn = rustls::ClientConnection::new(Arc::new(tls_config), server_name)
        .map_err(|e| connect_err(e.to_string()))?;
    Ok(rustls::StreamOwned::new(conn, tcp))
}

// ── Session ─────────────────────────────────────────────────────────

/// One tagged command's server reply.
#[derive(Debug, Default)]
struct Reply {
    untagged: Vec<String>,
    literals: Vec<Vec<u8>>,
    ok: bool,
    status: String,
}

struct Session<S: Read + Write> {
    stream: BufReader<S>,
    next_tag: u32,
}

impl<S: Read + Write> Session<S> {
    fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            next_tag: 1,
        }
    }

    fn read_line(&mut self) -> Result<String, MailboxError> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf).map_err(io_err)?;
        if n == 0 {
            return Err(MailboxError::Protocol("connection closed by server".into()));
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn greeting(&mut self) -> Result<(), MailboxError> {
        let line = self.read_line()?;
        if line.starts_with("* OK") || line.starts_with("* PREAUTH") {
            Ok(())
        } else {
            Err(MailboxError::Protocol(format!("unexpected greeting: {}", line.trim_end())))
        }
    }

    fn command(&mut self, command: &str) -> Result<Reply, MailboxError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        let writer = self.stream.get_mut();
        writer
            .write_all(format!("{tag} {command}\r\n").as_bytes())
            .and_then(|()| writer.flush())
            .map_err(io_err)?;

        let mut reply = Reply::default();
        let tagged = format!("{tag} ");
        loop {
            let line = self.read_line()?;
            if let Some(status) = line.strip_prefix(&tagged) {
                reply.ok = status.starts_with("OK");
                reply.status = status.trim_end().to_string();
                return Ok(reply);
            }
            if let Some(len) = literal_len(&line) {
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal).map_err(io_err)?;
                reply.literals.push(literal);
            }
            reply.untagged.push(line);
        }
    }
}

fn io_err(e: std::io::Error) -> MailboxError {
    MailboxError::Protocol(e.to_string())
}

/// `{1234}` at the end of a line announces a literal of that many bytes.
fn literal_len(line: &str) -> Option<usize> {
    let line = line.trim_end();
    let open = line.rfind('{')?;
    line.strip_suffix('}')?[open + 1..].parse().ok()
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Greeting, LOGIN and SELECT INBOX.
fn open_inbox<S: Read + Write>(
    session: &mut Session<S>,
    user: &str,
    password: &str,
) -> Result<(), MailboxError> {
    session.greeting()?;

    let login = session.command(&format!("LOGIN {} {}", quote(user), quote(password)))?;
    if !login.ok {
        return Err(MailboxError::AuthFailed { user: user.to_string() });
    }

    let select = session.command("SELECT \"INBOX\"")?;
    if !select.ok {
        return Err(MailboxError::Protocol(format!("SELECT failed: {}", select.status)));
    }
    Ok(())
}

fn logout<S: Read + Write>(session: &mut Session<S>) {
    if let Err(e) = session.command("LOGOUT") {
        debug!(error = %e, "LOGOUT failed");
    }
}

/// Log in and fetch up to `limit` unseen messages, oldest first. Flags are
/// left untouched; unreadable messages are skipped and stay unseen.
fn fetch_unseen<S: Read + Write>(
    stream: S,
    user: &str,
    password: &str,
    limit: usize,
) -> Result<Vec<(u32, Email)>, MailboxError> {
    let mut session = Session::new(stream);
    open_inbox(&mut session, user, password)?;

    let search = session.command("UID SEARCH UNSEEN")?;
    if !search.ok {
        return Err(MailboxError::Protocol(format!("SEARCH failed: {}", search.status)));
    }
    let mut uids: Vec<u32> = search
        .untagged
        .iter()
        .filter_map(|l| l.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace().filter_map(|u| u.parse().ok()))
        .collect();
    uids.sort_unstable();
    if uids.len() > limit {
        debug!(unseen = uids.len(), limit, "Truncating unseen batch");
        uids.truncate(limit);
    }

    let mut emails = Vec::with_capacity(uids.len());
    for uid in uids {
        let fetch = session.command(&format!("UID FETCH {uid} BODY.PEEK[]"))?;
        match fetch.literals.first().and_then(|raw| parse_message(uid, raw)) {
            Some(email) => emails.push((uid, email)),
            None => warn!(uid, "Skipping unreadable message"),
        }
    }

    logout(&mut session);
    info!(count = emails.len(), "Fetched unseen emails");
    Ok(emails)
}

/// Log in and flag `uids` as `\Seen` with a single STORE.
fn flag_seen<S: Read + Write>(
    stream: S,
    user: &str,
    password: &str,
    uids: &[u32],
) -> Result<(), MailboxError> {
    let mut session = Session::new(stream);
    open_inbox(&mut session, user, password)?;

    let set = uids.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
    let store = session.command(&format!("UID STORE {set} +FLAGS (\\Seen)"))?;
    logout(&mut session);

    if !store.ok {
        return Err(MailboxError::Protocol(format!("STORE failed: {}", store.status)));
    }
    debug!(count = uids.len(), "Flagged messages seen");
    Ok(())
}

fn parse_message(uid: u32, raw: &[u8]) -> Option<Email> {
    let parsed = MessageParser::default().parse(raw)?;

    let id = parsed
        .message_id()
        .map(str::to_string)
        .unwrap_or_else(|| format!("uid-{uid}"));
    let subject = parsed.subject().unwrap_or("(no subject)").to_string();
    let sender = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .unwrap_or("unknown")
        .to_string();
    let received_at = parsed
        .date()
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);

    Some(Email {
        id,
        subject,
        sender,
        body: strip_quoted_text(&body_text(&parsed)),
        received_at,
    })
}

fn body_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.into_owned();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(&html);
    }
    parsed
        .attachments()
        .find(|part| {
            MimeHeaders::content_type(*part).is_some_and(|ct| ct.ctype() == "text")
        })
        .and_then(|part| std::str::from_utf8(part.contents()).ok())
        .map(str::to_string)
        .unwrap_or_default()
}
