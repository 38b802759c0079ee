//! Interactive SSH session to an ASA.
//!
//! The ASA CLI is only reachable through an interactive shell, so commands
//! are written to a PTY channel and replies are read until the device prompt
//! shows up again. Everything the device sends is also appended to the
//! session log in the backup directory.

use super::{Connector, Scope, Session};
use crate::config::DeviceParams;
use crate::utils::TransportError;
use regex::Regex;
use std::borrow::Cow;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._/()\-]+[#>]\s*$").unwrap());
static PASSWORD_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)password:\s*$").unwrap());

const TERMINAL_WIDTH: u32 = 511;

pub struct SshSession {
    // Field order: the channel has to go before the session it belongs to.
    channel: ssh2::Channel,
    _session: ssh2::Session,
    read_timeout: Duration,
    log: Option<File>,
    host: String,
}

impl SshSession {
    pub fn connect(params: &DeviceParams, session_log: Option<&Path>) -> Result<Self, TransportError> {
        let tcp = connect_tcp(&params.hostname, params.port, params.conn_timeout)?;

        let mut session = ssh2::Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(millis(params.conn_timeout));
        session.handshake()?;

        authenticate(&session, params)?;

        session.set_timeout(millis(params.read_timeout));
        let mut channel = session.channel_session()?;
        channel.request_pty("vt100", None, Some((TERMINAL_WIDTH, 24, 0, 0)))?;
        channel.shell()?;

        let log = match session_log {
            Some(path) => match File::create(path) {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot create session log");
                    None
                }
            },
            None => None,
        };

        let mut ssh = Self {
            channel,
            _session: session,
            read_timeout: params.read_timeout,
            log,
            host: params.hostname.clone(),
        };

        ssh.read_until(&PROMPT, "login")?;
        ssh.enable(&params.enable_secret)?;
        ssh.prepare_terminal()?;

        info!(host = %ssh.host, "SSH session established");
        Ok(ssh)
    }

    fn enable(&mut self, secret: &str) -> Result<(), TransportError> {
        self.write_line("enable")?;
        let reply = self.read_until_any("enable")?;
        if PASSWORD_PROMPT.is_match(&reply) {
            self.channel.write_all(format!("{}\n", secret).as_bytes())?;
            self.read_until(&PROMPT, "enable secret")?;
        }
        Ok(())
    }

    fn prepare_terminal(&mut self) -> Result<(), TransportError> {
        self.send("terminal pager 0")?;
        self.send(&format!("terminal width {}", TERMINAL_WIDTH))?;
        Ok(())
    }

    fn write_line(&mut self, command: &str) -> Result<(), TransportError> {
        self.channel.write_all(format!("{}\n", command).as_bytes())?;
        self.channel.flush()?;
        Ok(())
    }

    /// Read until the last line is the prompt or a password request.
    fn read_until_any(&mut self, context: &str) -> Result<String, TransportError> {
        self.read_matching(context, |last| PROMPT.is_match(last) || PASSWORD_PROMPT.is_match(last))
    }

    fn read_until(&mut self, pattern: &Regex, context: &str) -> Result<String, TransportError> {
        self.read_matching(context, |last| pattern.is_match(last))
    }

    fn read_matching<F>(&mut self, context: &str, done: F) -> Result<String, TransportError>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = Instant::now() + self.read_timeout;
        let mut reply = ReplyBuffer::default();
        let mut buf = [0u8; 8192];

        loop {
            if Instant::now() > deadline {
                return Err(TransportError::Timeout {
                    command: context.to_string(),
                });
            }

            match self.channel.read(&mut buf) {
                Ok(0) if self.channel.eof() => return Err(TransportError::Closed),
                Ok(0) => continue,
                Ok(n) => {
                    if let Some(log) = self.log.as_mut() {
                        if let Err(e) = log.write_all(&buf[..n]) {
                            warn!(error = %e, "Writing session log failed, disabling it");
                            self.log = None;
                        }
                    }
                    reply.push(&buf[..n]);
                    if done(&*reply.last_line()) {
                        return Ok(reply.into_string());
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Err(TransportError::Timeout {
                        command: context.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Session for SshSession {
    fn send(&mut self, command: &str) -> Result<String, TransportError> {
        debug!(host = %self.host, command = %command, "Sending command");
        self.write_line(command)?;
        let raw = self.read_until(&PROMPT, command)?;
        Ok(clean_output(&raw, command))
    }

    fn change_scope(&mut self, scope: &Scope) -> Result<(), TransportError> {
        self.send(scope.command())?;
        // Pager settings are per context.
        self.send("terminal pager 0")?;
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.write_line("exit").is_err() {
            return;
        }
        if let Err(e) = self.channel.close() {
            debug!(host = %self.host, error = %e, "Closing SSH channel failed");
        }
    }
}

/// Opens real SSH sessions, logging each transcript to `<log_dir>/session.log`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnector;

impl Connector for SshConnector {
    type Session = SshSession;

    fn connect(&self, params: &DeviceParams, log_dir: &Path) -> Result<SshSession, TransportError> {
        let log = log_dir.join(crate::destination::SESSION_LOG);
        SshSession::connect(params, Some(&log))
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, TransportError> {
    let connect_err = |source| TransportError::Connect {
        host: host.to_string(),
        source,
    };

    let addrs = (host, port).to_socket_addrs().map_err(connect_err)?;
    let mut last_err = std::io::Error::new(ErrorKind::NotFound, "no addresses resolved");

    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = e,
        }
    }

    Err(connect_err(last_err))
}

fn authenticate(session: &ssh2::Session, params: &DeviceParams) -> Result<(), TransportError> {
    if let Some(key) = params.ssh_key.as_deref().filter(|k| k.exists()) {
        if let Err(e) = session.userauth_pubkey_file(&params.username, None, key, None) {
            debug!(key = %key.display(), error = %e, "Public key authentication failed");
        }
    }

    if !session.authenticated() {
        session
            .userauth_password(&params.username, &params.password)
            .map_err(|_| TransportError::Authentication {
                username: params.username.clone(),
                host: params.hostname.clone(),
            })?;
    }

    if !session.authenticated() {
        return Err(TransportError::Authentication {
            username: params.username.clone(),
            host: params.hostname.clone(),
        });
    }

    Ok(())
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// Raw bytes of one reply, decoded as a whole so that a multibyte
/// character split across two reads stays intact.
#[derive(Debug, Default)]
struct ReplyBuffer {
    raw: Vec<u8>,
}

impl ReplyBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.raw.extend_from_slice(chunk);
    }

    /// Last non-empty line, where the prompt shows up.
    fn last_line(&self) -> Cow<'_, str> {
        let end = self
            .raw
            .iter()
            .rposition(|b| !matches!(b, b'\r' | b'\n'))
            .map_or(0, |idx| idx + 1);
        let trimmed = &self.raw[..end];
        let start = trimmed
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |idx| idx + 1);

        let mut line = &trimmed[start..];
        while let Some(rest) = line.strip_prefix(b"\r") {
            line = rest;
        }
        String::from_utf8_lossy(line)
    }

    fn into_string(self) -> String {
        match String::from_utf8(self.raw) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

/// Strip the echoed command and the trailing prompt from a raw reply.
pub fn clean_output(raw: &str, command: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "");
    let mut lines: Vec<&str> = normalized.lines().collect();

    if lines.last().is_some_and(|l| PROMPT.is_match(l)) {
        lines.pop();
    }
    if lines.first().is_some_and(|l| l.trim_end().ends_with(command.trim())) {
        lines.remove(0);
    }

    lines.join("\n")
}
