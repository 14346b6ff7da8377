// src/verify/smtp.rs
// =============================================================================
// SMTP RCPT TO probing.
//
// For one MX host the probe does:
//   connect :25 -> EHLO -> MAIL FROM:<sender> -> RCPT TO:<candidate> -> QUIT
// and hands back the reply code of RCPT TO. No message is ever sent.
//
// lettre's SmtpConnection is a blocking client, so the whole exchange runs on
// tokio's blocking thread pool.
//
// Reading the reply:
//   2xx -> the server would accept mail for the address
//   5xx -> the server rejects the address
//   anything else (4xx greylisting, dropped connection, refused MAIL FROM)
//       -> no verdict, try the next MX host
// Many servers accept every RCPT (catch-all) or block probes on sight, so a
// 2xx is weak evidence and "no verdict" is common.
// =============================================================================

use async_trait::async_trait;
use lettre::transport::smtp::client::SmtpConnection;
use lettre::transport::smtp::commands::{Mail, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::response::Code;
use lettre::Address;
use std::net::ToSocketAddrs;
use std::str::FromStr;
use std::time::Duration;

use super::VerificationStatus;
use crate::error::{HarvestError, Result};

const SMTP_PORT: u16 = 25;

#[async_trait]
pub trait SmtpProbe: Send + Sync {
    /// Runs the RCPT TO exchange against `host` and returns the reply code
    async fn probe(&self, host: &str, recipient: &str) -> Result<u16>;
}

/// Maps an RCPT TO reply code to a verdict, None if inconclusive
pub fn classify_reply(code: u16) -> Option<VerificationStatus> {
    match code {
        200..=299 => Some(VerificationStatus::Valid),
        500..=599 => Some(VerificationStatus::Invalid),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct LettreProbe {
    sender: String,
    helo_name: String,
    timeout: Duration,
}

impl LettreProbe {
    pub fn new(sender: impl Into<String>, helo_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            sender: sender.into(),
            helo_name: helo_name.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SmtpProbe for LettreProbe {
    async fn probe(&self, host: &str, recipient: &str) -> Result<u16> {
        let probe = self.clone();
        let host = host.to_string();
        let recipient = recipient.to_string();

        tokio::task::spawn_blocking(move || probe.probe_blocking(&host, &recipient))
            .await
            .map_err(|e| HarvestError::TaskFailed(e.to_string()))?
    }
}

impl LettreProbe {
    fn probe_blocking(&self, host: &str, recipient: &str) -> Result<u16> {
        let smtp_error = |reason: String| HarvestError::Smtp {
            host: host.to_string(),
            reason,
        };

        let sender = Address::from_str(&self.sender)
            .map_err(|e| smtp_error(format!("invalid sender '{}': {}", self.sender, e)))?;
        let recipient_address = Address::from_str(recipient)
            .map_err(|e| smtp_error(format!("invalid recipient '{}': {}", recipient, e)))?;

        let socket_addr = (host, SMTP_PORT)
            .to_socket_addrs()
            .map_err(|e| smtp_error(format!("cannot resolve host: {}", e)))?
            .next()
            .ok_or_else(|| smtp_error("host has no address".to_string()))?;

        tracing::debug!(target: "smtp_task", "Connecting to {} ({})", host, socket_addr);
        let helo = ClientId::Domain(self.helo_name.clone());
        let mut connection =
            SmtpConnection::connect(socket_addr, Some(self.timeout), &helo, None, None)
                .map_err(|e| smtp_error(format!("connect failed: {}", e)))?;

        if let Err(e) = connection.command(Mail::new(Some(sender), vec![])) {
            connection.quit().ok();
            return Err(smtp_error(format!("MAIL FROM refused: {}", e)));
        }

        let outcome = match connection.command(Rcpt::new(recipient_address, vec![])) {
            Ok(response) => Ok(code_number(response.code())),
            // negative replies come back as errors but still carry the code
            Err(e) => match e.status() {
                Some(code) => Ok(code_number(code)),
                None => Err(smtp_error(format!("RCPT TO failed: {}", e))),
            },
        };

        connection.quit().ok();

        if let Ok(code) = &outcome {
            tracing::debug!(target: "smtp_task", "RCPT TO:<{}> via {} -> {}", recipient, host, code);
        }
        outcome
    }
}

fn code_number(code: Code) -> u16 {
    // Code displays as its three digits, e.g. "550"
    code.to_string().parse().unwrap_or(0)
}
