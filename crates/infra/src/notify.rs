//! One-time passcode delivery.
//!
//! Delivery is best-effort. [`FallbackSender`] walks its chain in order
//! (SMTP, Postmark, RapidAPI when configured) and always ends with
//! [`LogSender`], so a login request never fails because an email provider
//! is down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OnceCell;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("{provider} is not configured")]
    NotConfigured { provider: &'static str },

    #[error("{provider} request failed: {message}")]
    Transport { provider: &'static str, message: String },

    #[error("{provider} rejected the message with status {status}")]
    Rejected { provider: &'static str, status: u16 },
}

/// A channel that can deliver a code to a recipient (email address or phone).
#[async_trait::async_trait]
pub trait OtpSender: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, recipient: &str, code: &str) -> Result<(), NotifyError>;
}

pub type SharedSender = Arc<dyn OtpSender>;

fn is_email(recipient: &str) -> bool {
    recipient.contains('@')
}

/// Postmark transactional email API.
#[derive(Debug, Clone)]
pub struct PostmarkSender {
    client: reqwest::Client,
    endpoint: String,
    server_token: String,
    from_email: String,
    ttl_minutes: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: String,
    message_stream: &'a str,
}

impl PostmarkSender {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.postmarkapp.com/email";

    pub fn new(server_token: String, from_email: String, ttl_minutes: i64) -> Result<Self, NotifyError> {
        Self::with_endpoint(Self::DEFAULT_ENDPOINT.to_string(), server_token, from_email, ttl_minutes)
    }

    pub fn with_endpoint(
        endpoint: String,
        server_token: String,
        from_email: String,
        ttl_minutes: i64,
    ) -> Result<Self, NotifyError> {
        if server_token.trim().is_empty() {
            return Err(NotifyError::NotConfigured { provider: "postmark" });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Transport {
                provider: "postmark",
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint,
            server_token,
            from_email,
            ttl_minutes,
        })
    }
}

#[async_trait::async_trait]
impl OtpSender for PostmarkSender {
    fn name(&self) -> &'static str {
        "postmark"
    }

    async fn send(&self, recipient: &str, code: &str) -> Result<(), NotifyError> {
        let body = PostmarkEmail {
            from: &self.from_email,
            to: recipient,
            subject: EMAIL_SUBJECT,
            text_body: email_body(code, self.ttl_minutes),
            message_stream: "outbound",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", &self.server_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport {
                provider: "postmark",
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                provider: "postmark",
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Plain-text body shared by the email providers.
fn email_body(code: &str, ttl_minutes: i64) -> String {
    format!(
        "Your OTP code for Railway Parcel Management System is: {code}\n\n\
         This code will expire in {ttl_minutes} minutes.\n\n\
         If you didn't request this code, please ignore this email."
    )
}

const EMAIL_SUBJECT: &str = "Railway Parcel Management - OTP Code";

/// SMTP relay settings, e.g. Gmail with an app password.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    /// 465 uses implicit TLS; any other port upgrades with STARTTLS.
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
}

/// Email over an authenticated SMTP relay.
///
/// The transport is built on first use so a bad relay setting shows up as a
/// failed delivery, not a startup error.
pub struct SmtpSender {
    settings: SmtpSettings,
    ttl_minutes: i64,
    transport: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpSender {
    pub fn new(settings: SmtpSettings, ttl_minutes: i64) -> Result<Self, NotifyError> {
        if settings.host.trim().is_empty() || settings.username.trim().is_empty() {
            return Err(NotifyError::NotConfigured { provider: "smtp" });
        }
        Ok(Self {
            settings,
            ttl_minutes,
            transport: OnceCell::new(),
        })
    }

    fn transport_error(e: impl std::fmt::Display) -> NotifyError {
        NotifyError::Transport {
            provider: "smtp",
            message: e.to_string(),
        }
    }

    async fn transport(&self) -> Result<&AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        self.transport
            .get_or_try_init(|| async {
                let s = &self.settings;
                let builder = if s.port == 465 {
                    AsyncSmtpTransport::<Tokio1Executor>::relay(&s.host)
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&s.host)
                }
                .map_err(Self::transport_error)?;
                Ok::<_, NotifyError>(builder
                    .port(s.port)
                    .credentials(Credentials::new(s.username.clone(), s.password.clone()))
                    .timeout(Some(Duration::from_secs(10)))
                    .build())
            })
            .await
    }
}

#[async_trait::async_trait]
impl OtpSender for SmtpSender {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, recipient: &str, code: &str) -> Result<(), NotifyError> {
        let from: Mailbox = self.settings.from_email.parse().map_err(Self::transport_error)?;
        let to: Mailbox = recipient.parse().map_err(Self::transport_error)?;
        let email = lettre::Message::builder()
            .from(from)
            .to(to)
            .subject(EMAIL_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(email_body(code, self.ttl_minutes))
            .map_err(Self::transport_error)?;

        self.transport()
            .await?
            .send(email)
            .await
            .map_err(Self::transport_error)?;
        Ok(())
    }
}

/// RapidAPI email OTP relay.
#[derive(Debug, Clone)]
pub struct RapidApiSender {
    client: reqwest::Client,
    endpoint: String,
    host: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct RapidApiOtp<'a> {
    email: &'a str,
    otp: &'a str,
}

impl RapidApiSender {
    pub const DEFAULT_HOST: &'static str = "emailotp.p.rapidapi.com";

    pub fn new(api_key: String) -> Result<Self, NotifyError> {
        let endpoint = format!("https://{}/otp_verification", Self::DEFAULT_HOST);
        Self::with_endpoint(endpoint, Self::DEFAULT_HOST.to_string(), api_key)
    }

    pub fn with_endpoint(endpoint: String, host: String, api_key: String) -> Result<Self, NotifyError> {
        if api_key.trim().is_empty() {
            return Err(NotifyError::NotConfigured { provider: "rapidapi" });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Transport {
                provider: "rapidapi",
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint,
            host,
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl OtpSender for RapidApiSender {
    fn name(&self) -> &'static str {
        "rapidapi"
    }

    async fn send(&self, recipient: &str, code: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-rapidapi-host", &self.host)
            .header("x-rapidapi-key", &self.api_key)
            .json(&RapidApiOtp {
                email: recipient,
                otp: code,
            })
            .send()
            .await
            .map_err(|e| NotifyError::Transport {
                provider: "rapidapi",
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                provider: "rapidapi",
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Writes the code to the service log. Stands in for SMS delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

#[async_trait::async_trait]
impl OtpSender for LogSender {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, recipient: &str, code: &str) -> Result<(), NotifyError> {
        tracing::info!(recipient, code, "OTP delivered via log channel");
        Ok(())
    }
}

/// Records every delivery. Used by tests to read back issued codes.
#[derive(Debug, Default)]
pub struct MemorySender {
    sent: Mutex<Vec<(String, String)>>,
}

impl MemorySender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent code sent to `recipient`.
    pub fn last_code_for(&self, recipient: &str) -> Option<String> {
        let sent = self.sent.lock().ok()?;
        sent.iter()
            .rev()
            .find(|(to, _)| to == recipient)
            .map(|(_, code)| code.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl OtpSender for MemorySender {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn send(&self, recipient: &str, code: &str) -> Result<(), NotifyError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((recipient.to_string(), code.to_string()));
        }
        Ok(())
    }
}

/// Tries each email sender in turn, then falls back to the log channel.
#[derive(Clone, Default)]
pub struct FallbackSender {
    chain: Vec<SharedSender>,
    last_resort: LogSender,
}

impl FallbackSender {
    pub fn new(chain: Vec<SharedSender>) -> Self {
        Self {
            chain,
            last_resort: LogSender,
        }
    }

    /// Deliver and report which channel succeeded.
    pub async fn deliver(&self, recipient: &str, code: &str) -> &'static str {
        if is_email(recipient) {
            for sender in &self.chain {
                match sender.send(recipient, code).await {
                    Ok(()) => {
                        tracing::info!(channel = sender.name(), "OTP sent");
                        return sender.name();
                    }
                    Err(e) => {
                        tracing::warn!(channel = sender.name(), error = %e, "OTP delivery failed, trying next channel");
                    }
                }
            }
        }
        // LogSender cannot fail.
        let _ = self.last_resort.send(recipient, code).await;
        self.last_resort.name()
    }
}

#[async_trait::async_trait]
impl OtpSender for FallbackSender {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn send(&self, recipient: &str, code: &str) -> Result<(), NotifyError> {
        self.deliver(recipient, code).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait::async_trait]
    impl OtpSender for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn send(&self, _recipient: &str, _code: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Rejected {
                provider: "failing",
                status: 503,
            })
        }
    }

    #[tokio::test]
    async fn falls_through_failing_senders() {
        let memory = Arc::new(MemorySender::new());
        let chain: Vec<SharedSender> = vec![Arc::new(Failing), memory.clone()];
        let sender = FallbackSender::new(chain);

        assert_eq!(sender.deliver("op@rail.in", "123456").await, "memory");
        assert_eq!(memory.last_code_for("op@rail.in").as_deref(), Some("123456"));
    }

    #[tokio::test]
    async fn phone_numbers_go_to_the_log_channel() {
        let memory = Arc::new(MemorySender::new());
        let sender = FallbackSender::new(vec![memory.clone()]);

        assert_eq!(sender.deliver("+919800000000", "654321").await, "log");
        assert_eq!(memory.count(), 0);
    }

    #[tokio::test]
    async fn empty_chain_still_delivers() {
        let sender = FallbackSender::default();
        assert!(sender.send("op@rail.in", "111111").await.is_ok());
    }

    /// Fails and records that it was tried.
    struct Down {
        name: &'static str,
        tried: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait::async_trait]
    impl OtpSender for Down {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn send(&self, _recipient: &str, _code: &str) -> Result<(), NotifyError> {
            self.tried.lock().unwrap().push(self.name);
            Err(NotifyError::Transport {
                provider: self.name,
                message: "unreachable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn every_provider_is_tried_in_order_before_the_log() {
        let tried = Arc::new(Mutex::new(Vec::new()));
        let chain: Vec<SharedSender> = ["smtp", "postmark", "rapidapi"]
            .into_iter()
            .map(|name| {
                Arc::new(Down {
                    name,
                    tried: tried.clone(),
                }) as SharedSender
            })
            .collect();
        let sender = FallbackSender::new(chain);

        assert_eq!(sender.deliver("op@rail.in", "123456").await, "log");
        assert_eq!(*tried.lock().unwrap(), vec!["smtp", "postmark", "rapidapi"]);
    }

    #[test]
    fn smtp_requires_a_host_and_login() {
        let settings = SmtpSettings {
            host: "smtp.gmail.com".to_string(),
            port: 465,
            username: String::new(),
            password: "app-password".to_string(),
            from_email: "noreply@rail.in".to_string(),
        };
        let err = SmtpSender::new(settings, 10).err().unwrap();
        assert!(matches!(err, NotifyError::NotConfigured { provider: "smtp" }));
    }

    #[test]
    fn rapidapi_requires_a_key() {
        let err = RapidApiSender::new(String::new()).unwrap_err();
        assert!(matches!(err, NotifyError::NotConfigured { provider: "rapidapi" }));
    }

    #[test]
    fn postmark_requires_a_token() {
        let err = PostmarkSender::new("  ".to_string(), "noreply@rail.in".to_string(), 10).unwrap_err();
        assert!(matches!(err, NotifyError::NotConfigured { provider: "postmark" }));
    }

    #[test]
    fn memory_sender_returns_latest_code() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let memory = MemorySender::new();
        rt.block_on(async {
            memory.send("a@rail.in", "100000").await.unwrap();
            memory.send("a@rail.in", "200000").await.unwrap();
        });
        assert_eq!(memory.last_code_for("a@rail.in").as_deref(), Some("200000"));
        assert_eq!(memory.last_code_for("b@rail.in"), None);
    }
}
