//! 邮件服务

use std::sync::Arc;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{Message, SmtpTransport, Transport};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::{EmailConfig, EmailMode};
use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn new(to: &str, subject: &str, body: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }
}

pub trait EmailService: Send + Sync {
    /// 发件人地址
    fn sender(&self) -> &str;

    fn send(&self, message: &EmailMessage) -> Result<(), AppError>;
}

/// 只记录不投递，用于本地开发
pub struct LogEmailService {
    from: String,
    sent: Mutex<Vec<EmailMessage>>,
}

impl LogEmailService {
    pub fn new(from: &str) -> Self {
        Self {
            from: from.to_string(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// 已记录的邮件
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }
}

impl EmailService for LogEmailService {
    fn sender(&self) -> &str {
        &self.from
    }

    fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        info!(
            from = %self.from,
            to = %message.to,
            subject = %message.subject,
            "email logged instead of sent"
        );
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// 通过 SMTP 中继投递（明文连接，不含认证）
pub struct SmtpEmailService {
    relay: String,
    from: String,
    mailbox: Mailbox,
    transport: SmtpTransport,
}

impl SmtpEmailService {
    pub fn new(host: &str, port: u16, from: &str) -> Result<Self, AppError> {
        Self::with_timeout(host, port, from, Duration::from_secs(10))
    }

    pub fn with_timeout(host: &str, port: u16, from: &str, timeout: Duration) -> Result<Self, AppError> {
        let mailbox = parse_mailbox("sender", from)?;
        let transport = SmtpTransport::builder_dangerous(host)
            .port(port)
            .timeout(Some(timeout))
            .build();
        Ok(Self {
            relay: format!("{}:{}", host, port),
            from: from.to_string(),
            mailbox,
            transport,
        })
    }

    /// 组装待投递的邮件；地址和头部由 lettre 校验并编码
    pub fn build_message(&self, message: &EmailMessage) -> Result<Message, AppError> {
        let to = parse_mailbox("recipient", &message.to)?;
        Message::builder()
            .from(self.mailbox.clone())
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| AppError::Email(format!("cannot build message to {}: {}", message.to, e)))
    }
}

fn parse_mailbox(role: &str, address: &str) -> Result<Mailbox, AppError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| AppError::Email(format!("invalid {} address '{}': {}", role, address.escape_debug(), e)))
}

impl EmailService for SmtpEmailService {
    fn sender(&self) -> &str {
        &self.from
    }

    fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        let email = self.build_message(message)?;
        debug!(to = %message.to, relay = %self.relay, "relaying email");
        self.transport
            .send(&email)
            .map_err(|e| AppError::Email(format!("smtp relay {} rejected message: {}", self.relay, e)))?;

        info!(to = %message.to, subject = %message.subject, relay = %self.relay, "email sent");
        Ok(())
    }
}

/// 按配置选择邮件实现
pub fn build_email_service(config: &EmailConfig) -> Result<Arc<dyn EmailService>, AppError> {
    let service: Arc<dyn EmailService> = match config.mode {
        EmailMode::Log => Arc::new(LogEmailService::new(&config.from)),
        EmailMode::Smtp => Arc::new(SmtpEmailService::new(&config.host, config.port, &config.from)?),
    };
    Ok(service)
}
