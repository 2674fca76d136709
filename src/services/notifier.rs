use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
};

use crate::config::EmailConfig;
use crate::database::models::{Entry, User};
use crate::database::repositories::{ProfileRepository, UserRepository};
use crate::directory::DirectoryLookup;
use crate::services::forms::DEFAULT_DATE_FORMAT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16) -> Self {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .build();
        Self { transport }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let mut builder = Message::builder()
            .from(message.from.parse::<Mailbox>()?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for to in &message.to {
            builder = builder.to(to.parse::<Mailbox>()?);
        }
        for cc in &message.cc {
            builder = builder.cc(cc.parse::<Mailbox>()?);
        }
        let email = builder.body(message.body.clone())?;

        self.transport.send(email).await?;
        Ok(())
    }
}

/// Logs messages instead of sending them; used when no SMTP host is set.
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        log::info!(
            "Email from {} to {:?} (cc {:?}): {}\n{}",
            message.from,
            message.to,
            message.cc,
            message.subject,
            message.body
        );
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Clone, Default)]
pub struct OutboxMailer {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.outbox
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox lock poisoned"))?
            .push(message.clone());
        Ok(())
    }
}

pub fn mailer_from_config(config: &EmailConfig) -> Arc<dyn Mailer> {
    if config.smtp_host.is_empty() {
        log::info!("No SMTP host configured, emails will be logged");
        Arc::new(ConsoleMailer)
    } else {
        Arc::new(SmtpMailer::new(&config.smtp_host, config.smtp_port))
    }
}

/// Substitute `%(first_name)s` style placeholders with the user's details.
pub fn render_subject(template: &str, user: &User) -> String {
    template
        .replace("%(first_name)s", &user.first_name)
        .replace("%(last_name)s", &user.last_name)
        .replace("%(username)s", &user.username)
        .replace("%(email)s", &user.email)
}

/// Order-preserving de-duplication, falling back when nothing is left.
pub fn finalize_recipients(addresses: Vec<String>, fallback: &str) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for address in addresses {
        let address = address.trim().to_string();
        if address.is_empty()
            || unique
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(&address))
        {
            continue;
        }
        unique.push(address);
    }
    if unique.is_empty() {
        unique.push(fallback.to_string());
    }
    unique
}

fn render_body(entry: &Entry, user: &User, is_edit: bool, work_day: i32, signature: &str) -> String {
    let verb = if is_edit {
        "has updated their time off"
    } else {
        "will be taking time off"
    };
    let hours = entry.total_hours.unwrap_or(0);
    let mut body = format!(
        "{} {} starting {}, ending {}.\n\nTotal: {} hours ({} days)",
        user.full_name_form(false),
        verb,
        entry.start_date.format(DEFAULT_DATE_FORMAT),
        entry.end_date.format(DEFAULT_DATE_FORMAT),
        hours,
        entry.total_days(work_day)
    );
    if !entry.details.is_empty() {
        body.push_str(&format!("\n\nDetails:\n{}", entry.details));
    }
    body.push_str(&format!("\n\n-- \n{}", signature));
    body
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    users: UserRepository,
    profiles: ProfileRepository,
    lookup: DirectoryLookup,
    config: EmailConfig,
    work_day: i32,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        users: UserRepository,
        profiles: ProfileRepository,
        lookup: DirectoryLookup,
        config: EmailConfig,
        work_day: i32,
    ) -> Self {
        Self {
            mailer,
            users,
            profiles,
            lookup,
            config,
            work_day,
        }
    }

    /// HR managers, the user's manager and `extra`, de-duplicated.
    pub async fn recipients(&self, user: &User, extra: &[String]) -> Result<Vec<String>> {
        let mut addresses: Vec<String> = self
            .users
            .hr_managers()
            .await?
            .into_iter()
            .map(|hr| hr.email)
            .filter(|email| !email.is_empty())
            .collect();

        if let Some(profile) = self.profiles.find_by_user(user.id).await? {
            if !profile.manager.is_empty() {
                if let Some(manager) = self.lookup.fetch_user_details(&profile.manager, false).await {
                    if !manager.mail.is_empty() {
                        addresses.push(manager.mail);
                    }
                }
            }
        }

        addresses.extend(extra.iter().cloned());
        Ok(finalize_recipients(addresses, &self.config.fallback_to_address))
    }

    /// Send the notification for a finished entry and return the recipient
    /// list. Transport failures are logged and otherwise ignored.
    pub async fn send_entry_notification(
        &self,
        entry: &Entry,
        user: &User,
        extra: &[String],
        is_edit: bool,
    ) -> Result<Vec<String>> {
        let recipients = self.recipients(user, extra).await?;
        let template = if is_edit {
            &self.config.subject_edit
        } else {
            &self.config.subject
        };

        let message = EmailMessage {
            subject: render_subject(template, user),
            body: render_body(entry, user, is_edit, self.work_day, &self.config.signature),
            from: if user.email.is_empty() {
                self.config.fallback_to_address.clone()
            } else {
                user.email.clone()
            },
            to: recipients.clone(),
            cc: if user.email.is_empty() {
                Vec::new()
            } else {
                vec![user.email.clone()]
            },
        };

        match self.mailer.send(&message).await {
            Ok(()) => log::info!("Notified {:?} about entry {}", recipients, entry.id),
            Err(e) => log::error!("Failed to send notification for entry {}: {}", entry.id, e),
        }

        Ok(recipients)
    }
}
