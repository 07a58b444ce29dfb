//! Outgoing account emails
//!
//! Delivery goes through the `Mailer` trait. Sending is best-effort: callers
//! log failures and carry on.

use async_trait::async_trait;
use tracing::{info, warn};

const PRODUCT_NAME: &str = "judgehub";

/// Rendered email, plain-text and HTML bodies
#[derive(Debug, Clone, PartialEq)]
pub struct MailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, content: MailContent) -> anyhow::Result<()>;
}

/// Mailer that writes messages to the log instead of an SMTP server
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, content: MailContent) -> anyhow::Result<()> {
        info!(
            "Mail to={} subject={:?}\n{}",
            to, content.subject, content.text
        );
        Ok(())
    }
}

/// Send and swallow errors
pub async fn send_best_effort(mailer: &dyn Mailer, to: &str, content: MailContent) {
    match mailer.send(to, content).await {
        Ok(()) => info!("Email sent to {}", to),
        Err(e) => warn!("Error sending email to {}: {:#}", to, e),
    }
}

struct ActionMail<'a> {
    subject: &'a str,
    name: &'a str,
    intro: &'a str,
    instructions: &'a str,
    button_text: &'a str,
    link: &'a str,
}

impl ActionMail<'_> {
    fn render(&self) -> MailContent {
        let outro = "Need help, or have questions? Just reply to this email, we'd love to help.";

        let text = format!(
            "Hi {name},\n\n{intro}\n\n{instructions}\n{link}\n\n{outro}\n\n{product}",
            name = self.name,
            intro = self.intro,
            instructions = self.instructions,
            link = self.link,
            outro = outro,
            product = PRODUCT_NAME,
        );

        let html = format!(
            "<p>Hi {name},</p><p>{intro}</p><p>{instructions}</p>\
             <p><a href=\"{link}\" style=\"background:#22BC66;color:#fff;padding:10px 16px;\
             text-decoration:none;border-radius:4px\">{button}</a></p>\
             <p>{outro}</p><p>{product}</p>",
            name = escape_html(self.name),
            intro = self.intro,
            instructions = self.instructions,
            link = escape_html(self.link),
            button = self.button_text,
            outro = outro,
            product = PRODUCT_NAME,
        );

        MailContent {
            subject: self.subject.to_string(),
            text,
            html,
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn verification_email(username: &str, verification_url: &str) -> MailContent {
    ActionMail {
        subject: "Email Verification",
        name: username,
        intro: "Welcome to judgehub! We're very excited to have you on board.",
        instructions: "To get started, please verify your email address:",
        button_text: "Verify your email address",
        link: verification_url,
    }
    .render()
}

pub fn resend_verification_email(username: &str, verification_url: &str) -> MailContent {
    MailContent {
        subject: "Resend Verification".to_string(),
        ..verification_email(username, verification_url)
    }
}
