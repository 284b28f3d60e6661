use anyhow::{anyhow, Result};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::AppConfig;

/// Outbound SMTP client. When SMTP is not configured the mailer stays
/// disabled: every send is logged and skipped so messages remain observable
/// in development.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
    app_base_url: String,
    frontend_url: String,
    company_approver_email: Option<String>,
}

impl Mailer {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let from_address = config
            .email_from
            .clone()
            .or_else(|| config.smtp_username.clone());

        let (transport, from) = match (&config.smtp_host, &from_address) {
            (Some(host), Some(address)) => {
                // Implicit TLS on 465, STARTTLS otherwise.
                let mut builder = if config.smtp_port == 465 {
                    AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
                };
                builder = builder.port(config.smtp_port);
                if let (Some(username), Some(password)) =
                    (&config.smtp_username, &config.smtp_password)
                {
                    builder =
                        builder.credentials(Credentials::new(username.clone(), password.clone()));
                }
                let from = format!("Brag Board <{}>", address)
                    .parse::<Mailbox>()
                    .map_err(|err| anyhow!("invalid EMAIL_FROM: {}", err))?;
                (Some(builder.build()), Some(from))
            }
            _ => (None, None),
        };

        Ok(Self {
            transport,
            from,
            app_base_url: config.app_base_url.trim_end_matches('/').to_string(),
            frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
            company_approver_email: config.company_approver_email.clone(),
        })
    }

    pub fn company_approver_email(&self) -> Option<&str> {
        self.company_approver_email.as_deref()
    }

    async fn send(&self, to: &str, subject: &str, text: String, html: String) -> Result<()> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            tracing::info!(to, subject, "smtp not configured, skipping email");
            return Ok(());
        };

        let message = Message::builder()
            .from(from.clone())
            .to(to
                .parse::<Mailbox>()
                .map_err(|err| anyhow!("invalid recipient address {}: {}", to, err))?)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text, html))?;

        transport.send(message).await?;
        Ok(())
    }

    /// Email-verification link pointing at the backend verify endpoint.
    pub async fn send_verification_email(&self, to: &str, name: &str, token: &str) -> Result<()> {
        let verify_link = format!("{}/api/auth/verify-email?token={}", self.app_base_url, token);
        let subject = "Verify your email address";
        let text = format!(
            "Hello {name},\n\nPlease verify your email by clicking the link: {verify_link}\n\
             This link will expire in 24 hours.\n\n\
             If you did not sign up, you can ignore this email."
        );
        let html = format!(
            "<div style='font-family: Arial, sans-serif; line-height: 1.6;'>\
             <h2>Welcome to BragBoard, {name}!</h2>\
             <p>Thanks for signing up. Please verify your email address by clicking the button below:</p>\
             <p><a href=\"{verify_link}\" style=\"background:#2563eb;color:#fff;padding:10px 16px;border-radius:6px;text-decoration:none;display:inline-block\">Verify Email</a></p>\
             <p>Or copy and paste this URL into your browser:</p>\
             <p><a href=\"{verify_link}\">{verify_link}</a></p>\
             <p>This link will expire in 24 hours.</p>\
             <p>If you didn't create an account, you can ignore this email.</p>\
             </div>"
        );
        self.send(to, subject, text, html).await
    }

    /// Password-reset link pointing at the frontend reset page.
    pub async fn send_password_reset_email(&self, to: &str, name: &str, token: &str) -> Result<()> {
        let reset_link = format!("{}/reset-password?token={}", self.frontend_url, token);
        let subject = "Reset your password";
        let text = format!(
            "Hello {name},\n\n\
             You recently requested to reset your password. Click the link below to proceed:\n{reset_link}\n\n\
             If you did not request this, you can ignore this email. The link expires in 1 hour."
        );
        let html = format!(
            "<div style='font-family: Arial, sans-serif; line-height: 1.6;'>\
             <h2>Password Reset Request</h2>\
             <p>Hello {name},</p>\
             <p>You requested a password reset. Click the button below to set a new password (link valid 1 hour):</p>\
             <p><a href=\"{reset_link}\" style=\"background:#2563eb;color:#fff;padding:10px 16px;border-radius:6px;text-decoration:none;display:inline-block\">Reset Password</a></p>\
             <p>Or copy and paste this URL:</p>\
             <p><a href=\"{reset_link}\">{reset_link}</a></p>\
             <p>If you didn't request this, you can safely ignore this email.</p>\
             </div>"
        );
        self.send(to, subject, text, html).await
    }

    /// Notify the company approver about a newly verified user awaiting
    /// approval. A no-op when no approver address is configured.
    pub async fn send_company_approval_email(
        &self,
        name: &str,
        email: &str,
        department: Option<&str>,
        role: &str,
        token: &str,
    ) -> Result<()> {
        let Some(approver) = self.company_approver_email.clone() else {
            return Ok(());
        };

        let approve_link = format!(
            "{}/api/auth/company-approval?token={}&action=approve",
            self.app_base_url, token
        );
        let reject_link = format!(
            "{}/api/auth/company-approval?token={}&action=reject",
            self.app_base_url, token
        );
        let subject = "New employee waiting for approval";
        let department_display = department.unwrap_or("Not specified");

        let text = format!(
            "A new user has completed email verification.\n\n\
             Name: {name}\nEmail: {email}\nDepartment: {department_display}\nRole: {role}\n\n\
             Approve: {approve_link}\nReject: {reject_link}\n"
        );
        let html = format!(
            "<div style='font-family: Arial, sans-serif; line-height: 1.6;'>\
             <h2>New Employee Awaiting Approval</h2>\
             <p>A new user has completed email verification and is waiting for company approval.</p>\
             <table style='border-collapse: collapse; margin-bottom: 16px;'>\
             <tr><td style='font-weight:bold; padding:4px 12px;'>Name</td><td style='padding:4px 12px;'>{name}</td></tr>\
             <tr><td style='font-weight:bold; padding:4px 12px;'>Email</td><td style='padding:4px 12px;'>{email}</td></tr>\
             <tr><td style='font-weight:bold; padding:4px 12px;'>Department</td><td style='padding:4px 12px;'>{department_display}</td></tr>\
             <tr><td style='font-weight:bold; padding:4px 12px;'>Role</td><td style='padding:4px 12px;'>{role}</td></tr>\
             </table>\
             <p>Please choose an action:</p>\
             <p><a href=\"{approve_link}\" style=\"background:#16a34a;color:#fff;padding:10px 16px;border-radius:6px;text-decoration:none;margin-right:12px;display:inline-block\">Approve</a>\
             <a href=\"{reject_link}\" style=\"background:#dc2626;color:#fff;padding:10px 16px;border-radius:6px;text-decoration:none;display:inline-block\">Reject</a></p>\
             <p>If the buttons above do not work, use these links:</p>\
             <p>Approve: <a href=\"{approve_link}\">{approve_link}</a></p>\
             <p>Reject: <a href=\"{reject_link}\">{reject_link}</a></p>\
             </div>"
        );
        self.send(&approver, subject, text, html).await
    }

    /// Confirmation to the user after the company approval decision.
    pub async fn send_company_approval_outcome_email(
        &self,
        to: &str,
        name: &str,
        approved: bool,
    ) -> Result<()> {
        let login_link = format!("{}/login", self.frontend_url);
        let (subject, headline, body, cta_color) = if approved {
            (
                "Welcome to Brag Board",
                "You're all set!",
                format!(
                    "Hi {name},<br /><p>Your company administrator just approved your account. \
                     You can now sign in, start posting shoutouts, and celebrate your teammates.</p>"
                ),
                "#16a34a",
            )
        } else {
            (
                "Update on your Brag Board request",
                "We're sorry",
                format!(
                    "Hi {name},<br /><p>We received a response from your company administrator and \
                     they weren't able to approve your Brag Board access at this time.</p>\
                     <p>If you think this is a mistake, please reach out to them directly and feel \
                     free to try again later.</p>"
                ),
                "#2563eb",
            )
        };

        let text = if approved {
            format!(
                "Hi {name},\n\nGreat news! Your company administrator approved your Brag Board \
                 account. You can now sign in and get started.\n\nSign in: {login_link}\n\n\
                 Thanks for being part of the community!"
            )
        } else {
            format!(
                "Hi {name},\n\nWe wanted to let you know that your company administrator did not \
                 approve your Brag Board access. If this doesn't look right, please contact them \
                 directly.\n\nSign in: {login_link}\n\nThanks for being part of the community!"
            )
        };
        let headline_color = if approved { "#16a34a" } else { "#dc2626" };
        let html = format!(
            "<div style='font-family: Arial, sans-serif; line-height: 1.6; color: #0f172a;'>\
             <h2 style='color: {headline_color}; margin-bottom: 16px;'>{headline}</h2>\
             {body}\
             <p style='margin: 24px 0;'>\
             <a href=\"{login_link}\" style='background:{cta_color};color:#fff;padding:10px 18px;border-radius:6px;text-decoration:none;display:inline-block;'>Sign in to Brag Board</a>\
             </p>\
             <p style='font-size: 0.9rem; color: #475569;'>If the button above doesn't work, copy \
             and paste this link into your browser:<br /><a href=\"{login_link}\">{login_link}</a></p>\
             </div>"
        );
        self.send(to, subject, text, html).await
    }

    /// Heads-up to the user after their password changed.
    pub async fn send_password_change_confirmation_email(
        &self,
        to: &str,
        name: &str,
    ) -> Result<()> {
        let login_link = format!("{}/login", self.frontend_url);
        let reset_link = format!("{}/forgot-password", self.frontend_url);
        let subject = "Your Brag Board password was updated";
        let text = format!(
            "Hi {name},\n\n\
             This is a confirmation that your Brag Board password was just changed. \
             If you made this change, you're all set.\n\n\
             If you didn't request this update, reset your password immediately using the link \
             below and contact support.\n\n\
             Reset password: {reset_link}\nSign in: {login_link}\n\nStay secure!"
        );
        let html = format!(
            "<div style='font-family: Arial, sans-serif; line-height: 1.6; color: #0f172a;'>\
             <h2 style='color:#2563eb;'>Password successfully updated</h2>\
             <p>Hi {name},</p>\
             <p>This is a quick confirmation that your Brag Board password has been changed. If you \
             just updated it, there's nothing else you need to do.</p>\
             <p>If this wasn't you, please reset your password immediately and get in touch with \
             your administrator.</p>\
             <p style='margin: 24px 0;'>\
             <a href=\"{login_link}\" style='background:#2563eb;color:#fff;padding:10px 18px;border-radius:6px;text-decoration:none;display:inline-block;'>Sign in</a>\
             </p>\
             <p style='font-size: 0.9rem; color: #475569;'>Need help? Reset here: \
             <a href=\"{reset_link}\">{reset_link}</a></p>\
             </div>"
        );
        self.send(to, subject, text, html).await
    }
}
