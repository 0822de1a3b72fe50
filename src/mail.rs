//! Outbound mail interface.
//!
//! Actual delivery is an external collaborator; the server only needs a seam
//! it can hand a reset link to. Deployments wire in their own transport; the
//! default implementation records the link in the server log so a local
//! install stays usable without SMTP credentials.

use crate::error::Result;

pub trait Mailer: Send + Sync {
    fn send_password_reset(&self, email: &str, reset_link: &str) -> Result<()>;
}

pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_password_reset(&self, email: &str, reset_link: &str) -> Result<()> {
        tracing::info!("Password reset requested for {email}: {reset_link}");
        Ok(())
    }
}
