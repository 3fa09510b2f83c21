// Operator channel - where configuration gaps, validation failures and errors are reported

use tracing::{error, warn};

use super::{Notification, NotificationSender};
use crate::resolver::{looks_like_address, RecipientKey, RecipientResolver, Role};

pub const SUBJECT_PREFIX: &str = "[調査書作成願]";

pub struct OperatorChannel<'a> {
    sender: &'a dyn NotificationSender,
    resolver: &'a dyn RecipientResolver,
}

impl<'a> OperatorChannel<'a> {
    pub fn new(sender: &'a dyn NotificationSender, resolver: &'a dyn RecipientResolver) -> Self {
        Self { sender, resolver }
    }

    /// Report to the administrator
    pub fn report(&self, subject: &str, body: &str) -> Option<String> {
        self.report_to(&[Role::Admin], subject, body)
    }

    /// Report to the first role in `roles` with a usable address.
    /// Returns the address the notice went to; a notice nobody can receive is logged.
    pub fn report_to(&self, roles: &[Role], subject: &str, body: &str) -> Option<String> {
        let recipient = roles.iter().find_map(|role| {
            self.resolver
                .resolve(&RecipientKey::Role(*role))
                .filter(|address| looks_like_address(address))
        });

        let Some(recipient) = recipient else {
            warn!(
                roles = ?roles,
                subject = %subject,
                "No operator address configured; notice only logged"
            );
            return None;
        };

        let notice = Notification::new(&recipient, format!("{SUBJECT_PREFIX} {subject}"), body);
        match self.sender.send(&notice) {
            Ok(()) => Some(recipient),
            Err(e) => {
                error!(
                    recipient = %recipient,
                    subject = %subject,
                    error = %e,
                    "Failed to deliver operator notice"
                );
                None
            }
        }
    }
}
