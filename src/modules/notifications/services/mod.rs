pub mod email_templates;
pub mod notifier;

pub use notifier::{notifier_from_config, EmailMessage, LogNotifier, Notifier, SmtpNotifier};
