pub mod services;

pub use services::{EmailMessage, LogNotifier, Notifier, SmtpNotifier};
