//! Mailbox sources and notification channels.

pub mod demo;
pub mod email_text;
pub mod imap;
pub mod log;
pub mod whatsapp;

pub use demo::DemoMailbox;
pub use imap::ImapMailbox;
pub use log::LogNotifier;
pub use whatsapp::TwilioWhatsAppNotifier;
