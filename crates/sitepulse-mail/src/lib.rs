pub mod error;
pub mod sender;
pub mod templates;

pub use error::{MailError, Result};
pub use sender::{Notifier, SmtpConfig, SmtpNotifier};
pub use templates::{render_completion, EmailTemplate};
