pub mod mailer;
pub mod queue;
pub mod submission;
pub mod template;
pub mod vendor;
