pub mod mailer;
pub mod reset_link;
