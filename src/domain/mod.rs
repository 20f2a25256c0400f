mod action;
mod email_address;
mod person_name;
mod slug;

pub use action::Action;
pub use email_address::EmailAddress;
pub use person_name::PersonName;
pub use slug::Slug;

/// Characters that must be quoted in a display name
const SPECIALS: [char; 13] = ['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

/// Format a mailbox as `Name <email>`, or just the email when there is no
/// name. Names with special characters are sent as a quoted string.
pub fn mailbox(name: Option<&str>, email: &str) -> String {
    match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) if name.contains(SPECIALS) => {
            let quoted = name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{}\" <{}>", quoted, email)
        }
        Some(name) => format!("{} <{}>", name, email),
        None => email.to_string(),
    }
}
