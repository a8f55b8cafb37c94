pub mod content;
pub mod jid;
