mod core;
mod inspect;

pub use core::{cmd_delete, cmd_next, cmd_save};
pub use inspect::{cmd_info, cmd_open, cmd_reveal, cmd_sources};
