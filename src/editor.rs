pub mod navigation;
pub mod session;

pub use navigation::{next_cell, Advance};
pub use session::{ActiveEdit, Caret, Commit, EditSession, EditTrigger};
