//! Undo/redo on top of [`text_buffer::PieceTreeTextBuffer`].
//!
//! Edits are recorded as reverse [`text_buffer::TextChange`] lists. Edits
//! arriving within the coalescing window are folded into one undo unit.

mod clock;
mod coalescer;
mod config;
mod error;
mod session;
mod stack;
mod state;

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::coalescer::UndoCoalescer;
pub use crate::config::HistoryConfig;
pub use crate::error::{HistoryError, HistoryResult};
pub use crate::session::{EditListener, EditSession, cursor_after};
pub use crate::stack::EditorStack;
pub use crate::state::{FontDescriptor, FontStyle, SavedState, ViewState};
