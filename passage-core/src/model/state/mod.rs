mod editor;
mod path_state;
mod state_data;

pub use editor::PathStateEditor;
pub use path_state::PathState;
pub use state_data::{ExtensionSlot, ExtensionValue, StateData};
