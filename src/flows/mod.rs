//! Screen flows outside the classification run: login, selection, save, success.
//!
//! Each flow guards the session where the screen is protected, reports through
//! [`crate::logging`], and answers with the [`Navigation`](crate::model::Navigation)
//! the host should follow or a [`FlowError`](crate::error::FlowError).

mod login;
mod save;
mod selection;
mod success;

pub use login::{begin_login, complete_login, logout, CallbackParams};
pub use save::{default_playlist_name, playlist_names, save_playlists, skip_save, SaveOptions};
pub use selection::{choose_emotions, normalize_emotions, select_playlist};
pub use success::{load_summary, start_over, CategorySummary, SuccessSummary, PLAYLISTS_LIBRARY_URL};
