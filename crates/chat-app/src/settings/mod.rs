mod file;
pub mod session;
pub mod state;

pub use file::SettingsError;
pub use session::{SESSION_FILE_NAME, SavedSession, SessionFile};
pub use state::{
    ClientSettings, DEFAULT_RELAY_ENDPOINT, IdentitySettings, RelaySettings, SettingsStore,
};
