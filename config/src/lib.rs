pub mod paths;
pub mod settings;

pub use paths::PathManager;
pub use settings::Settings;

/// Load environment variables from .env files.
/// Reads ./.env (project directory) and then ~/.env (home directory).
/// Project directory values take precedence over home directory values, and
/// variables already present in the process environment win over both.
/// Call this before parsing CLI args to ensure env vars are available.
pub fn load_env_file() {
    // dotenv never overwrites a variable that is already set, so the
    // project file has to be loaded first for it to win.
    dotenv::dotenv().ok();

    if let Some(home) = dirs::home_dir() {
        let home_env_path = home.join(".env");
        dotenv::from_path(home_env_path).ok();
    }
}
