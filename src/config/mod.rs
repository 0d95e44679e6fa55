//! Tool settings.
//!
//! Settings are layered from several tiers, each overriding the fields it sets:
//! 1. **Defaults** - Built into the binary
//! 2. **Project** - `./compose-render.yaml` when present
//! 3. **Explicit** - `--config <file>` or `COMPOSE_RENDER_CONFIG_PATH`
//! 4. **Environment** - `COMPOSE_RENDER_MACRO_NAME`, `COMPOSE_RENDER_SCHEMA`
//!
//! Command-line flags are applied on top by the binary.

mod loader;
mod types;

pub use loader::{SettingsLoader, SettingsPaths, SettingsTier};
pub use types::*;
