//! Ready-made policies for the usual endpoint classes.
//!
//! Each preset is a plain [`Policy`]; integrators with different traffic should
//! build their own with [`Policy::new`] or load them from config.
//!
//! | Preset             | Window | Max requests |
//! |--------------------|--------|--------------|
//! | [`auth`]           | 15 min | 5            |
//! | [`password_reset`] | 15 min | 3            |
//! | [`write`]          | 1 min  | 30           |
//! | [`read`]           | 1 min  | 100          |
//! | [`registration`]   | 1 hour | 3            |
//!
//! ```rust
//! use quotaguard::presets;
//!
//! let login = presets::auth();
//! assert_eq!(login.name(), "auth");
//! assert_eq!(login.max_requests(), 5);
//! ```

use crate::Policy;
use std::time::Duration;

const AUTH_WINDOW_SECS: u64 = 15 * 60;
const AUTH_MAX_REQUESTS: u32 = 5;

const PASSWORD_RESET_WINDOW_SECS: u64 = 15 * 60;
const PASSWORD_RESET_MAX_REQUESTS: u32 = 3;

const WRITE_WINDOW_SECS: u64 = 60;
const WRITE_MAX_REQUESTS: u32 = 30;

const READ_WINDOW_SECS: u64 = 60;
const READ_MAX_REQUESTS: u32 = 100;

const REGISTRATION_WINDOW_SECS: u64 = 60 * 60;
const REGISTRATION_MAX_REQUESTS: u32 = 3;

/// Login and token endpoints: short window, low count.
pub fn auth() -> Policy {
    Policy::preset("auth", Duration::from_secs(AUTH_WINDOW_SECS), AUTH_MAX_REQUESTS)
}

/// Password reset requests.
pub fn password_reset() -> Policy {
    Policy::preset(
        "password_reset",
        Duration::from_secs(PASSWORD_RESET_WINDOW_SECS),
        PASSWORD_RESET_MAX_REQUESTS,
    )
}

/// General create/update/delete operations.
pub fn write() -> Policy {
    Policy::preset("write", Duration::from_secs(WRITE_WINDOW_SECS), WRITE_MAX_REQUESTS)
}

/// Read-only listing and lookup.
pub fn read() -> Policy {
    Policy::preset("read", Duration::from_secs(READ_WINDOW_SECS), READ_MAX_REQUESTS)
}

/// Account creation: the strictest preset.
pub fn registration() -> Policy {
    Policy::preset(
        "registration",
        Duration::from_secs(REGISTRATION_WINDOW_SECS),
        REGISTRATION_MAX_REQUESTS,
    )
}

/// Every preset.
pub fn all() -> [Policy; 5] {
    [auth(), password_reset(), write(), read(), registration()]
}
