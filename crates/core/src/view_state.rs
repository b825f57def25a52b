//! Persisted display preferences and their storage keys.
//!
//! Each mode is stored as a plain string under a fixed key in the
//! client's local key-value store. Missing or unrecognised values fall
//! back to the mode's default.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Storage keys
// ---------------------------------------------------------------------------

/// Bearer token for authenticated calls.
pub const KEY_TOKEN: &str = "token";
/// Display name of the logged-in user.
pub const KEY_USERNAME: &str = "username";
/// Phantom viewer mode (slices or 3-D plot).
pub const KEY_VIEWER_MODE: &str = "viewerMode";
/// Phantom parameter map.
pub const KEY_MAP_MODE: &str = "mapMode";
/// Last selected result surface.
pub const KEY_RESULT_MODE: &str = "resultMode";
/// Last selected sequence surface.
pub const KEY_SEQ_MODE: &str = "seqMode";
/// Identifier of the most recent simulation job.
pub const KEY_JOB_ID: &str = "jobId";
/// Phantom currently on display, reloaded when the map mode changes.
pub const KEY_PHANTOM: &str = "phantom";

/// A display mode that round-trips through the string store.
pub trait PersistedMode: Copy + Eq + FromStr<Err = CoreError> + fmt::Display {
    const KEY: &'static str;
    const DEFAULT: Self;

    /// Parse a stored value, falling back to [`Self::DEFAULT`].
    fn from_stored(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or(Self::DEFAULT)
    }
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, key = $key:expr, default = $default:ident,
        { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(CoreError::Validation(format!(
                        "unknown {} '{other}'",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl PersistedMode for $name {
            const KEY: &'static str = $key;
            const DEFAULT: Self = $name::$default;
        }
    };
}

string_enum! {
    /// How the loaded phantom is shown: orthogonal slices or the
    /// server-rendered 3-D plot.
    ViewerMode, key = KEY_VIEWER_MODE, default = Slices,
    { Slices => "slices", ThreeD => "3d" }
}

string_enum! {
    /// Phantom parameter map used for plots and slices.
    MapMode, key = KEY_MAP_MODE, default = T1,
    { Pd => "PD", T1 => "T1", T2 => "T2", T2s => "T2s", Dw => "dw" }
}

string_enum! {
    /// Which simulation output surface is shown.
    ResultMode, key = KEY_RESULT_MODE, default = Signal,
    { Signal => "signal", Image => "image", Kspace => "kspace" }
}

string_enum! {
    /// Which sequence plot surface is shown.
    SeqMode, key = KEY_SEQ_MODE, default = Diagram,
    { Diagram => "diagram", Kspace => "kspace" }
}
