//! Process-wide minimum TLS version.
//!
//! Every transport the engine builds reads the current floor. A batch raises
//! the floor through a [`TlsPolicyGuard`], which puts the previous value back
//! when the batch ends, whatever happened to the individual items.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

/// Minimum TLS protocol version accepted by new transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsFloor {
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsFloor {
    /// The floor enforced for download batches.
    pub const REQUIRED: Self = Self::Tls12;

    /// Newest version the TLS backend can negotiate.
    pub const NEWEST_SUPPORTED: Self = Self::Tls13;

    pub(crate) fn to_reqwest(self) -> reqwest::tls::Version {
        match self {
            Self::Tls10 => reqwest::tls::Version::TLS_1_0,
            Self::Tls11 => reqwest::tls::Version::TLS_1_1,
            Self::Tls12 => reqwest::tls::Version::TLS_1_2,
            Self::Tls13 => reqwest::tls::Version::TLS_1_3,
        }
    }
}

static PROCESS_TLS_FLOOR: Mutex<TlsFloor> = Mutex::new(TlsFloor::Tls10);

/// Returns the floor new transports are built with.
#[must_use]
pub fn current_floor() -> TlsFloor {
    *PROCESS_TLS_FLOOR
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Raises the process TLS floor for its lifetime.
///
/// The previous floor is captured on creation and restored on drop.
/// Restoring never panics; a poisoned lock is logged and recovered.
#[derive(Debug)]
#[must_use = "the previous TLS floor is restored as soon as the guard is dropped"]
pub struct TlsPolicyGuard {
    previous: TlsFloor,
    enforced: TlsFloor,
}

impl TlsPolicyGuard {
    /// Raises the floor to at least `minimum`; a stricter existing floor is kept.
    pub fn enforce(minimum: TlsFloor) -> Self {
        let mut floor = match PROCESS_TLS_FLOOR.lock() {
            Ok(floor) => floor,
            Err(poisoned) => {
                warn!("TLS floor lock was poisoned; recovering");
                poisoned.into_inner()
            }
        };
        let previous = *floor;
        let enforced = previous.max(minimum);
        *floor = enforced;
        debug!(
            ?previous,
            ?enforced,
            newest = ?TlsFloor::NEWEST_SUPPORTED,
            "raised process TLS floor"
        );
        Self { previous, enforced }
    }

    /// Floor in effect while the guard lives.
    #[must_use]
    pub fn enforced(&self) -> TlsFloor {
        self.enforced
    }

    /// Floor that will be restored on drop.
    #[must_use]
    pub fn previous(&self) -> TlsFloor {
        self.previous
    }
}

impl Drop for TlsPolicyGuard {
    fn drop(&mut self) {
        match PROCESS_TLS_FLOOR.lock() {
            Ok(mut floor) => *floor = self.previous,
            Err(poisoned) => {
                warn!("TLS floor lock was poisoned while restoring; restoring anyway");
                *poisoned.into_inner() = self.previous;
            }
        }
        debug!(restored = ?self.previous, "restored process TLS floor");
    }
}
