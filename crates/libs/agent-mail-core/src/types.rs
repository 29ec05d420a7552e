//! Strong newtypes for domain identifiers.
//!
//! Every entity's surrogate primary key is wrapped in its own type so that,
//! for example, a `MessageId` cannot be passed where an `AgentId` is
//! expected. All newtypes are thin wrappers around `i64` (the libsql rowid
//! type) with `Copy`, `Serialize`/`Deserialize`, and `Display`.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

id_newtype!(ProjectId);
id_newtype!(AgentId);
id_newtype!(MessageId);
id_newtype!(ThreadId);
id_newtype!(ReservationId);
id_newtype!(ContactLinkId);
id_newtype!(AttachmentId);

/// A project's URL-safe identifier, e.g. `abs-backend`.
pub type ProjectSlug = String;

/// An agent's memorable name, e.g. `GreenCastle`.
pub type AgentName = String;
