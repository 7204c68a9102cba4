//! Strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Error parsing an ID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    /// The ID was empty.
    #[error("identifier must not be empty")]
    Empty,
    /// The ID format is invalid.
    #[error("invalid ID format")]
    InvalidFormat,
}

/// Identifier of an authenticated principal, as issued by the authentication subsystem.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(i64);

impl PrincipalId {
    /// Wrap a raw principal id.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub const fn get(&self) -> i64 {
        self.0
    }

    /// Parse from a decimal string.
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdParseError::Empty);
        }
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| IdParseError::InvalidFormat)
    }
}

impl From<i64> for PrincipalId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<i32> for PrincipalId {
    fn from(id: i32) -> Self {
        Self(i64::from(id))
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrincipalId({})", self.0)
    }
}

impl std::str::FromStr for PrincipalId {
    type Err = IdParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A string-backed identifier.
macro_rules! define_string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Parse from string, rejecting empty values.
            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                if s.trim().is_empty() {
                    return Err(IdParseError::Empty);
                }
                Ok(Self(s.to_string()))
            }

            /// Borrow the string form.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into the string form.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// Opaque session token resolved by the authentication service.
    SessionId
);

define_string_id!(
    /// Name under which a guarded operation is registered.
    OperationId
);

define_string_id!(
    /// Identifier of a resource instance.
    ///
    /// Numeric identifiers are normalized to their decimal form, so audit
    /// entries always carry a string regardless of the underlying key type.
    ResourceId
);

impl SessionId {
    /// Generate a new random session token (`ses_<uuid>`).
    pub fn generate() -> Self {
        Self(format!("ses_{}", Uuid::new_v4()))
    }
}

macro_rules! resource_id_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ResourceId {
                fn from(id: $t) -> Self {
                    Self(id.to_string())
                }
            }
        )*
    };
}

resource_id_from_int!(i32, i64, u32, u64, usize);

impl From<Uuid> for ResourceId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}
