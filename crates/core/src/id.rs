// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! String-backed entity identifiers.

/// Define a newtype ID wrapper around `String`.
///
/// Generates `generate()` for random uuid-v4 IDs, `new()` for wrapping an
/// existing string, `as_str()`, `short()`, `Display`, `From` conversions,
/// `PartialEq<str>`, and `Borrow<str>` implementations.
macro_rules! entity_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh random ID.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Wrap an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the first `n` characters, for compact log lines.
            pub fn short(&self, n: usize) -> &str {
                let end = self.0.char_indices().nth(n).map_or(self.0.len(), |(i, _)| i);
                &self.0[..end]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
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

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

entity_id! {
    /// Unique identifier for a job.
    pub struct JobId;
}

entity_id! {
    /// Unique identifier for a work unit.
    pub struct UnitId;
}

entity_id! {
    /// Unique identifier for a worker assignment record.
    pub struct WorkerId;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
