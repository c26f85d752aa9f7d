// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros for reducing boilerplate.
//!
//! - [`simple_display!`] - `Display` impl mapping enum variants to string literals
//! - [`status_str!`] - `simple_display!` plus the matching `FromStr` impl
//! - [`builder!`] - test builder struct with setters and `build()`

/// Generate a `Display` impl that maps enum variants to string literals.
///
/// ```ignore
/// crate::simple_display! {
///     JobStatus {
///         Created => "created",
///         Running => "running",
///     }
/// }
/// ```
#[macro_export]
macro_rules! simple_display {
    ($enum:ty { $( $variant:ident => $str:expr ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $( Self::$variant => $str, )+
                })
            }
        }
    };
}

/// Generate paired `Display` and `FromStr` impls for a status enum.
///
/// Statuses round-trip through database columns as plain strings, so the
/// two directions must agree; defining them from one table keeps them in
/// sync.
#[macro_export]
macro_rules! status_str {
    ($enum:ident, $kind:literal { $( $variant:ident => $str:expr ),+ $(,)? }) => {
        $crate::simple_display! {
            $enum {
                $( $variant => $str, )+
            }
        }

        impl std::str::FromStr for $enum {
            type Err = $crate::ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $str => Ok(Self::$variant), )+
                    other => Err($crate::ParseStatusError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Generate a test builder for an entity struct.
///
/// Everything generated is gated behind `#[cfg(any(test, feature =
/// "test-support"))]` so production builds carry none of it.
///
/// Field groups:
/// - `convert { field: Type = default }` - setter takes `impl Into<Type>`
///   (strings, ids)
/// - `plain { field: Type = default }` - setter takes `Type` directly
///   (scalars, enums, collections)
/// - `optional { field: Type }` - stored as `Option<Type>` defaulting to
///   `None`; setter wraps in `Some(v.into())`
/// - `auto { field: Type = expr }` - no setter; the expression runs at
///   `build()` time
///
/// ```ignore
/// crate::builder! {
///     pub struct WorkUnitBuilder => WorkUnit {
///         convert { job_id: JobId = JobId::new("job-test") }
///         plain { retry_count: u32 = 0 }
///         optional { error: String }
///         auto { created_at: DateTime<Utc> = Utc::now() }
///     }
/// }
/// ```
#[macro_export]
macro_rules! builder {
    (
        pub struct $builder:ident => $target:ident {
            $(convert {
                $( $conv:ident : $conv_ty:ty = $conv_default:expr ),* $(,)?
            })?
            $(plain {
                $( $plain:ident : $plain_ty:ty = $plain_default:expr ),* $(,)?
            })?
            $(optional {
                $( $opt:ident : $opt_ty:ty ),* $(,)?
            })?
            $(auto {
                $( $auto:ident : $auto_ty:ty = $auto_expr:expr ),* $(,)?
            })?
        }
    ) => {
        #[cfg(any(test, feature = "test-support"))]
        pub struct $builder {
            $($( $conv: $conv_ty, )*)?
            $($( $plain: $plain_ty, )*)?
            $($( $opt: Option<$opt_ty>, )*)?
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $builder {
            fn new() -> Self {
                Self {
                    $($( $conv: $conv_default, )*)?
                    $($( $plain: $plain_default, )*)?
                    $($( $opt: None, )*)?
                }
            }

            $($(
                pub fn $conv(mut self, v: impl Into<$conv_ty>) -> Self {
                    self.$conv = v.into();
                    self
                }
            )*)?

            $($(
                pub fn $plain(mut self, v: $plain_ty) -> Self {
                    self.$plain = v;
                    self
                }
            )*)?

            $($(
                pub fn $opt(mut self, v: impl Into<$opt_ty>) -> Self {
                    self.$opt = Some(v.into());
                    self
                }
            )*)?

            pub fn build(self) -> $target {
                $target {
                    $($( $conv: self.$conv, )*)?
                    $($( $plain: self.$plain, )*)?
                    $($( $opt: self.$opt, )*)?
                    $($( $auto: $auto_expr, )*)?
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $target {
            /// Builder preloaded with test defaults.
            pub fn builder() -> $builder {
                $builder::new()
            }
        }
    };
}
