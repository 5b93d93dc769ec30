//! Utilities for ConfigValidator trait implementation.
//!
//! This module provides macros that implement [`ConfigValidator`](super::ConfigValidator)
//! from a compact list of per-field rules.

/// Macro to implement ConfigValidator with basic validation patterns.
///
/// # Example
///
/// ```rust
/// use textblock_detect::core::config::ConfigValidator;
/// use textblock_detect::impl_config_validator;
///
/// #[derive(Debug, Clone, Default)]
/// pub struct SweepConfig {
///     pub range: f32,
///     pub reduction: i32,
/// }
///
/// impl_config_validator!(SweepConfig {
///     range: range(0.0, 90.0),
///     reduction: min(1),
/// });
///
/// let config = SweepConfig { range: 30.0, reduction: 0 };
/// assert!(config.validate().is_err());
/// ```
#[macro_export]
macro_rules! impl_config_validator {
    ($type_name:ident { $($field:ident: $validator:ident $(($($args:tt)*))?),* $(,)? }) => {
        impl $crate::core::config::ConfigValidator for $type_name {
            fn validate(&self) -> Result<(), $crate::core::config::ConfigError> {
                $(
                    $crate::validate_field!(self, $field, $validator $(($($args)*))?);
                )*
                Ok(())
            }
        }
    };
}

/// Helper macro for field validation.
#[macro_export]
macro_rules! validate_field {
    ($self:expr, $field:ident, range($min:expr, $max:expr)) => {
        if !($min..=$max).contains(&$self.$field) {
            return Err($crate::core::config::ConfigError::InvalidConfig {
                message: format!(
                    "{} must be between {} and {}, got {}",
                    stringify!($field),
                    $min,
                    $max,
                    $self.$field
                ),
            });
        }
    };

    ($self:expr, $field:ident, min($min_val:expr)) => {
        if !($self.$field >= $min_val) {
            return Err($crate::core::config::ConfigError::InvalidConfig {
                message: format!(
                    "{} must be at least {}, got {}",
                    stringify!($field),
                    $min_val,
                    $self.$field
                ),
            });
        }
    };

    ($self:expr, $field:ident, positive) => {
        if !($self.$field > Default::default()) {
            return Err($crate::core::config::ConfigError::InvalidConfig {
                message: format!(
                    "{} must be greater than 0, got {}",
                    stringify!($field),
                    $self.$field
                ),
            });
        }
    };
}
