//! Macros shared across the detector.

/// Declares a flat parameter record from a single ordered field list.
///
/// Every field is written once as `name: type = default`. The macro derives the
/// struct (serde enabled, missing JSON fields fall back to defaults), `Default`,
/// the ordered `FIELD_NAMES` list, parcel encode/decode in declaration order, and
/// a `Display` dump with one `name: value` line per field.
///
/// Field types must implement [`ParcelField`](crate::core::config::ParcelField)
/// and `Display`.
///
/// # Example
///
/// ```rust
/// use textblock_detect::define_parameters;
///
/// define_parameters! {
///     /// Two knobs.
///     pub struct Knobs {
///         enabled: bool = true,
///         size: i32 = 8,
///     }
/// }
///
/// let knobs = Knobs::default();
/// assert_eq!(Knobs::FIELD_NAMES, &["enabled", "size"]);
/// assert_eq!(knobs.to_string(), "Parameters:\nenabled: true\nsize: 8");
/// ```
#[macro_export]
macro_rules! define_parameters {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident : $ty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field: $ty,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $($field: $default,)*
                }
            }
        }

        impl $name {
            /// Field names in wire order.
            pub const FIELD_NAMES: &'static [&'static str] = &[$(stringify!($field)),*];

            /// Appends every field, in declaration order, to `parcel`.
            pub fn write_to_parcel(&self, parcel: &mut $crate::core::config::ParcelWriter) {
                $(
                    $crate::core::config::ParcelField::write_field(&self.$field, parcel);
                )*
            }

            /// Reads every field, in declaration order, from `parcel`.
            pub fn read_from_parcel(
                parcel: &mut $crate::core::config::ParcelReader<'_>,
            ) -> Result<Self, $crate::core::config::ParcelError> {
                Ok(Self {
                    $(
                        $field: <$ty as $crate::core::config::ParcelField>::read_field(
                            parcel,
                            stringify!($field),
                        )?,
                    )*
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "Parameters:")?;
                $(
                    write!(f, "\n{}: {}", stringify!($field), self.$field)?;
                )*
                Ok(())
            }
        }
    };
}
