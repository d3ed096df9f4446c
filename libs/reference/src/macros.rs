//! Macro for defining the document type table.

/// Defines the `DocumentType` enum from a table of
/// `Variant => "name", "PREFIX", "SHORT"` rows.
///
/// This generates:
/// - The enum itself with an `ALL` constant listing every variant
/// - `as_str()` / `prefix()` / `legacy_short_prefix()` accessors
/// - Exact, case-sensitive reverse lookups `from_name()`, `from_prefix()`
///   and `from_legacy_short_prefix()`
/// - `Display` and `FromStr` implementations over the snake_case name
/// - `Serialize` and `Deserialize` implementations over the same name
///
/// # Example
///
/// ```ignore
/// define_document_types! {
///     Quotation => "quotation", "DEV", "DV";
///     Invoice => "invoice", "FAC", "FC";
/// }
///
/// assert_eq!(DocumentType::Quotation.prefix(), "DEV");
/// assert_eq!(DocumentType::from_prefix("FAC"), Some(DocumentType::Invoice));
/// ```
#[macro_export]
macro_rules! define_document_types {
    ($($variant:ident => $name:literal, $prefix:literal, $short:literal;)+) => {
        /// The kind of document a reference belongs to.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum DocumentType {
            $(
                #[doc = concat!("`", $name, "` documents, prefix `", $prefix, "`.")]
                $variant,
            )+
        }

        impl DocumentType {
            /// Every document type, in table order.
            pub const ALL: &'static [DocumentType] = &[$(DocumentType::$variant),+];

            /// The snake_case name of this document type.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(DocumentType::$variant => $name,)+
                }
            }

            /// The prefix rendered at the start of every reference.
            #[must_use]
            pub const fn prefix(&self) -> &'static str {
                match self {
                    $(DocumentType::$variant => $prefix,)+
                }
            }

            /// The two-letter prefix used by historical short references (`DV001`).
            #[must_use]
            pub const fn legacy_short_prefix(&self) -> &'static str {
                match self {
                    $(DocumentType::$variant => $short,)+
                }
            }

            /// Looks up a document type by its snake_case name.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(DocumentType::$variant),)+
                    _ => None,
                }
            }

            /// Looks up a document type by its reference prefix.
            #[must_use]
            pub fn from_prefix(prefix: &str) -> Option<Self> {
                match prefix {
                    $($prefix => Some(DocumentType::$variant),)+
                    _ => None,
                }
            }

            /// Looks up a document type by its historical two-letter prefix.
            #[must_use]
            pub fn from_legacy_short_prefix(prefix: &str) -> Option<Self> {
                match prefix {
                    $($short => Some(DocumentType::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for DocumentType {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for DocumentType {
            type Err = $crate::ReferenceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_name(s)
                    .ok_or_else(|| $crate::ReferenceError::UnknownDocumentType(s.to_string()))
            }
        }

        impl serde::Serialize for DocumentType {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for DocumentType {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}
