//! Strong-typed UUID identifiers for all domain entities.
//!
//! Newtype wrappers over [`uuid::Uuid`] prevent swapping a `TableId` for a
//! `FieldId` at a call site — a mistake the original map-keyed-by-string
//! data model made easy.

/// Define a strong-typed UUID identifier for a domain entity.
macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            derive_more::Display,
            derive_more::From,
            derive_more::Into,
            serde::Serialize,
            serde::Deserialize,
            schemars::JsonSchema,
        )]
        #[display("{_0}")]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Generate a new random UUID v4 identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Wrap an existing [`uuid::Uuid`].
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// The wrapped UUID.
            #[must_use]
            pub fn as_uuid(&self) -> uuid::Uuid {
                self.0
            }

            /// Parse from its canonical string form.
            ///
            /// # Errors
            ///
            /// Returns an error if `s` is not a valid UUID.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

define_id!(BaseId, "Strong-typed identifier for a Base (tenancy unit)");
define_id!(TableId, "Strong-typed identifier for a Table");
define_id!(FieldId, "Strong-typed identifier for a Field");
define_id!(RecordId, "Strong-typed identifier for a Record");
define_id!(ViewId, "Strong-typed identifier for a View");
