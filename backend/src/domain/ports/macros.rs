//! Helper macro generating port error enums.
//!
//! Each generated enum derives `thiserror::Error`, gains a snake_case
//! constructor per variant accepting `impl Into<_>` arguments, and exposes a
//! stable `kind()` label for structured logging.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            #[doc = "Construct the `" $variant "` variant."]
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        ::paste::paste! {
            #[doc = "Construct the `" $variant "` variant."]
            pub fn [<$variant:snake>]($($field: impl Into<$ty>),*) -> Self {
                Self::$variant { $($field: $field.into()),* }
            }
        }
    };

    (@pattern $variant:ident) => { Self::$variant };
    (@pattern $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => { Self::$variant { .. } };

    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*

            /// Stable snake_case label naming the failure variant.
            pub fn kind(&self) -> &'static str {
                match self {
                    $(
                        define_port_error!(@pattern $variant $( { $($field : $ty),* } )?) => {
                            ::paste::paste! { stringify!([<$variant:snake>]) }
                        }
                    )*
                }
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use rstest::rstest;

    define_port_error! {
        pub enum SamplePortError {
            Unavailable => "store unavailable",
            Rejected { message: String } => "rejected: {message}",
            Stale { entity: String, expected: u32 } => "stale {entity} (expected {expected})",
        }
    }

    #[rstest]
    fn unit_variants_get_zero_argument_constructors() {
        let err = SamplePortError::unavailable();
        assert_eq!(err, SamplePortError::Unavailable);
        assert_eq!(err.to_string(), "store unavailable");
    }

    #[rstest]
    fn string_fields_accept_str_arguments() {
        let err = SamplePortError::rejected("duplicate key");
        assert_eq!(err.to_string(), "rejected: duplicate key");
    }

    #[rstest]
    fn mixed_fields_keep_their_types() {
        let err = SamplePortError::stale("note/1", 4_u32);
        assert_eq!(err.to_string(), "stale note/1 (expected 4)");
    }

    #[rstest]
    #[case(SamplePortError::unavailable(), "unavailable")]
    #[case(SamplePortError::rejected("x"), "rejected")]
    #[case(SamplePortError::stale("note/1", 1_u32), "stale")]
    fn kind_reports_snake_case_variant(#[case] err: SamplePortError, #[case] expected: &str) {
        assert_eq!(err.kind(), expected);
    }
}
