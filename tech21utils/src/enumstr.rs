//!
//! # Keyword-Enumeration Module
//!
//! Defines the [enumstr] macro and its paired [EnumStr] trait,
//! mapping between fieldless enums and the keyword-strings that name them in technology files.
//!
//! Technology formats are a mix of case conventions: the Cadence dialects are camel-cased and case-sensitive,
//! while the line-oriented keyword format matches its keywords case-insensitively.
//! [EnumStr] therefore offers both an exact `from_str` and a case-folding `from_str_nocase`.
//!
//! Example:
//!
//! ```
//! use tech21utils::{enumstr, EnumStr};
//!
//! enumstr!(
//!     /// # Routing Directions
//!     RouteDir {
//!         Horizontal: "horizontal",
//!         Vertical: "vertical",
//!     }
//! );
//! assert_eq!(RouteDir::from_str_nocase("HORIZONTAL"), Some(RouteDir::Horizontal));
//! ```
//!

///
/// # Keyword-Enumeration Trait
///
/// * `to_str` converts a variant to its keyword.
/// * `from_str` converts a keyword to a variant, exactly matching.
/// * `from_str_nocase` does the same, ignoring ASCII case.
/// * `variants` lists all variants, in declaration order.
///
pub trait EnumStr: std::marker::Sized + 'static {
    fn to_str(&self) -> &'static str;
    fn from_str(txt: &str) -> Option<Self>;
    fn variants() -> &'static [Self];
    /// Case-insensitive keyword lookup
    fn from_str_nocase(txt: &str) -> Option<Self> {
        Self::variants()
            .iter()
            .position(|v| v.to_str().eq_ignore_ascii_case(txt))
            .map(|idx| Self::variants()[idx].clone_variant())
    }
    /// Copy out a variant. Implemented by the macro via `Copy`.
    fn clone_variant(&self) -> Self;
}

///
/// # Keyword-Enumeration Macro
///
/// Creates a fieldless `enum` with:
/// * Paired keyword strings, implementing [EnumStr]
/// * A [std::fmt::Display] implementation writing the keyword
/// * Derived `Clone, Copy, Debug, PartialEq, Eq, Hash` and serde traits.
///   Invoking crates must depend on `serde`.
///
#[macro_export]
macro_rules! enumstr {
    (   $(#[$meta: meta])*
        $enum_name: ident {
        $( $variant: ident : $strval: literal ),* $(,)?
    }) => {
        $(#[$meta])*
        #[allow(dead_code)]
        #[derive(Clone, Copy, Debug, ::serde::Deserialize, ::serde::Serialize, PartialEq, Eq, Hash)]
        pub enum $enum_name {
            $( #[doc=$strval]
                $variant ),*
        }
        impl $crate::EnumStr for $enum_name {
            fn to_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $strval),*,
                }
            }
            fn from_str(txt: &str) -> Option<Self> {
                match txt {
                    $( $strval => Some(Self::$variant)),*,
                    _ => None,
                }
            }
            fn variants() -> &'static [Self] {
                &[ $( Self::$variant ),* ]
            }
            fn clone_variant(&self) -> Self {
                *self
            }
        }
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}", $crate::EnumStr::to_str(self))
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    enumstr!(
        /// # Packet Fill Styles
        FillStyle {
            Solid: "solid",
            OutlineStipple: "outlineStipple",
            X: "X",
        }
    );

    #[test]
    fn test_enumstr() {
        assert_eq!(FillStyle::OutlineStipple.to_str(), "outlineStipple");
        assert_eq!(FillStyle::X.to_string(), "X");
        assert_eq!(FillStyle::from_str("solid"), Some(FillStyle::Solid));
        assert_eq!(FillStyle::from_str("SOLID"), None);
        assert_eq!(FillStyle::from_str_nocase("SOLID"), Some(FillStyle::Solid));
        assert_eq!(FillStyle::from_str_nocase("outlinestipple"), Some(FillStyle::OutlineStipple));
        assert_eq!(FillStyle::from_str_nocase("hatched"), None);
        assert_eq!(FillStyle::variants().len(), 3);
    }
}
