//! Reference and pointer qualifiers for mapped parameter types.
//!
//! A qualifier never changes which type is mapped, only how the mapped type
//! string is wrapped:
//!
//! ```text
//! Auto   -> T
//! Ref    -> T&
//! CRef   -> const T&
//! RRef   -> T&&
//! Ptr    -> T*
//! PtrC   -> const T*          (pointer to const)
//! CPtr   -> T* const          (const pointer)
//! CPtrC  -> const T* const
//! ```

use std::fmt::{self, Display, Formatter};

/// How a mapped target type is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Qualifier {
    /// Pass by value, no wrapping.
    #[default]
    Auto,
    Ref,
    CRef,
    RRef,
    Ptr,
    PtrC,
    CPtr,
    CPtrC,
}

impl Qualifier {
    pub const ALL: [Qualifier; 8] = [
        Qualifier::Auto,
        Qualifier::Ref,
        Qualifier::CRef,
        Qualifier::RRef,
        Qualifier::Ptr,
        Qualifier::PtrC,
        Qualifier::CPtr,
        Qualifier::CPtrC,
    ];

    /// Wrap a mapped type string.
    ///
    /// ```
    /// use xenoform_core::Qualifier;
    ///
    /// assert_eq!(Qualifier::CRef.wrap("std::string"), "const std::string&");
    /// assert_eq!(Qualifier::Auto.wrap("uint64_t"), "uint64_t");
    /// ```
    pub fn wrap(self, ty: &str) -> String {
        match self {
            Qualifier::Auto => ty.to_string(),
            Qualifier::Ref => format!("{ty}&"),
            Qualifier::CRef => format!("const {ty}&"),
            Qualifier::RRef => format!("{ty}&&"),
            Qualifier::Ptr => format!("{ty}*"),
            Qualifier::PtrC => format!("const {ty}*"),
            Qualifier::CPtr => format!("{ty}* const"),
            Qualifier::CPtrC => format!("const {ty}* const"),
        }
    }

    pub fn is_auto(self) -> bool {
        self == Qualifier::Auto
    }

    /// Whether the wrapping makes the pointee const.
    pub fn adds_const(self) -> bool {
        matches!(self, Qualifier::CRef | Qualifier::PtrC | Qualifier::CPtrC)
    }
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Qualifier::Auto => "Auto",
            Qualifier::Ref => "Ref",
            Qualifier::CRef => "CRef",
            Qualifier::RRef => "RRef",
            Qualifier::Ptr => "Ptr",
            Qualifier::PtrC => "PtrC",
            Qualifier::CPtr => "CPtr",
            Qualifier::CPtrC => "CPtrC",
        };
        f.write_str(name)
    }
}
