use std::cmp::Ordering;

use strum::{Display, EnumIter, IntoStaticStr};

/// The closed set of object kinds.
///
/// The `Display`/`IntoStaticStr` text is the kind name shown in error messages.
/// It also defines how objects of different kinds are ordered: by kind name,
/// which makes comparison a total order across every pair of objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum Kind {
    #[strum(serialize = "none")]
    None,
    #[strum(serialize = "int")]
    Int,
    #[strum(serialize = "float")]
    Float,
    #[strum(serialize = "string")]
    Str,
    #[strum(serialize = "list")]
    List,
    #[strum(serialize = "tuple")]
    Tuple,
    #[strum(serialize = "dictionary")]
    Dict,
    #[strum(serialize = "module")]
    Module,
    #[strum(serialize = "function")]
    Func,
    #[strum(serialize = "built-in method")]
    Method,
    #[strum(serialize = "class")]
    Class,
    #[strum(serialize = "class member")]
    ClassMember,
    #[strum(serialize = "class method")]
    ClassMethod,
    #[strum(serialize = "code")]
    Code,
    #[strum(serialize = "frame")]
    Frame,
    #[strum(serialize = "traceback")]
    Traceback,
}

impl Kind {
    /// Orders two kinds by name.
    #[must_use]
    pub fn cmp_name(self, other: Self) -> Ordering {
        let a: &'static str = self.into();
        let b: &'static str = other.into();
        a.cmp(b)
    }
}
