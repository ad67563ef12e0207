//! Type representations in the AST

use super::ParamDecl;
use crate::common::Span;

/// C type representation
#[derive(Debug, Clone, PartialEq)]
pub struct CType {
    pub kind: TypeKind,
    pub qualifiers: TypeQualifiers,
    pub span: Span,
}

impl CType {
    pub fn new(kind: TypeKind, span: Span) -> Self {
        Self {
            kind,
            qualifiers: TypeQualifiers::default(),
            span,
        }
    }

    pub fn with_qualifiers(mut self, qualifiers: TypeQualifiers) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    pub fn void(span: Span) -> Self {
        Self::new(TypeKind::Void, span)
    }

    pub fn char(span: Span) -> Self {
        Self::new(TypeKind::Char { signed: true }, span)
    }

    pub fn int(span: Span) -> Self {
        Self::new(TypeKind::Int { signed: true }, span)
    }

    pub fn pointer_to(inner: CType, span: Span) -> Self {
        Self::new(TypeKind::Pointer(Box::new(inner)), span)
    }

    /// Check if this type is an integer type
    pub fn is_integer(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Char { .. }
                | TypeKind::Short { .. }
                | TypeKind::Int { .. }
                | TypeKind::Long { .. }
                | TypeKind::LongLong { .. }
                | TypeKind::Enum { .. }
        )
    }

    /// Check if this type is a pointer type
    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer(_))
    }

    /// Check if this type is void
    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }

    pub fn is_floating(&self) -> bool {
        matches!(self.kind, TypeKind::Float | TypeKind::Double)
    }

    /// Integer, floating, boolean or pointer: a value held in one piece
    pub fn is_scalar(&self) -> bool {
        self.is_integer()
            || self.is_floating()
            || self.is_pointer()
            || matches!(self.kind, TypeKind::Bool)
    }
}

/// The kind of a C type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Void,
    Bool,
    Char { signed: bool },
    Short { signed: bool },
    Int { signed: bool },
    Long { signed: bool },
    LongLong { signed: bool },
    Float,
    Double,
    Pointer(Box<CType>),
    Array {
        element: Box<CType>,
        size: Option<usize>,
    },
    Function {
        return_type: Box<CType>,
        params: Vec<ParamDecl>,
        variadic: bool,
    },
    Struct {
        name: Option<String>,
        members: Vec<(String, CType)>,
    },
    Union {
        name: Option<String>,
        members: Vec<(String, CType)>,
    },
    Enum {
        name: Option<String>,
        variants: Vec<(String, Option<i64>)>,
    },
    Typedef(String),
}

/// Type qualifiers (const, volatile, restrict)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeQualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
}

/// Storage class specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Auto,
    Register,
    Static,
    Extern,
    Typedef,
}
