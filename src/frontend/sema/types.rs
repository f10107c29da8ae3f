//! The structural semantic type system: representation, sizing (LP64),
//! compatibility, implicit conversion, and the usual-arithmetic common
//! type. Types are shared through `Rc`; record and enum bodies sit behind
//! `RefCell` so forward declarations can be completed in place and every
//! holder observes the completion. Equality is structural, never pointer
//! identity.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type TypeRef = Rc<Type>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntKind {
    Char,
    Short,
    Int,
    Long,
    LongLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FloatKind {
    Float,
    Double,
    LongDouble,
}

/// A struct or union body. `complete` flips when the defining declaration
/// is analyzed; member offsets are assigned at that point.
#[derive(Debug)]
pub struct RecordType {
    pub tag: String,
    pub members: Vec<Member>,
    pub complete: bool,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub ty: TypeRef,
    pub offset: i64,
}

#[derive(Debug)]
pub struct EnumType {
    pub tag: String,
    pub constants: HashMap<String, i64>,
    pub complete: bool,
}

#[derive(Debug)]
pub enum Type {
    Void,
    Integer { kind: IntKind, unsigned: bool },
    Float { kind: FloatKind },
    Pointer(TypeRef),
    /// `len` is the element count, or -1 for an incomplete array.
    Array { elem: TypeRef, len: i64 },
    Function {
        ret: TypeRef,
        params: Vec<TypeRef>,
        variadic: bool,
    },
    Struct(Rc<RefCell<RecordType>>),
    Union(Rc<RefCell<RecordType>>),
    Enum(Rc<RefCell<EnumType>>),
}

// ----- constructors -----

impl Type {
    pub fn void() -> TypeRef {
        Rc::new(Type::Void)
    }

    pub fn int() -> TypeRef {
        Rc::new(Type::Integer { kind: IntKind::Int, unsigned: false })
    }

    pub fn char_type() -> TypeRef {
        Rc::new(Type::Integer { kind: IntKind::Char, unsigned: false })
    }

    pub fn long() -> TypeRef {
        Rc::new(Type::Integer { kind: IntKind::Long, unsigned: false })
    }

    pub fn ulong() -> TypeRef {
        Rc::new(Type::Integer { kind: IntKind::Long, unsigned: true })
    }

    pub fn integer(kind: IntKind, unsigned: bool) -> TypeRef {
        Rc::new(Type::Integer { kind, unsigned })
    }

    pub fn float(kind: FloatKind) -> TypeRef {
        Rc::new(Type::Float { kind })
    }

    pub fn double() -> TypeRef {
        Rc::new(Type::Float { kind: FloatKind::Double })
    }

    pub fn pointer(pointee: TypeRef) -> TypeRef {
        Rc::new(Type::Pointer(pointee))
    }

    pub fn array(elem: TypeRef, len: i64) -> TypeRef {
        Rc::new(Type::Array { elem, len })
    }

    pub fn function(ret: TypeRef, params: Vec<TypeRef>, variadic: bool) -> TypeRef {
        Rc::new(Type::Function { ret, params, variadic })
    }
}

// ----- predicates and accessors -----

impl Type {
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Enums count as integers, matching their 4-byte int representation.
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer { .. } | Type::Enum(_))
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self, Type::Integer { unsigned: true, .. })
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float { .. })
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || self.is_pointer()
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function { .. })
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Type::Struct(_) | Type::Union(_))
    }

    pub fn is_aggregate(&self) -> bool {
        self.is_array() || self.is_record()
    }

    pub fn pointee(&self) -> Option<TypeRef> {
        match self {
            Type::Pointer(p) => Some(Rc::clone(p)),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<TypeRef> {
        match self {
            Type::Array { elem, .. } => Some(Rc::clone(elem)),
            _ => None,
        }
    }

    pub fn return_type(&self) -> Option<TypeRef> {
        match self {
            Type::Function { ret, .. } => Some(Rc::clone(ret)),
            _ => None,
        }
    }

    /// Look up a member of a struct/union by name.
    pub fn find_member(&self, name: &str) -> Option<Member> {
        match self {
            Type::Struct(rec) | Type::Union(rec) => rec
                .borrow()
                .members
                .iter()
                .find(|m| m.name == name)
                .cloned(),
            _ => None,
        }
    }

    /// Size in bytes. Incomplete types and functions report 0.
    pub fn size(&self) -> i64 {
        match self {
            Type::Void => 0,
            Type::Integer { kind, .. } => match kind {
                IntKind::Char => 1,
                IntKind::Short => 2,
                IntKind::Int => 4,
                IntKind::Long | IntKind::LongLong => 8,
            },
            Type::Float { kind } => match kind {
                FloatKind::Float => 4,
                FloatKind::Double => 8,
                FloatKind::LongDouble => 16,
            },
            Type::Pointer(_) => 8,
            Type::Array { elem, len } => {
                if *len < 0 {
                    0
                } else {
                    elem.size() * len
                }
            }
            Type::Function { .. } => 0,
            Type::Struct(rec) => {
                let rec = rec.borrow();
                if !rec.complete || rec.members.is_empty() {
                    return 0;
                }
                let last = rec.members.last().unwrap();
                let unpadded = last.offset + last.ty.size();
                let align = self.alignment();
                (unpadded + align - 1) / align * align
            }
            Type::Union(rec) => {
                let rec = rec.borrow();
                let max = rec.members.iter().map(|m| m.ty.size()).max().unwrap_or(0);
                let align = self.alignment();
                if align == 0 {
                    return 0;
                }
                (max + align - 1) / align * align
            }
            Type::Enum(_) => 4,
        }
    }

    pub fn alignment(&self) -> i64 {
        match self {
            Type::Void => 1,
            Type::Integer { .. } | Type::Float { .. } => self.size(),
            Type::Pointer(_) => 8,
            Type::Array { elem, .. } => elem.alignment(),
            Type::Function { .. } => 1,
            Type::Struct(rec) | Type::Union(rec) => rec
                .borrow()
                .members
                .iter()
                .map(|m| m.ty.alignment())
                .max()
                .unwrap_or(1),
            Type::Enum(_) => 4,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Integer { kind, unsigned } => {
                if *unsigned {
                    write!(f, "unsigned ")?;
                }
                match kind {
                    IntKind::Char => write!(f, "char"),
                    IntKind::Short => write!(f, "short"),
                    IntKind::Int => write!(f, "int"),
                    IntKind::Long => write!(f, "long"),
                    IntKind::LongLong => write!(f, "long long"),
                }
            }
            Type::Float { kind } => match kind {
                FloatKind::Float => write!(f, "float"),
                FloatKind::Double => write!(f, "double"),
                FloatKind::LongDouble => write!(f, "long double"),
            },
            Type::Pointer(p) => write!(f, "{}*", p),
            Type::Array { elem, len } => {
                if *len < 0 {
                    write!(f, "{}[]", elem)
                } else {
                    write!(f, "{}[{}]", elem, len)
                }
            }
            Type::Function { ret, params, variadic } => {
                write!(f, "{}(", ret)?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                if *variadic {
                    if !params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
            Type::Struct(rec) => {
                let rec = rec.borrow();
                if rec.tag.is_empty() {
                    write!(f, "struct <anonymous>")
                } else {
                    write!(f, "struct {}", rec.tag)
                }
            }
            Type::Union(rec) => {
                let rec = rec.borrow();
                if rec.tag.is_empty() {
                    write!(f, "union <anonymous>")
                } else {
                    write!(f, "union {}", rec.tag)
                }
            }
            Type::Enum(en) => {
                let en = en.borrow();
                if en.tag.is_empty() {
                    write!(f, "enum <anonymous>")
                } else {
                    write!(f, "enum {}", en.tag)
                }
            }
        }
    }
}

// ----- compatibility, conversion, promotion -----

/// Structural type compatibility.
pub fn compatible(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Void, Type::Void) => true,
        (
            Type::Integer { kind: ka, unsigned: ua },
            Type::Integer { kind: kb, unsigned: ub },
        ) => ka == kb && ua == ub,
        (Type::Float { kind: ka }, Type::Float { kind: kb }) => ka == kb,
        (Type::Pointer(pa), Type::Pointer(pb)) => {
            pa.is_void() || pb.is_void() || compatible(pa, pb)
        }
        (Type::Array { elem: ea, len: la }, Type::Array { elem: eb, len: lb }) => {
            compatible(ea, eb) && (*la < 0 || *lb < 0 || la == lb)
        }
        (
            Type::Function { ret: ra, params: pa, variadic: va },
            Type::Function { ret: rb, params: pb, variadic: vb },
        ) => {
            compatible(ra, rb)
                && pa.len() == pb.len()
                && va == vb
                && pa.iter().zip(pb).all(|(x, y)| compatible(x, y))
        }
        (Type::Struct(ra), Type::Struct(rb)) => ra.borrow().tag == rb.borrow().tag,
        (Type::Union(ra), Type::Union(rb)) => ra.borrow().tag == rb.borrow().tag,
        (Type::Enum(ea), Type::Enum(eb)) => ea.borrow().tag == eb.borrow().tag,
        _ => false,
    }
}

/// Whether `from` implicitly converts to `to`. Warning-worthy cases
/// (integer/pointer mixing, narrowing) still return true; the analyzer
/// decides what to diagnose.
pub fn can_implicitly_convert(from: &Type, to: &Type) -> bool {
    if compatible(from, to) {
        return true;
    }
    if from.is_arithmetic() && to.is_arithmetic() {
        return true;
    }
    // Integer <-> pointer, with a warning at the use site.
    if (from.is_integer() && to.is_pointer()) || (from.is_pointer() && to.is_integer()) {
        return true;
    }
    // Any pointer to void* and back.
    match (from, to) {
        (Type::Pointer(a), Type::Pointer(b)) if a.is_void() || b.is_void() => return true,
        _ => {}
    }
    // Array decay to pointer of compatible element.
    if let (Type::Array { elem, .. }, Type::Pointer(p)) = (from, to) {
        if p.is_void() || compatible(elem, p) {
            return true;
        }
    }
    // Function to function pointer.
    if let (Type::Function { .. }, Type::Pointer(p)) = (from, to) {
        if compatible(from, p) {
            return true;
        }
    }
    // `char s[] = "..."`: a char pointer initializes a char array.
    if let (Type::Pointer(p), Type::Array { elem, .. }) = (from, to) {
        if matches!(**p, Type::Integer { kind: IntKind::Char, .. })
            && matches!(**elem, Type::Integer { kind: IntKind::Char, .. })
        {
            return true;
        }
    }
    false
}

/// The common type of an arithmetic binary operation.
pub fn common_type(a: &TypeRef, b: &TypeRef) -> TypeRef {
    // Floats dominate; the larger float kind wins.
    match (&**a, &**b) {
        (Type::Float { kind: ka }, Type::Float { kind: kb }) => {
            return Type::float(*ka.max(kb));
        }
        (Type::Float { .. }, _) => return Rc::clone(a),
        (_, Type::Float { .. }) => return Rc::clone(b),
        _ => {}
    }

    // Integer promotion: everything narrower than int becomes int; enums
    // already behave as int.
    let (ka, ua) = int_rank(a);
    let (kb, ub) = int_rank(b);
    if ka == kb {
        Type::integer(ka, ua || ub)
    } else if ka > kb {
        Type::integer(ka, ua)
    } else {
        Type::integer(kb, ub)
    }
}

fn int_rank(t: &TypeRef) -> (IntKind, bool) {
    match &**t {
        Type::Integer { kind, unsigned } => {
            if *kind < IntKind::Int {
                (IntKind::Int, false)
            } else {
                (*kind, *unsigned)
            }
        }
        Type::Enum(_) => (IntKind::Int, false),
        _ => (IntKind::Int, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_types() -> Vec<TypeRef> {
        let point = Rc::new(RefCell::new(RecordType {
            tag: "Point".to_string(),
            members: vec![
                Member { name: "x".into(), ty: Type::int(), offset: 0 },
                Member { name: "y".into(), ty: Type::int(), offset: 4 },
            ],
            complete: true,
        }));
        vec![
            Type::void(),
            Type::int(),
            Type::integer(IntKind::Int, true),
            Type::char_type(),
            Type::long(),
            Type::float(FloatKind::Float),
            Type::double(),
            Type::pointer(Type::int()),
            Type::pointer(Type::void()),
            Type::array(Type::int(), 5),
            Type::array(Type::int(), -1),
            Type::function(Type::int(), vec![Type::int()], false),
            Rc::new(Type::Struct(point)),
        ]
    }

    #[test]
    fn compatibility_is_reflexive_and_symmetric() {
        let types = sample_types();
        for t in &types {
            assert!(compatible(t, t), "reflexivity failed for {}", t);
        }
        for a in &types {
            for b in &types {
                assert_eq!(
                    compatible(a, b),
                    compatible(b, a),
                    "symmetry failed for {} vs {}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn void_pointer_is_universal() {
        let vp = Type::pointer(Type::void());
        let ip = Type::pointer(Type::int());
        assert!(compatible(&vp, &ip));
        assert!(can_implicitly_convert(&ip, &vp));
        assert!(can_implicitly_convert(&vp, &ip));
    }

    #[test]
    fn unknown_array_length_matches_any() {
        let known = Type::array(Type::int(), 5);
        let unknown = Type::array(Type::int(), -1);
        let other = Type::array(Type::int(), 7);
        assert!(compatible(&known, &unknown));
        assert!(!compatible(&known, &other));
    }

    #[test]
    fn array_decays_to_pointer() {
        let arr = Type::array(Type::int(), 4);
        let ptr = Type::pointer(Type::int());
        assert!(can_implicitly_convert(&arr, &ptr));
        assert!(!can_implicitly_convert(&arr, &Type::pointer(Type::double())));
    }

    #[test]
    fn common_type_promotion() {
        let c = Type::char_type();
        let i = Type::int();
        let u = Type::integer(IntKind::Int, true);
        let l = Type::long();
        let d = Type::double();
        let f = Type::float(FloatKind::Float);

        assert_eq!(common_type(&c, &c).to_string(), "int");
        assert_eq!(common_type(&i, &u).to_string(), "unsigned int");
        assert_eq!(common_type(&i, &l).to_string(), "long");
        assert_eq!(common_type(&i, &d).to_string(), "double");
        assert_eq!(common_type(&f, &d).to_string(), "double");
    }

    #[test]
    fn lp64_sizes_and_alignment() {
        assert_eq!(Type::char_type().size(), 1);
        assert_eq!(Type::int().size(), 4);
        assert_eq!(Type::long().size(), 8);
        assert_eq!(Type::pointer(Type::void()).size(), 8);
        assert_eq!(Type::array(Type::int(), 5).size(), 20);
        assert_eq!(Type::array(Type::int(), 5).alignment(), 4);
    }

    #[test]
    fn struct_size_rounds_to_alignment() {
        let rec = Rc::new(RefCell::new(RecordType {
            tag: "S".to_string(),
            members: vec![
                Member { name: "c".into(), ty: Type::char_type(), offset: 0 },
                Member { name: "l".into(), ty: Type::long(), offset: 8 },
                Member { name: "c2".into(), ty: Type::char_type(), offset: 16 },
            ],
            complete: true,
        }));
        let s = Type::Struct(rec);
        assert_eq!(s.alignment(), 8);
        assert_eq!(s.size(), 24);
    }

    #[test]
    fn incomplete_record_has_zero_size() {
        let rec = Rc::new(RefCell::new(RecordType {
            tag: "Fwd".to_string(),
            members: vec![],
            complete: false,
        }));
        assert_eq!(Type::Struct(rec).size(), 0);
    }
}
