use std::fmt::{self, Write};

use ahash::AHashSet;

use crate::{
    exception_private::RunError,
    exception_public::Exception,
    heap::{DropWithHeap, Heap, HeapData, HeapId},
    resource::{MAX_DATA_RECURSION_DEPTH, ResourceError, ResourceTracker},
    types::{Dict, List, PyTrait, Str, Tuple},
    value::Value,
};

/// A runtime value detached from the heap.
///
/// This is the host-facing form of an object: it owns its data and can be
/// cloned, compared and serialised freely. Convert with
/// `Interpreter::to_object` and `Interpreter::from_object`.
///
/// # Input vs Output Variants
///
/// `None`, `Int`, `Float`, `String`, `List`, `Tuple` and `Dict` convert both ways.
/// `Module`, `Repr` and `Cycle` are output-only: they describe objects that have
/// no plain-data form. True and False are the ints 1 and 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Object {
    None,
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Self>),
    Tuple(Vec<Self>),
    /// Entries in table order.
    Dict(Vec<(String, Self)>),
    /// A module, by name.
    Module(String),
    /// Any other object, as its repr, e.g. `<built-in method len>`.
    Repr(String),
    /// A container met again while it was being converted.
    Cycle(HeapId, String),
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            _ => f.write_str(&self.repr()),
        }
    }
}

impl Object {
    /// Converts the object at `id` without touching reference counts.
    pub(crate) fn from_heap(heap: &Heap<impl ResourceTracker>, id: HeapId) -> Self {
        let mut visiting = AHashSet::new();
        Self::from_heap_inner(heap, id, &mut visiting, 0)
    }

    fn from_heap_inner(
        heap: &Heap<impl ResourceTracker>,
        id: HeapId,
        visiting: &mut AHashSet<HeapId>,
        depth: u16,
    ) -> Self {
        let data = heap.get(id);
        let is_container = matches!(data, HeapData::List(_) | HeapData::Tuple(_) | HeapData::Dict(_));
        if is_container && (visiting.contains(&id) || depth > MAX_DATA_RECURSION_DEPTH) {
            let placeholder = match data {
                HeapData::List(_) => "[...]",
                HeapData::Tuple(_) => "(...)",
                _ => "{...}",
            };
            return Self::Cycle(id, placeholder.to_owned());
        }
        visiting.insert(id);

        let mut convert = |item: &Value| Self::from_heap_inner(heap, item.id(), visiting, depth + 1);
        let object = match data {
            HeapData::None => Self::None,
            HeapData::Int(i) => Self::Int(*i),
            HeapData::Float(f) => Self::Float(*f),
            HeapData::Str(s) => Self::String(s.to_string_lossy()),
            HeapData::List(l) => Self::List(l.items().iter().map(&mut convert).collect()),
            HeapData::Tuple(t) => Self::Tuple(t.items().iter().map(&mut convert).collect()),
            HeapData::Dict(d) => Self::Dict(
                d.iter()
                    .map(|(key, value)| (String::from_utf8_lossy(key).into_owned(), convert(value)))
                    .collect(),
            ),
            HeapData::Module(m) => match heap.get(m.name().id()) {
                HeapData::Str(name) => Self::Module(name.to_string_lossy()),
                _ => Self::Module(String::new()),
            },
            HeapData::Method(m) => Self::Repr(format!("<built-in method {}>", m.function().name())),
            HeapData::Code(c) => Self::Repr(format!("<code {}>", c.filename())),
            other => Self::Repr(format!("<{}>", other.py_kind())),
        };

        visiting.remove(&id);
        object
    }

    /// Builds a heap object. The returned value owns one reference.
    pub(crate) fn to_value(&self, heap: &mut Heap<impl ResourceTracker>) -> Result<Value, InvalidInputError> {
        let data = match self {
            Self::None => return Ok(heap.none()),
            Self::Int(i) => HeapData::Int(*i),
            Self::Float(f) => HeapData::Float(*f),
            Self::String(s) => HeapData::Str(Str::from(s.as_str())),
            Self::List(items) => HeapData::List(List::from_vec(Self::items_to_values(items, heap)?)),
            Self::Tuple(items) => HeapData::Tuple(Tuple::from_vec(Self::items_to_values(items, heap)?)),
            Self::Dict(entries) => {
                let mut dict = Dict::new();
                for (key, object) in entries {
                    let inserted = match object.to_value(heap) {
                        Ok(value) => dict.insert(key.as_bytes(), value, heap).map_err(InvalidInputError::from),
                        Err(err) => Err(err),
                    };
                    if let Err(err) = inserted {
                        dict.drop_with_heap(heap);
                        return Err(err);
                    }
                }
                HeapData::Dict(dict)
            }
            Self::Module(_) => return Err(InvalidInputError::invalid_type("module")),
            Self::Repr(_) => return Err(InvalidInputError::invalid_type("repr")),
            Self::Cycle(..) => return Err(InvalidInputError::invalid_type("cycle")),
        };
        Ok(heap.allocate_value(data)?)
    }

    fn items_to_values(items: &[Self], heap: &mut Heap<impl ResourceTracker>) -> Result<Vec<Value>, InvalidInputError> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item.to_value(heap) {
                Ok(value) => values.push(value),
                Err(err) => {
                    values.drop_with_heap(heap);
                    return Err(err);
                }
            }
        }
        Ok(values)
    }

    /// The runtime's printed form: strings quoted, containers bracketed.
    #[must_use]
    pub fn repr(&self) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = self.repr_fmt(&mut out);
        out
    }

    fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::String(s) => string_repr_fmt(s, f),
            Self::List(items) => {
                f.write_char('[')?;
                Self::items_fmt(items, f)?;
                f.write_char(']')
            }
            Self::Tuple(items) => {
                f.write_char('(')?;
                Self::items_fmt(items, f)?;
                if items.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Self::Dict(entries) => {
                f.write_char('{')?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    string_repr_fmt(key, f)?;
                    f.write_str(": ")?;
                    value.repr_fmt(f)?;
                }
                f.write_char('}')
            }
            Self::Module(name) => write!(f, "<module '{name}'>"),
            Self::Repr(s) | Self::Cycle(_, s) => f.write_str(s),
        }
    }

    fn items_fmt(items: &[Self], f: &mut impl Write) -> fmt::Result {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            item.repr_fmt(f)?;
        }
        Ok(())
    }

    /// Kind name, as the runtime reports it in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dictionary",
            Self::Module(_) => "module",
            Self::Repr(_) => "repr",
            Self::Cycle(..) => "cycle",
        }
    }
}

fn string_repr_fmt(s: &str, f: &mut impl Write) -> fmt::Result {
    f.write_char('\'')?;
    for c in s.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('\'')
}

/// Error returned when an `Object` cannot be converted to the requested Rust type.
#[derive(Debug)]
pub struct ConversionError {
    /// The kind that was expected (e.g. "int").
    pub expected: &'static str,
    /// The kind the `Object` actually holds.
    pub actual: &'static str,
}

impl ConversionError {
    #[must_use]
    pub fn new(expected: &'static str, actual: &'static str) -> Self {
        Self { expected, actual }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, got {}", self.expected, self.actual)
    }
}

impl std::error::Error for ConversionError {}

/// Error returned when an `Object` cannot be turned into a heap object.
#[derive(Debug, Clone)]
pub enum InvalidInputError {
    /// The variant is output-only. Holds its kind name.
    InvalidType(&'static str),
    /// A resource limit was exceeded during conversion.
    Resource(ResourceError),
    /// A container refused an entry.
    Runtime(Exception),
}

impl InvalidInputError {
    #[must_use]
    pub fn invalid_type(type_name: &'static str) -> Self {
        Self::InvalidType(type_name)
    }
}

impl fmt::Display for InvalidInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidType(type_name) => write!(f, "'{type_name}' is not a valid input value"),
            Self::Resource(e) => write!(f, "{e}"),
            Self::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for InvalidInputError {}

impl From<ResourceError> for InvalidInputError {
    fn from(err: ResourceError) -> Self {
        Self::Resource(err)
    }
}

impl From<RunError> for InvalidInputError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Exc(exc) => Self::Runtime(exc.into()),
            RunError::Propagated => Self::InvalidType("dictionary"),
        }
    }
}

/// Extracts an int. Fails for every other variant.
impl TryFrom<&Object> for i64 {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Int(i) => Ok(*i),
            other => Err(ConversionError::new("int", other.type_name())),
        }
    }
}

/// Extracts a float. Ints are not promoted.
impl TryFrom<&Object> for f64 {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Float(f) => Ok(*f),
            other => Err(ConversionError::new("float", other.type_name())),
        }
    }
}

impl TryFrom<&Object> for String {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::String(s) => Ok(s.clone()),
            other => Err(ConversionError::new("string", other.type_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn repr_forms() {
        let dict = Object::Dict(vec![("a".to_owned(), Object::Int(1))]);
        assert_eq!(dict.repr(), "{'a': 1}");
        assert_eq!(Object::Tuple(vec![Object::Int(1)]).repr(), "(1,)");
        assert_eq!(Object::Tuple(vec![]).repr(), "()");
        assert_eq!(Object::Float(2.0).repr(), "2.0");
        assert_eq!(Object::String("it's".to_owned()).repr(), "'it\\'s'");
        assert_eq!(Object::Module("math".to_owned()).repr(), "<module 'math'>");
    }

    #[test]
    fn display_leaves_strings_unquoted() {
        assert_eq!(Object::String("hi".to_owned()).to_string(), "hi");
        assert_eq!(Object::List(vec![Object::String("hi".to_owned())]).to_string(), "['hi']");
    }

    #[test]
    fn conversions_do_not_promote() {
        assert_eq!(i64::try_from(&Object::Int(4)).unwrap(), 4);
        let err = f64::try_from(&Object::Int(4)).unwrap_err();
        assert_eq!(err.to_string(), "expected float, got int");
    }
}
