//! Serialisable compiled code.
//!
//! A `CodeImage` is what a compiler hands the runtime: the opcode stream, the
//! constant and name tables and the source filename. It lives outside the heap
//! and is turned into a heap `Code` object by `Interpreter::load_code`.

use serde::{Deserialize, Serialize};

/// A constant table entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Const {
    None,
    Int(i64),
    Float(f64),
    Str(String),
    /// Body of a nested function or class, for `BUILD_FUNCTION`.
    Code(Box<CodeImage>),
}

impl From<i64> for Const {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Const {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Const {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<CodeImage> for Const {
    fn from(code: CodeImage) -> Self {
        Self::Code(Box::new(code))
    }
}

/// Compiled code for one module, function or class body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeImage {
    pub filename: String,
    pub bytecode: Vec<u8>,
    pub consts: Vec<Const>,
    pub names: Vec<String>,
}

impl CodeImage {
    /// Serialises the image, including nested code constants, with postcard.
    ///
    /// The result can be restored with [`CodeImage::load`].
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores an image produced by [`CodeImage::dump`].
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn nested_code_survives_dump_and_load() {
        let body = CodeImage {
            filename: "lib.py".to_owned(),
            bytecode: vec![83],
            consts: vec![Const::None],
            names: vec![],
        };
        let image = CodeImage {
            filename: "main.py".to_owned(),
            bytecode: vec![100, 0, 0, 83],
            consts: vec![Const::from(1.5), Const::from("x"), Const::from(body)],
            names: vec!["f".to_owned()],
        };
        let bytes = image.dump().unwrap();
        assert_eq!(CodeImage::load(&bytes).unwrap(), image);
    }

    #[test]
    fn truncated_input_is_an_error() {
        let image = CodeImage {
            filename: "main.py".to_owned(),
            bytecode: vec![1, 2, 3],
            consts: vec![Const::Int(7)],
            names: vec!["abc".to_owned()],
        };
        let bytes = image.dump().unwrap();
        assert!(CodeImage::load(&bytes[..bytes.len() - 2]).is_err());
    }
}
