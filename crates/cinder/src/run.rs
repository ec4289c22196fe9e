//! Running a code image as a program.

use crate::{
    bytecode::{CodeImage, Interpreter},
    exception_private::{ExcType, SimpleException},
    exception_public::Exception,
    object::Object,
    resource::{NoLimitTracker, ResourceTracker},
    tracer::{NoopTracer, VmTracer},
};

/// Runs a code image as the `__main__` module.
///
/// The module's attribute dict serves as both globals and locals, so top-level
/// names become module attributes.
///
/// # Example
///
/// ```
/// use cinder::{CodeBuilder, Object, Opcode, Runner};
///
/// let mut builder = CodeBuilder::new("main.py");
/// builder.load_const(6).load_const(7).emit(Opcode::BinaryMultiply).emit(Opcode::ReturnValue);
/// let runner = Runner::new(builder.build());
/// assert_eq!(runner.run_no_limits().unwrap(), Object::Int(42));
/// ```
#[derive(Debug, Clone)]
pub struct Runner {
    image: CodeImage,
}

impl Runner {
    #[must_use]
    pub fn new(image: CodeImage) -> Self {
        Self { image }
    }

    #[must_use]
    pub fn image(&self) -> &CodeImage {
        &self.image
    }

    /// Runs with no resource limits.
    pub fn run_no_limits(&self) -> Result<Object, Exception> {
        self.run(NoLimitTracker)
    }

    /// Runs under `tracker`'s limits.
    pub fn run(&self, tracker: impl ResourceTracker) -> Result<Object, Exception> {
        let mut interp = Interpreter::with_tracker(tracker, NoopTracer);
        self.run_in(&mut interp)
    }

    /// Runs in a caller-supplied interpreter, whose tracer and heap can be
    /// inspected afterwards.
    pub fn run_in<T: ResourceTracker, Tr: VmTracer>(&self, interp: &mut Interpreter<T, Tr>) -> Result<Object, Exception> {
        run_main(interp, &self.image)
    }

    /// Runs with no limits and reports reference counts, for leak tests.
    ///
    /// `counts` holds the refcount of every name bound in `__main__` after the
    /// run. `heap_count` is the number of objects the run left alive once the
    /// result and the code are released; the module and everything its
    /// namespace still references are part of it.
    #[cfg(feature = "ref-count-return")]
    pub fn run_ref_counts(&self) -> Result<RefCountOutput, Exception> {
        let mut interp = Interpreter::new();
        let baseline = interp.heap_entry_count();
        let code = interp.load_code(&self.image)?;
        let module = match interp.add_module("__main__") {
            Ok(module) => module,
            Err(err) => {
                interp.release(code);
                return Err(err);
            }
        };
        let globals = match interp.get_attr(&module, "__dict__") {
            Ok(globals) => globals,
            Err(err) => {
                interp.release(code);
                interp.release(module);
                return Err(err);
            }
        };
        let result = interp.eval(&code, &globals, &globals, None);
        let object = result.as_ref().map(|value| interp.to_object(value));
        interp.release(result);
        interp.release(code);

        let mut counts = ahash::AHashMap::new();
        if let Some(capacity) = interp.dict_capacity(&globals) {
            for index in 0..capacity {
                if let Some(name) = interp.dict_key_at(&globals, index)
                    && let Some(value) = interp.dict_lookup(&globals, &name)
                {
                    let count = interp.refcount(value);
                    counts.insert(name, count);
                }
            }
        }
        interp.release(globals);
        interp.release(module);

        let object = match object {
            Some(object) => object,
            None => return Err(interp.take_exception().unwrap_or_else(ghost_error)),
        };
        Ok(RefCountOutput {
            object,
            counts,
            heap_count: interp.heap_entry_count() - baseline,
        })
    }
}

/// Loads `image`, registers `__main__` and evaluates the image in its namespace.
fn run_main<T: ResourceTracker, Tr: VmTracer>(
    interp: &mut Interpreter<T, Tr>,
    image: &CodeImage,
) -> Result<Object, Exception> {
    let code = interp.load_code(image)?;
    let module = match interp.add_module("__main__") {
        Ok(module) => module,
        Err(err) => {
            interp.release(code);
            return Err(err);
        }
    };
    let globals = interp.get_attr(&module, "__dict__");
    interp.release(module);
    let globals = match globals {
        Ok(globals) => globals,
        Err(err) => {
            interp.release(code);
            return Err(err);
        }
    };

    let result = interp.eval(&code, &globals, &globals, None);
    let object = result.as_ref().map(|value| interp.to_object(value));
    interp.release(result);
    interp.release(code);
    interp.release(globals);
    object.ok_or_else(|| interp.take_exception().unwrap_or_else(ghost_error))
}

fn ghost_error() -> Exception {
    SimpleException::new_msg(ExcType::SystemError, "ghost error").into()
}

/// Result of [`Runner::run_ref_counts`].
#[cfg(feature = "ref-count-return")]
#[derive(Debug)]
pub struct RefCountOutput {
    pub object: Object,
    pub counts: ahash::AHashMap<String, usize>,
    pub heap_count: usize,
}
