//! Function records and the shapes compiled bodies are called through.
//!
//! A compiled body takes one of three forms:
//!
//! - global code, run once against the global object;
//! - evaluated code, which gets the activation's private and shared slot
//!   arrays plus the dynamic scope chain;
//! - a [`CodeFactory`] that builds the entry point for whatever calling
//!   convention the caller asks for.
//!
//! [`FunctionRecord::specialize`] turns any of them into a
//! [`NativeCallable`] without touching the body itself.
use core::fmt;
use std::sync::Arc;

use crate::{
    ExecutionError, HostObject, NativeBoxed, ObjectRef, PropertyTable, ScopeChain, SharedSlots, Tag,
    Value, ValueError,
};

pub type NativeResult = Result<Value, ExecutionError>;

pub type FunctionRef = Arc<FunctionRecord>;

pub type GlobalCode = Arc<dyn Fn(&FunctionRecord, &ObjectRef) -> NativeResult + Send + Sync>;

pub type EvalCode = Arc<
    dyn Fn(
            &FunctionRecord,
            &ObjectRef,
            &mut [Value],
            &SharedSlots,
            &ScopeChain,
        ) -> NativeResult
        + Send
        + Sync,
>;

pub type DirectFn = Arc<dyn Fn(&Value, &[Value]) -> NativeResult + Send + Sync>;

pub type ReflectiveFn = Arc<
    dyn Fn(&NativeBoxed, &[NativeBoxed]) -> Result<NativeBoxed, ExecutionError>
        + Send
        + Sync,
>;

/// Calling conventions a body can be entered through.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum CallShape {
    Global,
    Eval,
    /// Tagged receiver and arguments.
    #[default]
    Direct,
    /// Plain host values in and out, for reflection-style callers.
    Reflective,
}

/// An invocable entry point produced for one [`CallShape`].
#[derive(Clone)]
pub enum NativeCallable {
    Direct(DirectFn),
    Reflective(ReflectiveFn),
}

impl NativeCallable {
    pub fn shape(&self) -> CallShape {
        match self {
            NativeCallable::Direct(_) => CallShape::Direct,
            NativeCallable::Reflective(_) => CallShape::Reflective,
        }
    }

    /// Call with tagged values, converting at the boundary if this is a
    /// reflective entry point.
    pub fn invoke(&self, this: &Value, args: &[Value]) -> NativeResult {
        match self {
            NativeCallable::Direct(f) => f(this, args),
            NativeCallable::Reflective(f) => {
                let native: Vec<_> = args.iter().map(Value::to_native_boxed).collect();
                let result = f(&this.to_native_boxed(), &native)?;
                Ok(Value::from(result))
            }
        }
    }
}

impl fmt::Debug for NativeCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeCallable({:?})", self.shape())
    }
}

/// Produces entry points for a function record on demand.
pub trait CodeFactory: Send + Sync {
    /// Build the entry point for `shape`, or `None` if this factory has no
    /// native form for it. The record falls back to adapting its direct
    /// entry point for reflective callers.
    fn specialize(&self, function: &FunctionRef, shape: CallShape) -> Option<NativeCallable>;
}

/// Factory for functions implemented directly by the host.
struct HostCode(DirectFn);

impl CodeFactory for HostCode {
    fn specialize(&self, _function: &FunctionRef, shape: CallShape) -> Option<NativeCallable> {
        match shape {
            CallShape::Direct => Some(NativeCallable::Direct(self.0.clone())),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub enum FunctionBody {
    Global(GlobalCode),
    Eval(EvalCode),
    Generic(Arc<dyn CodeFactory>),
}

impl FunctionBody {
    pub fn shape(&self) -> Option<CallShape> {
        match self {
            FunctionBody::Global(_) => Some(CallShape::Global),
            FunctionBody::Eval(_) => Some(CallShape::Eval),
            FunctionBody::Generic(_) => None,
        }
    }
}

/// Names of the statically allocated slots, by index.
///
/// Private slots are only visible to the activation that owns them; shared
/// slots are the ones nested functions close over.
#[derive(Debug, Clone, Default)]
pub struct SlotLayout {
    pub private: Vec<Arc<str>>,
    pub shared: Vec<Arc<str>>,
}

impl SlotLayout {
    pub fn new<'a>(
        private: impl IntoIterator<Item = &'a str>,
        shared: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            private: private.into_iter().map(Arc::from).collect(),
            shared: shared.into_iter().map(Arc::from).collect(),
        }
    }

    pub fn private_index(&self, name: &str) -> Option<usize> {
        self.private.iter().position(|slot| &**slot == name)
    }

    pub fn shared_index(&self, name: &str) -> Option<usize> {
        self.shared.iter().position(|slot| &**slot == name)
    }
}

pub struct FunctionRecord {
    name: Arc<str>,
    arity: usize,
    layout: SlotLayout,
    body: FunctionBody,
    properties: PropertyTable,
}

impl FunctionRecord {
    pub fn new(
        name: impl Into<Arc<str>>,
        arity: usize,
        layout: SlotLayout,
        body: FunctionBody,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            layout,
            body,
            properties: PropertyTable::default(),
        }
    }

    pub fn global(
        name: impl Into<Arc<str>>,
        code: impl Fn(&FunctionRecord, &ObjectRef) -> NativeResult
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self::new(
            name,
            0,
            SlotLayout::default(),
            FunctionBody::Global(Arc::new(code)),
        )
    }

    /// Evaluated code. The first `arity` private slots receive the
    /// arguments when the record is called directly.
    pub fn eval(
        name: impl Into<Arc<str>>,
        arity: usize,
        layout: SlotLayout,
        code: impl Fn(
            &FunctionRecord,
            &ObjectRef,
            &mut [Value],
            &SharedSlots,
            &ScopeChain,
        ) -> NativeResult
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self::new(name, arity, layout, FunctionBody::Eval(Arc::new(code)))
    }

    pub fn host(
        name: impl Into<Arc<str>>,
        arity: usize,
        code: impl Fn(&Value, &[Value]) -> NativeResult + Send + Sync + 'static,
    ) -> Self {
        let factory = HostCode(Arc::new(code));
        Self::new(
            name,
            arity,
            SlotLayout::default(),
            FunctionBody::Generic(Arc::new(factory)),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn body(&self) -> &FunctionBody {
        &self.body
    }

    fn shape_mismatch(&self, expected: CallShape) -> ExecutionError {
        ExecutionError::ShapeMismatch {
            function: self.name.to_string(),
            expected,
        }
    }

    /// Build an entry point for `shape`. Global and eval bodies are
    /// wrapped; reflective entry points are derived from the direct one
    /// unless a factory provides its own.
    pub fn specialize(
        self: &Arc<Self>,
        shape: CallShape,
    ) -> Result<NativeCallable, ExecutionError> {
        log::debug!("specializing '{}' for {shape:?}", self.name);
        if let FunctionBody::Generic(factory) = &self.body {
            if let Some(callable) = factory.specialize(self, shape) {
                return Ok(callable);
            }
        }
        match shape {
            CallShape::Direct => self.direct_entry(),
            CallShape::Reflective => {
                let direct = self.direct_entry()?;
                let reflective: ReflectiveFn =
                    Arc::new(move |this: &NativeBoxed, args: &[NativeBoxed]| {
                        let args: Vec<_> = args.iter().cloned().map(Value::from).collect();
                        let this = Value::from(this.clone());
                        Ok(direct.invoke(&this, &args)?.to_native_boxed())
                    });
                Ok(NativeCallable::Reflective(reflective))
            }
            CallShape::Global | CallShape::Eval => Err(self.shape_mismatch(shape)),
        }
    }

    fn direct_entry(self: &Arc<Self>) -> Result<NativeCallable, ExecutionError> {
        let function = self.clone();
        let direct: DirectFn = match &self.body {
            FunctionBody::Global(code) => {
                let code = code.clone();
                Arc::new(move |this: &Value, _args: &[Value]| {
                    code(&function, &receiver_object(this)?)
                })
            }
            FunctionBody::Eval(code) => {
                let code = code.clone();
                Arc::new(move |this: &Value, args: &[Value]| {
                    let receiver = receiver_object(this)?;
                    let layout = function.layout();
                    let mut private = vec![Value::Undefined; layout.private.len()];
                    let count = args.len().min(function.arity).min(private.len());
                    private[..count].clone_from_slice(&args[..count]);
                    let shared = SharedSlots::new(layout.shared.len());
                    code(
                        &function,
                        &receiver,
                        &mut private,
                        &shared,
                        &ScopeChain::empty(),
                    )
                })
            }
            FunctionBody::Generic(factory) => {
                return factory
                    .specialize(self, CallShape::Direct)
                    .ok_or_else(|| self.shape_mismatch(CallShape::Direct));
            }
        };
        Ok(NativeCallable::Direct(direct))
    }
}

fn receiver_object(this: &Value) -> Result<ObjectRef, ExecutionError> {
    match this {
        Value::Object(object) => Ok(object.clone()),
        other => Err(ValueError::TypeMismatch {
            expected: Tag::Object,
            found: other.tag(),
        }
        .into()),
    }
}

impl HostObject for FunctionRecord {
    fn get(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.clone())),
            "length" => Some(Value::from(self.arity as f64)),
            _ => self.properties.get(name),
        }
    }

    fn put(&self, name: &str, value: Value) {
        self.properties.put(name, value);
    }

    fn class_name(&self) -> &'static str {
        "Function"
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

impl fmt::Debug for FunctionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRecord")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("layout", &self.layout)
            .field("shape", &self.body.shape())
            .finish()
    }
}
