//! The main dispatch loop
//!
//! `spec.md` §4.4: "The main dispatch loop is opcode-addressed; a
//! computed-goto-style implementation is an acceptable optimization but not
//! required." We use a plain `match` over [`Opcode`] — the optimization is
//! explicitly not required, and a `match` keeps the safepoint check
//! (`spec.md` §4.4 "Safepoint") and the exception-table consultation
//! (`spec.md` §4.4 "Exceptions") in one legible place.

use super::calling::bind_arguments_with_heap;
use super::closure;
use super::exceptions::{FinallyIntent, FinallyState};
use super::frame::{FunctionInfo, ValueStack};
use super::opcode::Opcode;
use crate::concurrency::thread::ThreadState;
use crate::error::{ExceptionKind, RaisedException, VmResult};
use crate::globals::RuntimeContext;
use crate::stdlib::array::AloreArray;
use crate::stdlib::hash::default_eq;
use crate::stdlib::int_ops;
use crate::stdlib::pair_range::{AlorePair, AloreRange};
use crate::types::dispatch::{self, MemberRole, PrimitiveKind, Visibility};
use crate::types::instance::AloreInstance;
use crate::types::type_value::AloreType;
use crate::types::typeinfo::{MemberItem, TypeInfo};
use alore_core::Value;
use std::sync::Arc;

/// One call-stack activation: which function is running, where its frame's
/// slots live in the shared [`ValueStack`], and the current program
/// counter.
struct Activation {
    function: Arc<FunctionInfo>,
    base: usize,
    pc: u32,
}

/// Per-thread interpreter state: the value stack plus the call stack of
/// activations. One `Interpreter` runs on exactly one OS thread
/// (`spec.md` §5's one-OS-thread-per-Alore-thread model); cross-thread
/// coordination happens through `concurrency::ThreadState`, not here.
pub struct Interpreter<'ctx> {
    ctx: &'ctx RuntimeContext,
    thread: &'ctx mut ThreadState,
    stack: ValueStack,
    call_stack: Vec<Activation>,
    /// Gathered via `CREATE_ANON` / invoked via `CallMember` on a bound
    /// method's receiver+function pair; kept separate from `call_stack`
    /// since it's addressed by global index, not by lexical nesting.
    globals: Vec<Value>,
    /// `spec.md` §4.3's "global function index" space: the table
    /// `CALL_G`, a bound method's function slot, a closure's function
    /// slot, and `MemberItem::GlobalFunction` all address by index. Kept
    /// distinct from `globals` (the data-global array `GLOBAL_TO_LOCAL`/
    /// `LOCAL_TO_GLOBAL` read and write) rather than boxing every function
    /// as a first-class `Value` inside `globals` and unwrapping it again on
    /// every call — a deliberate simplification over the spec's single
    /// contiguous array, noted in `DESIGN.md`.
    functions: Vec<Arc<FunctionInfo>>,
    /// Compiler-assigned type table, addressed by the same index an
    /// instance stashes in its own slot 0 (`types::instance::AloreInstance`,
    /// `spec.md` §3.3).
    types: Vec<Arc<TypeInfo>>,
    /// `spec.md` §4.3's primitive-wrapper dispatch: which registered type
    /// (an index into `types`) a bare `Int`/`Str`/`Float`/... `Value`
    /// resolves its member tables through. Populated by the loader
    /// callback (`spec.md` §4.6) once per primitive kind at VM start,
    /// alongside the user-defined types it registers.
    wrapper_types: std::collections::HashMap<PrimitiveKind, u32>,
}

const DEFAULT_STACK_CAPACITY: usize = 1 << 16;

impl<'ctx> Interpreter<'ctx> {
    pub fn new(ctx: &'ctx RuntimeContext, thread: &'ctx mut ThreadState) -> Interpreter<'ctx> {
        Interpreter {
            ctx,
            thread,
            stack: ValueStack::new(DEFAULT_STACK_CAPACITY),
            call_stack: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
            types: Vec::new(),
            wrapper_types: std::collections::HashMap::new(),
        }
    }

    /// Register a compiled function, returning the global function index
    /// `CALL_G`, bound methods, closures, and `MemberItem::GlobalFunction`
    /// address it by.
    pub fn register_function(&mut self, function: Arc<FunctionInfo>) -> u32 {
        self.functions.push(function);
        (self.functions.len() - 1) as u32
    }

    /// Register a `TypeInfo`, returning the type index instances stash in
    /// their own slot 0 (`types::instance::AloreInstance::allocate`).
    pub fn register_type(&mut self, type_info: Arc<TypeInfo>) -> u32 {
        self.types.push(type_info);
        (self.types.len() - 1) as u32
    }

    /// Register the internal wrapper `TypeInfo` a bare primitive `Value` of
    /// `kind` dispatches through (`spec.md` §4.3). `type_index` must already
    /// have been registered via [`Self::register_type`].
    pub fn register_wrapper_type(&mut self, kind: PrimitiveKind, type_index: u32) {
        self.wrapper_types.insert(kind, type_index);
    }

    fn function_at(&self, idx: u32) -> VmResult<Arc<FunctionInfo>> {
        self.functions.get(idx as usize).cloned().ok_or_else(|| {
            RaisedException::new(
                ExceptionKind::MemberError,
                format!("unknown global function index {idx}"),
            )
        })
    }

    /// `spec.md` §4.3 step 1: "Start at the receiver's concrete TypeInfo."
    /// For an `Instance`, that's the type stashed in its own slot 0; for a
    /// bare primitive (`Int`, `Str`, `Float`, `Pair`, `Range`, `LongInt`,
    /// `Constant`, `Function`), it's the registered wrapper type for that
    /// kind (§4.3 "Primitive values... are first wrapped into a
    /// single-slot instance of the matching internal wrapper type" — we
    /// skip the allocation and resolve the wrapper `TypeInfo` directly,
    /// since nothing here needs the wrapper instance itself to survive
    /// past this lookup).
    fn type_of(&self, v: Value) -> VmResult<Arc<TypeInfo>> {
        let idx = if let Some(idx) = AloreInstance::type_index(v) {
            idx
        } else {
            let kind = dispatch::primitive_kind_of(v).ok_or_else(|| {
                RaisedException::new(
                    ExceptionKind::TypeError,
                    "value has no member dispatch: not an Instance and not a dispatchable primitive kind",
                )
            })?;
            *self.wrapper_types.get(&kind).ok_or_else(|| {
                RaisedException::new(
                    ExceptionKind::TypeError,
                    format!("no wrapper type registered for primitive kind {kind:?}"),
                )
            })?
        };
        self.types.get(idx as usize).cloned().ok_or_else(|| {
            RaisedException::new(ExceptionKind::MemberError, format!("unknown type index {idx}"))
        })
    }

    /// Resolve a callee `Value` (a first-class `Function`, a bound method,
    /// or a closure) into the underlying `FunctionInfo` plus any arguments
    /// the call convention prepends ahead of the caller's own
    /// (`spec.md` §4.4 "Closures", §4.3 "Constructing a bound method").
    fn resolve_callable(&self, callee: Value) -> VmResult<(Arc<FunctionInfo>, Vec<Value>)> {
        if let Some(idx) = closure::function_value_index(callee) {
            return Ok((self.function_at(idx)?, Vec::new()));
        }
        if let Some((idx, prepend)) = closure::closure_parts(callee) {
            return Ok((self.function_at(idx)?, prepend));
        }
        if let Some((receiver, idx)) = dispatch::bound_method_parts(callee) {
            return Ok((self.function_at(idx)?, vec![receiver]));
        }
        Err(RaisedException::new(ExceptionKind::TypeError, "value is not callable"))
    }

    fn do_call(&mut self, callee: Value, args: &[Value]) -> VmResult<Value> {
        if let Some(type_idx) = AloreType::type_index(callee) {
            return self.construct(type_idx, args);
        }
        let (function, prepend) = self.resolve_callable(callee)?;
        let mut full_args = prepend;
        full_args.extend_from_slice(args);
        self.call_function(function, &full_args)
    }

    /// `spec.md` §4.4 "Calls": "Type-constructor calls allocate an instance
    /// block, initialize all slots to Nil..., prepend the instance as
    /// receiver, then invoke the constructor." The constructor's own return
    /// value is discarded; the call itself evaluates to the instance, the
    /// same way the callee side never sees `CALL_L`/`CALL_M`'s normal return
    /// slot repurposed for this.
    fn construct(&mut self, type_idx: u32, args: &[Value]) -> VmResult<Value> {
        let t = self.types.get(type_idx as usize).cloned().ok_or_else(|| {
            RaisedException::new(ExceptionKind::MemberError, format!("unknown type index {type_idx}"))
        })?;
        let instance = AloreInstance::allocate(&self.ctx.heap, type_idx, t.instance_slot_count);
        if let Some(ctor_idx) = t.constructor {
            let function = self.function_at(ctor_idx)?;
            let mut full_args = vec![instance];
            full_args.extend_from_slice(args);
            self.call_function(function, &full_args)?;
        }
        Ok(instance)
    }

    /// `spec.md` §4.3 steps 1-5 for `MEMBER_TO_LOCAL`/`LOCAL_TO_MEMBER`:
    /// resolve `receiver`'s concrete type and walk its member tables for
    /// `member` under `role`.
    fn resolve_member(&self, receiver: Value, role: MemberRole, member: u32) -> VmResult<MemberItem> {
        let t = self.type_of(receiver)?;
        match role {
            MemberRole::Set => dispatch::dispatch_set(&t, Visibility::Public, member),
            _ => dispatch::dispatch_get(&t, role, Visibility::Public, member),
        }
    }

    /// `spec.md` §4.3 "Item decoding": a direct slot index is a plain load;
    /// a global function index is invoked with the receiver prepended as
    /// `self`.
    fn read_member(&mut self, receiver: Value, item: MemberItem) -> VmResult<Value> {
        match item {
            MemberItem::InstanceSlot(n) => AloreInstance::get_field(receiver, n).ok_or_else(|| {
                RaisedException::new(ExceptionKind::TypeError, "member access on a non-Instance value")
            }),
            MemberItem::GlobalFunction(idx) => {
                let function = self.function_at(idx)?;
                self.call_function(function, &[receiver])
            }
        }
    }

    /// Same as [`Self::read_member`] but for a setter: a direct slot index
    /// is a plain store through the write barrier; a global function index
    /// is invoked with receiver and the new value (`spec.md` §4.3, "with
    /// receiver+value for setters").
    fn write_member(&mut self, receiver: Value, item: MemberItem, value: Value) -> VmResult<()> {
        match item {
            MemberItem::InstanceSlot(n) => {
                let ok = AloreInstance::set_field(receiver, n, value, self.thread.new_reference_list());
                if !ok {
                    return Err(RaisedException::new(
                        ExceptionKind::TypeError,
                        "member assignment on a non-Instance value",
                    ));
                }
                Ok(())
            }
            MemberItem::GlobalFunction(idx) => {
                let function = self.function_at(idx)?;
                self.call_function(function, &[receiver, value])?;
                Ok(())
            }
        }
    }

    fn frame_slots(&mut self, activation_index: usize) -> &mut [Value] {
        let base = self.call_stack[activation_index].base;
        let size = self.call_stack[activation_index].function.frame_size as usize;
        &mut self.stack.slots_mut()[base..base + size]
    }

    /// `spec.md` §4.4 "Calls": allocate a new frame, bind arguments per the
    /// callee's declared arity, and push an activation for it.
    pub fn call_function(&mut self, function: Arc<FunctionInfo>, args: &[Value]) -> VmResult<Value> {
        let frame_size = function.frame_size as usize;
        let range = self.stack.push_frame(frame_size).ok_or_else(|| {
            RaisedException::new(ExceptionKind::RuntimeError, "stack overflow")
        })?;
        let base = range.start;

        bind_arguments_with_heap(
            &self.ctx.heap,
            &mut self.stack.slots_mut()[range.clone()],
            args,
            function.min_args,
            function.max_args,
            function.has_varargs,
            &function.name,
        )?;

        self.call_stack.push(Activation {
            function: function.clone(),
            base,
            pc: 0,
        });

        let result = self.run_current_activation();
        self.stack.pop_frame(range);
        self.call_stack.pop();
        result
    }

    /// Periodic safepoint check (`spec.md` §4.4 "Safepoint"): at every
    /// backward branch and non-trivial call site, test whether a freeze or
    /// a keyboard interrupt is pending.
    fn safepoint(&self) -> VmResult<()> {
        self.thread.poll_safepoint()
    }

    fn run_current_activation(&mut self) -> VmResult<Value> {
        loop {
            let depth = self.call_stack.len() - 1;
            let pc = self.call_stack[depth].pc as usize;
            let instr = self.call_stack[depth].function.code.get(pc).cloned();
            let Some(instr) = instr else {
                return Ok(Value::NIL);
            };

            match self.step(depth, instr.op) {
                Ok(StepOutcome::Continue) => {
                    self.call_stack[depth].pc += 1;
                }
                Ok(StepOutcome::Jump(target)) => {
                    if (target as usize) < pc {
                        self.safepoint()?;
                    }
                    self.call_stack[depth].pc = target;
                }
                Ok(StepOutcome::Return(v)) => return Ok(v),
                Err(exc) => {
                    match self.call_stack[depth].function.handler_for(pc as u32) {
                        Some(handler_pc) => {
                            self.thread.set_unwinding_exception(exc);
                            self.call_stack[depth].pc = handler_pc;
                        }
                        None => return Err(exc),
                    }
                }
            }
        }
    }

    fn step(&mut self, depth: usize, op: Opcode) -> VmResult<StepOutcome> {
        match op {
            Opcode::ConstToLocal { dst, value } => {
                self.frame_slots(depth)[dst as usize] = value;
                Ok(StepOutcome::Continue)
            }
            Opcode::LocalToLocal { dst, src } => {
                let v = self.frame_slots(depth)[src as usize];
                self.frame_slots(depth)[dst as usize] = v;
                Ok(StepOutcome::Continue)
            }
            Opcode::NilToLocal { dst } => {
                self.frame_slots(depth)[dst as usize] = Value::NIL;
                Ok(StepOutcome::Continue)
            }
            Opcode::GlobalToLocal { dst, global } => {
                let v = self.globals.get(global as usize).copied().unwrap_or(Value::NIL);
                self.frame_slots(depth)[dst as usize] = v;
                Ok(StepOutcome::Continue)
            }
            Opcode::LocalToGlobal { global, src, barriered: _ } => {
                let v = self.frame_slots(depth)[src as usize];
                if self.globals.len() <= global as usize {
                    self.globals.resize(global as usize + 1, Value::NIL);
                }
                self.globals[global as usize] = v;
                Ok(StepOutcome::Continue)
            }

            Opcode::Add { dst, lhs, rhs } => self.arith(depth, dst, lhs, rhs, int_ops::checked_add, |a, b| a + b),
            Opcode::Sub { dst, lhs, rhs } => self.arith(depth, dst, lhs, rhs, int_ops::checked_sub, |a, b| a - b),
            Opcode::Mul { dst, lhs, rhs } => self.arith(depth, dst, lhs, rhs, int_ops::checked_mul, |a, b| a * b),

            Opcode::Div { dst, lhs, rhs } => {
                let (a, b) = self.int_operands(depth, lhs, rhs)?;
                if b == 0 {
                    return Err(RaisedException::new(ExceptionKind::ArithmeticError, "division by zero"));
                }
                self.frame_slots(depth)[dst as usize] = int_ops::float_div(a, b);
                Ok(StepOutcome::Continue)
            }
            Opcode::IDiv { dst, lhs, rhs } => {
                let (a, b) = self.int_operands(depth, lhs, rhs)?;
                let (q, _) = int_ops::floor_div_mod(a, b).ok_or_else(|| {
                    RaisedException::new(ExceptionKind::ArithmeticError, "division by zero")
                })?;
                self.frame_slots(depth)[dst as usize] = q;
                Ok(StepOutcome::Continue)
            }
            Opcode::Mod { dst, lhs, rhs } => {
                let (a, b) = self.int_operands(depth, lhs, rhs)?;
                let (_, r) = int_ops::floor_div_mod(a, b).ok_or_else(|| {
                    RaisedException::new(ExceptionKind::ArithmeticError, "modulus by zero")
                })?;
                self.frame_slots(depth)[dst as usize] = r;
                Ok(StepOutcome::Continue)
            }
            Opcode::Pow { dst, lhs, rhs } => {
                let (a, b) = self.int_operands(depth, lhs, rhs)?;
                let v = int_ops::pow(&self.ctx.heap, a, b)?;
                self.frame_slots(depth)[dst as usize] = v;
                Ok(StepOutcome::Continue)
            }
            Opcode::Neg { dst, src } => {
                let v = self.frame_slots(depth)[src as usize];
                let a = v.as_short_int().ok_or_else(|| {
                    RaisedException::new(ExceptionKind::TypeError, "NEG expects an integer")
                })?;
                self.frame_slots(depth)[dst as usize] = int_ops::checked_neg(&self.ctx.heap, a);
                Ok(StepOutcome::Continue)
            }

            Opcode::Eq { dst, lhs, rhs } => self.compare(depth, dst, lhs, rhs, |o| o == std::cmp::Ordering::Equal),
            Opcode::Neq { dst, lhs, rhs } => self.compare(depth, dst, lhs, rhs, |o| o != std::cmp::Ordering::Equal),
            Opcode::Lt { dst, lhs, rhs } => self.compare(depth, dst, lhs, rhs, |o| o == std::cmp::Ordering::Less),
            Opcode::Lte { dst, lhs, rhs } => self.compare(depth, dst, lhs, rhs, |o| o != std::cmp::Ordering::Greater),
            Opcode::Gt { dst, lhs, rhs } => self.compare(depth, dst, lhs, rhs, |o| o == std::cmp::Ordering::Greater),
            Opcode::Gte { dst, lhs, rhs } => self.compare(depth, dst, lhs, rhs, |o| o != std::cmp::Ordering::Less),
            Opcode::Is { dst, lhs, rhs } => {
                let a = self.frame_slots(depth)[lhs as usize];
                let b = self.frame_slots(depth)[rhs as usize];
                self.frame_slots(depth)[dst as usize] = Value::from_bool(a.raw_bits() == b.raw_bits());
                Ok(StepOutcome::Continue)
            }
            Opcode::IsNot { dst, lhs, rhs } => {
                let a = self.frame_slots(depth)[lhs as usize];
                let b = self.frame_slots(depth)[rhs as usize];
                self.frame_slots(depth)[dst as usize] = Value::from_bool(a.raw_bits() != b.raw_bits());
                Ok(StepOutcome::Continue)
            }
            Opcode::In { dst, lhs, rhs } => {
                let needle = self.frame_slots(depth)[lhs as usize];
                let container = self.frame_slots(depth)[rhs as usize];
                self.require_sequence(container, "IN")?;
                let len = AloreArray::len(container);
                let mut found = false;
                for i in 0..len as i64 {
                    if default_eq(AloreArray::get(container, i)?, needle) {
                        found = true;
                        break;
                    }
                }
                self.frame_slots(depth)[dst as usize] = Value::from_bool(found);
                Ok(StepOutcome::Continue)
            }

            Opcode::BranchIfTrue { cond, offset } => {
                let v = self.frame_slots(depth)[cond as usize];
                if v.is_truthy() {
                    let target = (self.call_stack[depth].pc as i64 + offset as i64) as u32;
                    Ok(StepOutcome::Jump(target))
                } else {
                    Ok(StepOutcome::Continue)
                }
            }
            Opcode::Jump { offset } => {
                let target = (self.call_stack[depth].pc as i64 + offset as i64) as u32;
                Ok(StepOutcome::Jump(target))
            }

            Opcode::ArrayGet { dst, array, index } => {
                let a = self.frame_slots(depth)[array as usize];
                let i = self.frame_slots(depth)[index as usize];
                let idx = i.as_short_int().ok_or_else(|| {
                    RaisedException::new(ExceptionKind::TypeError, "array index must be an Int")
                })?;
                let v = AloreArray::get(a, idx)?;
                self.frame_slots(depth)[dst as usize] = v;
                Ok(StepOutcome::Continue)
            }
            Opcode::ArraySet { array, index, value } => {
                let a = self.frame_slots(depth)[array as usize];
                let i = self.frame_slots(depth)[index as usize];
                let v = self.frame_slots(depth)[value as usize];
                let idx = i.as_short_int().ok_or_else(|| {
                    RaisedException::new(ExceptionKind::TypeError, "array index must be an Int")
                })?;
                AloreArray::set(a, idx, v, self.thread.new_reference_list())?;
                Ok(StepOutcome::Continue)
            }

            Opcode::CreateArray { dst, elements } => {
                let values: Vec<Value> = elements.iter().map(|&s| self.frame_slots(depth)[s as usize]).collect();
                self.frame_slots(depth)[dst as usize] = AloreArray::from_values(&self.ctx.heap, &values);
                Ok(StepOutcome::Continue)
            }
            Opcode::CreateTuple { dst, elements } => {
                let values: Vec<Value> = elements.iter().map(|&s| self.frame_slots(depth)[s as usize]).collect();
                self.frame_slots(depth)[dst as usize] =
                    crate::stdlib::tuple::AloreTuple::from_values(&self.ctx.heap, &values);
                Ok(StepOutcome::Continue)
            }

            Opcode::Ret => Ok(StepOutcome::Return(Value::NIL)),
            Opcode::RetLocal { src } => {
                let v = self.frame_slots(depth)[src as usize];
                Ok(StepOutcome::Return(v))
            }

            Opcode::RaiseLocal { exc } => {
                let v = self.frame_slots(depth)[exc as usize];
                Err(RaisedException::new(
                    ExceptionKind::RuntimeError,
                    format!("raised {v:?}"),
                ))
            }
            Opcode::Try { .. } | Opcode::TryEnd => Ok(StepOutcome::Continue),
            Opcode::LeaveFinally { state_slot } => {
                let status_value = self.frame_slots(depth)[state_slot as usize];
                let state = FinallyState {
                    status: status_value.as_short_int().unwrap_or(0) as u32,
                    value: self.frame_slots(depth)[state_slot as usize + 1],
                    context_depth: self.frame_slots(depth)[state_slot as usize + 2]
                        .as_short_int()
                        .unwrap_or(0) as u32,
                };
                match state.intent() {
                    FinallyIntent::Continue => Ok(StepOutcome::Continue),
                    FinallyIntent::Return => Ok(StepOutcome::Return(state.value)),
                    FinallyIntent::Reraise => Err(RaisedException::new(
                        ExceptionKind::RuntimeError,
                        format!("reraised {:?}", state.value),
                    )),
                    FinallyIntent::Branch { target_pc, .. } => Ok(StepOutcome::Jump(target_pc)),
                }
            }

            Opcode::JumpOffsetToLocal { dst, offset } => {
                let target = (self.call_stack[depth].pc as i64 + offset as i64) as i64;
                self.frame_slots(depth)[dst as usize] = Value::try_int(target).unwrap_or(Value::NIL);
                Ok(StepOutcome::Continue)
            }

            Opcode::MemberToLocal { dst, receiver, member } => {
                let r = self.frame_slots(depth)[receiver as usize];
                let item = self.resolve_member(r, MemberRole::Get, member)?;
                let v = self.read_member(r, item)?;
                self.frame_slots(depth)[dst as usize] = v;
                Ok(StepOutcome::Continue)
            }
            Opcode::LocalToMember { receiver, member, src } => {
                let r = self.frame_slots(depth)[receiver as usize];
                let v = self.frame_slots(depth)[src as usize];
                let item = self.resolve_member(r, MemberRole::Set, member)?;
                self.write_member(r, item, v)?;
                Ok(StepOutcome::Continue)
            }

            Opcode::CallLocal { dst, callee, args } => {
                let callee_v = self.frame_slots(depth)[callee as usize];
                let arg_values: Vec<Value> = args.iter().map(|&s| self.frame_slots(depth)[s as usize]).collect();
                let result = self.do_call(callee_v, &arg_values)?;
                self.frame_slots(depth)[dst as usize] = result;
                Ok(StepOutcome::Continue)
            }
            Opcode::CallGlobal { dst, global, args } => {
                let function = self.function_at(global)?;
                let arg_values: Vec<Value> = args.iter().map(|&s| self.frame_slots(depth)[s as usize]).collect();
                let result = self.call_function(function, &arg_values)?;
                self.frame_slots(depth)[dst as usize] = result;
                Ok(StepOutcome::Continue)
            }
            Opcode::CallMember { dst, receiver, member, args } => {
                let r = self.frame_slots(depth)[receiver as usize];
                let item = self.resolve_member(r, MemberRole::Method, member)?;
                let arg_values: Vec<Value> = args.iter().map(|&s| self.frame_slots(depth)[s as usize]).collect();
                let result = match item {
                    MemberItem::InstanceSlot(n) => {
                        let callee = AloreInstance::get_field(r, n).ok_or_else(|| {
                            RaisedException::new(ExceptionKind::TypeError, "member is not callable")
                        })?;
                        self.do_call(callee, &arg_values)?
                    }
                    MemberItem::GlobalFunction(idx) => {
                        let function = self.function_at(idx)?;
                        let mut full_args = vec![r];
                        full_args.extend_from_slice(&arg_values);
                        self.call_function(function, &full_args)?
                    }
                };
                self.frame_slots(depth)[dst as usize] = result;
                Ok(StepOutcome::Continue)
            }

            Opcode::Slice { dst, base, start, stop } => {
                let container = self.frame_slots(depth)[base as usize];
                self.require_sequence(container, "slice")?;
                let len = AloreArray::len(container) as i64;
                let start_v = self.frame_slots(depth)[start as usize];
                let stop_v = self.frame_slots(depth)[stop as usize];
                let norm = |v: Value, default: i64| -> VmResult<i64> {
                    if v == Value::DEFAULT {
                        return Ok(default);
                    }
                    let i = v.as_short_int().ok_or_else(|| {
                        RaisedException::new(ExceptionKind::TypeError, "slice bound must be an Int")
                    })?;
                    Ok(if i < 0 { (i + len).max(0) } else { i.min(len) })
                };
                let s = norm(start_v, 0)?;
                let e = norm(stop_v, len)?;
                let mut values = Vec::new();
                let mut i = s;
                while i < e && i < len {
                    values.push(AloreArray::get(container, i)?);
                    i += 1;
                }
                self.frame_slots(depth)[dst as usize] = AloreArray::from_values(&self.ctx.heap, &values);
                Ok(StepOutcome::Continue)
            }

            Opcode::Expand { sources, dsts } => {
                let container = self.frame_slots(depth)[sources as usize];
                self.require_sequence(container, "EXPAND")?;
                let len = AloreArray::len(container);
                if len != dsts.len() {
                    return Err(RaisedException::new(
                        ExceptionKind::ValueError,
                        format!("cannot expand {len} values into {} targets", dsts.len()),
                    ));
                }
                for (i, &d) in dsts.iter().enumerate() {
                    let v = AloreArray::get(container, i as i64)?;
                    self.frame_slots(depth)[d as usize] = v;
                }
                Ok(StepOutcome::Continue)
            }

            Opcode::ForInit { dst_iter, iterable } => {
                let container = self.frame_slots(depth)[iterable as usize];
                let cursor = if let Ok((start, _)) = AloreRange::short_int_bounds(container) {
                    AlorePair::make(&self.ctx.heap, container, Value::int(start))
                } else if matches!(container.as_heap_ptr(), Some((tag, _)) if tag == alore_core::value::TAG_FIX_ARRAY || tag == alore_core::value::TAG_TUPLE)
                {
                    AlorePair::make(&self.ctx.heap, container, Value::int(0))
                } else if AloreInstance::type_index(container).is_some() {
                    // `spec.md` §4.4's generic path: ask the iterable for its
                    // `iterator()`, then drive that with `hasNext`/`next`
                    // (`types::typeinfo::MEMBER_ITERATOR`). The cursor's
                    // index slot is unused here — state lives in the
                    // iterator instance itself.
                    let item = self.resolve_member(container, MemberRole::Method, crate::types::typeinfo::MEMBER_ITERATOR)?;
                    let iterator = self.read_member(container, item)?;
                    AlorePair::make(&self.ctx.heap, iterator, Value::NIL)
                } else {
                    return Err(RaisedException::new(
                        ExceptionKind::TypeError,
                        "FOR_INIT requires an Array, Tuple, Range, or a type defining iterator()",
                    ));
                };
                self.frame_slots(depth)[dst_iter as usize] = cursor;
                Ok(StepOutcome::Continue)
            }
            Opcode::ForLoop { iter, dst_item, offset } => {
                let cursor = self.frame_slots(depth)[iter as usize];
                let (container, idx_v) = AlorePair::parts(cursor)
                    .expect("FOR_LOOP's iter slot always holds a FOR_INIT-built cursor");

                let (next, advanced_cursor) = if let Some((_, stop)) = AloreRange::parts(container) {
                    let idx = idx_v.as_short_int().expect("Range cursor index is always a short int");
                    let stop = stop.as_short_int().expect("Range bounds are short ints");
                    if idx < stop {
                        (Some(Value::int(idx)), AlorePair::make(&self.ctx.heap, container, Value::int(idx + 1)))
                    } else {
                        (None, cursor)
                    }
                } else if matches!(container.as_heap_ptr(), Some((tag, _)) if tag == alore_core::value::TAG_FIX_ARRAY || tag == alore_core::value::TAG_TUPLE)
                {
                    let idx = idx_v.as_short_int().expect("Array/Tuple cursor index is always a short int");
                    if idx < AloreArray::len(container) as i64 {
                        (Some(AloreArray::get(container, idx)?), AlorePair::make(&self.ctx.heap, container, Value::int(idx + 1)))
                    } else {
                        (None, cursor)
                    }
                } else {
                    // Generic iterator: `container` holds the `Instance`
                    // returned by `iterator()`; the cursor never needs to
                    // move, since `hasNext`/`next` carry their own state.
                    let has_next_item = self.resolve_member(container, MemberRole::Method, crate::types::typeinfo::MEMBER_HAS_NEXT)?;
                    let has_next = self.read_member(container, has_next_item)?;
                    if has_next.is_truthy() {
                        let next_item = self.resolve_member(container, MemberRole::Method, crate::types::typeinfo::MEMBER_NEXT)?;
                        (Some(self.read_member(container, next_item)?), cursor)
                    } else {
                        (None, cursor)
                    }
                };

                match next {
                    Some(item) => {
                        self.frame_slots(depth)[dst_item as usize] = item;
                        self.frame_slots(depth)[iter as usize] = advanced_cursor;
                        let target = (self.call_stack[depth].pc as i64 + offset as i64) as u32;
                        Ok(StepOutcome::Jump(target))
                    }
                    None => Ok(StepOutcome::Continue),
                }
            }

            Opcode::CreateExposed { dst, src } => {
                let v = self.frame_slots(depth)[src as usize];
                self.frame_slots(depth)[dst as usize] = closure::make_cell(&self.ctx.heap, v);
                Ok(StepOutcome::Continue)
            }
            Opcode::CreateAnon { dst, function_global, captured_cells } => {
                let cells: Vec<Value> = captured_cells.iter().map(|&s| self.frame_slots(depth)[s as usize]).collect();
                self.frame_slots(depth)[dst as usize] =
                    closure::make_closure(&self.ctx.heap, function_global, &cells);
                Ok(StepOutcome::Continue)
            }

            other => Err(RaisedException::new(
                ExceptionKind::RuntimeError,
                format!("unimplemented opcode in this build: {other:?}"),
            )),
        }
    }

    /// `AloreArray`'s accessors assume their argument is already a
    /// `FixArray`/`Tuple`-shaped heap block; this checks that before calling
    /// into them so a malformed operand raises `TypeError` instead of
    /// panicking.
    fn require_sequence(&self, v: Value, op: &str) -> VmResult<()> {
        match v.as_heap_ptr() {
            Some((tag, _))
                if tag == alore_core::value::TAG_FIX_ARRAY || tag == alore_core::value::TAG_TUPLE =>
            {
                Ok(())
            }
            _ => Err(RaisedException::new(
                ExceptionKind::TypeError,
                format!("{op} expects an Array or Tuple"),
            )),
        }
    }

    fn int_operands(&mut self, depth: usize, lhs: u32, rhs: u32) -> VmResult<(i64, i64)> {
        let a = self.frame_slots(depth)[lhs as usize];
        let b = self.frame_slots(depth)[rhs as usize];
        match (a.as_short_int(), b.as_short_int()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(RaisedException::new(ExceptionKind::TypeError, "expected two integers")),
        }
    }

    fn arith(
        &mut self,
        depth: usize,
        dst: u32,
        lhs: u32,
        rhs: u32,
        checked: impl FnOnce(&crate::heap::Heap, i64, i64) -> Value,
        _math: impl FnOnce(i64, i64) -> i64,
    ) -> VmResult<StepOutcome> {
        let (a, b) = self.int_operands(depth, lhs, rhs)?;
        let result = checked(&self.ctx.heap, a, b);
        self.frame_slots(depth)[dst as usize] = result;
        Ok(StepOutcome::Continue)
    }

    fn compare(
        &mut self,
        depth: usize,
        dst: u32,
        lhs: u32,
        rhs: u32,
        test: impl FnOnce(std::cmp::Ordering) -> bool,
    ) -> VmResult<StepOutcome> {
        let (a, b) = self.int_operands(depth, lhs, rhs)?;
        self.frame_slots(depth)[dst as usize] = Value::from_bool(test(a.cmp(&b)));
        Ok(StepOutcome::Continue)
    }
}

enum StepOutcome {
    Continue,
    Jump(u32),
    Return(Value),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::frame::ExceptionTableEntry;
    use crate::interp::opcode::Instruction;

    fn test_ctx() -> RuntimeContext {
        RuntimeContext::new(false)
    }

    #[test]
    fn runs_simple_add_and_returns() {
        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let function = Arc::new(FunctionInfo {
            name: "add_two".to_string(),
            frame_size: 3,
            min_args: 2,
            max_args: 2,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::Add { dst: 2, lhs: 0, rhs: 1 } },
                Instruction { op: Opcode::RetLocal { src: 2 } },
            ],
        });

        let result = interp
            .call_function(function, &[Value::int(2), Value::int(3)])
            .unwrap();
        assert_eq!(result.as_short_int(), Some(5));
    }

    #[test]
    fn division_by_zero_raises_arithmetic_error() {
        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let function = Arc::new(FunctionInfo {
            name: "boom".to_string(),
            frame_size: 3,
            min_args: 2,
            max_args: 2,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![Instruction { op: Opcode::Mod { dst: 2, lhs: 0, rhs: 1 } }],
        });

        let err = interp
            .call_function(function, &[Value::int(7), Value::int(0)])
            .unwrap_err();
        assert_eq!(err.kind, ExceptionKind::ArithmeticError);
    }

    #[test]
    fn try_handler_catches_raised_exception() {
        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let function = Arc::new(FunctionInfo {
            name: "guarded".to_string(),
            frame_size: 2,
            min_args: 0,
            max_args: 0,
            has_varargs: false,
            exception_table: vec![ExceptionTableEntry {
                start_pc: 0,
                end_pc: 1,
                handler_pc: 2,
            }],
            code: vec![
                Instruction { op: Opcode::Mod { dst: 1, lhs: 0, rhs: 0 } },
                Instruction { op: Opcode::Jump { offset: 10 } },
                Instruction { op: Opcode::NilToLocal { dst: 1 } },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });

        let result = interp.call_function(function, &[]).unwrap();
        assert!(result.is_nil());
    }

    #[test]
    fn call_global_invokes_registered_function() {
        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let callee = Arc::new(FunctionInfo {
            name: "double".to_string(),
            frame_size: 2,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::Add { dst: 1, lhs: 0, rhs: 0 } },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });
        let callee_idx = interp.register_function(callee);

        let caller = Arc::new(FunctionInfo {
            name: "caller".to_string(),
            frame_size: 2,
            min_args: 0,
            max_args: 0,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::ConstToLocal { dst: 0, value: Value::int(21) } },
                Instruction {
                    op: Opcode::CallGlobal { dst: 1, global: callee_idx, args: vec![0] },
                },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });

        let result = interp.call_function(caller, &[]).unwrap();
        assert_eq!(result.as_short_int(), Some(42));
    }

    #[test]
    fn member_to_local_dispatches_through_a_registered_primitive_wrapper_type() {
        use crate::types::typeinfo::{Role, Visibility as TypeVisibility};

        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        // `double(self)`: doubles a plain Int receiver.
        let double = Arc::new(FunctionInfo {
            name: "double".to_string(),
            frame_size: 2,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::Add { dst: 1, lhs: 0, rhs: 0 } },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });
        let double_idx = interp.register_function(double);

        let mut int_wrapper = TypeInfo::new("Int");
        int_wrapper.define(Role::Method, TypeVisibility::Public, 5, MemberItem::GlobalFunction(double_idx));
        let wrapper_type_idx = interp.register_type(Arc::new(int_wrapper));
        interp.register_wrapper_type(PrimitiveKind::Int, wrapper_type_idx);

        let function = Arc::new(FunctionInfo {
            name: "calls_double_on_int".to_string(),
            frame_size: 2,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::CallMember { dst: 1, receiver: 0, member: 5, args: vec![] } },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });

        let result = interp.call_function(function, &[Value::int(21)]).unwrap();
        assert_eq!(result.as_short_int(), Some(42));
    }

    #[test]
    fn member_to_local_reads_instance_slot() {
        use crate::types::typeinfo::{Role, Visibility as TypeVisibility};

        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let mut widget = TypeInfo::new("Widget");
        widget.define(Role::Getter, TypeVisibility::Public, 7, MemberItem::InstanceSlot(0));
        let type_idx = interp.register_type(Arc::new(widget));

        let instance = AloreInstance::allocate(&ctx.heap, type_idx, 1);
        AloreInstance::set_field(instance, 0, Value::int(5), &mut Vec::new());

        let function = Arc::new(FunctionInfo {
            name: "reads_field".to_string(),
            frame_size: 2,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::MemberToLocal { dst: 1, receiver: 0, member: 7 } },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });

        let result = interp.call_function(function, &[instance]).unwrap();
        assert_eq!(result.as_short_int(), Some(5));
    }

    #[test]
    fn local_to_member_writes_instance_slot() {
        use crate::types::typeinfo::{Role, Visibility as TypeVisibility};

        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let mut widget = TypeInfo::new("Widget");
        widget.define(Role::Setter, TypeVisibility::Public, 3, MemberItem::InstanceSlot(0));
        let type_idx = interp.register_type(Arc::new(widget));
        let instance = AloreInstance::allocate(&ctx.heap, type_idx, 1);

        let function = Arc::new(FunctionInfo {
            name: "writes_field".to_string(),
            frame_size: 2,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::ConstToLocal { dst: 1, value: Value::int(9) } },
                Instruction { op: Opcode::LocalToMember { receiver: 0, member: 3, src: 1 } },
                Instruction { op: Opcode::RetLocal { src: 0 } },
            ],
        });

        interp.call_function(function, &[instance]).unwrap();
        assert_eq!(AloreInstance::get_field(instance, 0).unwrap().as_short_int(), Some(9));
    }

    #[test]
    fn call_member_invokes_global_function_with_receiver_prepended() {
        use crate::types::typeinfo::{Role, Visibility as TypeVisibility};

        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        // Doubles its argument; min_args: 2 so the call only type-checks if
        // CallMember actually prepended the receiver ahead of the arg.
        let greet = Arc::new(FunctionInfo {
            name: "greet".to_string(),
            frame_size: 3,
            min_args: 2,
            max_args: 2,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::Add { dst: 2, lhs: 1, rhs: 1 } },
                Instruction { op: Opcode::RetLocal { src: 2 } },
            ],
        });
        let greet_idx = interp.register_function(greet);

        let mut widget = TypeInfo::new("Widget");
        widget.define(Role::Method, TypeVisibility::Public, 1, MemberItem::GlobalFunction(greet_idx));
        let type_idx = interp.register_type(Arc::new(widget));
        let instance = AloreInstance::allocate(&ctx.heap, type_idx, 0);

        let caller = Arc::new(FunctionInfo {
            name: "caller".to_string(),
            frame_size: 3,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::ConstToLocal { dst: 1, value: Value::int(4) } },
                Instruction {
                    op: Opcode::CallMember { dst: 2, receiver: 0, member: 1, args: vec![1] },
                },
                Instruction { op: Opcode::RetLocal { src: 2 } },
            ],
        });

        let result = interp.call_function(caller, &[instance]).unwrap();
        assert_eq!(result.as_short_int(), Some(8));
    }

    #[test]
    fn for_loop_iterates_an_array() {
        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let array = AloreArray::from_values(&ctx.heap, &[Value::int(10), Value::int(20), Value::int(30)]);

        let function = Arc::new(FunctionInfo {
            name: "sums_array".to_string(),
            frame_size: 4,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::ConstToLocal { dst: 1, value: Value::int(0) } },
                Instruction { op: Opcode::ForInit { dst_iter: 2, iterable: 0 } },
                Instruction { op: Opcode::ForLoop { iter: 2, dst_item: 3, offset: 2 } },
                Instruction { op: Opcode::Jump { offset: 3 } },
                Instruction { op: Opcode::Add { dst: 1, lhs: 1, rhs: 3 } },
                Instruction { op: Opcode::Jump { offset: -3 } },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });

        let result = interp.call_function(function, &[array]).unwrap();
        assert_eq!(result.as_short_int(), Some(60));
    }

    #[test]
    fn for_loop_iterates_a_range() {
        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let range = AloreRange::make(&ctx.heap, Value::int(0), Value::int(4));

        let function = Arc::new(FunctionInfo {
            name: "sums_range".to_string(),
            frame_size: 4,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::ConstToLocal { dst: 1, value: Value::int(0) } },
                Instruction { op: Opcode::ForInit { dst_iter: 2, iterable: 0 } },
                Instruction { op: Opcode::ForLoop { iter: 2, dst_item: 3, offset: 2 } },
                Instruction { op: Opcode::Jump { offset: 3 } },
                Instruction { op: Opcode::Add { dst: 1, lhs: 1, rhs: 3 } },
                Instruction { op: Opcode::Jump { offset: -3 } },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });

        let result = interp.call_function(function, &[range]).unwrap();
        assert_eq!(result.as_short_int(), Some(6));
    }

    #[test]
    fn for_loop_drives_a_user_defined_iterator_protocol() {
        use crate::types::typeinfo::{Role, Visibility as TypeVisibility, MEMBER_HAS_NEXT, MEMBER_ITERATOR, MEMBER_NEXT};

        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        // A `Countdown` whose `iterator()` returns itself and whose
        // `hasNext`/`next` walk a single instance slot (member id 10,
        // wired straight to `InstanceSlot(0)`) down to zero.
        const COUNT_SLOT: u32 = 10;

        let iterator_fn = Arc::new(FunctionInfo {
            name: "iterator".to_string(),
            frame_size: 1,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![Instruction { op: Opcode::RetLocal { src: 0 } }],
        });
        let iterator_idx = interp.register_function(iterator_fn);

        let has_next_fn = Arc::new(FunctionInfo {
            name: "hasNext".to_string(),
            frame_size: 3,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::MemberToLocal { dst: 1, receiver: 0, member: COUNT_SLOT } },
                Instruction { op: Opcode::ConstToLocal { dst: 2, value: Value::int(0) } },
                Instruction { op: Opcode::Gt { dst: 1, lhs: 1, rhs: 2 } },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });
        let has_next_idx = interp.register_function(has_next_fn);

        let next_fn = Arc::new(FunctionInfo {
            name: "next".to_string(),
            frame_size: 3,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::MemberToLocal { dst: 1, receiver: 0, member: COUNT_SLOT } },
                Instruction { op: Opcode::ConstToLocal { dst: 2, value: Value::int(1) } },
                Instruction { op: Opcode::Sub { dst: 2, lhs: 1, rhs: 2 } },
                Instruction { op: Opcode::LocalToMember { receiver: 0, member: COUNT_SLOT, src: 2 } },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });
        let next_idx = interp.register_function(next_fn);

        let mut countdown = TypeInfo::new("Countdown");
        countdown.define(Role::Getter, TypeVisibility::Public, COUNT_SLOT, MemberItem::InstanceSlot(0));
        countdown.define(Role::Setter, TypeVisibility::Public, COUNT_SLOT, MemberItem::InstanceSlot(0));
        countdown.define(Role::Method, TypeVisibility::Public, MEMBER_ITERATOR, MemberItem::GlobalFunction(iterator_idx));
        countdown.define(Role::Method, TypeVisibility::Public, MEMBER_HAS_NEXT, MemberItem::GlobalFunction(has_next_idx));
        countdown.define(Role::Method, TypeVisibility::Public, MEMBER_NEXT, MemberItem::GlobalFunction(next_idx));
        let type_idx = interp.register_type(Arc::new(countdown));

        let instance = AloreInstance::allocate(&ctx.heap, type_idx, 1);
        AloreInstance::set_field(instance, 0, Value::int(3), &mut Vec::new());

        let sum_fn = Arc::new(FunctionInfo {
            name: "sums_countdown".to_string(),
            frame_size: 4,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::ConstToLocal { dst: 1, value: Value::int(0) } },
                Instruction { op: Opcode::ForInit { dst_iter: 2, iterable: 0 } },
                Instruction { op: Opcode::ForLoop { iter: 2, dst_item: 3, offset: 2 } },
                Instruction { op: Opcode::Jump { offset: 3 } },
                Instruction { op: Opcode::Add { dst: 1, lhs: 1, rhs: 3 } },
                Instruction { op: Opcode::Jump { offset: -3 } },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });

        let result = interp.call_function(sum_fn, &[instance]).unwrap();
        assert_eq!(result.as_short_int(), Some(6));
    }

    #[test]
    fn slice_extracts_a_subrange_with_negative_and_open_bounds() {
        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let array = AloreArray::from_values(
            &ctx.heap,
            &[Value::int(1), Value::int(2), Value::int(3), Value::int(4), Value::int(5)],
        );

        let function = Arc::new(FunctionInfo {
            name: "slices".to_string(),
            frame_size: 4,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::ConstToLocal { dst: 1, value: Value::int(1) } },
                Instruction { op: Opcode::ConstToLocal { dst: 2, value: Value::int(-1) } },
                Instruction { op: Opcode::Slice { dst: 3, base: 0, start: 1, stop: 2 } },
                Instruction { op: Opcode::RetLocal { src: 3 } },
            ],
        });

        let result = interp.call_function(function, &[array]).unwrap();
        assert_eq!(AloreArray::len(result), 3);
        assert_eq!(AloreArray::get(result, 0).unwrap().as_short_int(), Some(2));
        assert_eq!(AloreArray::get(result, 2).unwrap().as_short_int(), Some(4));
    }

    #[test]
    fn expand_destructures_into_targets() {
        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let pair = AloreArray::from_values(&ctx.heap, &[Value::int(1), Value::int(2)]);

        let function = Arc::new(FunctionInfo {
            name: "expands".to_string(),
            frame_size: 3,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::Expand { sources: 0, dsts: vec![1, 2] } },
                Instruction { op: Opcode::Sub { dst: 1, lhs: 2, rhs: 1 } },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });

        let result = interp.call_function(function, &[pair]).unwrap();
        assert_eq!(result.as_short_int(), Some(1));
    }

    #[test]
    fn expand_raises_value_error_on_length_mismatch() {
        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let triple = AloreArray::from_values(&ctx.heap, &[Value::int(1), Value::int(2), Value::int(3)]);

        let function = Arc::new(FunctionInfo {
            name: "bad_expand".to_string(),
            frame_size: 3,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![Instruction { op: Opcode::Expand { sources: 0, dsts: vec![1, 2] } }],
        });

        let err = interp.call_function(function, &[triple]).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::ValueError);
    }

    #[test]
    fn in_operator_scans_an_array() {
        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let array = AloreArray::from_values(&ctx.heap, &[Value::int(1), Value::int(2), Value::int(3)]);

        let function = Arc::new(FunctionInfo {
            name: "contains_two".to_string(),
            frame_size: 3,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::ConstToLocal { dst: 1, value: Value::int(2) } },
                Instruction { op: Opcode::In { dst: 2, lhs: 1, rhs: 0 } },
                Instruction { op: Opcode::RetLocal { src: 2 } },
            ],
        });

        let result = interp.call_function(function, &[array]).unwrap();
        assert!(result.is_truthy());
    }

    #[test]
    fn closure_created_and_invoked_reads_captured_cell() {
        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        // A closure's prepended argument slot holds the captured cell
        // itself (a 1-element FixArray), so the body dereferences it with a
        // plain ArrayGet rather than treating it as the value directly.
        let body = Arc::new(FunctionInfo {
            name: "adder_body".to_string(),
            frame_size: 3,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::ConstToLocal { dst: 1, value: Value::int(0) } },
                Instruction { op: Opcode::ArrayGet { dst: 2, array: 0, index: 1 } },
                Instruction { op: Opcode::RetLocal { src: 2 } },
            ],
        });
        let body_idx = interp.register_function(body);

        let maker = Arc::new(FunctionInfo {
            name: "makes_closure".to_string(),
            frame_size: 2,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::CreateExposed { dst: 1, src: 0 } },
                Instruction {
                    op: Opcode::CreateAnon { dst: 1, function_global: body_idx, captured_cells: vec![1] },
                },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });

        let closure = interp.call_function(maker, &[Value::int(11)]).unwrap();

        let invoker = Arc::new(FunctionInfo {
            name: "invokes".to_string(),
            frame_size: 2,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::CallLocal { dst: 1, callee: 0, args: vec![] } },
                Instruction { op: Opcode::RetLocal { src: 1 } },
            ],
        });

        let result = interp.call_function(invoker, &[closure]).unwrap();
        assert_eq!(result.as_short_int(), Some(11));
    }

    #[test]
    fn calling_a_type_value_constructs_an_instance_and_runs_its_constructor() {
        use crate::types::type_value::AloreType;

        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        // Constructor body: min_args 2 (self, arg) so the call only
        // type-checks if `construct` actually prepended the instance.
        let ctor = Arc::new(FunctionInfo {
            name: "Widget_init".to_string(),
            frame_size: 2,
            min_args: 2,
            max_args: 2,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![Instruction { op: Opcode::Ret }],
        });
        let ctor_idx = interp.register_function(ctor);

        let widget = TypeInfo::new("Widget").with_instance_slots(1).with_constructor(ctor_idx);
        let type_idx = interp.register_type(Arc::new(widget));
        let type_value = AloreType::make(&ctx.heap, type_idx);

        let caller = Arc::new(FunctionInfo {
            name: "makes_widget".to_string(),
            frame_size: 3,
            min_args: 1,
            max_args: 1,
            has_varargs: false,
            exception_table: Vec::new(),
            code: vec![
                Instruction { op: Opcode::ConstToLocal { dst: 1, value: Value::int(3) } },
                Instruction {
                    op: Opcode::CallLocal { dst: 2, callee: 0, args: vec![1] },
                },
                Instruction { op: Opcode::RetLocal { src: 2 } },
            ],
        });

        let result = interp.call_function(caller, &[type_value]).unwrap();
        assert!(AloreInstance::type_index(result).is_some());
        assert_eq!(AloreInstance::type_index(result), Some(type_idx));
    }

    #[test]
    fn constructing_a_type_with_no_constructor_returns_a_bare_nil_slotted_instance() {
        use crate::types::type_value::AloreType;

        let ctx = test_ctx();
        let mut thread = ThreadState::new_for_test();
        let mut interp = Interpreter::new(&ctx, &mut thread);

        let plain = TypeInfo::new("Plain").with_instance_slots(2);
        let type_idx = interp.register_type(Arc::new(plain));
        let type_value = AloreType::make(&ctx.heap, type_idx);

        let instance = interp.do_call(type_value, &[]).unwrap();
        assert_eq!(AloreInstance::type_index(instance), Some(type_idx));
        assert!(AloreInstance::get_field(instance, 0).unwrap().is_nil());
        assert!(AloreInstance::get_field(instance, 1).unwrap().is_nil());
    }
}
