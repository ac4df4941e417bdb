#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing follows ES ToInt32/ToUint32")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts mirror ES integer conversion")]
#![expect(clippy::float_cmp, reason = "ES numeric semantics require exact f64 comparison")]
#![expect(clippy::struct_excessive_bools, reason = "frame sub-state is a set of done flags by design")]
#![expect(clippy::return_self_not_must_use, reason = "builder-style helpers are used inline")]

mod ast;
mod builtins;
mod error;
mod heap;
mod interp;
mod lex;
mod object;
mod parse;
mod scope;
mod value;

pub use crate::{
    ast::{Ast, LitValue, LocSpan, Node, NodeId, NodeKind, PropertyKind, Span},
    error::{CodeLoc, ErrorKind, Exception},
    heap::{HeapStats, ObjectId},
    interp::{GuestValue, HostDescriptor, Interpreter, InterpreterOptions, Resolver},
    lex::CommentHandler,
    object::Object,
    parse::{EcmaVersion, ParseOptions, parse_program},
};
