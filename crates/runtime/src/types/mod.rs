//! Types and member dispatch
//!
//! `spec.md` §4.3: every type carries six hashed member tables
//! (public/private × getter/setter/method); a member access walks the
//! receiver's concrete type and then its supertype chain, consulting the
//! table for the requested role at each level.

pub mod dispatch;
pub mod instance;
pub mod type_value;
pub mod typeinfo;

pub use dispatch::{dispatch_get, dispatch_method, dispatch_set, MemberRole};
pub use typeinfo::{MemberId, MemberItem, TypeInfo};
