//! `TypeInfo`: per-type member tables and supertype chain
//!
//! `spec.md` §9: "TypeInfo holds behavior, replacing virtual dispatch with
//! explicit member-table lookup." Six tables per type cover
//! public/private × getter/setter/method (`spec.md` §4.3); the historical
//! implementation packed getter/method into one table with a high-bit flag
//! (`A_VAR_METHOD`) — `SPEC_FULL.md` §B.3 takes the redesign `spec.md` §9
//! offers and keeps the six tables fully separate.

use std::collections::HashMap;
use std::sync::Arc;

/// An interned member name, assigned at parse time from the symbol table
/// (owned by the compiler; the runtime only ever receives already-interned
/// ids, never strings, at the dispatch layer).
pub type MemberId = u32;

/// Reserved ids for the generic iterator protocol (`spec.md` §4.4: "generic
/// iterator via `iterator`/`hasNext`/`next`"). Every other `MemberId` is the
/// compiler's to assign per source symbol, but these three names have to
/// resolve to the same id across every compiled module for
/// `Interpreter::for_init`/`for_loop`'s fallback path to find them — the
/// same reasoning `spec.md` §3.6 gives for reserving fixed low global
/// indices for core entities (`Nil`, `True`, ...). The loader callback
/// (`spec.md` §4.6) is responsible for interning `"iterator"`, `"hasNext"`,
/// `"next"` to exactly these ids.
pub const MEMBER_ITERATOR: MemberId = 0;
pub const MEMBER_HAS_NEXT: MemberId = 1;
pub const MEMBER_NEXT: MemberId = 2;

/// How a resolved member item should be invoked (`spec.md` §4.3,
/// "Item decoding").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberItem {
    /// A direct instance-slot index: reading/writing the member is a plain
    /// load/store, no call involved.
    InstanceSlot(u32),
    /// A global function index to invoke, receiver prepended as `self` for
    /// methods and getters, receiver+value for setters.
    GlobalFunction(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Default, Clone)]
struct MemberTable {
    entries: HashMap<MemberId, MemberItem>,
}

impl MemberTable {
    fn get(&self, id: MemberId) -> Option<MemberItem> {
        self.entries.get(&id).copied()
    }

    fn insert(&mut self, id: MemberId, item: MemberItem) {
        self.entries.insert(id, item);
    }
}

/// The six member tables `spec.md` §4.3 describes, kept as distinct maps
/// rather than one table with a discriminating bit
/// (`SPEC_FULL.md` §B.3's chosen redesign).
#[derive(Debug, Default, Clone)]
struct MemberTables {
    public_getters: MemberTable,
    public_setters: MemberTable,
    public_methods: MemberTable,
    private_getters: MemberTable,
    private_setters: MemberTable,
    private_methods: MemberTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Getter,
    Setter,
    Method,
}

impl MemberTables {
    fn table(&self, role: Role, visibility: Visibility) -> &MemberTable {
        match (role, visibility) {
            (Role::Getter, Visibility::Public) => &self.public_getters,
            (Role::Setter, Visibility::Public) => &self.public_setters,
            (Role::Method, Visibility::Public) => &self.public_methods,
            (Role::Getter, Visibility::Private) => &self.private_getters,
            (Role::Setter, Visibility::Private) => &self.private_setters,
            (Role::Method, Visibility::Private) => &self.private_methods,
        }
    }

    fn table_mut(&mut self, role: Role, visibility: Visibility) -> &mut MemberTable {
        match (role, visibility) {
            (Role::Getter, Visibility::Public) => &mut self.public_getters,
            (Role::Setter, Visibility::Public) => &mut self.public_setters,
            (Role::Method, Visibility::Public) => &mut self.public_methods,
            (Role::Getter, Visibility::Private) => &mut self.private_getters,
            (Role::Setter, Visibility::Private) => &mut self.private_setters,
            (Role::Method, Visibility::Private) => &mut self.private_methods,
        }
    }
}

/// A class or interface as the dispatch machinery sees it. The compiler
/// builds these (out of scope here, `spec.md` §1); the runtime only reads
/// them during dispatch and during instance construction (to know slot
/// count and finalizer presence).
pub struct TypeInfo {
    pub name: String,
    pub supertype: Option<Arc<TypeInfo>>,
    /// Interfaces this type (or any supertype) declares it implements, for
    /// `spec.md` §4.3's "Interface type-inclusion checks."
    pub interfaces: Vec<Arc<TypeInfo>>,
    tables: MemberTables,
    /// Number of `Value`-sized instance slots a freshly constructed
    /// instance of this type needs.
    pub instance_slot_count: u32,
    /// Whether instances of this type are tracked for finalization
    /// (`spec.md` §4.2).
    pub has_finalizer: bool,
    /// `spec.md` §4.3: "Primitive values... are first wrapped into a
    /// single-slot instance of the matching internal wrapper type." Set for
    /// those synthetic wrapper types (`Int`, `Str`, `Float`, `Pair`,
    /// `Range`, `Constant`, `Function`, `Type`).
    pub is_primitive_wrapper: bool,
    /// Global function index of this type's constructor body, invoked with
    /// the freshly allocated instance prepended as `self`
    /// (`spec.md` §4.4, "Type-constructor calls... prepend the instance as
    /// receiver, then invoke the constructor"). `None` for a type with no
    /// declared constructor, e.g. an interface or a plain-data type relying
    /// on the implicit all-Nil-slots default.
    pub constructor: Option<u32>,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>) -> TypeInfo {
        TypeInfo {
            name: name.into(),
            supertype: None,
            interfaces: Vec::new(),
            tables: MemberTables::default(),
            instance_slot_count: 0,
            has_finalizer: false,
            is_primitive_wrapper: false,
            constructor: None,
        }
    }

    pub fn with_supertype(mut self, supertype: Arc<TypeInfo>) -> TypeInfo {
        self.supertype = Some(supertype);
        self
    }

    pub fn with_constructor(mut self, function_global_index: u32) -> TypeInfo {
        self.constructor = Some(function_global_index);
        self
    }

    pub fn with_instance_slots(mut self, count: u32) -> TypeInfo {
        self.instance_slot_count = count;
        self
    }

    pub fn define(&mut self, role: Role, visibility: Visibility, id: MemberId, item: MemberItem) {
        self.tables.table_mut(role, visibility).insert(id, item);
    }

    /// Look up `id` for `role`/`visibility` at exactly this type, not
    /// walking supertypes. Used by [`Self::resolve`]'s chain walk.
    pub fn local_lookup(&self, role: Role, visibility: Visibility, id: MemberId) -> Option<MemberItem> {
        self.tables.table(role, visibility).get(id)
    }

    /// `spec.md` §4.3 steps 1-4: walk this type's supertype chain looking
    /// for `id` under `role`/`visibility`; if the full chain misses and
    /// `role` is `Method`, also probe the getter table at each level (an
    /// accessible getter may yield a callable).
    pub fn resolve(&self, role: Role, visibility: Visibility, id: MemberId) -> Option<MemberItem> {
        let mut cur = Some(self);
        while let Some(t) = cur {
            if let Some(item) = t.local_lookup(role, visibility, id) {
                return Some(item);
            }
            cur = t.supertype.as_deref();
        }
        if role == Role::Method {
            let mut cur = Some(self);
            while let Some(t) = cur {
                if let Some(item) = t.local_lookup(Role::Getter, visibility, id) {
                    return Some(item);
                }
                cur = t.supertype.as_deref();
            }
        }
        None
    }

    /// `spec.md` §4.3: "Interface type-inclusion checks walk the interface
    /// list at each level of the supertype chain."
    pub fn implements(&self, iface_name: &str) -> bool {
        let mut cur = Some(self);
        while let Some(t) = cur {
            if t.interfaces.iter().any(|i| i.name == iface_name) {
                return true;
            }
            cur = t.supertype.as_deref();
        }
        false
    }

    pub fn is_subtype_of(&self, other_name: &str) -> bool {
        if self.name == other_name {
            return true;
        }
        let mut cur = self.supertype.as_deref();
        while let Some(t) = cur {
            if t.name == other_name {
                return true;
            }
            cur = t.supertype.as_deref();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_through_supertype_chain() {
        let mut base = TypeInfo::new("Animal");
        base.define(Role::Method, Visibility::Public, 1, MemberItem::GlobalFunction(10));
        let base = Arc::new(base);

        let mut derived = TypeInfo::new("Dog").with_supertype(base.clone());
        derived.define(Role::Method, Visibility::Public, 2, MemberItem::GlobalFunction(20));

        assert_eq!(
            derived.resolve(Role::Method, Visibility::Public, 2),
            Some(MemberItem::GlobalFunction(20))
        );
        assert_eq!(
            derived.resolve(Role::Method, Visibility::Public, 1),
            Some(MemberItem::GlobalFunction(10))
        );
        assert_eq!(derived.resolve(Role::Method, Visibility::Public, 99), None);
    }

    #[test]
    fn method_miss_falls_back_to_getter() {
        let mut t = TypeInfo::new("Thing");
        t.define(Role::Getter, Visibility::Public, 5, MemberItem::GlobalFunction(50));
        assert_eq!(
            t.resolve(Role::Method, Visibility::Public, 5),
            Some(MemberItem::GlobalFunction(50))
        );
    }

    #[test]
    fn is_subtype_of_walks_chain() {
        let base = Arc::new(TypeInfo::new("Animal"));
        let derived = TypeInfo::new("Dog").with_supertype(base);
        assert!(derived.is_subtype_of("Animal"));
        assert!(derived.is_subtype_of("Dog"));
        assert!(!derived.is_subtype_of("Cat"));
    }

    #[test]
    fn implements_walks_supertype_interfaces() {
        let comparable = Arc::new(TypeInfo::new("Comparable"));
        let mut base = TypeInfo::new("Animal");
        base.interfaces.push(comparable);
        let derived = TypeInfo::new("Dog").with_supertype(Arc::new(base));
        assert!(derived.implements("Comparable"));
        assert!(!derived.implements("Nonexistent"));
    }
}
