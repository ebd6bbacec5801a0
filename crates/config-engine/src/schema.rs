//! Author-written field tables for configuration records.
//!
//! A module describes its record once with [`RecordSchema`]: one entry per
//! field, carrying the declared name, an annotation string and a typed
//! getter/setter pair. The compiler captures those pairs into the compiled
//! [`Field`](crate::Field) descriptors so loading, saving and form parsing
//! never need to inspect the record type at runtime.
//!
//! ```
//! use config_engine::{ConfigRecord, RecordSchema};
//!
//! #[derive(Default)]
//! struct SyncConfig {
//!     token: String,
//!     interval_hours: i32,
//! }
//!
//! impl ConfigRecord for SyncConfig {
//!     fn schema() -> RecordSchema<Self> {
//!         RecordSchema::<Self>::new()
//!             .text("Token", "secret", |c| c.token.clone(), |c, v| c.token = v)
//!             .integer(
//!                 "SyncIntervalHours",
//!                 "default=24,min=1",
//!                 |c| c.interval_hours,
//!                 |c, v| c.interval_hours = v,
//!             )
//!     }
//! }
//! ```

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::value::{Value, ValueKind};

/// A configuration record owned by one module.
pub trait ConfigRecord: Any + Default + Send + Sync {
    /// The record's field table.
    fn schema() -> RecordSchema<Self>;

    /// Reject a value set before it is persisted.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// One item of a repeated sub-group inside a [`ConfigRecord`].
pub trait ConfigItem: Any + Default + Send + Sync {
    fn schema() -> ItemSchema<Self>;
}

type Getter = Arc<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;
type Setter = Arc<dyn Fn(&mut dyn Any, Value) -> bool + Send + Sync>;

/// Type-erased getter/setter pair for one leaf.
#[derive(Clone)]
pub(crate) struct Accessor {
    get: Getter,
    set: Setter,
}

impl Accessor {
    fn text<T: Any>(get: fn(&T) -> String, set: fn(&mut T, String)) -> Self {
        Self {
            get: Arc::new(move |rec: &dyn Any| rec.downcast_ref::<T>().map(|r| Value::Text(get(r)))),
            set: Arc::new(move |rec: &mut dyn Any, value: Value| match (rec.downcast_mut::<T>(), value) {
                (Some(r), Value::Text(s)) => {
                    set(r, s);
                    true
                }
                _ => false,
            }),
        }
    }

    fn integer<T, N>(get: fn(&T) -> N, set: fn(&mut T, N)) -> Self
    where
        T: Any,
        N: Into<i64> + TryFrom<i64> + 'static,
    {
        Self {
            get: Arc::new(move |rec: &dyn Any| {
                rec.downcast_ref::<T>()
                    .map(|r| Value::Integer(get(r).into()))
            }),
            set: Arc::new(move |rec: &mut dyn Any, value: Value| match (rec.downcast_mut::<T>(), value) {
                (Some(r), Value::Integer(i)) => match N::try_from(i) {
                    Ok(n) => {
                        set(r, n);
                        true
                    }
                    Err(_) => false,
                },
                _ => false,
            }),
        }
    }

    fn boolean<T: Any>(get: fn(&T) -> bool, set: fn(&mut T, bool)) -> Self {
        Self {
            get: Arc::new(move |rec: &dyn Any| rec.downcast_ref::<T>().map(|r| Value::Bool(get(r)))),
            set: Arc::new(move |rec: &mut dyn Any, value: Value| match (rec.downcast_mut::<T>(), value) {
                (Some(r), Value::Bool(b)) => {
                    set(r, b);
                    true
                }
                _ => false,
            }),
        }
    }

    pub(crate) fn get(&self, record: &dyn Any) -> Option<Value> {
        (self.get)(record)
    }

    pub(crate) fn set(&self, record: &mut dyn Any, value: Value) -> bool {
        (self.set)(record, value)
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Accessor")
    }
}

/// Type-erased access to the `Vec` behind an array field.
pub(crate) trait ListAccess: Send + Sync {
    fn len(&self, record: &dyn Any) -> usize;
    fn item<'a>(&self, record: &'a dyn Any, index: usize) -> Option<&'a dyn Any>;
    fn item_mut<'a>(&self, record: &'a mut dyn Any, index: usize) -> Option<&'a mut dyn Any>;
    fn push_default<'a>(&self, record: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
    fn retain(&self, record: &mut dyn Any, keep: &mut dyn FnMut(&dyn Any) -> bool);
    fn clear(&self, record: &mut dyn Any);
}

struct TypedList<T, I> {
    get: fn(&T) -> &Vec<I>,
    get_mut: fn(&mut T) -> &mut Vec<I>,
}

impl<T: Any, I: ConfigItem> ListAccess for TypedList<T, I> {
    fn len(&self, record: &dyn Any) -> usize {
        record.downcast_ref::<T>().map_or(0, |r| (self.get)(r).len())
    }

    fn item<'a>(&self, record: &'a dyn Any, index: usize) -> Option<&'a dyn Any> {
        let items = (self.get)(record.downcast_ref::<T>()?);
        items.get(index).map(|item| item as &dyn Any)
    }

    fn item_mut<'a>(&self, record: &'a mut dyn Any, index: usize) -> Option<&'a mut dyn Any> {
        let items = (self.get_mut)(record.downcast_mut::<T>()?);
        items.get_mut(index).map(|item| item as &mut dyn Any)
    }

    fn push_default<'a>(&self, record: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let items = (self.get_mut)(record.downcast_mut::<T>()?);
        items.push(I::default());
        items.last_mut().map(|item| item as &mut dyn Any)
    }

    fn retain(&self, record: &mut dyn Any, keep: &mut dyn FnMut(&dyn Any) -> bool) {
        if let Some(r) = record.downcast_mut::<T>() {
            (self.get_mut)(r).retain(|item| keep(item as &dyn Any));
        }
    }

    fn clear(&self, record: &mut dyn Any) {
        if let Some(r) = record.downcast_mut::<T>() {
            (self.get_mut)(r).clear();
        }
    }
}

/// A declared leaf: name, native kind, annotation and accessor.
#[derive(Debug, Clone)]
pub(crate) struct LeafDecl {
    pub(crate) name: &'static str,
    pub(crate) kind: ValueKind,
    pub(crate) tag: &'static str,
    pub(crate) access: Accessor,
}

/// A declared repeated sub-group.
#[derive(Clone)]
pub(crate) struct ArrayDecl {
    pub(crate) name: &'static str,
    pub(crate) tag: &'static str,
    pub(crate) items: Vec<LeafDecl>,
    pub(crate) list: Arc<dyn ListAccess>,
}

#[derive(Clone)]
pub(crate) enum Decl {
    Leaf(LeafDecl),
    Array(ArrayDecl),
}

/// Field table of a [`ConfigRecord`], in declaration order.
pub struct RecordSchema<T> {
    decls: Vec<Decl>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Any> RecordSchema<T> {
    pub fn new() -> Self {
        Self {
            decls: Vec::new(),
            _record: PhantomData,
        }
    }

    pub fn text(
        mut self,
        name: &'static str,
        tag: &'static str,
        get: fn(&T) -> String,
        set: fn(&mut T, String),
    ) -> Self {
        self.decls.push(Decl::Leaf(LeafDecl {
            name,
            kind: ValueKind::Text,
            tag,
            access: Accessor::text(get, set),
        }));
        self
    }

    pub fn integer<N>(
        mut self,
        name: &'static str,
        tag: &'static str,
        get: fn(&T) -> N,
        set: fn(&mut T, N),
    ) -> Self
    where
        N: Into<i64> + TryFrom<i64> + 'static,
    {
        self.decls.push(Decl::Leaf(LeafDecl {
            name,
            kind: ValueKind::Integer,
            tag,
            access: Accessor::integer(get, set),
        }));
        self
    }

    pub fn boolean(
        mut self,
        name: &'static str,
        tag: &'static str,
        get: fn(&T) -> bool,
        set: fn(&mut T, bool),
    ) -> Self {
        self.decls.push(Decl::Leaf(LeafDecl {
            name,
            kind: ValueKind::Boolean,
            tag,
            access: Accessor::boolean(get, set),
        }));
        self
    }

    /// Declare a repeated sub-group backed by a `Vec` of [`ConfigItem`]s.
    pub fn array<I: ConfigItem>(
        mut self,
        name: &'static str,
        tag: &'static str,
        get: fn(&T) -> &Vec<I>,
        get_mut: fn(&mut T) -> &mut Vec<I>,
    ) -> Self {
        self.decls.push(Decl::Array(ArrayDecl {
            name,
            tag,
            items: I::schema().leaves,
            list: Arc::new(TypedList { get, get_mut }),
        }));
        self
    }

    pub(crate) fn into_decls(self) -> Vec<Decl> {
        self.decls
    }
}

impl<T: Any> Default for RecordSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Field table of a [`ConfigItem`]. Items hold leaves only; nested arrays
/// are not representable.
pub struct ItemSchema<I> {
    leaves: Vec<LeafDecl>,
    _item: PhantomData<fn() -> I>,
}

impl<I: Any> ItemSchema<I> {
    pub fn new() -> Self {
        Self {
            leaves: Vec::new(),
            _item: PhantomData,
        }
    }

    pub fn text(
        mut self,
        name: &'static str,
        tag: &'static str,
        get: fn(&I) -> String,
        set: fn(&mut I, String),
    ) -> Self {
        self.leaves.push(LeafDecl {
            name,
            kind: ValueKind::Text,
            tag,
            access: Accessor::text(get, set),
        });
        self
    }

    pub fn integer<N>(
        mut self,
        name: &'static str,
        tag: &'static str,
        get: fn(&I) -> N,
        set: fn(&mut I, N),
    ) -> Self
    where
        N: Into<i64> + TryFrom<i64> + 'static,
    {
        self.leaves.push(LeafDecl {
            name,
            kind: ValueKind::Integer,
            tag,
            access: Accessor::integer(get, set),
        });
        self
    }

    pub fn boolean(
        mut self,
        name: &'static str,
        tag: &'static str,
        get: fn(&I) -> bool,
        set: fn(&mut I, bool),
    ) -> Self {
        self.leaves.push(LeafDecl {
            name,
            kind: ValueKind::Boolean,
            tag,
            access: Accessor::boolean(get, set),
        });
        self
    }
}

impl<I: Any> Default for ItemSchema<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Erased identity of a record type: factory, validation hook and schema.
#[derive(Clone, Copy)]
pub struct RecordType {
    type_id: fn() -> TypeId,
    type_name: &'static str,
    new_record: fn() -> Box<dyn Any + Send + Sync>,
    validate: fn(&dyn Any) -> Result<(), String>,
    describe: fn() -> Vec<Decl>,
}

impl RecordType {
    pub fn of<T: ConfigRecord>() -> Self {
        Self {
            type_id: TypeId::of::<T>,
            type_name: type_name::<T>(),
            new_record: new_boxed::<T>,
            validate: validate_erased::<T>,
            describe: describe_erased::<T>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    pub(crate) fn new_record(&self) -> Box<dyn Any + Send + Sync> {
        (self.new_record)()
    }

    pub(crate) fn validate(&self, record: &dyn Any) -> Result<(), String> {
        (self.validate)(record)
    }

    pub(crate) fn describe(&self) -> Vec<Decl> {
        (self.describe)()
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordType").field(&self.type_name).finish()
    }
}

fn new_boxed<T: ConfigRecord>() -> Box<dyn Any + Send + Sync> {
    Box::new(T::default())
}

fn validate_erased<T: ConfigRecord>(record: &dyn Any) -> Result<(), String> {
    record.downcast_ref::<T>().map_or(Ok(()), T::validate)
}

fn describe_erased<T: ConfigRecord>() -> Vec<Decl> {
    T::schema().into_decls()
}
