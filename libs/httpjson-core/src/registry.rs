//! Type-to-shape registration and the process-wide shape cache.

use std::any::TypeId;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::rc::Rc;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use crate::shape::{Shape, ShapeRef, any};
use crate::value::{Map, Number, Value};

/// Types that can describe the JSON they decode from.
///
/// Usually derived with `#[derive(JsonShape)]`, which reads the same
/// `#[serde(...)]` attributes the `Deserialize` derive does. Implement it by
/// hand for types with a custom `Deserialize`.
pub trait JsonShape: 'static {
    /// Builds the shape of `Self`.
    ///
    /// Called at most once per type and process through [`shape_of`]; nested
    /// shapes must be referenced as `shape_of::<Nested>` rather than built
    /// inline.
    fn describe() -> Shape;
}

static SHAPES: LazyLock<DashMap<TypeId, Arc<Shape>>> = LazyLock::new(DashMap::new);

/// Returns the cached shape of `T`, building it on first use.
///
/// Entries are never replaced or evicted. When two threads race on the same
/// type the first insert wins and both get that shape.
#[must_use]
pub fn shape_of<T: JsonShape>() -> Arc<Shape> {
    let id = TypeId::of::<T>();
    if let Some(shape) = SHAPES.get(&id).map(|entry| Arc::clone(entry.value())) {
        return shape;
    }
    // Built without holding a shard lock: describe() may look up other types.
    let shape = Arc::new(T::describe());
    Arc::clone(SHAPES.entry(id).or_insert(shape).value())
}

fn label_of<T: JsonShape>() -> String {
    shape_of::<T>().label().to_owned()
}

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl JsonShape for $ty {
                fn describe() -> Shape {
                    Shape::scalar(stringify!($ty))
                }
            }
        )*
    };
}

impl_scalar!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, (),
    String, Box<str>, Arc<str>, Number,
);

impl JsonShape for Cow<'static, str> {
    fn describe() -> Shape {
        Shape::scalar("Cow<str>")
    }
}

impl JsonShape for Value {
    fn describe() -> Shape {
        Shape::scalar("Value")
    }
}

impl JsonShape for Map<String, Value> {
    fn describe() -> Shape {
        Shape::map("Map<String, Value>", any)
    }
}

macro_rules! impl_wrapped {
    ($($wrapper:ident),* $(,)?) => {
        $(
            impl<T: JsonShape> JsonShape for $wrapper<T> {
                fn describe() -> Shape {
                    Shape::wrapped(
                        format!(concat!(stringify!($wrapper), "<{}>"), label_of::<T>()),
                        shape_of::<T>,
                    )
                }
            }
        )*
    };
}

impl_wrapped!(Option, Box, Arc, Rc);

macro_rules! impl_sequence {
    ($($seq:ident),* $(,)?) => {
        $(
            impl<T: JsonShape> JsonShape for $seq<T> {
                fn describe() -> Shape {
                    Shape::sequence(
                        format!(concat!(stringify!($seq), "<{}>"), label_of::<T>()),
                        shape_of::<T>,
                    )
                }
            }
        )*
    };
}

impl_sequence!(Vec, VecDeque, LinkedList, BTreeSet);

impl<T: JsonShape, S: 'static> JsonShape for HashSet<T, S> {
    fn describe() -> Shape {
        Shape::sequence(format!("HashSet<{}>", label_of::<T>()), shape_of::<T>)
    }
}

impl<T: JsonShape> JsonShape for Box<[T]> {
    fn describe() -> Shape {
        Shape::sequence(format!("Box<[{}]>", label_of::<T>()), shape_of::<T>)
    }
}

impl<T: JsonShape, const N: usize> JsonShape for [T; N] {
    fn describe() -> Shape {
        Shape::sequence(format!("[{}; {N}]", label_of::<T>()), shape_of::<T>)
    }
}

macro_rules! impl_tuple {
    ($($name:ident)+) => {
        impl<$($name: JsonShape),+> JsonShape for ($($name,)+) {
            fn describe() -> Shape {
                let labels = [$(label_of::<$name>()),+];
                let elements = vec![$(shape_of::<$name> as ShapeRef),+];
                Shape::tuple(format!("({})", labels.join(", ")), elements)
            }
        }
    };
}

impl_tuple!(A);
impl_tuple!(A B);
impl_tuple!(A B C);
impl_tuple!(A B C D);
impl_tuple!(A B C D E);
impl_tuple!(A B C D E F);
impl_tuple!(A B C D E F G);
impl_tuple!(A B C D E F G H);
impl_tuple!(A B C D E F G H I);
impl_tuple!(A B C D E F G H I J);
impl_tuple!(A B C D E F G H I J K);
impl_tuple!(A B C D E F G H I J K L);

impl<K: JsonShape, V: JsonShape> JsonShape for BTreeMap<K, V> {
    fn describe() -> Shape {
        Shape::map(
            format!("BTreeMap<{}, {}>", label_of::<K>(), label_of::<V>()),
            shape_of::<V>,
        )
    }
}

impl<K: JsonShape, V: JsonShape, S: 'static> JsonShape for HashMap<K, V, S> {
    fn describe() -> Shape {
        Shape::map(
            format!("HashMap<{}, {}>", label_of::<K>(), label_of::<V>()),
            shape_of::<V>,
        )
    }
}
