// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element kinds: what a type tag resolves to.
//!
//! An [`ElementKind`] knows the byte size of one element, how the embedded
//! runtime spells it (a numpy array-interface typestr such as `"<f4"`), and
//! how to render a single element for debugging. [`ElementType`] is the
//! cheap, cloneable handle stored in buffers and views; it also carries the
//! view constructor.

use crate::{ArrayView, Epoch, Shape};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;

/// Per-type behaviour registered in the [`crate::TypeDispatchTable`].
///
/// Implement this to add a new element type without touching buffer logic.
pub trait ElementKind: Send + Sync + fmt::Debug {
    /// Canonical name, e.g. `"float32"`.
    fn name(&self) -> &str;

    /// Size of a single element in bytes.
    fn size_bytes(&self) -> usize;

    /// numpy array-interface typestr, e.g. `"<f4"` or `"|b1"`.
    fn typestr(&self) -> &str;

    /// Renders one element from exactly `size_bytes()` bytes.
    fn render(&self, bytes: &[u8]) -> String;
}

/// A Rust scalar type that can be read from and written to element bytes.
pub trait Element: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Canonical element name, matching [`ElementKind::name`].
    const NAME: &'static str;
    /// numpy array-interface typestr.
    const TYPESTR: &'static str;

    /// Decodes one element from native-endian bytes.
    fn read(bytes: &[u8]) -> Self;

    /// Encodes this element into native-endian bytes.
    fn write(self, out: &mut [u8]);
}

/// Marker for elements where every bit pattern is a valid value.
///
/// Only these types may be viewed in place as typed slices.
///
/// # Safety
/// Implementors must be plain data: no padding, no invalid bit patterns,
/// alignment no greater than 64 bytes.
pub unsafe trait PlainElement: Element {}

macro_rules! numeric_element {
    ($($ty:ty => $name:literal, $typestr:literal;)*) => {
        $(
            impl Element for $ty {
                const NAME: &'static str = $name;
                const TYPESTR: &'static str = $typestr;

                fn read(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                    <$ty>::from_ne_bytes(raw)
                }

                fn write(self, out: &mut [u8]) {
                    out[..std::mem::size_of::<$ty>()].copy_from_slice(&self.to_ne_bytes());
                }
            }

            // SAFETY: primitive integers and floats accept every bit pattern.
            unsafe impl PlainElement for $ty {}
        )*
    };
}

#[cfg(target_endian = "little")]
numeric_element! {
    i8 => "int8", "|i1";
    i16 => "int16", "<i2";
    i32 => "int32", "<i4";
    i64 => "int64", "<i8";
    u8 => "uint8", "|u1";
    u16 => "uint16", "<u2";
    u32 => "uint32", "<u4";
    u64 => "uint64", "<u8";
    f32 => "float32", "<f4";
    f64 => "float64", "<f8";
}

#[cfg(target_endian = "big")]
numeric_element! {
    i8 => "int8", "|i1";
    i16 => "int16", ">i2";
    i32 => "int32", ">i4";
    i64 => "int64", ">i8";
    u8 => "uint8", "|u1";
    u16 => "uint16", ">u2";
    u32 => "uint32", ">u4";
    u64 => "uint64", ">u8";
    f32 => "float32", ">f4";
    f64 => "float64", ">f8";
}

impl Element for bool {
    const NAME: &'static str = "bool";
    const TYPESTR: &'static str = "|b1";

    fn read(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn write(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }
}

/// The [`ElementKind`] for a built-in Rust scalar.
///
/// Zero-sized element types are rejected at compile time:
///
/// ```compile_fail
/// use array_core::{Element, Scalar};
///
/// #[derive(Clone, Copy, PartialEq, Debug)]
/// struct Nothing;
///
/// impl Element for Nothing {
///     const NAME: &'static str = "nothing";
///     const TYPESTR: &'static str = "|V0";
///     fn read(_: &[u8]) -> Self { Nothing }
///     fn write(self, _: &mut [u8]) {}
/// }
///
/// let _ = Scalar::<Nothing>::new();
/// ```
pub struct Scalar<T: Element>(PhantomData<fn() -> T>);

impl<T: Element> Scalar<T> {
    const NON_ZERO_SIZE: () = assert!(
        std::mem::size_of::<T>() > 0,
        "element types must be at least one byte"
    );

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NON_ZERO_SIZE;
        Self(PhantomData)
    }
}

impl<T: Element> Default for Scalar<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> fmt::Debug for Scalar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar<{}>", T::NAME)
    }
}

impl<T: Element> ElementKind for Scalar<T> {
    fn name(&self) -> &str {
        T::NAME
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn typestr(&self) -> &str {
        T::TYPESTR
    }

    fn render(&self, bytes: &[u8]) -> String {
        format!("{:?}", T::read(bytes))
    }
}

/// A resolved element type: the value a dispatch-table lookup returns.
///
/// Cloning is a reference-count bump. Two element types are equal when
/// their canonical names match.
#[derive(Clone)]
pub struct ElementType {
    kind: Arc<dyn ElementKind>,
}

impl ElementType {
    /// Wraps an element kind. Custom kinds enter through
    /// [`TypeDispatchTable::register`](crate::TypeDispatchTable::register),
    /// which rejects zero-sized ones.
    pub(crate) fn new(kind: Arc<dyn ElementKind>) -> Self {
        Self { kind }
    }

    /// Element type for a built-in scalar.
    pub fn of<T: Element>() -> Self {
        Self::new(Arc::new(Scalar::<T>::new()))
    }

    /// Canonical name, e.g. `"float32"`.
    pub fn name(&self) -> &str {
        self.kind.name()
    }

    /// Size of a single element in bytes.
    pub fn size_bytes(&self) -> usize {
        self.kind.size_bytes()
    }

    /// numpy array-interface typestr.
    pub fn typestr(&self) -> &str {
        self.kind.typestr()
    }

    /// Renders one element.
    pub fn render(&self, bytes: &[u8]) -> String {
        self.kind.render(bytes)
    }

    /// Returns `true` if `T` is the Rust type for this element kind.
    pub fn is<T: Element>(&self) -> bool {
        self.name() == T::NAME
    }

    /// Builds a row-major view over `data` with this element type.
    ///
    /// The view records the epoch's current generation and refuses data
    /// access once the epoch moves on.
    ///
    /// # Safety
    /// `data` must stay valid for reads and writes of
    /// `shape.size_bytes(self.size_bytes())` bytes for as long as `epoch`
    /// reports the generation captured here, and the owner must
    /// [`retire`](Epoch::retire) the epoch before releasing the memory.
    pub unsafe fn make_view(&self, data: NonNull<u8>, shape: Shape, epoch: &Epoch) -> ArrayView {
        let strides = shape.byte_strides(self.size_bytes());
        ArrayView::from_raw_parts(data, shape, strides, self.clone(), epoch)
    }
}

impl PartialEq for ElementType {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for ElementType {}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementType")
            .field("name", &self.name())
            .field("size_bytes", &self.size_bytes())
            .field("typestr", &self.typestr())
            .finish()
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(ElementType::of::<f32>().size_bytes(), 4);
        assert_eq!(ElementType::of::<f64>().size_bytes(), 8);
        assert_eq!(ElementType::of::<bool>().size_bytes(), 1);
        assert_eq!(ElementType::of::<i16>().size_bytes(), 2);
    }

    #[test]
    fn test_read_write_roundtrip() {
        let mut buf = [0u8; 8];
        3.5f64.write(&mut buf);
        assert_eq!(f64::read(&buf), 3.5);

        let mut b = [7u8; 1];
        false.write(&mut b);
        assert!(!bool::read(&b));
        assert!(bool::read(&[2]));
    }

    #[test]
    fn test_render() {
        let t = ElementType::of::<i32>();
        assert_eq!(t.render(&(-12i32).to_ne_bytes()), "-12");
    }

    #[test]
    fn test_equality_by_name() {
        assert_eq!(ElementType::of::<f32>(), ElementType::of::<f32>());
        assert_ne!(ElementType::of::<f32>(), ElementType::of::<f64>());
        assert!(ElementType::of::<u8>().is::<u8>());
        assert!(!ElementType::of::<u8>().is::<i8>());
    }

    #[test]
    fn test_typestr() {
        assert_eq!(ElementType::of::<bool>().typestr(), "|b1");
        assert!(ElementType::of::<f32>().typestr().ends_with("f4"));
    }
}
