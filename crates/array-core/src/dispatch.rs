// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Type tag → element type dispatch.
//!
//! Host code names element types with symbolic tags. The table resolves a
//! tag to an [`ElementType`] (element size, typestr, view constructor).
//! New element types are added by registering an [`ElementKind`]; nothing
//! in buffer or runtime code switches on the tag.

use crate::{ArrayError, Element, ElementKind, ElementType};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry of element types keyed by type tag.
///
/// # Example
/// ```
/// use array_core::TypeDispatchTable;
///
/// let table = TypeDispatchTable::with_builtins();
/// assert_eq!(table.resolve("float_").unwrap().size_bytes(), 4);
/// assert_eq!(table.resolve("double").unwrap().name(), "float64");
/// assert!(table.resolve("int128").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeDispatchTable {
    entries: BTreeMap<String, ElementType>,
}

impl TypeDispatchTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with the built-in numeric types.
    ///
    /// Every type is reachable by its numpy name (`float32`), its C name
    /// (`float`, `int32_t`) and, for the two host tags used by existing
    /// drivers, `bool_` and `float_`. Note that `float_` is a 4-byte float.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table
            .register_scalar::<bool>(&["bool", "bool_"])
            .register_scalar::<i8>(&["int8", "int8_t"])
            .register_scalar::<i16>(&["int16", "int16_t"])
            .register_scalar::<i32>(&["int32", "int32_t"])
            .register_scalar::<i64>(&["int64", "int64_t"])
            .register_scalar::<u8>(&["uint8", "uint8_t"])
            .register_scalar::<u16>(&["uint16", "uint16_t"])
            .register_scalar::<u32>(&["uint32", "uint32_t"])
            .register_scalar::<u64>(&["uint64", "uint64_t"])
            .register_scalar::<f32>(&["float32", "float", "float_"])
            .register_scalar::<f64>(&["float64", "double"]);
        table
    }

    /// Registers an element kind under `tag`, replacing any previous entry.
    ///
    /// Kinds reporting a zero element size are rejected with
    /// [`ArrayError::InvalidElement`].
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        kind: Arc<dyn ElementKind>,
    ) -> Result<&mut Self, ArrayError> {
        if kind.size_bytes() == 0 {
            return Err(ArrayError::InvalidElement {
                name: kind.name().to_string(),
                detail: "element size must be at least one byte".into(),
            });
        }
        self.entries.insert(tag.into(), ElementType::new(kind));
        Ok(self)
    }

    /// Registers a built-in scalar under each of `tags`.
    pub fn register_scalar<T: Element>(&mut self, tags: &[&str]) -> &mut Self {
        let element = ElementType::of::<T>();
        for tag in tags {
            self.entries.insert((*tag).to_string(), element.clone());
        }
        self
    }

    /// Makes `alias` resolve to whatever `target` resolves to.
    pub fn register_alias(&mut self, alias: impl Into<String>, target: &str) -> Result<&mut Self, ArrayError> {
        let element = self.resolve(target)?;
        self.entries.insert(alias.into(), element);
        Ok(self)
    }

    /// Looks up a tag.
    pub fn lookup(&self, tag: &str) -> Option<&ElementType> {
        self.entries.get(tag)
    }

    /// Resolves a tag, failing with [`ArrayError::UnsupportedType`].
    pub fn resolve(&self, tag: &str) -> Result<ElementType, ArrayError> {
        self.lookup(tag)
            .cloned()
            .ok_or_else(|| ArrayError::UnsupportedType(tag.to_string()))
    }

    /// Returns `true` if the tag is registered.
    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    /// Returns all registered tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of registered tags (aliases included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no tags are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
