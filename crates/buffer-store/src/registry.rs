// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Name-keyed buffer registry.
//!
//! The registry is built once from a declaration table. Under the default
//! [`RegistryPolicy::Static`] policy the set of names is frozen after
//! construction: lookups of undeclared names fail with
//! [`BufferError::NameNotFound`]. [`RegistryPolicy::FirstTouch`] is an
//! explicit opt-in that creates a buffer with a default capacity and type
//! the first time an unknown name is requested through
//! [`BufferRegistry::get_or_declare`].

use crate::{Buffer, BufferError, BufferStats, Capacity, ShapeTemplate};
use array_core::TypeDispatchTable;
use std::collections::BTreeMap;

/// Declaration of one named buffer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BufferDecl {
    /// Unique buffer name.
    pub name: String,
    /// Element type tag, resolved through the dispatch table.
    pub type_tag: String,
    /// Fixed capacity in bytes.
    pub capacity: Capacity,
    /// Fixed axes every bound shape must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<ShapeTemplate>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
}

impl BufferDecl {
    /// Declares a buffer with an explicit byte capacity.
    pub fn new(name: impl Into<String>, capacity: Capacity, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            capacity,
            template: None,
            doc: String::new(),
        }
    }

    /// Declares a buffer from signed extents.
    ///
    /// Capacity is `product(|max_shape|) * element_size`. Negative extents
    /// are fixed axes: when any is present the declaration carries a
    /// [`ShapeTemplate`] and the buffer rejects shapes that do not match
    /// it. Without fixed axes only the capacity constrains the shape.
    pub fn from_max_shape(
        name: impl Into<String>,
        type_tag: &str,
        max_shape: &[i64],
        table: &TypeDispatchTable,
    ) -> Result<Self, BufferError> {
        let element = table.resolve(type_tag)?;
        let name = name.into();
        let elements = max_shape
            .iter()
            .try_fold(1usize, |acc, &d| {
                usize::try_from(d.unsigned_abs())
                    .ok()
                    .and_then(|d| acc.checked_mul(d))
            })
            .ok_or_else(|| {
                BufferError::InvalidCapacity(format!("buffer '{name}': max shape {max_shape:?} overflows"))
            })?;
        let capacity = Capacity::for_elements(elements, element.size_bytes()).map_err(|e| match e {
            BufferError::InvalidCapacity(detail) => {
                BufferError::InvalidCapacity(format!("buffer '{name}': {detail}"))
            }
            other => other,
        })?;
        let template = ShapeTemplate::from_signed(max_shape);
        let mut decl = Self::new(name, capacity, type_tag);
        decl.template = template.has_fixed().then_some(template);
        Ok(decl)
    }

    /// Attaches a description.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }
}

/// Whether the registry may grow after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryPolicy {
    /// Only declared names exist.
    #[default]
    Static,
    /// Unknown names are declared on first use with these defaults.
    FirstTouch { capacity: Capacity, type_tag: String },
}

/// Owner of every buffer in a session, keyed by name.
///
/// # Example
/// ```
/// use array_core::TypeDispatchTable;
/// use buffer_store::{BufferDecl, BufferError, BufferRegistry, Capacity};
///
/// let table = TypeDispatchTable::with_builtins();
/// let decls = [
///     BufferDecl::new("input_a", Capacity::parse("4000").unwrap(), "float_"),
///     BufferDecl::new("output_a", Capacity::parse("4000").unwrap(), "float_"),
/// ];
/// let mut reg = BufferRegistry::from_decls(&table, decls).unwrap();
/// reg.get_mut("input_a").unwrap().set([3, 2]).unwrap();
/// assert!(matches!(reg.get("no_such"), Err(BufferError::NameNotFound(_))));
/// ```
#[derive(Debug)]
pub struct BufferRegistry {
    buffers: BTreeMap<String, Buffer>,
    table: TypeDispatchTable,
    policy: RegistryPolicy,
}

impl BufferRegistry {
    /// Builds a static registry from a declaration table.
    pub fn from_decls(
        table: &TypeDispatchTable,
        decls: impl IntoIterator<Item = BufferDecl>,
    ) -> Result<Self, BufferError> {
        Self::with_policy(table, decls, RegistryPolicy::Static)
    }

    /// Builds a registry with an explicit growth policy.
    ///
    /// # Errors
    /// Fails on the first declaration with an unknown type tag, a zero
    /// capacity or a duplicate name; no registry is returned in that case.
    pub fn with_policy(
        table: &TypeDispatchTable,
        decls: impl IntoIterator<Item = BufferDecl>,
        policy: RegistryPolicy,
    ) -> Result<Self, BufferError> {
        if let RegistryPolicy::FirstTouch { type_tag, .. } = &policy {
            table.resolve(type_tag)?;
        }
        let mut registry = Self {
            buffers: BTreeMap::new(),
            table: table.clone(),
            policy,
        };
        for decl in decls {
            registry.declare(decl)?;
        }
        tracing::debug!(
            buffers = registry.len(),
            total_bytes = registry.total_capacity(),
            "buffer registry ready"
        );
        Ok(registry)
    }

    fn declare(&mut self, decl: BufferDecl) -> Result<&mut Buffer, BufferError> {
        if self.buffers.contains_key(&decl.name) {
            return Err(BufferError::DuplicateName(decl.name));
        }
        let mut buffer = Buffer::allocate(decl.capacity.as_bytes(), &decl.type_tag, &self.table)
            .map_err(|e| match e {
                BufferError::ZeroCapacity { .. } => BufferError::ZeroCapacity {
                    buffer: decl.name.clone(),
                },
                other => other,
            })?
            .with_name(decl.name.clone());
        if let Some(template) = decl.template {
            buffer = buffer.with_template(template);
        }
        Ok(self.buffers.entry(decl.name).or_insert(buffer))
    }

    /// Looks up a buffer.
    pub fn get(&self, name: &str) -> Result<&Buffer, BufferError> {
        self.buffers
            .get(name)
            .ok_or_else(|| BufferError::NameNotFound(name.to_string()))
    }

    /// Looks up a buffer for writing.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Buffer, BufferError> {
        self.buffers
            .get_mut(name)
            .ok_or_else(|| BufferError::NameNotFound(name.to_string()))
    }

    /// Looks up a buffer, declaring it first under
    /// [`RegistryPolicy::FirstTouch`]. Identical to
    /// [`get_mut`](BufferRegistry::get_mut) under the static policy.
    pub fn get_or_declare(&mut self, name: &str) -> Result<&mut Buffer, BufferError> {
        if !self.buffers.contains_key(name) {
            if let RegistryPolicy::FirstTouch { capacity, type_tag } = &self.policy {
                let decl = BufferDecl::new(name, *capacity, type_tag.clone());
                tracing::debug!(buffer = name, capacity = %capacity, "declaring buffer on first use");
                return self.declare(decl);
            }
        }
        self.get_mut(name)
    }

    /// Returns `true` if `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.buffers.contains_key(name)
    }

    /// Returns the declared names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Iterates over `(name, buffer)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Buffer)> {
        self.buffers.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of declared buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns `true` if no buffers are declared.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Returns the sum of all buffer capacities in bytes.
    pub fn total_capacity(&self) -> usize {
        self.buffers.values().map(Buffer::capacity).sum()
    }

    /// Returns the growth policy.
    pub fn policy(&self) -> &RegistryPolicy {
        &self.policy
    }

    /// Returns the dispatch table buffers were resolved against.
    pub fn table(&self) -> &TypeDispatchTable {
        &self.table
    }

    /// Returns a snapshot of every buffer's statistics.
    pub fn stats(&self) -> BTreeMap<String, BufferStats> {
        self.buffers
            .iter()
            .map(|(name, buffer)| (name.clone(), buffer.stats().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use array_core::Shape;

    fn cap(s: &str) -> Capacity {
        Capacity::parse(s).unwrap()
    }

    fn sample() -> BufferRegistry {
        let table = TypeDispatchTable::with_builtins();
        BufferRegistry::from_decls(
            &table,
            [
                BufferDecl::new("input_a", cap("4000"), "float_"),
                BufferDecl::new("input_b", cap("80"), "int64_t"),
                BufferDecl::new("output_a", cap("4000"), "float_"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_lookup() {
        let reg = sample();
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.get("input_b").unwrap().element().name(), "int64");
        assert_eq!(reg.get("output_a").unwrap().name(), Some("output_a"));
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["input_a", "input_b", "output_a"]);
        assert_eq!(reg.total_capacity(), 8080);
    }

    #[test]
    fn test_name_not_found() {
        let mut reg = sample();
        assert_eq!(
            reg.get("no_such").unwrap_err(),
            BufferError::NameNotFound("no_such".into())
        );
        assert!(reg.get_or_declare("no_such").is_err());
        assert!(!reg.contains("no_such"));
    }

    #[test]
    fn test_duplicate_rejected() {
        let table = TypeDispatchTable::with_builtins();
        let err = BufferRegistry::from_decls(
            &table,
            [
                BufferDecl::new("x", cap("8"), "uint8"),
                BufferDecl::new("x", cap("8"), "uint8"),
            ],
        )
        .unwrap_err();
        assert_eq!(err, BufferError::DuplicateName("x".into()));
    }

    #[test]
    fn test_unsupported_type_in_decls() {
        let table = TypeDispatchTable::with_builtins();
        let err =
            BufferRegistry::from_decls(&table, [BufferDecl::new("x", cap("100"), "int128")]).unwrap_err();
        assert_eq!(err, BufferError::UnsupportedType("int128".into()));
    }

    #[test]
    fn test_first_touch_policy() {
        let table = TypeDispatchTable::with_builtins();
        let policy = RegistryPolicy::FirstTouch {
            capacity: cap("1K"),
            type_tag: "double".into(),
        };
        let mut reg = BufferRegistry::with_policy(&table, std::iter::empty(), policy).unwrap();
        assert!(reg.is_empty());
        assert!(reg.get("late").is_err());

        let buf = reg.get_or_declare("late").unwrap();
        assert_eq!(buf.capacity(), 1024);
        assert_eq!(buf.max_elements(), 128);
        buf.set([4]).unwrap();

        // Second touch returns the same buffer.
        assert_eq!(reg.get_or_declare("late").unwrap().shape(), &Shape::vector(4));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_first_touch_bad_default_type() {
        let table = TypeDispatchTable::with_builtins();
        let policy = RegistryPolicy::FirstTouch {
            capacity: cap("1K"),
            type_tag: "int128".into(),
        };
        assert!(BufferRegistry::with_policy(&table, std::iter::empty(), policy).is_err());
    }

    #[test]
    fn test_from_max_shape() {
        let table = TypeDispatchTable::with_builtins();
        let decl = BufferDecl::from_max_shape("out", "float_", &[1000], &table).unwrap();
        assert_eq!(decl.capacity.as_bytes(), 4000);
        assert_eq!(decl.template, None);
        let decl = BufferDecl::from_max_shape("m", "double", &[3, 2], &table).unwrap();
        assert_eq!(decl.capacity.as_bytes(), 48);
        assert!(BufferDecl::from_max_shape("z", "float_", &[0], &table).is_err());
        assert!(BufferDecl::from_max_shape("t", "int128", &[1], &table).is_err());
        assert!(BufferDecl::from_max_shape("o", "uint8", &[i64::MIN, i64::MIN], &table).is_err());
    }

    #[test]
    fn test_fixed_axes_become_template() {
        let table = TypeDispatchTable::with_builtins();
        let decl = BufferDecl::from_max_shape("rgb", "uint8", &[-3, 64, 64], &table)
            .unwrap()
            .with_doc("channel-first image");
        assert_eq!(decl.capacity.as_bytes(), 3 * 64 * 64);
        assert_eq!(decl.template.as_ref().unwrap().to_string(), "[3, *, *]");

        let mut reg = BufferRegistry::from_decls(&table, [decl]).unwrap();
        let rgb = reg.get_mut("rgb").unwrap();
        assert_eq!(rgb.set([3, 8, 8]).unwrap().len(), 192);
        match rgb.set([4, 8, 8]).unwrap_err() {
            BufferError::ShapeMismatch { buffer, shape, template } => {
                assert_eq!(buffer, "rgb");
                assert_eq!(shape.dims(), &[4, 8, 8]);
                assert_eq!(template.to_string(), "[3, *, *]");
            }
            other => panic!("expected shape mismatch, got {other:?}"),
        }
        assert!(rgb.set([3, 64]).is_err());
        assert_eq!(rgb.shape().dims(), &[3, 8, 8]);
        assert_eq!(rgb.stats().template_rejections, 2);
        assert_eq!(rgb.stats().capacity_rejections, 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut reg = sample();
        reg.get_mut("input_a").unwrap().set([3, 2]).unwrap();
        let stats = reg.stats();
        assert_eq!(stats["input_a"].sets, 1);
        assert_eq!(stats["output_a"].sets, 0);
    }

    #[test]
    fn test_policy_serde() {
        let policy = RegistryPolicy::FirstTouch {
            capacity: cap("4K"),
            type_tag: "float_".into(),
        };
        let json = serde_json::to_string(&policy).unwrap();
        let back: RegistryPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(policy, back);
    }
}
