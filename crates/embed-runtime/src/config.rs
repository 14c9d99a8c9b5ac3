// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! outputs = ["output_a"]
//!
//! [module]
//! name = "model"
//! search_paths = ["demos"]
//! entry_point = "model"
//! recoverable_errors = false
//!
//! [[buffers]]
//! name = "input_a"
//! dtype = "float_"
//! capacity = "4000"
//!
//! [[buffers]]
//! name = "output_a"
//! dtype = "float_"
//! max_shape = [1000]
//! ```

use crate::RuntimeError;
use array_core::TypeDispatchTable;
use buffer_store::{BufferDecl, Capacity, RegistryPolicy};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Configuration for a runtime handle.
///
/// Field order matters for TOML output: plain values before tables.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Names of the buffers the entry point writes.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// The module to load and its symbol names.
    #[serde(default)]
    pub module: ModuleConfig,
    /// Buffer declarations.
    #[serde(default)]
    pub buffers: Vec<BufferSpec>,
    /// Opt-in: declare unknown input names on first use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_touch: Option<FirstTouchConfig>,
}

/// The module to load and the names of its symbols.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Module name, e.g. `"model"`.
    pub name: String,
    /// Directories prepended to the runtime's module search path.
    pub search_paths: Vec<PathBuf>,
    /// Input-set constructor.
    pub input_type: String,
    /// Output-set constructor.
    pub output_type: String,
    /// Entry point called by `invoke`.
    pub entry_point: String,
    /// Callable used by `inspect`.
    pub inspect: String,
    /// Keep the session usable after a computation error.
    pub recoverable_errors: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            name: "model".to_string(),
            search_paths: Vec::new(),
            input_type: "InputDataSet".to_string(),
            output_type: "OutputDataSet".to_string(),
            entry_point: "model".to_string(),
            inspect: "show".to_string(),
            recoverable_errors: false,
        }
    }
}

/// Declaration of one buffer. Exactly one of `capacity` and `max_shape`
/// must be given.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BufferSpec {
    pub name: String,
    /// Element type tag (`"float_"`, `"int32_t"`, `"float64"`, ...).
    pub dtype: String,
    /// Capacity in bytes (`4000`, `"4K"`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Capacity>,
    /// Largest shape the buffer must hold. A negative extent `-n` fixes
    /// that axis at `n`; bound shapes must then match it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_shape: Option<Vec<i64>>,
    /// Free-form description shown by `embed-bridge check`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
}

impl BufferSpec {
    /// A buffer with an explicit capacity.
    pub fn with_capacity(name: impl Into<String>, dtype: impl Into<String>, capacity: Capacity) -> Self {
        Self {
            name: name.into(),
            dtype: dtype.into(),
            capacity: Some(capacity),
            max_shape: None,
            doc: String::new(),
        }
    }

    /// A buffer sized for `max_shape`.
    pub fn with_max_shape(name: impl Into<String>, dtype: impl Into<String>, max_shape: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            dtype: dtype.into(),
            capacity: None,
            max_shape: Some(max_shape),
            doc: String::new(),
        }
    }

    /// Resolves the declaration against the dispatch table.
    pub fn to_decl(&self, table: &TypeDispatchTable) -> Result<BufferDecl, RuntimeError> {
        let decl = match (&self.capacity, &self.max_shape) {
            (Some(capacity), None) => BufferDecl::new(&self.name, *capacity, &self.dtype),
            (None, Some(dims)) => BufferDecl::from_max_shape(&self.name, &self.dtype, dims, table)?,
            _ => {
                return Err(RuntimeError::Config(format!(
                    "buffer '{}': set exactly one of 'capacity' or 'max_shape'",
                    self.name
                )))
            }
        };
        Ok(decl.with_doc(&self.doc))
    }
}

/// Defaults for buffers declared on first use.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FirstTouchConfig {
    pub dtype: String,
    pub capacity: Capacity,
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str).map_err(|e| RuntimeError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    /// Resolves every buffer declaration and checks that each output is
    /// declared.
    pub fn buffer_decls(&self, table: &TypeDispatchTable) -> Result<Vec<BufferDecl>, RuntimeError> {
        let decls = self
            .buffers
            .iter()
            .map(|spec| spec.to_decl(table))
            .collect::<Result<Vec<_>, _>>()?;

        let declared: BTreeSet<&str> = decls.iter().map(|d| d.name.as_str()).collect();
        let mut seen = BTreeSet::new();
        for output in &self.outputs {
            if !declared.contains(output.as_str()) {
                return Err(RuntimeError::Config(format!("output '{output}' is not a declared buffer")));
            }
            if !seen.insert(output.as_str()) {
                return Err(RuntimeError::Config(format!("output '{output}' listed twice")));
            }
        }
        Ok(decls)
    }

    /// Returns the registry growth policy.
    pub fn registry_policy(&self) -> RegistryPolicy {
        match &self.first_touch {
            Some(ft) => RegistryPolicy::FirstTouch {
                capacity: ft.capacity,
                type_tag: ft.dtype.clone(),
            },
            None => RegistryPolicy::Static,
        }
    }
}

impl Default for RuntimeConfig {
    /// Two float inputs and one float output of 1000 elements each, bound
    /// to a module named `model`.
    fn default() -> Self {
        let float_buffer = |name: &str| BufferSpec::with_max_shape(name, "float_", vec![1000]);
        Self {
            outputs: vec!["output_a".to_string()],
            module: ModuleConfig::default(),
            buffers: vec![float_buffer("input_a"), float_buffer("input_b"), float_buffer("output_a")],
            first_touch: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = RuntimeConfig::default();
        assert_eq!(c.outputs, vec!["output_a"]);
        assert_eq!(c.module.name, "model");
        assert_eq!(c.module.entry_point, "model");
        assert_eq!(c.module.inspect, "show");
        assert_eq!(c.buffers.len(), 3);
        assert!(!c.module.recoverable_errors);
    }

    #[test]
    fn test_default_decls() {
        let table = TypeDispatchTable::with_builtins();
        let decls = RuntimeConfig::default().buffer_decls(&table).unwrap();
        assert!(decls.iter().all(|d| d.capacity.as_bytes() == 4000));
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
outputs = ["out"]

[module]
name = "scaler"
search_paths = ["demos", "/opt/models"]
entry_point = "run"
recoverable_errors = true

[[buffers]]
name = "x"
dtype = "double"
capacity = "1K"

[[buffers]]
name = "out"
dtype = "double"
max_shape = [4, 8]
"#;
        let c = RuntimeConfig::from_toml(toml).unwrap();
        assert_eq!(c.module.name, "scaler");
        assert_eq!(c.module.entry_point, "run");
        assert_eq!(c.module.input_type, "InputDataSet");
        assert_eq!(c.module.search_paths.len(), 2);
        assert!(c.module.recoverable_errors);

        let table = TypeDispatchTable::with_builtins();
        let decls = c.buffer_decls(&table).unwrap();
        assert_eq!(decls[0].capacity.as_bytes(), 1024);
        assert_eq!(decls[1].capacity.as_bytes(), 256);
    }

    #[test]
    fn test_signed_max_shape() {
        let toml = r#"
[[buffers]]
name = "frames"
dtype = "float_"
max_shape = [-3, 100]
doc = "three channels, up to 100 samples"
"#;
        let c = RuntimeConfig::from_toml(toml).unwrap();
        let table = TypeDispatchTable::with_builtins();
        let decl = c.buffers[0].to_decl(&table).unwrap();
        assert_eq!(decl.capacity.as_bytes(), 1200);
        assert_eq!(decl.template.unwrap().dims(), &[Some(3), None]);
        assert_eq!(decl.doc, "three channels, up to 100 samples");
    }

    #[test]
    fn test_integer_capacity() {
        let toml = r#"
[[buffers]]
name = "x"
dtype = "uint8"
capacity = 24
"#;
        let c = RuntimeConfig::from_toml(toml).unwrap();
        assert_eq!(c.buffers[0].capacity.unwrap().as_bytes(), 24);
        assert!(c.outputs.is_empty());
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let mut c = RuntimeConfig::default();
        c.first_touch = Some(FirstTouchConfig {
            dtype: "float_".into(),
            capacity: Capacity::parse("4K").unwrap(),
        });
        c.buffers.push(BufferSpec::with_capacity("extra", "int32_t", Capacity::parse("64").unwrap()));
        let toml = c.to_toml().unwrap();
        let back = RuntimeConfig::from_toml(&toml).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_undeclared_output() {
        let c = RuntimeConfig {
            outputs: vec!["missing".into()],
            ..Default::default()
        };
        let table = TypeDispatchTable::with_builtins();
        assert!(matches!(c.buffer_decls(&table), Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_capacity_and_max_shape_exclusive() {
        let table = TypeDispatchTable::with_builtins();
        let both = BufferSpec {
            name: "x".into(),
            dtype: "float_".into(),
            capacity: Some(Capacity::parse("4K").unwrap()),
            max_shape: Some(vec![4]),
            doc: String::new(),
        };
        assert!(both.to_decl(&table).is_err());
        let neither = BufferSpec {
            capacity: None,
            max_shape: None,
            ..both
        };
        assert!(neither.to_decl(&table).is_err());
    }

    #[test]
    fn test_unsupported_dtype_in_max_shape() {
        let table = TypeDispatchTable::with_builtins();
        let spec = BufferSpec::with_max_shape("x", "int128", vec![4]);
        assert!(matches!(spec.to_decl(&table), Err(RuntimeError::Buffer(_))));
    }

    #[test]
    fn test_registry_policy() {
        let mut c = RuntimeConfig::default();
        assert_eq!(c.registry_policy(), RegistryPolicy::Static);
        c.first_touch = Some(FirstTouchConfig {
            dtype: "double".into(),
            capacity: Capacity::parse("1K").unwrap(),
        });
        assert!(matches!(c.registry_policy(), RegistryPolicy::FirstTouch { .. }));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            RuntimeConfig::from_file(Path::new("/nonexistent/bridge.toml")),
            Err(RuntimeError::Config(_))
        ));
    }
}
