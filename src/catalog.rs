//! Capability catalog.
//!
//! Built once at startup and shared read-only (typically behind an `Arc`) by
//! every planning request.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::coerce::{ArgType, CallArgs};
use crate::datum::Datum;
use crate::error::{CapabilityError, PlannerError};

/// A declared parameter of a capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    /// Required parameters have no default.
    pub required: bool,
}

impl Param {
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: true,
        }
    }

    pub fn optional(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
        }
    }
}

/// An external operation the oracle may request.
pub trait Capability: Send + Sync {
    /// Declared parameters, in signature order.
    fn params(&self) -> &[Param];

    fn call(&self, args: &CallArgs) -> Result<Datum, CapabilityError>;
}

/// Adapter turning a closure into a [`Capability`].
pub struct FnCapability<F> {
    params: Vec<Param>,
    f: F,
}

impl<F> FnCapability<F>
where
    F: Fn(&CallArgs) -> Result<Datum, CapabilityError> + Send + Sync,
{
    pub fn new(params: Vec<Param>, f: F) -> Self {
        Self { params, f }
    }
}

impl<F> Capability for FnCapability<F>
where
    F: Fn(&CallArgs) -> Result<Datum, CapabilityError> + Send + Sync,
{
    fn params(&self) -> &[Param] {
        &self.params
    }

    fn call(&self, args: &CallArgs) -> Result<Datum, CapabilityError> {
        (self.f)(args)
    }
}

#[derive(Clone)]
pub struct CapabilitySpec {
    pub name: String,
    pub callable: Arc<dyn Capability>,
    pub arg_types: BTreeMap<String, ArgType>,
    pub description: String,
}

impl CapabilitySpec {
    /// `(k, radius_km, profile=?)` style signature.
    pub fn signature(&self) -> String {
        let params = self
            .callable
            .params()
            .iter()
            .map(|param| {
                if param.required {
                    param.name.clone()
                } else {
                    format!("{}=?", param.name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("({})", params)
    }
}

impl fmt::Debug for CapabilitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitySpec")
            .field("name", &self.name)
            .field("params", &self.callable.params())
            .field("arg_types", &self.arg_types)
            .field("description", &self.description)
            .finish()
    }
}

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    specs: HashMap<String, CapabilitySpec>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        callable: Arc<dyn Capability>,
        arg_types: &[(&str, ArgType)],
        description: &str,
    ) -> Result<(), PlannerError> {
        if self.specs.contains_key(name) {
            return Err(PlannerError::DuplicateCapability {
                name: name.to_string(),
            });
        }

        let spec = CapabilitySpec {
            name: name.to_string(),
            callable,
            arg_types: arg_types
                .iter()
                .map(|(arg, tag)| (arg.to_string(), *tag))
                .collect(),
            description: description.trim().to_string(),
        };
        self.specs.insert(name.to_string(), spec);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&CapabilitySpec, PlannerError> {
        self.specs
            .get(name)
            .ok_or_else(|| PlannerError::UnknownCapability {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn list(&self) -> Vec<&str> {
        self.specs.keys().map(String::as_str).collect()
    }

    /// Text block describing every capability, sorted by name.
    pub fn render_catalog(&self) -> String {
        let mut names = self.list();
        names.sort_unstable();

        let mut lines = Vec::new();
        for name in names {
            let spec = &self.specs[name];
            lines.push(format!("• {}{}", name, spec.signature()));
            if !spec.description.is_empty() {
                lines.push(format!("  → {}", spec.description));
            }
            if !spec.arg_types.is_empty() {
                let types = spec
                    .arg_types
                    .iter()
                    .map(|(arg, tag)| format!("{}:{}", arg, tag))
                    .collect::<Vec<_>>()
                    .join(", ");
                lines.push(format!("  Types: {}", types));
            }
        }
        lines.join("\n")
    }
}
