//! Operator registry: plan kind -> constructor.
//!
//! Built explicitly; nothing registers itself at load time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use strata_core::prelude::{Error, Result};

use crate::descriptor::OperatorDescriptor;
use crate::traits::{OpError, Operator};
use crate::{CreateIndex, GetTable, IndexJoin, IndexScan};

pub type OperatorCtor =
    Arc<dyn Fn(&OperatorDescriptor) -> Result<Arc<dyn Operator>, OpError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct OperatorRegistry {
    ctors: HashMap<String, OperatorCtor>,
}

#[derive(Default)]
pub struct RegistryBuilder {
    ctors: HashMap<String, OperatorCtor>,
    duplicates: Vec<String>,
}

impl RegistryBuilder {
    pub fn register<F, O>(mut self, kind: impl Into<String>, ctor: F) -> Self
    where
        F: Fn(&OperatorDescriptor) -> Result<O, OpError> + Send + Sync + 'static,
        O: Operator,
    {
        let kind = kind.into();
        let ctor: OperatorCtor = Arc::new(
            move |d: &OperatorDescriptor| -> Result<Arc<dyn Operator>, OpError> {
                let op: Arc<dyn Operator> = Arc::new(ctor(d)?);
                Ok(op)
            },
        );
        if self.ctors.insert(kind.clone(), ctor).is_some() {
            self.duplicates.push(kind);
        }
        self
    }

    /// Fails if any kind was registered twice.
    pub fn build(self) -> Result<OperatorRegistry> {
        if !self.duplicates.is_empty() {
            return Err(Error::Config(format!(
                "operator kinds registered more than once: {}",
                self.duplicates.join(", ")
            )));
        }
        Ok(OperatorRegistry { ctors: self.ctors })
    }
}

impl OperatorRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Builder preloaded with the built-in operators.
    pub fn default_builder() -> RegistryBuilder {
        Self::builder()
            .register(GetTable::KIND, GetTable::from_descriptor)
            .register(CreateIndex::KIND, CreateIndex::from_descriptor)
            .register(IndexScan::KIND, IndexScan::from_descriptor)
            .register(IndexJoin::KIND, IndexJoin::from_descriptor)
    }

    pub fn with_defaults() -> Self {
        Self {
            ctors: Self::default_builder().ctors,
        }
    }

    /// Instantiate the operator a descriptor names.
    pub fn make(&self, descriptor: &OperatorDescriptor) -> Result<Arc<dyn Operator>> {
        let ctor = self.ctors.get(&descriptor.kind).ok_or_else(|| {
            Error::plan(format!("unknown operator kind '{}'", descriptor.kind))
        })?;
        Ok(ctor(descriptor)?)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.ctors.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.ctors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
