//! Splicing behavior into a chain the host already built
//!
//! Weaving happens once, before the chain serves traffic. Chain-level operations
//! locate units by [`Capability`] and keep the relative order of every unit they do
//! not touch. Unit-level operations reach into a unit's slots through
//! [`fields`](crate::fields):
//!
//! - [`wrap_handler_field`] replaces a handler slot with a decorator around the
//!   previous handler. Re-wrapping re-targets the existing decorator instead of
//!   nesting a second one.
//! - [`add_to_handler_list`] prepends a handler to a list slot, once per concrete
//!   handler type.

use std::any::{Any, TypeId};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::FieldResult;
use crate::fields::{self, Reflect};
use crate::security::AsAny;
use crate::unit::{Capability, Chain, ProcessingUnit};

/// Chain-level weaving operations
#[derive(Debug)]
pub struct PipelineWeaver<'c> {
    chain: &'c mut Chain,
}

impl<'c> PipelineWeaver<'c> {
    /// Weave into `chain`
    pub fn new(chain: &'c mut Chain) -> Self {
        Self { chain }
    }

    /// Units playing `capability`, in chain order
    pub fn find_by_capability(&self, capability: Capability) -> Vec<&dyn ProcessingUnit> {
        self.chain.iter().filter(|u| u.satisfies(capability)).collect()
    }

    /// Mutable units playing `capability`, in chain order
    pub fn find_by_capability_mut(
        &mut self,
        capability: Capability,
    ) -> Vec<&mut (dyn ProcessingUnit + 'static)> {
        self.chain
            .units_mut()
            .iter_mut()
            .filter(|u| u.satisfies(capability))
            .map(|u| &mut **u)
            .collect()
    }

    /// Position of the first unit playing `capability`
    pub fn position(&self, capability: Capability) -> Option<usize> {
        self.chain.iter().position(|u| u.satisfies(capability))
    }

    /// Whether any unit plays `capability`
    pub fn contains(&self, capability: Capability) -> bool {
        self.position(capability).is_some()
    }

    /// Insert `unit` immediately before the first unit playing `target`
    ///
    /// Returns the insertion index, or `None` (chain unchanged) when no unit plays
    /// `target`.
    pub fn insert_before(
        &mut self,
        target: Capability,
        unit: impl ProcessingUnit,
    ) -> Option<usize> {
        let Some(index) = self.position(target) else {
            debug!(target = %target, "No anchor unit; chain left unchanged");
            return None;
        };
        let name = unit.type_name();
        self.chain.units_mut().insert(index, Box::new(unit));
        info!(unit = name, before = %target, index, "Inserted unit");
        Some(index)
    }

    /// Insert `unit` at the head of the chain
    pub fn insert_first(&mut self, unit: impl ProcessingUnit) {
        info!(unit = unit.type_name(), "Inserted unit at head of chain");
        self.chain.units_mut().insert(0, Box::new(unit));
    }

    /// Swap the first unit playing `capability` for an extension of it
    ///
    /// `replacement` must extend the existing unit's type; every slot of the existing
    /// unit is copied into it before it takes the same position. Returns the
    /// replaced unit, or `Ok(None)` when no unit plays `capability`.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldAccessError`](crate::error::FieldAccessError) if the state
    /// cannot be copied; the chain is left unchanged.
    pub fn extend_unit<U: ProcessingUnit>(
        &mut self,
        capability: Capability,
        mut replacement: U,
    ) -> FieldResult<Option<Box<dyn ProcessingUnit>>> {
        let Some(index) = self.position(capability) else {
            return Ok(None);
        };
        let units = self.chain.units_mut();
        let copied = fields::copy_all(&*units[index], &mut replacement)?;
        let replaced = std::mem::replace(&mut units[index], Box::new(replacement));
        info!(
            replaced = replaced.type_name(),
            index,
            copied,
            "Extended unit in place"
        );
        Ok(Some(replaced))
    }
}

/// Decorator that can be re-targeted instead of nested
pub trait Decorator<H: ?Sized>: Sized + Send + Sync + 'static {
    /// The wrapped handler
    fn delegate(&self) -> Option<Arc<H>>;

    /// Same decorator wrapping `delegate`
    #[must_use]
    fn with_delegate(&self, delegate: Arc<H>) -> Self;

    /// View as the handler trait
    fn into_handler(self: Arc<Self>) -> Arc<H>;
}

/// Outcome of [`wrap_handler_field`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapped {
    /// The previous handler is now wrapped
    Fresh,
    /// A decorator of this type was already there; it was re-targeted at its own
    /// delegate
    Retargeted,
}

/// Wrap the handler in slot `field` of `unit` with `decorator`
///
/// The slot must hold `Arc<H>`. If it already holds a `D`, the new decorator takes
/// over that decorator's delegate, so the result is always one level deep.
///
/// # Errors
///
/// Returns a [`FieldAccessError`](crate::error::FieldAccessError) if the slot is
/// missing or cannot be read or written.
pub fn wrap_handler_field<H, D>(
    unit: &mut dyn Reflect,
    field: &str,
    decorator: D,
) -> FieldResult<Wrapped>
where
    H: ?Sized + AsAny + Send + Sync + 'static,
    D: Decorator<H>,
{
    let handle = fields::find_typed::<Arc<H>>(unit, field)?;
    let current: Arc<H> = handle.get(unit)?;

    let existing = (*current).as_any().downcast_ref::<D>();
    let (wrapped, outcome) = match existing.and_then(|d| d.delegate()) {
        Some(original) => (decorator.with_delegate(original), Wrapped::Retargeted),
        None if existing.is_some() => (decorator, Wrapped::Retargeted),
        None => (decorator.with_delegate(current.clone()), Wrapped::Fresh),
    };

    handle.set(unit, Arc::new(wrapped).into_handler())?;
    debug!(
        unit = unit.type_name(),
        field,
        decorator = std::any::type_name::<D>(),
        outcome = ?outcome,
        "Wrapped handler slot"
    );
    Ok(outcome)
}

/// Prepend `handler` to the list in slot `field` of `unit`
///
/// Existing handlers keep their relative order. Returns `false` without writing
/// when a handler of the same concrete type is already listed.
///
/// # Errors
///
/// Returns a [`FieldAccessError`](crate::error::FieldAccessError) if the slot is
/// missing or cannot be read or written.
pub fn add_to_handler_list<H>(
    unit: &mut dyn Reflect,
    field: &str,
    handler: Arc<H>,
) -> FieldResult<bool>
where
    H: ?Sized + AsAny + Send + Sync + 'static,
{
    let handle = fields::find_typed::<Vec<Arc<H>>>(unit, field)?;
    let current: Vec<Arc<H>> = handle.get(unit)?;

    let kind = concrete_type(&*handler);
    if current.iter().any(|h| concrete_type(&**h) == kind) {
        debug!(unit = unit.type_name(), field, "Handler already listed");
        return Ok(false);
    }

    let mut updated = Vec::with_capacity(current.len() + 1);
    updated.push(handler);
    updated.extend(current);
    let len = updated.len();
    handle.set(unit, updated)?;
    debug!(unit = unit.type_name(), field, len, "Prepended handler");
    Ok(true)
}

fn concrete_type<H: ?Sized + AsAny>(handler: &H) -> TypeId {
    let any: &dyn Any = handler.as_any();
    any.type_id()
}
