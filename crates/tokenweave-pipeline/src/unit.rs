//! Processing units and the chain that runs them
//!
//! A [`Chain`] is an ordered list of boxed [`ProcessingUnit`]s built by the host.
//! Each unit receives the [`Exchange`] and a [`Next`] continuation; calling
//! `next.run(exchange)` hands control to the rest of the chain, and returning without
//! calling it short-circuits.

use std::fmt;

use async_trait::async_trait;
use http::{Request, Response, StatusCode};

use crate::error::PipelineResult;
use crate::fields::Reflect;
use crate::security::SecurityContext;

/// Role a unit plays in the chain
///
/// Units advertise capabilities; weaving locates units by capability instead of by
/// concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability(&'static str);

impl Capability {
    /// Authenticates requests from a bearer token
    pub const TOKEN_AUTHENTICATION: Self = Self("token-authentication");
    /// Handles the logout endpoint
    pub const LOGOUT: Self = Self("logout");
    /// Handles interactive credential submission
    pub const CREDENTIAL_CHECK: Self = Self("credential-check");
    /// Rejects unauthenticated access to protected resources
    pub const AUTHORIZATION: Self = Self("authorization");

    /// Custom capability
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Capability name
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Request/response pair flowing through the chain
#[derive(Debug)]
pub struct Exchange {
    /// Inbound request
    pub request: Request<String>,
    /// Outbound response, filled in by units
    pub response: Response<String>,
    /// Per-request security state
    pub security: SecurityContext,
}

impl Exchange {
    /// Start an exchange with an empty `200 OK` response
    pub fn new(request: Request<String>) -> Self {
        Self {
            request,
            response: Response::new(String::new()),
            security: SecurityContext::default(),
        }
    }

    /// Request path
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// Set the response status and body
    pub fn respond(&mut self, status: StatusCode, body: impl Into<String>) {
        *self.response.status_mut() = status;
        *self.response.body_mut() = body.into();
    }
}

/// One stage of a host pipeline
#[async_trait]
pub trait ProcessingUnit: Reflect {
    /// Roles this unit plays
    fn capabilities(&self) -> &[Capability];

    /// Whether this unit plays `capability`
    fn satisfies(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Process the exchange, calling `next` to continue the chain
    ///
    /// # Errors
    ///
    /// Returns an error if the unit cannot complete; the chain stops.
    async fn handle<'a>(&'a self, exchange: &'a mut Exchange, next: Next<'a>)
    -> PipelineResult<()>;
}

/// Continuation into the rest of the chain
pub struct Next<'a> {
    units: &'a [Box<dyn ProcessingUnit>],
    index: usize,
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("remaining_units", &(self.units.len() - self.index))
            .finish()
    }
}

impl<'a> Next<'a> {
    fn new(units: &'a [Box<dyn ProcessingUnit>], index: usize) -> Self {
        Self { units, index }
    }

    /// Run the remaining units
    ///
    /// # Errors
    ///
    /// Propagates the first unit error.
    pub async fn run(self, exchange: &'a mut Exchange) -> PipelineResult<()> {
        match self.units.get(self.index) {
            Some(unit) => {
                let next = Next::new(self.units, self.index + 1);
                unit.handle(exchange, next).await
            }
            None => Ok(()),
        }
    }
}

/// Ordered processing units owned by the host
#[derive(Default)]
pub struct Chain {
    units: Vec<Box<dyn ProcessingUnit>>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.type_names()).finish()
    }
}

impl Chain {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit
    pub fn push(&mut self, unit: impl ProcessingUnit) {
        self.units.push(Box::new(unit));
    }

    /// Append a unit, builder style
    #[must_use]
    pub fn with(mut self, unit: impl ProcessingUnit) -> Self {
        self.push(unit);
        self
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the chain has no units
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units in order
    pub fn iter(&self) -> impl Iterator<Item = &dyn ProcessingUnit> {
        self.units.iter().map(|u| &**u)
    }

    /// Short type names in order
    pub fn type_names(&self) -> Vec<&'static str> {
        self.iter().map(|u| u.type_name()).collect()
    }

    /// Unit at `index`
    pub fn get(&self, index: usize) -> Option<&dyn ProcessingUnit> {
        self.units.get(index).map(|u| &**u)
    }

    pub(crate) fn units_mut(&mut self) -> &mut Vec<Box<dyn ProcessingUnit>> {
        &mut self.units
    }

    /// Run the exchange through every unit
    ///
    /// # Errors
    ///
    /// Propagates the first unit error.
    pub async fn run(&self, exchange: &mut Exchange) -> PipelineResult<()> {
        Next::new(&self.units, 0).run(exchange).await
    }
}

/// Owner of a chain that weaving can reach into
pub trait ChainHost {
    /// The chain, if the host has built one
    fn chain_mut(&mut self) -> Option<&mut Chain>;
}

impl ChainHost for Chain {
    fn chain_mut(&mut self) -> Option<&mut Chain> {
        Some(self)
    }
}

impl ChainHost for Option<Chain> {
    fn chain_mut(&mut self) -> Option<&mut Chain> {
        self.as_mut()
    }
}
