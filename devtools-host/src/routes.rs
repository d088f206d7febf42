//! Route tables exposed by the host's HTTP routers.

use devtools_primitives::CapabilityId;
use serde::Serialize;

/// Router flavours a host can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterKind {
    /// Thread-per-request handlers.
    Blocking,
    /// Async, non-blocking handlers.
    Reactive,
}

impl RouterKind {
    /// Both kinds.
    pub const ALL: [Self; 2] = [Self::Blocking, Self::Reactive];

    /// Name of the capability detected when a table of this kind exists.
    #[must_use]
    pub const fn capability_name(self) -> &'static str {
        match self {
            Self::Blocking => "routing.blocking",
            Self::Reactive => "routing.reactive",
        }
    }

    /// Capability detected when a table of this kind exists.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in names; validation is shared with every
    /// other capability id.
    pub fn capability(self) -> devtools_primitives::Result<CapabilityId> {
        CapabilityId::new(self.capability_name())
    }

    /// Provider group name for this kind's route listing.
    #[must_use]
    pub const fn group_name(self) -> &'static str {
        match self {
            Self::Blocking => "routes.blocking",
            Self::Reactive => "routes.reactive",
        }
    }
}

/// A handler parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteParam {
    /// Parameter name.
    pub name: String,
    /// Parameter type.
    #[serde(rename = "type")]
    pub ty: String,
}

/// One routed endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    /// Path pattern.
    pub path: String,
    /// Accepted methods; `["ALL"]` when unrestricted.
    pub methods: Vec<String>,
    /// Accepted media types.
    pub consumes: Vec<String>,
    /// Produced media types.
    pub produces: Vec<String>,
    /// Handler identifier.
    pub handler: String,
    /// Handler parameters.
    pub parameters: Vec<RouteParam>,
}

impl RouteInfo {
    /// Creates a route accepting every method.
    #[must_use]
    pub fn new(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: vec!["ALL".to_owned()],
            consumes: Vec::new(),
            produces: Vec::new(),
            handler: handler.into(),
            parameters: Vec::new(),
        }
    }

    /// Restricts the accepted methods.
    #[must_use]
    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        if self.methods.is_empty() {
            self.methods.push("ALL".to_owned());
        }
        self
    }

    /// Adds an accepted media type.
    #[must_use]
    pub fn consumes(mut self, media_type: impl Into<String>) -> Self {
        self.consumes.push(media_type.into());
        self
    }

    /// Adds a produced media type.
    #[must_use]
    pub fn produces(mut self, media_type: impl Into<String>) -> Self {
        self.produces.push(media_type.into());
        self
    }

    /// Adds a handler parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.parameters.push(RouteParam {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }
}

/// Routes of one router.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTable {
    kind: RouterKind,
    routes: Vec<RouteInfo>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(kind: RouterKind) -> Self {
        Self {
            kind,
            routes: Vec::new(),
        }
    }

    /// Adds a route.
    #[must_use]
    pub fn with_route(mut self, route: RouteInfo) -> Self {
        self.routes.push(route);
        self
    }

    /// Returns the router kind.
    #[must_use]
    pub const fn kind(&self) -> RouterKind {
        self.kind
    }

    /// Returns the routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }
}
