//! Route reachability from authentication state.
//!
//! Protected routes need a token; public routes (sign-in, sign-up) are only
//! for anonymous users. Violations redirect to the other class's entry point.

use std::fmt;
use std::sync::Arc;

use docchat_core::Session;

use crate::session::SessionStore;

/// Which side of the authentication boundary a route lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Public,
    Protected,
}

/// Known application routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// `/`, shows the sign-up form.
    Root,
    SignIn,
    SignUp,
    Dashboard,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Route> {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Some(Route::Root),
            "/signin" => Some(Route::SignIn),
            "/signup" => Some(Route::SignUp),
            "/dashboard" => Some(Route::Dashboard),
            _ => None,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Root => "/",
            Route::SignIn => "/signin",
            Route::SignUp => "/signup",
            Route::Dashboard => "/dashboard",
        }
    }

    pub fn class(&self) -> RouteClass {
        match self {
            Route::Root | Route::SignIn | Route::SignUp => RouteClass::Public,
            Route::Dashboard => RouteClass::Protected,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl RouteClass {
    /// Where a user who may not see this class is sent.
    pub fn fallback(&self) -> Route {
        match self {
            RouteClass::Protected => Route::SignIn,
            RouteClass::Public => Route::Dashboard,
        }
    }
}

/// Outcome of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Allow(Route),
    Redirect(Route),
    NotFound,
}

/// Pure reachability rule.
pub fn is_reachable(class: RouteClass, session: &Session) -> bool {
    match class {
        RouteClass::Protected => session.is_authenticated(),
        RouteClass::Public => !session.is_authenticated(),
    }
}

/// Decide navigation for `route` given `session`.
pub fn navigate(route: Route, session: &Session) -> Navigation {
    let class = route.class();
    if is_reachable(class, session) {
        Navigation::Allow(route)
    } else {
        Navigation::Redirect(class.fallback())
    }
}

/// Reads the live session on every decision, so a logout takes effect on
/// the next navigation.
#[derive(Clone)]
pub struct SessionGate {
    session: Arc<SessionStore>,
}

impl SessionGate {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    pub fn resolve(&self, route: Route) -> Navigation {
        navigate(route, &self.session.snapshot())
    }

    pub fn resolve_path(&self, path: &str) -> Navigation {
        match Route::from_path(path) {
            Some(route) => self.resolve(route),
            None => Navigation::NotFound,
        }
    }
}
