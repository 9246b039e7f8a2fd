//! Navigation requests emitted by the checkout session.

use std::fmt;

/// Where the host application should take the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// The cart page
    Cart,
    /// An external payment page
    External(String),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cart => f.write_str("/cart"),
            Self::External(url) => f.write_str(url),
        }
    }
}

/// Router owned by the host application
pub trait Navigator: Send + Sync {
    /// Leave the current view for `route`
    fn redirect(&self, route: Route);
}
