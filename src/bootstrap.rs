//! Entry-point resolution for the serve command.
//!
//! The launch command names the application to serve as `module:attribute`
//! (default `app:server`). Resolution happens before any socket is bound, so
//! a bad entry point fails startup with a non-zero exit and no listener.

use crate::error::{DashboardError, Result};
use crate::server;
use crate::state::AppState;
use axum::Router;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A `module:attribute` application reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub module: String,
    pub attribute: String,
}

impl FromStr for EntryPoint {
    type Err = DashboardError;

    fn from_str(spec: &str) -> Result<Self> {
        let (module, attribute) = spec.split_once(':').ok_or_else(|| {
            DashboardError::EntryPoint(format!(
                "'{}' is not of the form module:attribute",
                spec
            ))
        })?;
        if module.is_empty() || attribute.is_empty() {
            return Err(DashboardError::EntryPoint(format!(
                "'{}' is missing a module or attribute name",
                spec
            )));
        }
        Ok(Self {
            module: module.to_string(),
            attribute: attribute.to_string(),
        })
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.attribute)
    }
}

/// Builds the router for an application given the shared state.
pub type AppFactory = fn(AppState) -> Router;

/// Validates the launch-command worker count. Zero would panic inside the
/// runtime builder, so it is rejected as a config error up front.
pub fn validate_worker_count(workers: usize) -> Result<usize> {
    if workers == 0 {
        return Err(DashboardError::Config(
            "worker count must be at least 1".to_string(),
        ));
    }
    Ok(workers)
}

/// Registry of servable applications, keyed by module then attribute.
pub struct AppRegistry {
    modules: HashMap<&'static str, HashMap<&'static str, AppFactory>>,
}

impl AppRegistry {
    /// The applications compiled into this binary.
    pub fn builtin() -> Self {
        let mut app: HashMap<&'static str, AppFactory> = HashMap::new();
        app.insert("server", server::dashboard_app as AppFactory);

        let mut modules = HashMap::new();
        modules.insert("app", app);
        Self { modules }
    }

    pub fn resolve(&self, entry: &EntryPoint) -> Result<AppFactory> {
        let module = self.modules.get(entry.module.as_str()).ok_or_else(|| {
            DashboardError::EntryPoint(format!("no module named '{}'", entry.module))
        })?;
        module
            .get(entry.attribute.as_str())
            .copied()
            .ok_or_else(|| {
                DashboardError::EntryPoint(format!(
                    "module '{}' has no attribute '{}'",
                    entry.module, entry.attribute
                ))
            })
    }
}
