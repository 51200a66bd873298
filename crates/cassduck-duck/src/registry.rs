//! Attached catalogs, keyed by name
//!
//! Table functions run inside DuckDB callbacks with no handle on the caller,
//! so attachments live in a process-wide registry. The registry holds the
//! only strong reference to each catalog; detaching drops the session and
//! fails any scan still bound to it.

use crate::catalog::CassandraCatalog;
use cassduck_client::{CqlSession, Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Catalog name used when an attach does not give one
pub const DEFAULT_CATALOG: &str = "cassandra";

type Catalogs = HashMap<String, Arc<CassandraCatalog>>;

fn catalogs() -> &'static RwLock<Catalogs> {
    static CATALOGS: OnceLock<RwLock<Catalogs>> = OnceLock::new();
    CATALOGS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn read() -> RwLockReadGuard<'static, Catalogs> {
    catalogs().read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write() -> RwLockWriteGuard<'static, Catalogs> {
    catalogs().write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Connect and register a catalog under `name`
pub fn attach(name: &str, connection_string: &str) -> Result<Arc<CassandraCatalog>> {
    ensure_free(name)?;
    let catalog = CassandraCatalog::attach(name, connection_string)?;
    insert(catalog)
}

/// Register a catalog over an existing session
pub fn attach_session(
    name: &str,
    connection_string: &str,
    session: Arc<dyn CqlSession>,
) -> Result<Arc<CassandraCatalog>> {
    ensure_free(name)?;
    insert(CassandraCatalog::with_session(name, connection_string, session)?)
}

/// The catalog attached as `name`
pub fn attached(name: &str) -> Result<Arc<CassandraCatalog>> {
    read()
        .get(name)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("no Cassandra catalog attached as {}", name)))
}

/// Drop the catalog attached as `name`; false when there was none
pub fn detach(name: &str) -> bool {
    let removed = write().remove(name).is_some();
    if removed {
        tracing::info!(catalog = name, "Detached Cassandra catalog");
    }
    removed
}

pub fn attached_names() -> Vec<String> {
    let mut names: Vec<String> = read().keys().cloned().collect();
    names.sort();
    names
}

fn ensure_free(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Configuration("catalog name must not be empty".into()));
    }
    if read().contains_key(name) {
        return Err(Error::Configuration(format!(
            "a catalog named {} is already attached",
            name
        )));
    }
    Ok(())
}

fn insert(catalog: CassandraCatalog) -> Result<Arc<CassandraCatalog>> {
    let name = catalog.name().to_string();
    let catalog = Arc::new(catalog);
    let mut catalogs = write();
    // Another attach may have won the race since `ensure_free`
    if catalogs.contains_key(&name) {
        return Err(Error::Configuration(format!(
            "a catalog named {} is already attached",
            name
        )));
    }
    catalogs.insert(name, Arc::clone(&catalog));
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cassduck_client::{MemorySession, MemoryTable};

    fn session() -> Arc<dyn CqlSession> {
        Arc::new(MemorySession::new().with_table(MemoryTable::new("demo", "kv").partition_key("k", "text")))
    }

    #[test]
    fn test_attach_lookup_detach() {
        let catalog = attach_session("registry_lifecycle", "host=127.0.0.1", session()).unwrap();
        assert_eq!(catalog.name(), "registry_lifecycle");
        assert!(attached_names().contains(&"registry_lifecycle".to_string()));
        assert!(Arc::ptr_eq(&attached("registry_lifecycle").unwrap(), &catalog));

        assert!(detach("registry_lifecycle"));
        assert!(!detach("registry_lifecycle"));
        assert!(matches!(attached("registry_lifecycle"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        attach_session("registry_duplicate", "host=127.0.0.1", session()).unwrap();
        let err = attach_session("registry_duplicate", "host=10.0.0.1", session()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{:?}", err);
        assert_eq!(attached("registry_duplicate").unwrap().db_path(), "host=127.0.0.1");
        detach("registry_duplicate");
    }

    #[test]
    fn test_empty_name_is_rejected() {
        assert!(matches!(
            attach_session("", "host=127.0.0.1", session()),
            Err(Error::Configuration(_))
        ));
    }
}
