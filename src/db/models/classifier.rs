// src/db/models/classifier.rs

//! Classifier registry - every trove classifier seen on a release

use crate::error::Result;
use rusqlite::Connection;

/// Record a classifier, ignoring ones already known
pub fn ensure_classifier(conn: &Connection, name: &str) -> Result<()> {
    conn.execute("INSERT OR IGNORE INTO classifiers (name) VALUES (?1)", [name])?;
    Ok(())
}

/// Record every classifier in `names`
pub fn ensure_classifiers<'a, I>(conn: &Connection, names: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO classifiers (name) VALUES (?1)")?;
    let mut added = 0;
    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            continue;
        }
        added += stmt.execute([trimmed])?;
    }
    Ok(added)
}

/// List all known classifiers, sorted
pub fn list_classifiers(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM classifiers ORDER BY name")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}
