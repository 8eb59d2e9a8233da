//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod accounts;
pub mod pool;
pub mod tokens;

pub use pool::SqliteDb;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::Row as _;

use crate::error::DbError;
use crate::repository::DbResult;

/// Aktueller Zeitpunkt, auf Mikrosekunden gekuerzt (entspricht der Speichergenauigkeit)
pub(crate) fn jetzt() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Zeitstempel mit fester Breite, damit Textvergleiche in SQL chronologisch sind
pub(crate) fn zeitstempel(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_zeitstempel(row: &sqlx::sqlite::SqliteRow, spalte: &str) -> DbResult<DateTime<Utc>> {
    let wert: String = row.try_get(spalte)?;
    chrono::DateTime::parse_from_rfc3339(&wert)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::intern(format!("Ungueltiger Zeitstempel {spalte} '{wert}': {e}")))
}

pub(crate) fn eindeutigkeit_verletzt(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn fremdschluessel_verletzt(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn zeitstempel_feste_breite_und_sortierbar() {
        let a = jetzt();
        let b = a + Duration::microseconds(1);
        let c = a + Duration::seconds(10);
        let (sa, sb, sc) = (zeitstempel(a), zeitstempel(b), zeitstempel(c));
        assert_eq!(sa.len(), sb.len());
        assert_eq!(sa.len(), sc.len());
        assert!(sa < sb && sb < sc);
        assert!(sa.ends_with('Z'));
    }
}
