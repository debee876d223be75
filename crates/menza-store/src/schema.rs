use rusqlite_migration::{M, Migrations};

pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "CREATE TABLE fingerprints (
            resource        TEXT NOT NULL,
            scope           TEXT NOT NULL,
            hash            TEXT NOT NULL,
            updated_at      INTEGER NOT NULL,
            PRIMARY KEY (resource, scope)
        );

        CREATE TABLE validity (
            dataset         TEXT NOT NULL,
            scope           TEXT NOT NULL,
            last_fresh_at   INTEGER NOT NULL,
            PRIMARY KEY (dataset, scope)
        );

        CREATE TABLE records (
            collection      TEXT NOT NULL,
            scope           TEXT NOT NULL,
            position        INTEGER NOT NULL,
            record_id       TEXT NOT NULL,
            body            TEXT NOT NULL,
            PRIMARY KEY (collection, scope, position)
        );

        CREATE INDEX idx_records_id ON records(collection, scope, record_id);",
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_valid() {
        assert!(migrations().validate().is_ok());
    }
}
