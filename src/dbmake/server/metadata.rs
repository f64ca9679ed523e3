// Copyright (c) 2018 Jason White
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! The server metadata round trip.
//!
//! One batch tells the server about every tracked item and asks, for each,
//! whether its object exists, what it really is, how it must be ordered and
//! whether dependency analysis says it must be dropped first.

use std::fmt::Write;

use crate::cache::Cache;
use crate::error::{ErrorKind, ItemError, MakeError};
use crate::item::TypeCode;

use super::{ItemHint, ServerRow};

/// The server refuses more rows than this in one `VALUES` list.
const MAX_VALUES_ROWS: usize = 1000;

/// Quotes a Unicode string literal.
pub fn literal(s: &str) -> String {
    format!("N'{}'", s.replace('\'', "''"))
}

fn nullable_literal(s: &str) -> String {
    if s.is_empty() {
        "NULL".to_string()
    } else {
        literal(s)
    }
}

const PREAMBLE: &str = "\
SET NOCOUNT ON;

DECLARE @Items TABLE (
    Pathname nvarchar(4000) NOT NULL,
    SourceExists bit NOT NULL,
    SchemaName sysname NULL,
    ObjectName sysname NULL,
    Type varchar(2) NULL,
    NeedsToBeCompiled bit NOT NULL,
    DropOrder int NOT NULL
);
";

const SELECT: &str = "
WITH Resolved AS (
    SELECT
        i.Pathname,
        i.SourceExists,
        i.NeedsToBeCompiled,
        i.DropOrder AS DropOrderHint,
        COALESCE(SCHEMA_NAME(o.schema_id), SCHEMA_NAME(tt.schema_id), i.SchemaName) AS SchemaName,
        COALESCE(o.name, tt.name, i.ObjectName) AS ObjectName,
        COALESCE(RTRIM(o.type), CASE WHEN tt.user_type_id IS NOT NULL THEN 'TT' END, i.Type) AS Type,
        o.object_id AS ObjectId,
        tt.user_type_id AS UserTypeId,
        CASE WHEN o.object_id IS NOT NULL OR tt.user_type_id IS NOT NULL THEN 1 ELSE 0 END AS IsPresentOnServer
    FROM @Items AS i
    LEFT JOIN sys.objects AS o
        ON ISNULL(i.Type, '') <> 'TT'
        AND o.object_id = OBJECT_ID(QUOTENAME(i.SchemaName) + N'.' + QUOTENAME(i.ObjectName))
    LEFT JOIN sys.table_types AS tt
        ON i.Type = 'TT'
        AND tt.user_type_id = TYPE_ID(QUOTENAME(i.SchemaName) + N'.' + QUOTENAME(i.ObjectName))
),
Dropping AS (
    SELECT
        r.*,
        CASE WHEN r.IsPresentOnServer = 1 AND (
            r.NeedsToBeCompiled = 1
            OR EXISTS (
                SELECT 1
                FROM sys.sql_expression_dependencies AS dep
                JOIN Resolved AS stale
                    ON stale.UserTypeId = dep.referenced_id
                    AND stale.IsPresentOnServer = 1
                    AND stale.NeedsToBeCompiled = 1
                WHERE dep.referencing_id = r.ObjectId
                    AND dep.referenced_class = 6
            )
        ) THEN 1 ELSE 0 END AS NeedsToBeDropped
    FROM Resolved AS r
)
SELECT
    d.Pathname,
    d.SourceExists,
    d.SchemaName,
    d.ObjectName,
    d.Type,
    CAST(CASE WHEN d.NeedsToBeCompiled = 1 OR d.IsPresentOnServer = 0 OR d.NeedsToBeDropped = 1 THEN 1 ELSE 0 END AS bit) AS NeedsToBeCompiled,
    CAST(d.IsPresentOnServer AS bit) AS IsPresentOnServer,
    CASE WHEN d.Type = 'TT' THEN 1 ELSE d.DropOrderHint END AS DropOrder,
    CAST(d.NeedsToBeDropped AS bit) AS NeedsToBeDropped
FROM Dropping AS d
FOR JSON PATH, INCLUDE_NULL_VALUES;
";

/// Builds the metadata query for the given items.
pub fn query(items: &[ItemHint]) -> String {
    let mut sql = String::from(PREAMBLE);

    for chunk in items.chunks(MAX_VALUES_ROWS) {
        sql.push_str(
            "\nINSERT INTO @Items (Pathname, SourceExists, SchemaName, ObjectName, Type, NeedsToBeCompiled, DropOrder)\nVALUES\n",
        );

        for (i, item) in chunk.iter().enumerate() {
            let separator = if i + 1 == chunk.len() { ";" } else { "," };

            // Writing to a `String` cannot fail.
            let _ = writeln!(
                sql,
                "    ({}, {}, {}, {}, {}, {}, {}){}",
                literal(&item.pathname.to_string_lossy()),
                if item.source_exists { 1 } else { 0 },
                nullable_literal(&item.schema_name),
                nullable_literal(&item.object_name),
                nullable_literal(item.type_code.as_str()),
                if item.needs_to_be_compiled { 1 } else { 0 },
                item.drop_order,
                separator
            );
        }
    }

    sql.push_str(SELECT);
    sql
}

/// Applies the server's answer to the tracked items. Returns the rows that
/// could not be applied. Other rows are still applied.
pub fn apply(cache: &mut Cache, rows: Vec<ServerRow>) -> Vec<ItemError> {
    let mut errors = Vec::new();

    for row in rows {
        let item = match cache.get_mut(&row.pathname) {
            Some(item) => item,
            None => {
                let error = ErrorKind::UntrackedPathname(row.pathname.clone());
                errors.push(ItemError::new(row.pathname, MakeError::from(error)));
                continue;
            }
        };

        if !row.source_exists {
            let error = ErrorKind::MissingSource(row.pathname.clone());
            errors.push(ItemError::new(row.pathname, MakeError::from(error)));
            continue;
        }

        if let Some(schema) = row.schema_name {
            item.schema_name = schema;
        }

        if let Some(name) = row.object_name {
            item.object_name = name;
        }

        if let Some(code) = row.type_code {
            item.type_code = TypeCode::new(&code);
        }

        item.needs_to_be_compiled = row.needs_to_be_compiled;
        item.is_present_on_server = row.is_present_on_server;
        item.drop_order = row.drop_order;
        item.needs_to_be_dropped = row.needs_to_be_dropped;
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::find_kind;
    use crate::item::MakeItem;

    fn hint(path: &str, name: &str) -> ItemHint {
        ItemHint {
            pathname: path.into(),
            source_exists: true,
            schema_name: "dbo".into(),
            object_name: name.into(),
            type_code: TypeCode::default(),
            needs_to_be_compiled: false,
            drop_order: 0,
        }
    }

    fn row(path: &str) -> ServerRow {
        ServerRow {
            pathname: path.into(),
            source_exists: true,
            schema_name: Some("dbo".into()),
            object_name: Some("IdList".into()),
            type_code: Some("TT".into()),
            needs_to_be_compiled: true,
            is_present_on_server: true,
            drop_order: 1,
            needs_to_be_dropped: true,
        }
    }

    #[test]
    fn query_quotes_literals() {
        let sql = query(&[hint("/sql/O'Brien.sql", "O'Brien")]);
        assert!(sql.contains("(N'/sql/O''Brien.sql', 1, N'dbo', N'O''Brien', NULL, 0, 0);"));
        assert!(sql.starts_with("SET NOCOUNT ON;"));
        assert!(sql.trim_end().ends_with("FOR JSON PATH, INCLUDE_NULL_VALUES;"));
    }

    #[test]
    fn query_sends_whether_the_source_exists() {
        let mut gone = hint("/sql/Gone.sql", "Gone");
        gone.source_exists = false;

        let sql = query(&[hint("/sql/Here.sql", "Here"), gone]);
        assert!(sql.contains("(N'/sql/Here.sql', 1, N'dbo', N'Here', NULL, 0, 0),"));
        assert!(sql.contains("(N'/sql/Gone.sql', 0, N'dbo', N'Gone', NULL, 0, 0);"));
        assert!(sql.contains("i.SourceExists"));
        assert!(!sql.contains("d.Pathname IS NULL"));
    }

    #[test]
    fn hint_checks_the_file() -> Result<(), crate::error::Error> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("A.sql");
        std::fs::write(&path, "CREATE VIEW dbo.A AS SELECT 1")?;

        let item = MakeItem::new(path.clone())?;
        assert!(ItemHint::from(&item).source_exists);

        std::fs::remove_file(&path)?;
        assert!(!ItemHint::from(&item).source_exists);

        Ok(())
    }

    #[test]
    fn query_chunks_values() {
        let items: Vec<_> = (0..2500)
            .map(|i| hint(&format!("/sql/P{}.sql", i), &format!("P{}", i)))
            .collect();
        let sql = query(&items);
        assert_eq!(sql.matches("INSERT INTO @Items").count(), 3);
        assert_eq!(sql.matches("NULL, 0, 0);").count(), 3);
    }

    #[test]
    fn apply_updates_items() {
        let mut cache = Cache::new("/nowhere");
        cache.insert(
            MakeItem::from_contents(
                "/sql/IdList.sql".into(),
                b"CREATE TYPE dbo.IdList AS TABLE (Id int)",
            ),
        );

        let errors = apply(&mut cache, vec![row("/sql/IdList.sql")]);
        assert!(errors.is_empty());

        let item = cache.get("/sql/IdList.sql".as_ref()).unwrap();
        assert_eq!(item.object_name, "IdList");
        assert!(item.type_code.is_table_type());
        assert_eq!(item.drop_order, 1);
        assert!(item.needs_to_be_dropped);
        assert!(item.is_present_on_server);
    }

    #[test]
    fn apply_reports_bad_rows_and_keeps_going() {
        let mut cache = Cache::new("/nowhere");
        cache.insert(
            MakeItem::from_contents("/sql/A.sql".into(), b"CREATE VIEW A AS SELECT 1"),
        );
        cache.insert(
            MakeItem::from_contents("/sql/B.sql".into(), b"CREATE VIEW B AS SELECT 1"),
        );

        let mut missing = row("/sql/A.sql");
        missing.source_exists = false;

        let errors = apply(
            &mut cache,
            vec![missing, row("/sql/Ghost.sql"), row("/sql/B.sql")],
        );

        assert_eq!(errors.len(), 2);
        assert!(match find_kind(&errors[0].error) {
            Some(ErrorKind::MissingSource(_)) => true,
            _ => false,
        });
        assert!(match find_kind(&errors[1].error) {
            Some(ErrorKind::UntrackedPathname(p)) => p.ends_with("Ghost.sql"),
            _ => false,
        });

        // The good row still went through.
        assert!(cache.get("/sql/B.sql".as_ref()).unwrap().needs_to_be_dropped);
        assert!(!cache.get("/sql/A.sql".as_ref()).unwrap().needs_to_be_dropped);
    }
}
