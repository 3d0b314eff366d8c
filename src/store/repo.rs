use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::ChatResult;

pub fn query_one<T, F>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
    map: F,
) -> ChatResult<Option<T>>
where
    F: FnOnce(&Row<'_>) -> Result<T, rusqlite::Error>,
{
    let mut stmt = conn.prepare(sql)?;
    Ok(stmt.query_row(params, map).optional()?)
}

pub fn query_all<T, F>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
    map: F,
) -> ChatResult<Vec<T>>
where
    F: FnMut(&Row<'_>) -> Result<T, rusqlite::Error>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn exec(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> ChatResult<usize> {
    Ok(conn.execute(sql, params)?)
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
