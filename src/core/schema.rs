//! Destination table contract shared by the database adapters.

use crate::domain::model::FlatRow;

/// `CREATE TABLE IF NOT EXISTS`，六個 TEXT NOT NULL 欄位，順序與 [`FlatRow::COLUMNS`] 相同
pub fn create_table_sql(table: &str) -> String {
    let columns: Vec<String> = FlatRow::COLUMNS
        .iter()
        .map(|column| format!("    {} TEXT NOT NULL", column))
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
        table,
        columns.join(",\n")
    )
}

/// 依欄位位置寫入，不帶欄位名稱與標題列。
/// CSV 格式下未加引號的空欄位會被當成 NULL，FORCE_NOT_NULL 讓它保持為空字串。
pub fn copy_sql(table: &str) -> String {
    format!(
        "COPY {} FROM STDIN WITH (FORMAT csv, DELIMITER ',', FORCE_NOT_NULL ({}))",
        table,
        FlatRow::COLUMNS.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql_column_order() {
        let sql = create_table_sql("users");

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS users ("));
        let positions: Vec<usize> = FlatRow::COLUMNS
            .iter()
            .map(|c| sql.find(&format!("{} TEXT NOT NULL", c)).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
        assert_eq!(sql.matches("NOT NULL").count(), 6);
    }

    #[test]
    fn test_copy_sql_is_positional() {
        assert_eq!(
            copy_sql("users"),
            "COPY users FROM STDIN WITH (FORMAT csv, DELIMITER ',', \
             FORCE_NOT_NULL (firstname, lastname, country, username, password, email))"
        );
    }
}
