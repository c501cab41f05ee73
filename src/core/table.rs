//! Tabular data shared by the `table`, `trace` and `profileEnd` renderers

use super::log_entry::{LogEntry, Method};
use super::value::{ArrayKey, Value};

/// Column name used for scalar rows
pub const VALUE_COLUMN: &str = "value";

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub key: ArrayKey,
    /// One cell per column; `None` when the row has no such key
    pub cells: Vec<Option<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub caption: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl TableData {
    /// Build from a tabular entry; `None` when its data is not an array
    pub fn from_entry(entry: &LogEntry) -> Option<Self> {
        let data = entry.args.first()?;
        let mut table = Self::from_value(data, entry.meta.columns())?;
        table.caption = entry.meta.caption().map(str::to_string).or_else(|| match entry.method {
            Method::Trace => Some("trace".to_string()),
            Method::ProfileEnd => Some("profile".to_string()),
            _ => None,
        });
        Some(table)
    }

    pub fn from_value(data: &Value, columns: Option<Vec<String>>) -> Option<Self> {
        let items = data.as_array()?;
        let row_fields: Vec<(ArrayKey, Vec<(String, Value)>)> = items
            .iter()
            .map(|(key, value)| (key.clone(), row_fields(value)))
            .collect();

        let columns = match columns {
            Some(columns) => columns,
            None => {
                let mut columns: Vec<String> = Vec::new();
                for (_, fields) in &row_fields {
                    for (name, _) in fields {
                        if !columns.contains(name) {
                            columns.push(name.clone());
                        }
                    }
                }
                columns
            }
        };

        let rows = row_fields
            .into_iter()
            .map(|(key, fields)| TableRow {
                key,
                cells: columns
                    .iter()
                    .map(|col| {
                        fields
                            .iter()
                            .find(|(name, _)| name == col)
                            .map(|(_, v)| v.clone())
                    })
                    .collect(),
            })
            .collect();

        Some(Self {
            caption: None,
            columns,
            rows,
        })
    }

    /// Rows as JSON: an array when the row keys form a list, else an object
    pub fn to_json(&self) -> serde_json::Value {
        let row_json = |row: &TableRow| {
            let mut map = serde_json::Map::new();
            for (col, cell) in self.columns.iter().zip(&row.cells) {
                if let Some(cell) = cell {
                    map.insert(col.clone(), cell.to_json());
                }
            }
            serde_json::Value::Object(map)
        };

        let is_list = self
            .rows
            .iter()
            .enumerate()
            .all(|(i, row)| row.key == ArrayKey::Int(i as i64));
        if is_list {
            serde_json::Value::Array(self.rows.iter().map(row_json).collect())
        } else {
            let mut map = serde_json::Map::new();
            for row in &self.rows {
                map.insert(row.key.to_string(), row_json(row));
            }
            serde_json::Value::Object(map)
        }
    }

    /// Header row followed by one row per entry (first cell = row key)
    pub fn to_matrix(&self) -> serde_json::Value {
        let mut header = vec![serde_json::Value::String(String::new())];
        header.extend(self.columns.iter().cloned().map(serde_json::Value::String));

        let mut matrix = vec![serde_json::Value::Array(header)];
        for row in &self.rows {
            let mut cells = vec![serde_json::Value::String(row.key.to_string())];
            cells.extend(
                row.cells
                    .iter()
                    .map(|cell| cell.as_ref().map(Value::to_json).unwrap_or(serde_json::Value::Null)),
            );
            matrix.push(serde_json::Value::Array(cells));
        }
        serde_json::Value::Array(matrix)
    }

    /// Column-aligned plain text
    pub fn to_text(&self) -> Vec<String> {
        let mut grid: Vec<Vec<String>> = Vec::with_capacity(self.rows.len() + 1);
        let mut header = vec![String::new()];
        header.extend(self.columns.iter().cloned());
        grid.push(header);
        for row in &self.rows {
            let mut line = vec![row.key.to_string()];
            line.extend(
                row.cells
                    .iter()
                    .map(|cell| cell.as_ref().map(Value::to_text).unwrap_or_default()),
            );
            grid.push(line);
        }

        let widths: Vec<usize> = (0..=self.columns.len())
            .map(|i| {
                grid.iter()
                    .map(|line| line.get(i).map(|c| c.chars().count()).unwrap_or(0))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        grid.iter()
            .map(|line| {
                line.iter()
                    .zip(&widths)
                    .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                    .collect::<Vec<_>>()
                    .join(" | ")
                    .trim_end()
                    .to_string()
            })
            .collect()
    }
}

fn row_fields(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
        Value::Object(obj) => obj.properties.clone(),
        other => vec![(VALUE_COLUMN.to_string(), other.clone())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Value {
        Value::list(vec![
            Value::map(vec![("name", Value::from("Ann")), ("age", Value::from(31))]),
            Value::map(vec![("name", Value::from("Bob")), ("city", Value::from("Oslo"))]),
        ])
    }

    #[test]
    fn test_column_union() {
        let table = TableData::from_value(&people(), None).unwrap();
        assert_eq!(table.columns, vec!["name", "age", "city"]);
        assert_eq!(table.rows[1].cells[1], None);
        assert_eq!(table.rows[1].cells[2], Some(Value::from("Oslo")));
    }

    #[test]
    fn test_explicit_columns() {
        let table = TableData::from_value(&people(), Some(vec!["name".to_string()])).unwrap();
        assert_eq!(table.columns, vec!["name"]);
        assert_eq!(table.rows[0].cells.len(), 1);
    }

    #[test]
    fn test_scalar_rows() {
        let data = Value::map(vec![("a", 1), ("b", 2)]);
        let table = TableData::from_value(&data, None).unwrap();
        assert_eq!(table.columns, vec![VALUE_COLUMN]);
        assert_eq!(table.to_json()["b"]["value"], 2);
    }

    #[test]
    fn test_not_tabular() {
        assert!(TableData::from_value(&Value::from("nope"), None).is_none());
    }

    #[test]
    fn test_matrix_and_text() {
        let table = TableData::from_value(&people(), None).unwrap();
        let matrix = table.to_matrix();
        assert_eq!(matrix[0][1], "name");
        assert_eq!(matrix[1][0], "0");
        assert_eq!(matrix[2][2], serde_json::Value::Null);

        let lines = table.to_text();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("name | age | city"));
    }

    #[test]
    fn test_trace_caption() {
        let entry = LogEntry::new("general", Method::Trace, vec![people()]);
        let table = TableData::from_entry(&entry).unwrap();
        assert_eq!(table.caption.as_deref(), Some("trace"));
    }
}
