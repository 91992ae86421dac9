use std::fmt::Display;

/// Trait for types that can provide column values
pub trait GetColumnValue<C> {
    fn get_column_value(&self, column: &C) -> String;
}

/// Column types that know their own header text
pub trait TableColumn {
    fn header(&self) -> &'static str;
}

/// Output format configuration
#[derive(Clone, Debug)]
pub struct OutputFormat {
    pub raw: bool,
}

/// Build table rows from items and columns, headers first unless raw
pub fn build_table_data<T, C>(items: &[T], columns: &[C], with_header: bool) -> Vec<Vec<String>>
where
    T: GetColumnValue<C>,
    C: TableColumn,
{
    let header: Option<Vec<String>> = with_header.then(|| columns.iter().map(|c| c.header().to_string()).collect());
    header
        .into_iter()
        .chain(items.iter().map(|item| {
            columns
                .iter()
                .map(|col| item.get_column_value(col))
                .collect()
        }))
        .collect()
}

/// Parse a `--columns` value. A leading `+` appends to the defaults.
pub fn parse_columns<C>(columns: Option<&str>, defaults: &[&str]) -> Result<Vec<C>, C::Err>
where
    C: std::str::FromStr,
{
    let split = |s: &str| -> Vec<String> {
        s.split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    };

    let names: Vec<String> = match columns {
        Some(value) => match value.strip_prefix('+') {
            Some(extra) => defaults
                .iter()
                .map(|d| d.to_string())
                .chain(split(extra))
                .collect(),
            None => split(value),
        },
        None => defaults.iter().map(|d| d.to_string()).collect(),
    };

    names.iter().map(|name| name.parse()).collect()
}

impl OutputFormat {
    pub fn new(raw: bool) -> Self {
        Self { raw }
    }

    /// Print tabular data - either raw (tab-separated) or formatted (column-aligned)
    pub fn print_table<T>(&self, data: &[Vec<T>])
    where
        T: Display + AsRef<str>,
    {
        for line in self.render_table(data) {
            println!("{line}");
        }
    }

    pub fn render_table<T>(&self, data: &[Vec<T>]) -> Vec<String>
    where
        T: Display + AsRef<str>,
    {
        if data.is_empty() {
            return Vec::new();
        }

        if self.raw {
            return data
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| cell.as_ref())
                        .collect::<Vec<_>>()
                        .join("\t")
                })
                .collect();
        }

        // Column-aligned like `column -t`
        let num_cols = data.iter().map(|row| row.len()).max().unwrap_or(0);
        let mut col_widths = vec![0; num_cols];
        for row in data {
            for (i, cell) in row.iter().enumerate() {
                col_widths[i] = col_widths[i].max(cell.as_ref().chars().count());
            }
        }

        data.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, cell)| {
                        if i == row.len() - 1 {
                            cell.to_string()
                        } else {
                            format!("{:<width$}", cell.as_ref(), width = col_widths[i])
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("  ")
            })
            .collect()
    }

    /// Print key-value pairs
    pub fn print_key_value<K, V>(&self, pairs: &[(K, V)])
    where
        K: Display + AsRef<str>,
        V: Display + AsRef<str>,
    {
        let data: Vec<Vec<String>> = pairs
            .iter()
            .map(|(k, v)| vec![k.to_string(), v.to_string()])
            .collect();

        self.print_table(&data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_output() {
        let format = OutputFormat::new(true);
        let data = vec![
            vec!["short", "medium", "very_long_column"],
            vec!["a", "bb", "ccc"],
        ];

        assert_eq!(
            format.render_table(&data),
            vec!["short\tmedium\tvery_long_column", "a\tbb\tccc"]
        );
    }

    #[test]
    fn test_formatted_output() {
        let format = OutputFormat::new(false);
        let data = vec![
            vec!["short", "medium", "very_long_column"],
            vec!["a", "bb", "ccc"],
        ];

        assert_eq!(
            format.render_table(&data),
            vec!["short  medium  very_long_column", "a      bb      ccc"]
        );
    }

    #[test]
    fn test_parse_columns_append_and_override() {
        let defaults = ["name", "domain"];

        let cols: Vec<String> = parse_columns(None, &defaults).unwrap();
        assert_eq!(cols, vec!["name", "domain"]);

        let cols: Vec<String> = parse_columns(Some("+not_after, serial"), &defaults).unwrap();
        assert_eq!(cols, vec!["name", "domain", "not_after", "serial"]);

        let cols: Vec<String> = parse_columns(Some("serial"), &defaults).unwrap();
        assert_eq!(cols, vec!["serial"]);
    }
}
