//! Tabular file readers. Generalizes a `drivers::csv::CsvDriver`-style
//! reader (`CsvReadOptions` with a fixed comma separator) to the wire format
//! spec.md §6 actually specifies: tab-separated, `#`-prefixed comment
//! lines — the original pipeline's `FileTypeFormat._get_dataframe`
//! (`pd.read_csv(sep="\t", comment="#")`).

use polars::prelude::*;
use std::path::Path;

/// Read a tab-separated file with `#`-comment lines into a `DataFrame`.
pub fn read_tsv(path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(b'\t')
                .with_comment_prefix(Some(CommentPrefix::Single(b'#'))),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}
