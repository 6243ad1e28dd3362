use std::io::Read;
use std::path::PathBuf;

use anyhow::Context as _;

/// Where the research query comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuerySource {
    Argument(String),
    File(PathBuf),
    /// Read stdin to EOF.
    Interactive,
}

/// Reads and trims the query. Empty queries are an error.
pub fn read_query(source: &QuerySource, mut stdin: impl Read) -> anyhow::Result<String> {
    let raw = match source {
        QuerySource::Argument(text) => text.clone(),
        QuerySource::File(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Error reading input file {}", path.display()))?,
        QuerySource::Interactive => {
            let mut buf = String::new();
            stdin
                .read_to_string(&mut buf)
                .context("Error reading query from stdin")?;
            buf
        }
    };
    let query = raw.trim();
    if query.is_empty() {
        anyhow::bail!("Query is empty");
    }
    Ok(query.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn file_query_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "\n  # Topic\nCompare heat pumps.  \n").expect("write");
        let query = read_query(&QuerySource::File(file.path().to_path_buf()), std::io::empty())
            .expect("query");
        assert_eq!(query, "# Topic\nCompare heat pumps.");
    }

    #[test]
    fn interactive_reads_until_eof() {
        let stdin = "line one\nline two\n".as_bytes();
        let query = read_query(&QuerySource::Interactive, stdin).expect("query");
        assert_eq!(query, "line one\nline two");
    }

    #[test]
    fn blank_queries_are_rejected() {
        let err = read_query(&QuerySource::Argument("   ".into()), std::io::empty())
            .expect_err("empty");
        assert_eq!(err.to_string(), "Query is empty");
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.md");
        let err = read_query(&QuerySource::File(path), std::io::empty()).expect_err("missing");
        assert!(err.to_string().contains("missing.md"));
    }
}
