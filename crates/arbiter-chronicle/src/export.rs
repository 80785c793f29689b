//! Line-delimited JSON export and import, one full chronicle entry per line.

use std::borrow::Borrow;
use std::path::Path;

use arbiter_protocol::{AuthorityResult, ChronicleEntry};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub fn to_jsonl<E: Borrow<ChronicleEntry>>(entries: &[E]) -> AuthorityResult<String> {
    let mut out = String::new();
    for entry in entries {
        let entry: &ChronicleEntry = entry.borrow();
        out.push_str(&serde_json::to_string(entry)?);
        out.push('\n');
    }
    Ok(out)
}

/// Parses every non-blank line. Linkage is not checked here.
pub fn from_jsonl(text: &str) -> AuthorityResult<Vec<ChronicleEntry>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}

pub async fn write_file<E>(path: &Path, entries: &[E]) -> AuthorityResult<()>
where
    E: Borrow<ChronicleEntry> + Sync,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await?;
    for entry in entries {
        let entry: &ChronicleEntry = entry.borrow();
        let line = serde_json::to_string(entry)?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
    }
    file.flush().await?;
    Ok(())
}

pub async fn read_file(path: &Path) -> AuthorityResult<Vec<ChronicleEntry>> {
    let file = OpenOptions::new().read(true).open(path).await?;
    let mut reader = BufReader::new(file).lines();
    let mut entries = Vec::new();
    while let Some(line) = reader.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}
