//! Central database of all source files in a session.

use crate::file_id::FileId;
use crate::resolved_span::ResolvedSpan;
use crate::source_file::SourceFile;
use crate::span::Span;
use std::io;
use std::path::{Path, PathBuf};

/// The source database, owning all loaded source text and resolving
/// [`FileId`] + byte offsets to line/column coordinates.
pub struct SourceDb {
    files: Vec<SourceFile>,
}

impl SourceDb {
    /// Creates an empty source database.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Loads a source file from the filesystem and returns its [`FileId`].
    pub fn load_file(&mut self, path: &Path) -> Result<FileId, io::Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.add_source(path.to_path_buf(), content))
    }

    /// Adds a source file from an in-memory string.
    ///
    /// The `name` parameter is used as the file path in diagnostics.
    pub fn add_source(&mut self, name: impl Into<PathBuf>, content: String) -> FileId {
        let id = FileId::from_raw(self.files.len() as u32);
        self.files.push(SourceFile::new(id, name.into(), content));
        id
    }

    /// Returns the [`SourceFile`] for the given [`FileId`].
    ///
    /// # Panics
    ///
    /// Panics if the `FileId` is invalid.
    pub fn get_file(&self, id: FileId) -> &SourceFile {
        &self.files[id.as_raw() as usize]
    }

    /// Resolves a [`Span`] to line/column coordinates.
    pub fn resolve_span(&self, span: Span) -> ResolvedSpan {
        let file = self.get_file(span.file);
        let (start_line, start_col) = file.line_col(span.start);
        let (end_line, end_col) = file.line_col(span.end.saturating_sub(1).max(span.start));
        ResolvedSpan {
            file_path: file.path.clone(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Renders a span as `file:line` text.
    ///
    /// This is the form embedded in synthesized names such as
    /// `$genblock$top.v:12$3` and quoted in rewrite warnings. Dummy
    /// spans render as `<unknown>`.
    pub fn location(&self, span: Span) -> String {
        if span.is_dummy() {
            return "<unknown>".to_string();
        }
        let file = self.get_file(span.file);
        let (line, _) = file.line_col(span.start);
        format!("{}:{}", file.path.display(), line)
    }

    /// Returns the source text corresponding to a [`Span`].
    pub fn snippet(&self, span: Span) -> &str {
        let file = self.get_file(span.file);
        file.snippet(span.start, span.end)
    }
}

impl Default for SourceDb {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get() {
        let mut db = SourceDb::new();
        let id = db.add_source("a.v", "wire w;".to_string());
        assert_eq!(db.get_file(id).content, "wire w;");
    }

    #[test]
    fn resolve_span() {
        let mut db = SourceDb::new();
        let id = db.add_source("a.v", "abc\ndef\nghi".to_string());
        let r = db.resolve_span(Span::new(id, 4, 7));
        assert_eq!(r.start_line, 2);
        assert_eq!(r.start_col, 1);
        assert_eq!(r.end_line, 2);
        assert_eq!(r.end_col, 3);
    }

    #[test]
    fn location_text() {
        let mut db = SourceDb::new();
        let id = db.add_source("top.v", "line1\nline2\nline3".to_string());
        assert_eq!(db.location(Span::new(id, 6, 11)), "top.v:2");
        assert_eq!(db.location(Span::DUMMY), "<unknown>");
    }

    #[test]
    fn snippet() {
        let mut db = SourceDb::new();
        let id = db.add_source("a.v", "assign y = a;".to_string());
        assert_eq!(db.snippet(Span::new(id, 7, 8)), "y");
    }

    #[test]
    fn multiple_files() {
        let mut db = SourceDb::new();
        let a = db.add_source("a.v", "one".to_string());
        let b = db.add_source("b.v", "two".to_string());
        assert_ne!(a, b);
        assert_eq!(db.get_file(b).content, "two");
    }

    #[test]
    fn load_file_from_disk() {
        let dir = std::env::temp_dir().join("veld_source_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("load.v");
        std::fs::write(&path, "module top; endmodule").unwrap();

        let mut db = SourceDb::new();
        let id = db.load_file(&path).unwrap();
        assert_eq!(db.get_file(id).content, "module top; endmodule");

        std::fs::remove_dir_all(&dir).ok();
    }
}
