use std::fmt;
use std::path::{Path, PathBuf};

/// Role a file plays in a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Coordinates,
    Topology,
    ForceField,
    Configuration,
    JobScript,
    SubmitScript,
    Output,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileKind::Coordinates => "coordinates",
            FileKind::Topology => "topology",
            FileKind::ForceField => "force field",
            FileKind::Configuration => "configuration",
            FileKind::JobScript => "job script",
            FileKind::SubmitScript => "submit script",
            FileKind::Output => "output",
        };
        f.write_str(name)
    }
}

/// One file of an entry. A single file may play several roles, e.g. a
/// restart file holding both coordinates and velocities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPart {
    pub path: PathBuf,
    pub kinds: Vec<FileKind>,
}

impl EntryPart {
    pub fn new(path: impl Into<PathBuf>, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            kinds: vec![kind],
        }
    }

    pub fn has_kind(&self, kind: FileKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Record of the files needed for one step of a simulation.
///
/// Usually one file, but a step needing several files is a composite entry: an
/// ordered list of parts that answers every query as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    parts: Vec<EntryPart>,
}

impl FileEntry {
    pub fn single(path: impl Into<PathBuf>, kind: FileKind) -> Self {
        Self {
            parts: vec![EntryPart::new(path, kind)],
        }
    }

    /// Appends another file, turning the entry into a composite.
    pub fn with_part(mut self, part: EntryPart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn push(&mut self, part: EntryPart) {
        self.parts.push(part);
    }

    pub fn parts(&self) -> &[EntryPart] {
        &self.parts
    }

    /// The first file of the entry.
    pub fn primary(&self) -> &EntryPart {
        &self.parts[0]
    }

    pub fn is_composite(&self) -> bool {
        self.parts.len() > 1
    }

    /// Paths of all parts in order, either as recorded or reduced to file names.
    pub fn names(&self, full_path: bool) -> Vec<PathBuf> {
        self.parts
            .iter()
            .map(|part| {
                if full_path {
                    part.path.clone()
                } else {
                    part.path.file_name().map(PathBuf::from).unwrap_or_default()
                }
            })
            .collect()
    }

    /// Distinct roles covered by the entry, in order of first appearance.
    pub fn kinds(&self) -> Vec<FileKind> {
        let mut kinds = Vec::new();
        for kind in self.parts.iter().flat_map(|p| &p.kinds) {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }

    /// The first part playing the given role.
    pub fn find(&self, kind: FileKind) -> Option<&EntryPart> {
        self.parts.iter().find(|p| p.has_kind(kind))
    }

    /// Re-roots relative part paths under `dir`.
    pub fn relative_to(mut self, dir: &Path) -> Self {
        for part in &mut self.parts {
            if part.path.is_relative() {
                part.path = dir.join(&part.path);
            }
        }
        self
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            let kinds: Vec<String> = part.kinds.iter().map(ToString::to_string).collect();
            write!(f, "{} ({})", part.path.display(), kinds.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_entry_answers_queries_across_all_parts() {
        let mut restart = EntryPart::new("run/restart.coor", FileKind::Coordinates);
        restart.kinds.push(FileKind::Output);
        let entry = FileEntry::single("run/production01.pbs", FileKind::JobScript)
            .with_part(EntryPart::new("run/production01.conf", FileKind::Configuration))
            .with_part(restart);

        assert!(entry.is_composite());
        assert_eq!(entry.primary().file_name(), Some("production01.pbs"));
        assert_eq!(
            entry.names(false),
            vec![
                PathBuf::from("production01.pbs"),
                PathBuf::from("production01.conf"),
                PathBuf::from("restart.coor")
            ]
        );
        assert_eq!(
            entry.kinds(),
            vec![
                FileKind::JobScript,
                FileKind::Configuration,
                FileKind::Coordinates,
                FileKind::Output
            ]
        );
        assert_eq!(
            entry.find(FileKind::Output).map(|p| p.path.clone()),
            Some(PathBuf::from("run/restart.coor"))
        );
        assert!(entry.find(FileKind::Topology).is_none());
    }

    #[test]
    fn single_entry_is_not_composite() {
        let entry = FileEntry::single("qsub.sh", FileKind::SubmitScript).relative_to(Path::new("/work"));
        assert!(!entry.is_composite());
        assert_eq!(entry.names(true), vec![PathBuf::from("/work/qsub.sh")]);
        assert_eq!(entry.to_string(), "/work/qsub.sh (submit script)");
    }
}
