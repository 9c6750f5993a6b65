// src/repository/filename.rs

//! Distribution filename parsing
//!
//! Files linked from outside the index carry no metadata beyond their name,
//! so project, version, file type and Python version are recovered from it.

use regex::Regex;
use std::sync::LazyLock;

/// Python version recorded for source distributions
pub const SOURCE_PYVERSION: &str = "source";

/// Python version recorded when a binary names none
pub const ANY_PYVERSION: &str = "any";

/// Recognized extensions and their file types, longest match first
const EXTENSIONS: &[(&str, &str)] = &[
    (".tar.gz", "sdist"),
    (".tar.bz2", "sdist"),
    (".bz2", "sdist"),
    (".zip", "sdist"),
    (".egg", "bdist_egg"),
    (".exe", "bdist_wininst"),
    (".dmg", "bdist_dmg"),
    (".pgk", "bdist_dmg"),
    (".rpm", "bdist_rpm"),
];

/// What a distribution filename says about its contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub project: String,
    pub version: String,
    pub filetype: &'static str,
    pub pyversion: String,
}

static PY_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-.]py(\d+(?:\.\d+)*)(?:[-.].*)?$").unwrap());
static PLATFORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(?:win32|win-amd64|win-ia64|macosx-[\w.\-]+|linux-\w+)$").unwrap()
});
static RPM_ARCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(?:noarch|src|i[3-6]86|x86_64|ppc|ppc64)$").unwrap());

/// File type for a filename, by extension
pub fn filetype_for(filename: &str) -> Option<(&'static str, &'static str)> {
    let lower = filename.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(ext, _)| lower.ends_with(ext))
        .copied()
}

/// Parse a distribution filename
///
/// Returns `None` for unrecognized extensions and for names without a
/// `{project}-{version}` split.
pub fn parse_filename(filename: &str) -> Option<ParsedFilename> {
    let (extension, filetype) = filetype_for(filename)?;
    let mut stem = &filename[..filename.len() - extension.len()];

    let mut pyversion = None;
    if let Some(caps) = PY_TAG_RE.captures(stem)
        && let (Some(whole), Some(tag)) = (caps.get(0), caps.get(1))
    {
        pyversion = Some(tag.as_str().to_string());
        stem = &stem[..whole.start()];
    }

    if let Some(m) = PLATFORM_RE.find(stem) {
        stem = &stem[..m.start()];
    }

    let is_rpm = filetype == "bdist_rpm";
    if is_rpm && let Some(m) = RPM_ARCH_RE.find(stem) {
        stem = &stem[..m.start()];
    }

    let split = stem
        .char_indices()
        .zip(stem.chars().skip(1))
        .find(|((_, c), next)| *c == '-' && next.is_ascii_digit())
        .map(|((i, _), _)| i)?;

    let project = &stem[..split];
    let mut version = &stem[split + 1..];
    // RPMs are name-version-release
    if is_rpm && let Some(dash) = version.rfind('-') {
        version = &version[..dash];
    }

    if project.is_empty() || version.is_empty() {
        return None;
    }

    let pyversion = if filetype == "sdist" {
        SOURCE_PYVERSION.to_string()
    } else {
        pyversion.unwrap_or_else(|| ANY_PYVERSION.to_string())
    };

    Some(ParsedFilename {
        project: project.to_string(),
        version: version.to_string(),
        filetype,
        pyversion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(filename: &str) -> (String, String, &'static str, String) {
        let p = parse_filename(filename).unwrap();
        (p.project, p.version, p.filetype, p.pyversion)
    }

    #[test]
    fn test_extension_table() {
        assert_eq!(filetype_for("foo-1.0.tar.gz").unwrap().1, "sdist");
        assert_eq!(filetype_for("foo-1.0.zip").unwrap().1, "sdist");
        assert_eq!(filetype_for("foo-1.0.bz2").unwrap().1, "sdist");
        assert_eq!(filetype_for("foo-1.0.tar.bz2").unwrap().0, ".tar.bz2");
        assert_eq!(filetype_for("foo-1.0-py2.7.egg").unwrap().1, "bdist_egg");
        assert_eq!(filetype_for("foo-1.0.win32.exe").unwrap().1, "bdist_wininst");
        assert_eq!(filetype_for("foo-1.0.dmg").unwrap().1, "bdist_dmg");
        assert_eq!(filetype_for("foo-1.0.pgk").unwrap().1, "bdist_dmg");
        assert_eq!(filetype_for("foo-1.0-1.noarch.rpm").unwrap().1, "bdist_rpm");
        assert_eq!(filetype_for("FOO-1.0.TAR.GZ").unwrap().1, "sdist");
        assert!(filetype_for("foo-1.0.whl").is_none());
        assert!(filetype_for("index.html").is_none());
    }

    #[test]
    fn test_source_distributions() {
        assert_eq!(
            parsed("foo-1.0.tar.gz"),
            ("foo".into(), "1.0".into(), "sdist", "source".into())
        );
        assert_eq!(
            parsed("django-filer-0.8.1.zip"),
            ("django-filer".into(), "0.8.1".into(), "sdist", "source".into())
        );
        assert_eq!(
            parsed("foo-2.0b1.tar.bz2"),
            ("foo".into(), "2.0b1".into(), "sdist", "source".into())
        );
    }

    #[test]
    fn test_binary_distributions() {
        assert_eq!(
            parsed("foo-1.0-py2.7.egg"),
            ("foo".into(), "1.0".into(), "bdist_egg", "2.7".into())
        );
        assert_eq!(
            parsed("foo-1.0-py2.6-linux-x86_64.egg"),
            ("foo".into(), "1.0".into(), "bdist_egg", "2.6".into())
        );
        assert_eq!(
            parsed("foo-1.0.win32-py2.5.exe"),
            ("foo".into(), "1.0".into(), "bdist_wininst", "2.5".into())
        );
        assert_eq!(
            parsed("foo-1.0.win32.exe"),
            ("foo".into(), "1.0".into(), "bdist_wininst", "any".into())
        );
        assert_eq!(
            parsed("foo-1.0-py2.5-macosx10.5.dmg"),
            ("foo".into(), "1.0".into(), "bdist_dmg", "2.5".into())
        );
        assert_eq!(
            parsed("foo-1.0-1.noarch.rpm"),
            ("foo".into(), "1.0".into(), "bdist_rpm", "any".into())
        );
    }

    #[test]
    fn test_unparsable_names() {
        assert!(parse_filename("foo.tar.gz").is_none());
        assert!(parse_filename("-1.0.tar.gz").is_none());
        assert!(parse_filename("foo-.tar.gz").is_none());
        assert!(parse_filename("foo-1.0.html").is_none());
    }
}
