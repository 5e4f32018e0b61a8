use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::errors::ComposeError;

/// Source-language variant; each kind owns exactly one stage chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    PlainScript,
    PlainScriptJsx,
    TypedScript,
    TypedScriptJsx,
}

impl FileKind {
    pub const ALL: [FileKind; 4] = [
        FileKind::PlainScript,
        FileKind::PlainScriptJsx,
        FileKind::TypedScript,
        FileKind::TypedScriptJsx,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FileKind::PlainScript => "plain-script",
            FileKind::PlainScriptJsx => "plain-script-jsx",
            FileKind::TypedScript => "typed-script",
            FileKind::TypedScriptJsx => "typed-script-jsx",
        }
    }

    /// Name of the bundler rule holding this kind's chain
    pub fn rule_name(self) -> &'static str {
        match self {
            FileKind::PlainScript => "js",
            FileKind::PlainScriptJsx => "jsx",
            FileKind::TypedScript => "ts",
            FileKind::TypedScriptJsx => "tsx",
        }
    }

    /// File-name pattern the bundler matches the rule against
    pub fn test_pattern(self) -> &'static str {
        match self {
            FileKind::PlainScript => r"\.m?js$",
            FileKind::PlainScriptJsx => r"\.m?jsx$",
            FileKind::TypedScript => r"\.ts$",
            FileKind::TypedScriptJsx => r"\.tsx$",
        }
    }

    pub fn is_typed(self) -> bool {
        matches!(self, FileKind::TypedScript | FileKind::TypedScriptJsx)
    }

    pub fn is_jsx(self) -> bool {
        matches!(self, FileKind::PlainScriptJsx | FileKind::TypedScriptJsx)
    }

    /// Kind of a file, by extension
    pub fn for_path(path: &str) -> Option<FileKind> {
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let (_, extension) = file_name.rsplit_once('.')?;
        match extension {
            "js" | "mjs" => Some(FileKind::PlainScript),
            "jsx" | "mjsx" => Some(FileKind::PlainScriptJsx),
            "ts" => Some(FileKind::TypedScript),
            "tsx" => Some(FileKind::TypedScriptJsx),
            _ => None,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FileKind {
    type Err = ComposeError;

    /// Accepts the kind name or its rule name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s || kind.rule_name() == s)
            .ok_or_else(|| ComposeError::UnsupportedFileKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_parse_names() {
        assert_eq!("ts".parse::<FileKind>().unwrap(), FileKind::TypedScript);
        assert_eq!(
            "plain-script-jsx".parse::<FileKind>().unwrap(),
            FileKind::PlainScriptJsx
        );
    }

    #[test]
    fn test_parse_unknown_kind() {
        let err = "coffee".parse::<FileKind>().unwrap_err();
        assert!(matches!(err, ComposeError::UnsupportedFileKind(ref k) if k == "coffee"));
    }

    #[test]
    fn test_for_path() {
        assert_eq!(FileKind::for_path("src/main.js"), Some(FileKind::PlainScript));
        assert_eq!(FileKind::for_path("src/util.mjs"), Some(FileKind::PlainScript));
        assert_eq!(FileKind::for_path(r"src\App.jsx"), Some(FileKind::PlainScriptJsx));
        assert_eq!(FileKind::for_path("src/main.tsx"), Some(FileKind::TypedScriptJsx));
        assert_eq!(FileKind::for_path("src/types.d.ts"), Some(FileKind::TypedScript));
        assert_eq!(FileKind::for_path("src/style.css"), None);
        assert_eq!(FileKind::for_path("Makefile"), None);
        assert_eq!(FileKind::for_path("src.ts/Makefile"), None);
    }

    #[test]
    fn test_for_path_agrees_with_test_pattern() {
        let paths = [
            "a.js", "a.mjs", "a.jsx", "a.mjsx", "a.ts", "a.tsx", "a.json", "a.vue", "a.css",
        ];
        for kind in FileKind::ALL {
            let re = Regex::new(kind.test_pattern()).unwrap();
            for path in paths {
                assert_eq!(
                    re.is_match(path),
                    FileKind::for_path(path) == Some(kind),
                    "{} vs {}",
                    kind,
                    path
                );
            }
        }
    }

    #[test]
    fn test_flags() {
        assert!(FileKind::TypedScriptJsx.is_typed());
        assert!(FileKind::TypedScriptJsx.is_jsx());
        assert!(!FileKind::PlainScript.is_typed());
        assert!(!FileKind::TypedScript.is_jsx());
    }
}
