//! Challenge content and the bundled catalog.
//!
//! A challenge pairs a lesson with starter code, a reference solution and a declarative test
//! suite. The catalog is read-only content: this module only loads and queries it.

mod session;

use std::{fmt, fs, path::Path, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{grader::TestCase, CauldronError, CauldronResult};

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use session::*;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const BUNDLED_CATALOG: &str = include_str!("catalog.json");

static FUNCTION_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"function\s+(\w+)").expect("function declaration pattern should be valid")
});

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Difficulty tier of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// First steps
    Novato,

    /// Everyday techniques
    Intermedio,

    /// Patterns and algorithms
    Avanzado,

    /// Hardest tier
    Legendario,
}

/// Language a challenge is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Executable and gradable
    Javascript,

    /// Markup, never executed
    Html,

    /// Stylesheets, never executed
    Css,
}

/// The lesson attached to a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theory {
    /// Name of the concept
    pub concept: String,

    /// Markdown explanation
    pub explanation: String,

    /// Short takeaways
    #[serde(default)]
    pub key_points: Vec<String>,

    /// Where the concept shows up in practice
    pub real_world_use: String,
}

/// A programming exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    /// Stable identifier, e.g. `js-novato-001`
    pub id: String,

    /// Display title
    pub title: String,

    /// Difficulty tier
    pub level: Level,

    /// Language of the starter code
    pub language: Language,

    /// What the learner has to build
    pub description: String,

    /// The lesson
    pub theory: Theory,

    /// Code the editor starts with
    pub starter_code: String,

    /// Graded tests. May be empty.
    #[serde(default)]
    pub tests: Vec<TestCase>,

    /// Reference solution
    pub solution: String,

    /// Progressive hints
    #[serde(default)]
    pub hints: Vec<String>,
}

/// An ordered collection of challenges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    challenges: Vec<Challenge>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Level {
    /// All levels, easiest first.
    pub const ALL: [Level; 4] = [Level::Novato, Level::Intermedio, Level::Avanzado, Level::Legendario];

    /// Icon shown next to the level.
    pub fn icon(&self) -> &'static str {
        match self {
            Level::Novato => "🌱",
            Level::Intermedio => "🔥",
            Level::Avanzado => "⚡",
            Level::Legendario => "💀",
        }
    }

    /// Capitalized name of the level.
    pub fn display_name(&self) -> &'static str {
        match self {
            Level::Novato => "Novato",
            Level::Intermedio => "Intermedio",
            Level::Avanzado => "Avanzado",
            Level::Legendario => "Legendario",
        }
    }

    /// Lowercase identifier as used in content files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Novato => "novato",
            Level::Intermedio => "intermedio",
            Level::Avanzado => "avanzado",
            Level::Legendario => "legendario",
        }
    }
}

impl Language {
    /// Icon shown next to the language.
    pub fn icon(&self) -> &'static str {
        match self {
            Language::Javascript => "🟨",
            Language::Html => "🟧",
            Language::Css => "🟦",
        }
    }

    /// Lowercase identifier as used in content files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Javascript => "javascript",
            Language::Html => "html",
            Language::Css => "css",
        }
    }

    /// Whether submissions in this language can be run and graded.
    pub fn is_executable(&self) -> bool {
        matches!(self, Language::Javascript)
    }

    fn is_markup(&self) -> bool {
        matches!(self, Language::Html | Language::Css)
    }
}

impl Challenge {
    /// Name of the function under test, taken from the starter code.
    pub fn function_name(&self) -> Option<&str> {
        extract_function_name(&self.starter_code)
    }

    /// Whether the challenge has graded tests.
    pub fn has_tests(&self) -> bool {
        !self.tests.is_empty()
    }
}

impl Catalog {
    /// Creates a catalog from a list of challenges.
    pub fn new(challenges: Vec<Challenge>) -> Self {
        Self { challenges }
    }

    /// The challenges shipped with the crate.
    pub fn bundled() -> CauldronResult<Self> {
        Self::from_json(BUNDLED_CATALOG)
    }

    /// Parses a catalog document: `{"challenges": [...]}`.
    pub fn from_json(json: &str) -> CauldronResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a catalog document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> CauldronResult<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading challenge catalog");
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Looks up a challenge by id.
    pub fn get(&self, id: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.id == id)
    }

    /// Looks up a challenge by id, failing if it does not exist.
    pub fn find(&self, id: &str) -> CauldronResult<&Challenge> {
        self.get(id)
            .ok_or_else(|| CauldronError::ChallengeNotFound(id.to_string()))
    }

    /// Challenges for `language`. HTML and CSS share the markup challenges.
    pub fn by_language(&self, language: Language) -> Vec<&Challenge> {
        self.challenges
            .iter()
            .filter(|c| c.language == language || (language.is_markup() && c.language.is_markup()))
            .collect()
    }

    /// Challenges of `level`, in catalog order.
    pub fn by_level(&self, level: Level) -> Vec<&Challenge> {
        self.challenges.iter().filter(|c| c.level == level).collect()
    }

    /// All challenges in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Challenge> {
        self.challenges.iter()
    }

    /// Number of challenges.
    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = CauldronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| {
                CauldronError::InvalidConfig(format!(
                    "unknown level '{}'. Valid levels: novato, intermedio, avanzado, legendario",
                    s
                ))
            })
    }
}

impl FromStr for Language {
    type Err = CauldronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "javascript" | "js" => Ok(Language::Javascript),
            "html" => Ok(Language::Html),
            "css" => Ok(Language::Css),
            other => Err(CauldronError::UnsupportedLanguage(other.to_string())),
        }
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Challenge;
    type IntoIter = std::slice::Iter<'a, Challenge>;

    fn into_iter(self) -> Self::IntoIter {
        self.challenges.iter()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Name of the first `function <name>` declaration in `code`.
pub fn extract_function_name(code: &str) -> Option<&str> {
    FUNCTION_DECLARATION
        .captures(code)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::grader;

    #[test]
    fn test_bundled_catalog_loads() {
        let catalog = Catalog::bundled().unwrap();
        assert!(!catalog.is_empty());

        let first = catalog.get("js-novato-001").unwrap();
        assert_eq!(first.level, Level::Novato);
        assert_eq!(first.language, Language::Javascript);
        assert_eq!(first.function_name(), Some("translatePossessed"));
        assert_eq!(first.tests.len(), 3);
        assert!(!first.theory.key_points.is_empty());
    }

    #[test]
    fn test_bundled_solutions_pass_their_tests() {
        let catalog = Catalog::bundled().unwrap();

        for challenge in catalog.iter().filter(|c| c.has_tests()) {
            let name = challenge.function_name().unwrap();
            let results = grader::run_tests(&challenge.solution, &challenge.tests, name);

            assert_eq!(results.len(), challenge.tests.len(), "{}", challenge.id);
            for result in results {
                assert!(result.passed, "{}: {}", challenge.id, result.message);
            }
        }
    }

    #[test]
    fn test_starter_code_does_not_pass() {
        let catalog = Catalog::bundled().unwrap();
        let challenge = catalog.get("js-novato-002").unwrap();
        let results = grader::run_tests(
            &challenge.starter_code,
            &challenge.tests,
            challenge.function_name().unwrap(),
        );

        assert!(results.iter().any(|r| !r.passed));
    }

    #[test]
    fn test_filters() {
        let catalog = Catalog::bundled().unwrap();

        let novato = catalog.by_level(Level::Novato);
        assert!(novato.iter().all(|c| c.level == Level::Novato));
        assert!(!novato.is_empty());

        let javascript = catalog.by_language(Language::Javascript);
        assert!(javascript.iter().all(|c| c.language == Language::Javascript));

        assert_eq!(
            catalog.by_language(Language::Css).len(),
            catalog.by_language(Language::Html).len()
        );
        assert!(catalog.find("nope").is_err());
    }

    #[test]
    fn test_extract_function_name() {
        assert_eq!(extract_function_name("function suma(a, b) {}"), Some("suma"));
        assert_eq!(
            extract_function_name("// helper\nfunction  first() {}\nfunction second() {}"),
            Some("first")
        );
        assert_eq!(extract_function_name("const f = () => 1;"), None);
    }

    #[test]
    fn test_level_presentation() {
        assert_eq!(Level::Novato.icon(), "🌱");
        assert_eq!(Level::Legendario.icon(), "💀");
        assert_eq!(Level::Avanzado.display_name(), "Avanzado");
        assert_eq!("Intermedio".parse::<Level>().unwrap(), Level::Intermedio);
        assert!("experto".parse::<Level>().is_err());
        assert!(matches!(
            "python".parse::<Language>(),
            Err(CauldronError::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"challenges":[{{"id":"x","title":"X","level":"avanzado","language":"javascript",
            "description":"d","theory":{{"concept":"c","explanation":"e","realWorldUse":"r"}},
            "starterCode":"function x() {{}}","solution":"function x() {{ return 1; }}"}}]}}"#
        )
        .unwrap();

        let catalog = Catalog::from_path(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        let challenge = catalog.get("x").unwrap();
        assert!(!challenge.has_tests());
        assert!(challenge.hints.is_empty());
        assert_eq!(challenge.function_name(), Some("x"));
    }
}
