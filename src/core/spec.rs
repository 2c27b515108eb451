//! Gem specification (package descriptor).
//!
//! A `GemSpec` is the mutable, typed view of a gem's `metadata.gz` YAML
//! document. Only the attributes the compiler reads or rewrites are typed;
//! every other key of the original document is carried through untouched so
//! the rebuilt gem loses nothing.

use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::core::platform::RUBY_PLATFORM;
use crate::core::version::{Constraint, GemVersion, Requirement, VersionError};

const SPEC_TAG: &str = "!ruby/object:Gem::Specification";
const VERSION_TAG: &str = "!ruby/object:Gem::Version";
const REQUIREMENT_TAG: &str = "!ruby/object:Gem::Requirement";

/// Error reading gem metadata.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("invalid gem metadata: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("gem metadata is not a Gem::Specification")]
    NotASpecification,

    #[error("gem metadata is missing `{0}`")]
    MissingField(&'static str),

    #[error("invalid gem metadata: {0}")]
    Version(#[from] VersionError),
}

/// Dependency type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Runtime,
    Development,
}

/// A declared dependency of the gem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub requirement: Requirement,
    pub kind: DependencyKind,
}

/// The package descriptor of a gem.
#[derive(Debug, Clone)]
pub struct GemSpec {
    pub name: String,
    pub version: GemVersion,
    pub platform: String,
    /// The file manifest, relative to the gem root.
    pub files: Vec<String>,
    /// Native extension build entry points.
    pub extensions: Vec<String>,
    /// Library roots, `lib` by default.
    pub require_paths: Vec<String>,
    pub required_ruby_version: Requirement,
    pub required_rubygems_version: Requirement,
    pub rubygems_version: Option<String>,
    pub dependencies: Vec<Dependency>,
    doc: Mapping,
}

impl GemSpec {
    /// Create a minimal source (`ruby` platform) specification.
    pub fn new(name: impl Into<String>, version: GemVersion) -> Self {
        let name = name.into();
        let mut doc = Mapping::new();
        doc.insert(key("summary"), Value::String(format!("{} gem", name)));
        doc.insert(key("authors"), Value::Sequence(Vec::new()));
        doc.insert(key("specification_version"), Value::Number(4.into()));
        doc.insert(key("dependencies"), Value::Sequence(Vec::new()));

        GemSpec {
            name,
            version,
            platform: RUBY_PLATFORM.to_string(),
            files: Vec::new(),
            extensions: Vec::new(),
            require_paths: vec!["lib".to_string()],
            required_ruby_version: Requirement::default(),
            required_rubygems_version: Requirement::default(),
            rubygems_version: None,
            dependencies: Vec::new(),
            doc,
        }
    }

    /// Parse the YAML document stored in `metadata.gz`.
    pub fn from_yaml(yaml: &str) -> Result<Self, SpecError> {
        let value: Value = serde_yaml::from_str(yaml)?;

        let doc = match value {
            Value::Tagged(tagged) => {
                if tagged.tag != Tag::new(SPEC_TAG) {
                    return Err(SpecError::NotASpecification);
                }
                match tagged.value {
                    Value::Mapping(m) => m,
                    _ => return Err(SpecError::NotASpecification),
                }
            }
            Value::Mapping(m) => m,
            _ => return Err(SpecError::NotASpecification),
        };

        let name = doc
            .get("name")
            .and_then(scalar_string)
            .ok_or(SpecError::MissingField("name"))?;
        let version = doc
            .get("version")
            .ok_or(SpecError::MissingField("version"))
            .and_then(parse_version)?;
        let platform = doc
            .get("platform")
            .and_then(scalar_string)
            .unwrap_or_else(|| RUBY_PLATFORM.to_string());

        let mut require_paths = string_list(doc.get("require_paths"));
        if require_paths.is_empty() {
            require_paths.push("lib".to_string());
        }

        let dependencies = match doc.get("dependencies").map(untag) {
            Some(Value::Sequence(seq)) => seq
                .iter()
                .map(parse_dependency)
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };

        Ok(GemSpec {
            files: string_list(doc.get("files")),
            extensions: string_list(doc.get("extensions")),
            required_ruby_version: parse_requirement(doc.get("required_ruby_version"))?,
            required_rubygems_version: parse_requirement(doc.get("required_rubygems_version"))?,
            rubygems_version: doc.get("rubygems_version").and_then(scalar_string),
            name,
            version,
            platform,
            require_paths,
            dependencies,
            doc,
        })
    }

    /// Serialize back to a tagged `Gem::Specification` YAML document.
    pub fn to_yaml(&self) -> Result<String, SpecError> {
        let mut doc = self.doc.clone();

        doc.insert(key("name"), Value::String(self.name.clone()));
        doc.insert(key("version"), version_value(&self.version));
        doc.insert(key("platform"), Value::String(self.platform.clone()));
        doc.insert(key("files"), string_seq(&self.files));
        doc.insert(key("extensions"), string_seq(&self.extensions));
        doc.insert(key("require_paths"), string_seq(&self.require_paths));
        doc.insert(
            key("required_ruby_version"),
            requirement_value(&self.required_ruby_version),
        );
        doc.insert(
            key("required_rubygems_version"),
            requirement_value(&self.required_rubygems_version),
        );
        if let Some(ref v) = self.rubygems_version {
            doc.insert(key("rubygems_version"), Value::String(v.clone()));
        }

        let yaml = serde_yaml::to_string(&tagged(SPEC_TAG, Value::Mapping(doc)))?;
        Ok(format!("--- {}", yaml))
    }

    /// `name-version`, plus `-platform` for platform specific gems.
    pub fn full_name(&self) -> String {
        if self.platform == RUBY_PLATFORM {
            format!("{}-{}", self.name, self.version)
        } else {
            format!("{}-{}-{}", self.name, self.version, self.platform)
        }
    }

    /// File name of the gem archive for this specification.
    pub fn file_name(&self) -> String {
        format!("{}.gem", self.full_name())
    }

    /// Whether the gem is the generic `ruby` platform.
    pub fn is_source(&self) -> bool {
        self.platform == RUBY_PLATFORM
    }

    /// Add a file to the manifest unless it is already listed.
    ///
    /// Returns `true` when the file was added.
    pub fn add_file(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.files.iter().any(|f| *f == path) {
            return false;
        }
        self.files.push(path);
        true
    }
}

fn key(s: &str) -> Value {
    Value::String(s.to_string())
}

fn tagged(tag: &str, value: Value) -> Value {
    Value::Tagged(Box::new(TaggedValue {
        tag: Tag::new(tag),
        value,
    }))
}

fn untag(v: &Value) -> &Value {
    match v {
        Value::Tagged(t) => untag(&t.value),
        other => other,
    }
}

fn scalar_string(v: &Value) -> Option<String> {
    match untag(v) {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    match v.map(untag) {
        Some(Value::Sequence(seq)) => seq.iter().filter_map(scalar_string).collect(),
        Some(other) => scalar_string(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn string_seq(items: &[String]) -> Value {
    Value::Sequence(items.iter().cloned().map(Value::String).collect())
}

/// `!ruby/object:Gem::Version { version: "1.0" }`
fn parse_version(v: &Value) -> Result<GemVersion, SpecError> {
    let raw = match untag(v) {
        Value::Mapping(m) => m.get("version").and_then(scalar_string),
        other => scalar_string(other),
    }
    .ok_or(SpecError::MissingField("version"))?;
    Ok(GemVersion::parse(&raw)?)
}

fn version_value(v: &GemVersion) -> Value {
    let mut m = Mapping::new();
    m.insert(key("version"), Value::String(v.to_string()));
    tagged(VERSION_TAG, Value::Mapping(m))
}

/// `!ruby/object:Gem::Requirement { requirements: [[op, version], ...] }`
fn parse_requirement(v: Option<&Value>) -> Result<Requirement, SpecError> {
    let Some(v) = v else {
        return Ok(Requirement::default());
    };

    let pairs = match untag(v) {
        Value::Mapping(m) => match m.get("requirements").map(untag) {
            Some(Value::Sequence(seq)) => seq,
            _ => return Ok(Requirement::default()),
        },
        Value::String(s) => return Ok(Requirement::parse(s)?),
        _ => return Ok(Requirement::default()),
    };

    let mut constraints = Vec::new();
    for pair in pairs {
        let Value::Sequence(parts) = untag(pair) else {
            return Err(SpecError::MissingField("requirements"));
        };
        let (Some(op), Some(version)) = (parts.first(), parts.get(1)) else {
            return Err(SpecError::MissingField("requirements"));
        };
        let op = scalar_string(op).ok_or(SpecError::MissingField("requirements"))?;
        let version = parse_version(version)?;
        constraints.push(Constraint::from_parts(&op, version.as_str())?);
    }

    Ok(Requirement::from_constraints(constraints))
}

fn requirement_value(req: &Requirement) -> Value {
    let pairs = req
        .constraints()
        .iter()
        .map(|c| {
            Value::Sequence(vec![
                Value::String(c.op.as_str().to_string()),
                version_value(&c.version),
            ])
        })
        .collect();

    let mut m = Mapping::new();
    m.insert(key("requirements"), Value::Sequence(pairs));
    tagged(REQUIREMENT_TAG, Value::Mapping(m))
}

fn parse_dependency(v: &Value) -> Result<Dependency, SpecError> {
    let Value::Mapping(m) = untag(v) else {
        return Err(SpecError::MissingField("dependencies"));
    };

    let name = m
        .get("name")
        .and_then(scalar_string)
        .ok_or(SpecError::MissingField("name"))?;
    let requirement = parse_requirement(m.get("requirement"))?;
    let kind = match m.get("type").and_then(scalar_string).as_deref() {
        Some(":development") | Some("development") => DependencyKind::Development,
        _ => DependencyKind::Runtime,
    };

    Ok(Dependency {
        name,
        requirement,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"--- !ruby/object:Gem::Specification
name: nokogumbo
version: !ruby/object:Gem::Version
  version: 2.0.5
platform: ruby
authors:
- Sam Ruby
bindir: bin
cert_chain: []
date: 2021-03-19 00:00:00.000000000 Z
dependencies:
- !ruby/object:Gem::Dependency
  name: nokogiri
  requirement: !ruby/object:Gem::Requirement
    requirements:
    - - ">="
      - !ruby/object:Gem::Version
        version: '1.8'
  type: :runtime
  prerelease: false
  version_requirements: !ruby/object:Gem::Requirement
    requirements:
    - - ">="
      - !ruby/object:Gem::Version
        version: '1.8'
- !ruby/object:Gem::Dependency
  name: rake
  requirement: !ruby/object:Gem::Requirement
    requirements:
    - - "~>"
      - !ruby/object:Gem::Version
        version: '13.0'
  type: :development
  prerelease: false
description: HTML5 parser
extensions:
- ext/nokogumbo/extconf.rb
files:
- lib/nokogumbo.rb
- ext/nokogumbo/extconf.rb
- ext/nokogumbo/nokogumbo.c
homepage: https://github.com/rubys/nokogumbo
licenses:
- Apache-2.0
require_paths:
- lib
required_ruby_version: !ruby/object:Gem::Requirement
  requirements:
  - - ">="
    - !ruby/object:Gem::Version
      version: '2.1'
required_rubygems_version: !ruby/object:Gem::Requirement
  requirements:
  - - ">="
    - !ruby/object:Gem::Version
      version: '0'
rubygems_version: 3.2.3
specification_version: 4
summary: Nokogiri interface to the Gumbo HTML5 parser
test_files: []
"#;

    #[test]
    fn test_from_yaml() {
        let spec = GemSpec::from_yaml(METADATA).unwrap();
        assert_eq!(spec.name, "nokogumbo");
        assert_eq!(spec.version.to_string(), "2.0.5");
        assert!(spec.is_source());
        assert_eq!(spec.extensions, vec!["ext/nokogumbo/extconf.rb"]);
        assert_eq!(spec.files.len(), 3);
        assert_eq!(spec.require_paths, vec!["lib"]);
        assert_eq!(spec.required_ruby_version.to_string(), ">= 2.1");
        assert!(spec.required_rubygems_version.is_default());
        assert_eq!(spec.rubygems_version.as_deref(), Some("3.2.3"));

        assert_eq!(spec.dependencies.len(), 2);
        assert_eq!(spec.dependencies[0].name, "nokogiri");
        assert_eq!(spec.dependencies[0].kind, DependencyKind::Runtime);
        assert_eq!(spec.dependencies[1].kind, DependencyKind::Development);
        assert_eq!(spec.dependencies[1].requirement.to_string(), "~> 13.0");
    }

    #[test]
    fn test_rewritten_yaml_keeps_tags_and_unknown_keys() {
        let mut spec = GemSpec::from_yaml(METADATA).unwrap();
        spec.platform = "x86_64-linux".to_string();
        spec.extensions.clear();
        spec.required_ruby_version = "~> 3.3.0".parse().unwrap();

        let yaml = spec.to_yaml().unwrap();
        assert!(yaml.starts_with("--- !ruby/object:Gem::Specification"));
        assert!(yaml.contains("!ruby/object:Gem::Requirement"));
        assert!(yaml.contains("homepage: https://github.com/rubys/nokogumbo"));

        let reloaded = GemSpec::from_yaml(&yaml).unwrap();
        assert_eq!(reloaded.platform, "x86_64-linux");
        assert!(reloaded.extensions.is_empty());
        assert_eq!(reloaded.required_ruby_version.to_string(), "~> 3.3.0");
        assert_eq!(reloaded.dependencies.len(), 2);
        assert_eq!(reloaded.full_name(), "nokogumbo-2.0.5-x86_64-linux");
    }

    #[test]
    fn test_not_a_specification() {
        let err = GemSpec::from_yaml("--- !ruby/object:Gem::Version\nversion: 1\n").unwrap_err();
        assert!(matches!(err, SpecError::NotASpecification));

        let err = GemSpec::from_yaml("- a\n- b\n").unwrap_err();
        assert!(matches!(err, SpecError::NotASpecification));
    }

    #[test]
    fn test_missing_name() {
        let err = GemSpec::from_yaml("version: 1.0\n").unwrap_err();
        assert!(matches!(err, SpecError::MissingField("name")));
    }

    #[test]
    fn test_full_name() {
        let mut spec = GemSpec::new("a", GemVersion::parse("1").unwrap());
        assert_eq!(spec.full_name(), "a-1");
        assert_eq!(spec.file_name(), "a-1.gem");

        spec.platform = "x86-mingw32".to_string();
        assert_eq!(spec.file_name(), "a-1-x86-mingw32.gem");
    }

    #[test]
    fn test_add_file_is_idempotent() {
        let mut spec = GemSpec::new("a", GemVersion::parse("1").unwrap());
        assert!(spec.add_file("lib/a.so"));
        assert!(!spec.add_file("lib/a.so"));
        assert_eq!(spec.files, vec!["lib/a.so"]);
    }
}
