//! Dependency descriptors from application manifests
//!
//! A manifest line such as `runtime: >=1.2.0` names a component, the version
//! it needs and how that version is matched. Once a component is found on
//! disk the dependency records where and which version was picked.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use ferry_core::{AccessorObject, BridgeError, BridgeResult, Value};
use parking_lot::RwLock;
use tracing::debug;

/// Kind of component a dependency refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyType {
    Module,
    Runtime,
    Sdk,
    MobileSdk,
    AppUpdate,
    Unknown,
}

impl DependencyType {
    /// Manifest keys other than the well-known component names are modules
    pub fn from_key(key: &str) -> Self {
        match key {
            "runtime" => Self::Runtime,
            "sdk" => Self::Sdk,
            "mobilesdk" => Self::MobileSdk,
            "app_update" => Self::AppUpdate,
            "" => Self::Unknown,
            _ => Self::Module,
        }
    }

    /// Numeric code exposed to scripts
    pub fn code(self) -> i32 {
        match self {
            Self::Module => 0,
            Self::Runtime => 1,
            Self::Sdk => 2,
            Self::MobileSdk => 3,
            Self::AppUpdate => 4,
            Self::Unknown => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Module => "MODULE",
            Self::Runtime => "RUNTIME",
            Self::Sdk => "SDK",
            Self::MobileSdk => "MOBILESDK",
            Self::AppUpdate => "APP_UPDATE",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub const ALL: [DependencyType; 6] = [
        Self::Module,
        Self::Runtime,
        Self::Sdk,
        Self::MobileSdk,
        Self::AppUpdate,
        Self::Unknown,
    ];
}

/// How a candidate version is matched against the required one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Requirement {
    /// Split a leading operator off `text`. Without one the requirement is
    /// an exact match.
    pub fn split(text: &str) -> (Self, &str) {
        let text = text.trim();
        for (prefix, requirement) in [
            (">=", Self::Gte),
            ("<=", Self::Lte),
            (">", Self::Gt),
            ("<", Self::Lt),
            ("=", Self::Eq),
        ] {
            if let Some(rest) = text.strip_prefix(prefix) {
                return (requirement, rest.trim());
            }
        }
        (Self::Eq, text)
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Eq => 0,
            Self::Gt => 1,
            Self::Lt => 2,
            Self::Gte => 3,
            Self::Lte => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Gt => "GT",
            Self::Lt => "LT",
            Self::Gte => "GTE",
            Self::Lte => "LTE",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }

    /// Whether `candidate` compared against the required version passes
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Lt => ordering == Ordering::Less,
            Self::Gte => ordering != Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
        }
    }

    pub const ALL: [Requirement; 5] = [Self::Eq, Self::Gt, Self::Lt, Self::Gte, Self::Lte];
}

/// Leading decimal digits of `part`, 0 when there are none
fn component(part: &str) -> u64 {
    let digits = part
        .trim()
        .find(|c: char| !c.is_ascii_digit())
        .map_or(part.trim(), |end| &part.trim()[..end]);
    digits.parse().unwrap_or(0)
}

/// Compare dotted versions component by component
///
/// An empty version sorts before any other; when one version is a prefix of
/// the other, the longer one is greater.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }
    let left: Vec<&str> = a.split('.').collect();
    let right: Vec<&str> = b.split('.').collect();
    for (x, y) in left.iter().zip(&right) {
        match component(x).cmp(&component(y)) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    left.len().cmp(&right.len())
}

/// Where a dependency was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: String,
    pub version: String,
}

/// A component an application needs
#[derive(Debug)]
pub struct Dependency {
    dep_type: DependencyType,
    name: String,
    version: String,
    requirement: Requirement,
    resolution: RwLock<Option<Resolution>>,
}

impl Dependency {
    pub fn new(
        dep_type: DependencyType,
        name: impl Into<String>,
        version: impl Into<String>,
        requirement: Requirement,
    ) -> Self {
        Self {
            dep_type,
            name: name.into(),
            version: version.into(),
            requirement,
            resolution: RwLock::new(None),
        }
    }

    /// Build a dependency from a manifest `key: value` pair
    pub fn from_manifest_line(key: &str, value: &str) -> Self {
        let key = key.trim();
        let (requirement, version) = Requirement::split(value);
        Self::new(DependencyType::from_key(key), key, version, requirement)
    }

    /// Parse a raw `key: value` line
    pub fn parse_line(line: &str) -> BridgeResult<Self> {
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| BridgeError::native(format!("Malformed manifest line: {line}")))?;
        if key.trim().is_empty() {
            return Err(BridgeError::native(format!(
                "Manifest line has no component name: {line}"
            )));
        }
        Ok(Self::from_manifest_line(key, value))
    }

    pub fn dep_type(&self) -> DependencyType {
        self.dep_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    pub fn is_satisfied_by(&self, candidate: &str) -> bool {
        self.requirement
            .accepts(compare_versions(candidate, &self.version))
    }

    /// Record where the component was found
    pub fn resolve(&self, path: impl Into<String>, version: impl Into<String>) -> BridgeResult<()> {
        let version = version.into();
        if !self.is_satisfied_by(&version) {
            return Err(BridgeError::native(format!(
                "{} {} does not satisfy {}",
                self.name, version, self
            )));
        }
        let path = path.into();
        debug!(dependency = %self.name, %version, %path, "dependency resolved");
        *self.resolution.write() = Some(Resolution { path, version });
        Ok(())
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution.read().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.read().is_some()
    }

    /// Pick the greatest satisfying version from `candidates` of
    /// `(path, version)` pairs
    pub fn resolve_best<'a, I>(&self, candidates: I) -> BridgeResult<Resolution>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let best = candidates
            .into_iter()
            .filter(|(_, version)| self.is_satisfied_by(version))
            .max_by(|(_, a), (_, b)| compare_versions(a, b))
            .ok_or_else(|| {
                BridgeError::native(format!("No installed version satisfies {}", self))
            })?;
        self.resolve(best.0, best.1)?;
        Ok(Resolution {
            path: best.0.to_string(),
            version: best.1.to_string(),
        })
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.requirement.symbol(), self.version)
    }
}

/// Script-facing view of a [`Dependency`]
///
/// Every property is read-only; `resolvedPath` and `resolvedVersion` are
/// null until the dependency is resolved.
pub fn dependency_binding(dependency: Arc<Dependency>) -> AccessorObject {
    let binding = AccessorObject::new("Dependency");
    let dep = dependency.clone();
    binding.define_getter("type", move || Ok(Value::int(dep.dep_type().code())));
    let dep = dependency.clone();
    binding.define_getter("name", move || Ok(Value::string(dep.name())));
    let dep = dependency.clone();
    binding.define_getter("version", move || Ok(Value::string(dep.version())));
    let dep = dependency.clone();
    binding.define_getter("requirement", move || {
        Ok(Value::int(dep.requirement().code()))
    });
    let dep = dependency.clone();
    binding.define_getter("resolvedPath", move || {
        Ok(dep
            .resolution()
            .map_or(Value::Null, |r| Value::string(r.path)))
    });
    binding.define_getter("resolvedVersion", move || {
        Ok(dependency
            .resolution()
            .map_or(Value::Null, |r| Value::string(r.version)))
    });

    for dep_type in DependencyType::ALL {
        binding
            .table()
            .define_constant(dep_type.name(), Value::int(dep_type.code()));
    }
    for requirement in Requirement::ALL {
        binding
            .table()
            .define_constant(requirement.name(), Value::int(requirement.code()));
    }
    binding
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::{Object, ObjectExt};
    use proptest::prelude::*;

    #[test]
    fn test_from_manifest_line() {
        let dep = Dependency::from_manifest_line("runtime", " >= 1.2.0");
        assert_eq!(dep.dep_type(), DependencyType::Runtime);
        assert_eq!(dep.name(), "runtime");
        assert_eq!(dep.version(), "1.2.0");
        assert_eq!(dep.requirement(), Requirement::Gte);

        let module = Dependency::parse_line("tide.network: 1.0").unwrap();
        assert_eq!(module.dep_type(), DependencyType::Module);
        assert_eq!(module.requirement(), Requirement::Eq);
        assert_eq!(module.to_string(), "tide.network=1.0");
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(Dependency::parse_line("no separator").is_err());
        assert!(Dependency::parse_line(": 1.0").is_err());
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.2.0", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Less);
        assert_eq!(compare_versions("", "0"), Ordering::Less);
        assert_eq!(compare_versions("2.0rc1", "2.0"), Ordering::Equal);
    }

    #[test]
    fn test_requirements() {
        let cases = [
            (">=1.2", "1.2", true),
            (">=1.2", "1.1.9", false),
            (">1.2", "1.2", false),
            ("<2", "1.9.9", true),
            ("<=2", "2", true),
            ("=1.0", "1.0", true),
            ("1.0", "1.1", false),
        ];
        for (wanted, candidate, expected) in cases {
            let dep = Dependency::from_manifest_line("sdk", wanted);
            assert_eq!(dep.is_satisfied_by(candidate), expected, "{wanted} vs {candidate}");
        }
    }

    #[test]
    fn test_resolve_best() {
        let dep = Dependency::from_manifest_line("runtime", ">=1.2");
        let picked = dep
            .resolve_best([("/a", "1.1"), ("/b", "1.3"), ("/c", "1.2.5")])
            .unwrap();
        assert_eq!(picked.path, "/b");
        assert!(dep.is_resolved());

        let strict = Dependency::from_manifest_line("runtime", ">9");
        assert!(strict.resolve_best([("/a", "1.0")]).is_err());
        assert!(!strict.is_resolved());
    }

    #[test]
    fn test_binding_properties_are_read_only() {
        let dep = Arc::new(Dependency::from_manifest_line("runtime", ">=1.0"));
        let binding = dependency_binding(dep.clone());

        assert_eq!(binding.get("name").unwrap(), Value::string("runtime"));
        assert_eq!(binding.get_int("type", -1).unwrap(), 1);
        assert_eq!(binding.get_int("requirement", -1).unwrap(), 3);
        assert_eq!(binding.get("GTE").unwrap(), Value::int(3));
        assert!(binding.get("resolvedPath").unwrap().is_null());

        dep.resolve("/opt/runtime/1.4", "1.4").unwrap();
        assert_eq!(
            binding.get("resolvedPath").unwrap(),
            Value::string("/opt/runtime/1.4")
        );

        let err = binding
            .set("resolvedPath", Value::string("/tmp"))
            .unwrap_err();
        assert_eq!(err.kind(), "PropertyRejected");
        assert!(binding.set("GTE", Value::int(0)).is_err());
        assert_eq!(
            binding.get("resolvedPath").unwrap(),
            Value::string("/opt/runtime/1.4")
        );
    }

    proptest! {
        #[test]
        fn prop_compare_versions_is_antisymmetric(
            a in proptest::collection::vec(0u32..20, 1..4),
            b in proptest::collection::vec(0u32..20, 1..4),
        ) {
            let a = a.iter().map(u32::to_string).collect::<Vec<_>>().join(".");
            let b = b.iter().map(u32::to_string).collect::<Vec<_>>().join(".");
            prop_assert_eq!(compare_versions(&a, &b), compare_versions(&b, &a).reverse());
        }
    }
}
