//! Store path parsing and backend routing.
use std::fmt;
use std::path::{Path, PathBuf};

/// A registry root hive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hive {
    /// `HKEY_CURRENT_USER`.
    CurrentUser,
    /// `HKEY_LOCAL_MACHINE`.
    LocalMachine,
    /// `HKEY_CLASSES_ROOT`.
    ClassesRoot,
    /// `HKEY_USERS`.
    Users,
    /// `HKEY_CURRENT_CONFIG`.
    CurrentConfig,
}

impl Hive {
    /// Short spelling used in displayed paths (e.g. `HKCU`).
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::CurrentUser => "HKCU",
            Self::LocalMachine => "HKLM",
            Self::ClassesRoot => "HKCR",
            Self::Users => "HKU",
            Self::CurrentConfig => "HKCC",
        }
    }

    /// Whether writes under this hive affect every user of the machine.
    #[must_use]
    pub const fn is_machine_wide(self) -> bool {
        matches!(self, Self::LocalMachine | Self::Users | Self::CurrentConfig)
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.trim_end_matches(':').to_ascii_uppercase().as_str() {
            "HKCU" | "HKEY_CURRENT_USER" => Some(Self::CurrentUser),
            "HKLM" | "HKEY_LOCAL_MACHINE" => Some(Self::LocalMachine),
            "HKCR" | "HKEY_CLASSES_ROOT" => Some(Self::ClassesRoot),
            "HKU" | "HKEY_USERS" => Some(Self::Users),
            "HKCC" | "HKEY_CURRENT_CONFIG" => Some(Self::CurrentConfig),
            _ => None,
        }
    }
}

/// A hierarchical registry key: a root hive plus key segments.
///
/// # Examples
///
/// ```
/// use recovery_cli::store::path::{Hive, RegistryPath};
///
/// let path = RegistryPath::parse(r"HKCU:\Software\App").unwrap();
/// assert_eq!(path.hive(), Hive::CurrentUser);
/// assert_eq!(path.subkey(), r"Software\App");
/// assert_eq!(path.to_string(), r"HKCU:\Software\App");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistryPath {
    hive: Hive,
    segments: Vec<String>,
}

impl RegistryPath {
    /// Parse a registry path in `HKCU:\…`, `HKCU\…`, `HKEY_CURRENT_USER\…`
    /// or `Registry::HKEY_CURRENT_USER\…` form.
    ///
    /// Returns `None` when the first segment is not a recognised hive.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let without_provider = trimmed
            .get(..10)
            .filter(|prefix| prefix.eq_ignore_ascii_case("Registry::"))
            .and_then(|_| trimmed.get(10..))
            .unwrap_or(trimmed);

        let mut parts = without_provider.split(['\\', '/']);
        let hive = Hive::from_prefix(parts.next()?)?;
        let segments = parts
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        Some(Self { hive, segments })
    }

    /// The root hive.
    #[must_use]
    pub const fn hive(&self) -> Hive {
        self.hive
    }

    /// Key segments below the hive.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Key path below the hive joined with backslashes.
    #[must_use]
    pub fn subkey(&self) -> String {
        self.segments.join("\\")
    }

    /// Whether this path names the hive itself.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The parent key and the final segment, or `None` for a hive root.
    #[must_use]
    pub fn split_last(&self) -> Option<(Self, &str)> {
        let (last, parents) = self.segments.split_last()?;
        Some((
            Self {
                hive: self.hive,
                segments: parents.to_vec(),
            },
            last.as_str(),
        ))
    }
}

impl fmt::Display for RegistryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.hive.short_name())?;
        if self.segments.is_empty() {
            f.write_str("\\")
        } else {
            write!(f, "\\{}", self.subkey())
        }
    }
}

/// A parsed state store path, routed to its backend once at parse time.
///
/// # Examples
///
/// ```
/// use recovery_cli::store::StorePath;
///
/// assert!(matches!(StorePath::parse(r"HKLM\Software"), StorePath::Registry(_)));
/// assert!(matches!(StorePath::parse(r"C:\Users\me\app.ini"), StorePath::File(_)));
/// assert!(matches!(StorePath::parse("/etc/app.conf"), StorePath::File(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorePath {
    /// A key in the registry-like backend.
    Registry(RegistryPath),
    /// A path in the file-like backend.
    File(PathBuf),
}

impl StorePath {
    /// Parse a raw path: a recognised registry root selects the registry
    /// backend, anything else the file backend.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        RegistryPath::parse(raw).map_or_else(|| Self::File(PathBuf::from(raw)), Self::Registry)
    }

    /// Build a file path.
    #[must_use]
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    /// Name of the backend this path routes to.
    #[must_use]
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::Registry(_) => "registry",
            Self::File(_) => "file",
        }
    }
}

impl From<&str> for StorePath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(path) => write!(f, "{path}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}
