use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::StorageError;

/// Opaque content hash reported by the remote source for one resource.
///
/// Only equality matters; the engine never inspects the contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Marker stored after a unit's records were cleared. Never equal to a
    /// hash reported by the remote source, so the next sync refetches.
    pub fn cleared() -> Self {
        Self(String::new())
    }

    pub fn is_cleared(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dimensions of the sync parameters a key is namespaced by.
pub trait SyncParams: Send + Sync {
    /// Content language, e.g. `cs` or `en`.
    fn language(&self) -> Option<&str>;

    /// Cafeteria subsystem the data belongs to.
    fn subsystem(&self) -> Option<u32>;
}

impl SyncParams for () {
    fn language(&self) -> Option<&str> {
        None
    }

    fn subsystem(&self) -> Option<u32> {
        None
    }
}

/// Which parameter dimensions take part in a stored key.
///
/// Every unit and dataset declares its scope explicitly. Pictograms, for
/// example, are shared by all subsystems but still differ per language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    Global,
    Language,
    Subsystem,
    LanguageAndSubsystem,
}

impl KeyScope {
    /// Render the discriminator string for `params` under this scope.
    pub fn discriminator<P: SyncParams + ?Sized>(&self, params: &P) -> String {
        let language = || format!("lang={}", params.language().unwrap_or("-"));
        let subsystem = || match params.subsystem() {
            Some(id) => format!("subsystem={id}"),
            None => "subsystem=-".to_owned(),
        };

        match self {
            Self::Global => "*".to_owned(),
            Self::Language => language(),
            Self::Subsystem => subsystem(),
            Self::LanguageAndSubsystem => format!("{};{}", language(), subsystem()),
        }
    }
}

/// Storage key of a fingerprint: resource name plus parameter discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FingerprintKey {
    pub resource: String,
    pub scope: String,
}

impl FingerprintKey {
    pub fn new(resource: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            scope: scope.into(),
        }
    }
}

impl fmt::Display for FingerprintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.resource, self.scope)
    }
}

/// Last applied fingerprint per resource key.
///
/// A missing entry is treated exactly like a changed fingerprint, so first
/// runs and wiped caches need no special handling.
pub trait FingerprintStore: Send + Sync {
    fn fingerprint(&self, key: &FingerprintKey) -> Result<Option<Fingerprint>, StorageError>;

    fn set_fingerprint(
        &self,
        key: &FingerprintKey,
        fingerprint: &Fingerprint,
    ) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Params {
        language: &'static str,
        subsystem: u32,
    }

    impl SyncParams for Params {
        fn language(&self) -> Option<&str> {
            Some(self.language)
        }

        fn subsystem(&self) -> Option<u32> {
            Some(self.subsystem)
        }
    }

    #[test]
    fn discriminator_per_scope() {
        let params = Params {
            language: "cs",
            subsystem: 7,
        };

        assert_eq!(KeyScope::Global.discriminator(&params), "*");
        assert_eq!(KeyScope::Language.discriminator(&params), "lang=cs");
        assert_eq!(KeyScope::Subsystem.discriminator(&params), "subsystem=7");
        assert_eq!(
            KeyScope::LanguageAndSubsystem.discriminator(&params),
            "lang=cs;subsystem=7"
        );
    }

    #[test]
    fn discriminator_marks_missing_dimensions() {
        assert_eq!(
            KeyScope::LanguageAndSubsystem.discriminator(&()),
            "lang=-;subsystem=-"
        );
    }

    #[test]
    fn language_scope_ignores_subsystem() {
        let a = Params {
            language: "en",
            subsystem: 1,
        };
        let b = Params {
            language: "en",
            subsystem: 2,
        };
        assert_eq!(
            KeyScope::Language.discriminator(&a),
            KeyScope::Language.discriminator(&b)
        );
    }

    #[test]
    fn key_display() {
        let key = FingerprintKey::new("dishes", "lang=cs");
        assert_eq!(key.to_string(), "dishes[lang=cs]");
    }
}
