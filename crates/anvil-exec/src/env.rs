//! Platform-aware construction of child-process environments.
//!
//! The provider is resolved once per invocation from the host OS and the
//! captured client environment; building an environment for a spawn never
//! touches the ambient process environment and never mutates the capture.

use anvil_core::{EnvRequest, HostOs};
use std::collections::BTreeMap;

/// Variables the Darwin provider forwards so native toolchains can locate
/// themselves.
const DARWIN_TOOLCHAIN_VARS: [&str; 2] = ["DEVELOPER_DIR", "SDKROOT"];

/// Builds concrete child-process environments for one host platform.
#[derive(Debug, Clone)]
pub struct EnvironmentProvider {
    host: HostOs,
    client_env: BTreeMap<String, String>,
}

impl EnvironmentProvider {
    /// Select the provider variant for `host`, capturing `client_env`.
    ///
    /// Total over all hosts: anything that is not Darwin or Windows gets
    /// POSIX inheritance rules.
    pub fn resolve(host: HostOs, client_env: &BTreeMap<String, String>) -> Self {
        Self {
            host,
            client_env: client_env.clone(),
        }
    }

    /// The platform this provider was resolved for.
    pub fn host(&self) -> HostOs {
        self.host
    }

    /// Build the environment mapping for a child process.
    ///
    /// `request` is the action's declared environment; `pass_through`
    /// names client variables forwarded regardless of the request.
    /// Deterministic: the same provider and request always produce the
    /// same mapping.
    pub fn build_env(
        &self,
        request: &EnvRequest,
        pass_through: &[String],
    ) -> BTreeMap<String, String> {
        let mut env = match request {
            EnvRequest::InheritClient => self.client_env.clone(),
            EnvRequest::Explicit(vars) => vars.clone(),
        };

        for name in pass_through {
            if let Some(value) = self.client_env.get(name) {
                env.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }

        match self.host {
            HostOs::Posix => {}
            HostOs::Darwin => {
                for name in DARWIN_TOOLCHAIN_VARS {
                    if let Some(value) = self.client_env.get(name) {
                        env.insert(name.to_owned(), value.clone());
                    }
                }
            }
            HostOs::Windows => {
                // Windows children are unusable without these; they also
                // serve as the variant's marker variables.
                let system_root = self
                    .client_env
                    .get("SYSTEMROOT")
                    .cloned()
                    .unwrap_or_else(|| "C:\\Windows".to_owned());
                let system_drive = self
                    .client_env
                    .get("SYSTEMDRIVE")
                    .cloned()
                    .unwrap_or_else(|| "C:".to_owned());
                env.insert("SYSTEMROOT".to_owned(), system_root);
                env.insert("SYSTEMDRIVE".to_owned(), system_drive);
            }
        }

        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_env() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("PATH".to_owned(), "/usr/bin".to_owned()),
            ("HOME".to_owned(), "/home/dev".to_owned()),
            ("DEVELOPER_DIR".to_owned(), "/Applications/Xcode".to_owned()),
        ])
    }

    #[test]
    fn test_posix_inherit_all() {
        let provider = EnvironmentProvider::resolve(HostOs::Posix, &client_env());
        let env = provider.build_env(&EnvRequest::InheritClient, &[]);
        assert_eq!(env, client_env());
    }

    #[test]
    fn test_posix_explicit_subset() {
        let provider = EnvironmentProvider::resolve(HostOs::Posix, &client_env());
        let requested = BTreeMap::from([("LANG".to_owned(), "C".to_owned())]);
        let env = provider.build_env(&EnvRequest::Explicit(requested.clone()), &[]);
        assert_eq!(env, requested);
    }

    #[test]
    fn test_darwin_injects_toolchain_vars() {
        let provider = EnvironmentProvider::resolve(HostOs::Darwin, &client_env());
        let env = provider.build_env(&EnvRequest::Explicit(BTreeMap::new()), &[]);
        assert_eq!(
            env.get("DEVELOPER_DIR").map(String::as_str),
            Some("/Applications/Xcode")
        );
        // SDKROOT absent from the client env stays absent.
        assert!(!env.contains_key("SDKROOT"));
    }

    #[test]
    fn test_windows_always_carries_markers() {
        let provider = EnvironmentProvider::resolve(HostOs::Windows, &client_env());
        let env = provider.build_env(&EnvRequest::Explicit(BTreeMap::new()), &[]);
        assert_eq!(env.get("SYSTEMROOT").map(String::as_str), Some("C:\\Windows"));
        assert_eq!(env.get("SYSTEMDRIVE").map(String::as_str), Some("C:"));
    }

    #[test]
    fn test_pass_through_does_not_override_request() {
        let provider = EnvironmentProvider::resolve(HostOs::Posix, &client_env());
        let requested = BTreeMap::from([("HOME".to_owned(), "/sandbox".to_owned())]);
        let env = provider.build_env(
            &EnvRequest::Explicit(requested),
            &["HOME".to_owned(), "PATH".to_owned()],
        );
        assert_eq!(env.get("HOME").map(String::as_str), Some("/sandbox"));
        assert_eq!(env.get("PATH").map(String::as_str), Some("/usr/bin"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let provider = EnvironmentProvider::resolve(HostOs::Windows, &client_env());
        let first = provider.build_env(&EnvRequest::InheritClient, &[]);
        let second = provider.build_env(&EnvRequest::InheritClient, &[]);
        assert_eq!(first, second);
    }
}
