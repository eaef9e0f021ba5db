//! Native Windows registry backend.
//!
//! Uses the `winreg` crate for direct registry access instead of spawning
//! `PowerShell` per value.
use std::collections::BTreeMap;
use std::io;

use winreg::enums::{
    HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS,
    KEY_READ, KEY_WRITE, RegType,
};
use winreg::{RegKey, RegValue};

use super::path::{Hive, RegistryPath};
use super::{EntryKind, StateStore, StoreData, StoreError, StorePath, Value, ValueKind};

/// Registry backend over the live Windows registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsRegistry;

fn predef(hive: Hive) -> RegKey {
    RegKey::predef(match hive {
        Hive::CurrentUser => HKEY_CURRENT_USER,
        Hive::LocalMachine => HKEY_LOCAL_MACHINE,
        Hive::ClassesRoot => HKEY_CLASSES_ROOT,
        Hive::Users => HKEY_USERS,
        Hive::CurrentConfig => HKEY_CURRENT_CONFIG,
    })
}

fn registry_path<'a>(path: &'a StorePath, operation: &str) -> Result<&'a RegistryPath, StoreError> {
    match path {
        StorePath::Registry(key) => Ok(key),
        StorePath::File(_) => Err(StoreError::Unsupported {
            backend: "registry",
            operation: operation.to_string(),
            path: path.to_string(),
        }),
    }
}

fn open(key: &RegistryPath) -> Result<RegKey, StoreError> {
    predef(key.hive())
        .open_subkey_with_flags(key.subkey(), KEY_READ)
        .map_err(|e| StoreError::from_io(key.to_string(), e))
}

/// Encode a string as the NUL-terminated UTF-16LE payload of `REG_EXPAND_SZ`.
fn utf16_bytes(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn read_value(key: &RegKey, name: &str, location: &str) -> Result<Value, StoreError> {
    let io_err = |e: io::Error| StoreError::from_io(location.to_string(), e);
    let raw = key.get_raw_value(name).map_err(io_err)?;
    let value = match raw.vtype {
        RegType::REG_SZ => Value::String(key.get_value(name).map_err(io_err)?),
        RegType::REG_EXPAND_SZ => Value::ExpandString(key.get_value(name).map_err(io_err)?),
        RegType::REG_MULTI_SZ => Value::MultiString(key.get_value(name).map_err(io_err)?),
        RegType::REG_DWORD => Value::Dword(key.get_value(name).map_err(io_err)?),
        RegType::REG_QWORD => Value::Qword(key.get_value(name).map_err(io_err)?),
        _ => Value::Binary(raw.bytes.to_vec()),
    };
    Ok(value)
}

impl StateStore for WindowsRegistry {
    fn exists(&self, path: &StorePath) -> bool {
        matches!(path, StorePath::Registry(key) if open(key).is_ok())
    }

    fn get(&self, path: &StorePath, name: Option<&str>) -> Result<StoreData, StoreError> {
        let key_path = registry_path(path, "get")?;
        let key = open(key_path)?;
        match name {
            Some(name) => {
                read_value(&key, name, &format!("{key_path}\\{name}")).map(StoreData::Value)
            }
            None => {
                let mut values = BTreeMap::new();
                for entry in key.enum_values() {
                    let (name, _) = entry.map_err(|e| StoreError::from_io(key_path.to_string(), e))?;
                    let value = read_value(&key, &name, &format!("{key_path}\\{name}"))?;
                    values.insert(name, value);
                }
                Ok(StoreData::Values(values))
            }
        }
    }

    fn set(
        &self,
        path: &StorePath,
        name: &str,
        value: &Value,
        kind: ValueKind,
    ) -> Result<(), StoreError> {
        let key_path = registry_path(path, "set")?;
        let location = format!("{key_path}\\{name}");
        super::check_kind(&location, value, kind)?;

        let (key, _) = predef(key_path.hive())
            .create_subkey(key_path.subkey())
            .map_err(|e| StoreError::from_io(key_path.to_string(), e))?;
        let result = match value {
            Value::String(s) => key.set_value(name, s),
            Value::ExpandString(s) => key.set_raw_value(
                name,
                &RegValue {
                    bytes: utf16_bytes(s).into(),
                    vtype: RegType::REG_EXPAND_SZ,
                },
            ),
            Value::Binary(bytes) => key.set_raw_value(
                name,
                &RegValue {
                    bytes: bytes.clone().into(),
                    vtype: RegType::REG_BINARY,
                },
            ),
            Value::Dword(n) => key.set_value(name, n),
            Value::Qword(n) => key.set_value(name, n),
            Value::MultiString(items) => key.set_value(name, items),
        };
        result.map_err(|e| StoreError::from_io(location, e))
    }

    fn create(&self, path: &StorePath, kind: EntryKind) -> Result<(), StoreError> {
        let key_path = registry_path(path, "create")?;
        if kind != EntryKind::Key {
            return Err(StoreError::Unsupported {
                backend: "registry",
                operation: format!("create a {kind} at"),
                path: key_path.to_string(),
            });
        }
        if self.exists(path) {
            return Err(StoreError::AlreadyExists {
                path: key_path.to_string(),
            });
        }
        predef(key_path.hive())
            .create_subkey(key_path.subkey())
            .map(drop)
            .map_err(|e| StoreError::from_io(key_path.to_string(), e))
    }

    fn remove(&self, path: &StorePath, recursive: bool) -> Result<(), StoreError> {
        let key_path = registry_path(path, "remove")?;
        let Some((parent, last)) = key_path.split_last() else {
            return Err(StoreError::AccessDenied {
                path: key_path.to_string(),
            });
        };
        let io_err = |e: io::Error| StoreError::from_io(key_path.to_string(), e);

        let has_children = open(key_path)?.enum_keys().next().is_some();
        if has_children && !recursive {
            return Err(StoreError::NotEmpty {
                path: key_path.to_string(),
            });
        }
        let parent_key = predef(parent.hive());
        if recursive {
            parent_key
                .open_subkey_with_flags(parent.subkey(), KEY_READ | KEY_WRITE)
                .and_then(|p| p.delete_subkey_all(last))
                .map_err(io_err)
        } else {
            parent_key
                .open_subkey_with_flags(parent.subkey(), KEY_READ | KEY_WRITE)
                .and_then(|p| p.delete_subkey(last))
                .map_err(io_err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_bytes_are_nul_terminated() {
        assert_eq!(utf16_bytes("A"), vec![0x41, 0x00, 0x00, 0x00]);
    }
}
