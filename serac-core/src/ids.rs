//! Owner/group resolution by name rather than numeric id, so that
//! restoring onto a machine with a different `/etc/passwd` still maps to
//! the right principal when that name exists there (§9 "Owner/group
//! portability"). Implemented as a plain parse of `/etc/passwd` and
//! `/etc/group` — no `libc` calls, no `unsafe`, matching this crate's
//! `forbid(unsafe_code)`.

use std::collections::HashMap;
use std::fs;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// uid/gid -> name lookup tables, built once per scan/restore.
pub struct IdResolver {
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
}

impl IdResolver {
    pub fn load() -> Self {
        Self {
            users: parse_id_table("/etc/passwd"),
            groups: parse_id_table("/etc/group"),
        }
    }

    pub fn user_name(&self, uid: u32) -> String {
        self.users
            .get(&uid)
            .cloned()
            .unwrap_or_else(|| uid.to_string())
    }

    pub fn group_name(&self, gid: u32) -> String {
        self.groups
            .get(&gid)
            .cloned()
            .unwrap_or_else(|| gid.to_string())
    }

    /// uid for a name, if `/etc/passwd` on this machine has it.
    pub fn uid_for(&self, name: &str) -> Option<u32> {
        self.users
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(uid, _)| *uid)
    }

    pub fn gid_for(&self, name: &str) -> Option<u32> {
        self.groups
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(gid, _)| *gid)
    }
}

/// `/etc/passwd` (`name:passwd:uid:gid:gecos:home:shell`) and `/etc/group`
/// (`name:passwd:gid:members`) agree on the field that matters here: the
/// numeric id is the third colon-separated field, right after the name and
/// the password placeholder.
fn parse_id_table(path: &str) -> HashMap<u32, String> {
    let Ok(contents) = fs::read_to_string(path) else {
        return HashMap::new();
    };
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let id: u32 = fields.nth(1)?.parse().ok()?;
            Some((id, name.to_string()))
        })
        .collect()
}

#[cfg(unix)]
pub fn owner_group_of(metadata: &fs::Metadata, resolver: &IdResolver) -> (String, String) {
    (
        resolver.user_name(metadata.uid()),
        resolver.group_name(metadata.gid()),
    )
}

#[cfg(not(unix))]
pub fn owner_group_of(_metadata: &fs::Metadata, _resolver: &IdResolver) -> (String, String) {
    (whoami::username(), "users".to_string())
}

/// The user invoking the process, used as the restore-time fallback when
/// a recorded owner name doesn't resolve on this machine (§4.6, §9).
pub fn invoking_user() -> String {
    whoami::username()
}
