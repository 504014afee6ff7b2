//! Permission & capability model: access checks are a pure function of
//! `(euid, egid, owner_uid, owner_gid, mode, action)` plus a capability
//! gate for killing tasks.

use bitflags::bitflags;

/// User id. `0` is root; the sentinel `0xFFFF` marks "invalid" the same way
/// task ids do.
pub type Uid = u16;
/// Group id.
pub type Gid = u16;

pub const UID_ROOT: Uid = 0;
pub const GID_ROOT: Gid = 0;
pub const GID_SYSTEM: Gid = 1;
pub const GID_DRIVERS: Gid = 2;
pub const GID_USERS: Gid = 100;
pub const UID_INVALID: Uid = 0xFFFF;

bitflags! {
    /// Requested access combination for a [`Access::check`] call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        const READ = 0b100;
        const WRITE = 0b010;
        const EXEC = 0b001;
    }
}

bitflags! {
    /// Linux-style capability mask (`CAP_*`-style flags).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const SYS_ADMIN = 1 << 0;
        const SYS_BOOT = 1 << 1;
        const GPIO_WRITE = 1 << 2;
        const UART_CONFIG = 1 << 3;
        const TASK_SPAWN = 1 << 4;
        const TASK_KILL = 1 << 5;
        const MEM_LOCK = 1 << 6;
        const NET_ADMIN = 1 << 7;
        const ALL = 0xFFFF_FFFF;
    }
}

/// 9-bit Unix-style mode: three 3-bit groups (owner, group, other), each an
/// [`Access`] mask. Stored packed as `owner << 6 | group << 3 | other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode(pub u16);

impl Mode {
    pub const fn new(owner: Access, group: Access, other: Access) -> Self {
        Self(((owner.bits() as u16) << 6) | ((group.bits() as u16) << 3) | (other.bits() as u16))
    }

    pub fn owner(self) -> Access {
        Access::from_bits_truncate(((self.0 >> 6) & 0x7) as u8)
    }

    pub fn group(self) -> Access {
        Access::from_bits_truncate(((self.0 >> 3) & 0x7) as u8)
    }

    pub fn other(self) -> Access {
        Access::from_bits_truncate((self.0 & 0x7) as u8)
    }

    /// `rw-r--r--` (0644).
    pub const fn rw_r_r() -> Self {
        Self::new(
            Access::from_bits_truncate(Access::READ.bits() | Access::WRITE.bits()),
            Access::READ,
            Access::READ,
        )
    }

    /// `rw-------` (0600).
    pub const fn rw_owner_only() -> Self {
        Self::new(
            Access::from_bits_truncate(Access::READ.bits() | Access::WRITE.bits()),
            Access::empty(),
            Access::empty(),
        )
    }

    /// `rwxr-xr-x` (0755).
    pub const fn rwx_r_x_r_x() -> Self {
        Self::new(
            Access::from_bits_truncate(0o7),
            Access::from_bits_truncate(0o5),
            Access::from_bits_truncate(0o5),
        )
    }
}

/// Resource type tag. Only `Task` carries
/// the extra capability gate: killing a task additionally
/// requires `CAP_TASK_KILL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Device,
    Memory,
    Ipc,
    Syscall,
    Task,
}

/// A resource's ownership and permission bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourcePerm {
    pub owner_uid: Uid,
    pub owner_gid: Gid,
    pub mode: Mode,
    pub kind: ResourceType,
}

impl ResourcePerm {
    pub const fn new(owner_uid: Uid, owner_gid: Gid, mode: Mode, kind: ResourceType) -> Self {
        Self {
            owner_uid,
            owner_gid,
            mode,
            kind,
        }
    }
}

/// A task's security context: real/effective uid/gid, umask, capabilities
///. Carried by every task descriptor and consulted on every
/// permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityContext {
    pub uid: Uid,
    pub gid: Gid,
    pub euid: Uid,
    pub egid: Gid,
    pub umask: u16,
    pub capabilities: Capabilities,
}

impl SecurityContext {
    /// Builds the default context for a newly created task: root gets
    /// `GID_ROOT` and `CAP_ALL`, everyone else gets `GID_USERS` and no
    /// capabilities.
    pub fn for_uid(uid: Uid) -> Self {
        if uid == UID_ROOT {
            Self {
                uid,
                gid: GID_ROOT,
                euid: uid,
                egid: GID_ROOT,
                umask: 0o022,
                capabilities: Capabilities::ALL,
            }
        } else {
            Self {
                uid,
                gid: GID_USERS,
                euid: uid,
                egid: GID_USERS,
                umask: 0o022,
                capabilities: Capabilities::empty(),
            }
        }
    }

    /// True if this context has `capability`, with root as a universal
    /// override.
    pub fn has_capability(&self, capability: Capabilities) -> bool {
        self.euid == UID_ROOT || self.capabilities.contains(capability)
    }

    pub fn grant(&mut self, capability: Capabilities) {
        self.capabilities |= capability;
    }

    pub fn revoke(&mut self, capability: Capabilities) {
        self.capabilities.remove(capability);
    }

    /// Change effective uid. Always allowed to drop back to the real uid;
    /// otherwise only root may set an arbitrary euid. No capability-based setuid in this model.
    pub fn seteuid(&mut self, new_euid: Uid) -> bool {
        if new_euid == self.uid || self.euid == UID_ROOT {
            self.euid = new_euid;
            true
        } else {
            false
        }
    }

    /// Change effective gid, same rule shape as [`SecurityContext::seteuid`]
    /// but gated on `egid == GID_ROOT` rather than `euid == UID_ROOT` — an
    /// intentionally preserved asymmetry with `seteuid`, not a bug.
    pub fn setegid(&mut self, new_egid: Gid) -> bool {
        if new_egid == self.gid || self.egid == GID_ROOT {
            self.egid = new_egid;
            true
        } else {
            false
        }
    }
}

/// Pure access check: `(euid, egid, owner_uid, owner_gid, mode, action) ->
/// bool`. Root always passes; otherwise
/// owner bits, then group bits, then other bits — in that priority order,
/// never combined.
pub fn check_access(ctx: &SecurityContext, resource: &ResourcePerm, requested: Access) -> bool {
    if ctx.euid == UID_ROOT {
        return true;
    }
    if ctx.euid == resource.owner_uid {
        return resource.mode.owner().intersects(requested);
    }
    if ctx.egid == resource.owner_gid {
        return resource.mode.group().intersects(requested);
    }
    resource.mode.other().intersects(requested)
}

/// Combines [`check_access`] with the capability gate for `Task` resources:
/// killing a task (`Exec` on a `Task` resource) additionally requires
/// `CAP_TASK_KILL`.
pub fn can_access(ctx: &SecurityContext, resource: &ResourcePerm, requested: Access) -> bool {
    if !check_access(ctx, resource, requested) {
        return false;
    }
    if resource.kind == ResourceType::Task && requested.contains(Access::EXEC) {
        return ctx.has_capability(Capabilities::TASK_KILL);
    }
    true
}

/// `chmod`: owner or root only.
pub fn chmod(ctx: &SecurityContext, resource: &mut ResourcePerm, new_mode: Mode) -> bool {
    if ctx.uid == resource.owner_uid || ctx.euid == UID_ROOT {
        resource.mode = new_mode;
        true
    } else {
        false
    }
}

/// `chown`: root only.
pub fn chown(ctx: &SecurityContext, resource: &mut ResourcePerm, new_uid: Uid, new_gid: Gid) -> bool {
    if ctx.euid != UID_ROOT {
        return false;
    }
    resource.owner_uid = new_uid;
    resource.owner_gid = new_gid;
    true
}

#[cfg(test)]
mod test {
    use super::*;

    fn ctx(uid: Uid, gid: Gid) -> SecurityContext {
        SecurityContext {
            uid,
            gid,
            euid: uid,
            egid: gid,
            umask: 0o022,
            capabilities: Capabilities::empty(),
        }
    }

    #[test]
    fn root_always_allowed() {
        let c = ctx(UID_ROOT, GID_ROOT);
        let r = ResourcePerm::new(1, 1, Mode(0), ResourceType::Device);
        assert!(check_access(&c, &r, Access::READ));
    }

    #[test]
    fn permission_denial_and_allow() {
        let c = ctx(1000, GID_USERS);
        let deny = ResourcePerm::new(0, 0, Mode::rw_owner_only(), ResourceType::Device);
        assert!(!check_access(&c, &deny, Access::READ));

        let allow = ResourcePerm::new(0, 0, Mode::rw_r_r(), ResourceType::Device);
        assert!(check_access(&c, &allow, Access::READ));
    }

    #[test]
    fn owner_bits_take_priority_over_group() {
        let c = ctx(42, GID_USERS);
        // owner matches: owner bits say no-write even though group says yes
        let r = ResourcePerm::new(
            42,
            GID_USERS,
            Mode::new(Access::READ, Access::from_bits_truncate(0o7), Access::empty()),
            ResourceType::Device,
        );
        assert!(!check_access(&c, &r, Access::WRITE));
    }

    #[test]
    fn check_is_pure_idempotent_function() {
        let c = ctx(1000, GID_USERS);
        let r = ResourcePerm::new(0, 0, Mode::rw_r_r(), ResourceType::Device);
        let first = check_access(&c, &r, Access::READ);
        let second = check_access(&c, &r, Access::READ);
        assert_eq!(first, second);
    }

    #[test]
    fn task_kill_requires_capability_even_with_mode_bits() {
        let mut c = ctx(1000, GID_USERS);
        let r = ResourcePerm::new(1000, GID_USERS, Mode::rwx_r_x_r_x(), ResourceType::Task);
        assert!(!can_access(&c, &r, Access::EXEC));
        c.grant(Capabilities::TASK_KILL);
        assert!(can_access(&c, &r, Access::EXEC));
    }

    #[test]
    fn seteuid_can_always_drop_to_real_uid() {
        let mut c = ctx(1000, GID_USERS);
        c.euid = UID_ROOT;
        assert!(c.seteuid(1000));
        assert_eq!(c.euid, 1000);
    }

    #[test]
    fn seteuid_cannot_escalate_without_root() {
        let mut c = ctx(1000, GID_USERS);
        assert!(!c.seteuid(0));
        assert_eq!(c.euid, 1000);
    }

    #[test]
    fn chmod_by_non_owner_non_root_denied() {
        let c = ctx(1000, GID_USERS);
        let mut r = ResourcePerm::new(0, 0, Mode::rw_r_r(), ResourceType::Device);
        assert!(!chmod(&c, &mut r, Mode::rw_owner_only()));
    }

    #[test]
    fn chown_requires_root() {
        let owner = ctx(1000, GID_USERS);
        let mut r = ResourcePerm::new(1000, GID_USERS, Mode::rw_r_r(), ResourceType::Device);
        assert!(!chown(&owner, &mut r, 2000, GID_USERS));

        let root = ctx(UID_ROOT, GID_ROOT);
        assert!(chown(&root, &mut r, 2000, GID_USERS));
        assert_eq!(r.owner_uid, 2000);
    }
}
