// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Copyright (c) 2023, Rob Norris <robn@despairlabs.com>

//! Mirror of the kernel's `zfs_cmd_t` and the ioctl that carries it.
//!
//! The kernel copies the whole structure in and out by size and reads fields
//! by absolute offset, so this is a wire format, not a convenience type.
//! Nothing here may be reordered, resized or dropped, even where we never
//! look at the field. Everything outside this module should treat the
//! layout as opaque and only go through `name`, `obj` and `stat.gen`.

// most fields only hold their place
#![allow(dead_code)]

use std::os::raw::c_int;
use derivative::Derivative;
use iocuddle::{Ioctl, WriteRead};

// include/sys/fs/zfs.h
pub(crate) const ZFS_MAX_DATASET_NAME_LEN: usize = 256;

// include/os/linux/spl/sys/sysmacros.h
pub(crate) const MAXNAMELEN: usize = 256;
pub(crate) const MAXPATHLEN: usize = 4096;

// zfs_share_t
#[repr(C)]
#[derive(Default,Debug)]
pub struct Share {
    exportdata: u64,
    sharedata:  u64,
    sharetype:  u64, // 0 = share, 1 = unshare
    sharemax:   u64, // max length of share string
}

// dmu_objset_stats_t
#[repr(C)]
#[derive(Derivative,Debug)]
#[derivative(Default)]
pub struct ObjsetStats {
    num_clones:     u64,
    creation_txg:   u64,
    guid:           u64,
    typ:            c_int, // enum dmu_objset_type
    is_snapshot:    u8,
    inconsistent:   u8,
    #[derivative(Default(value="[0; ZFS_MAX_DATASET_NAME_LEN]"))]
    origin:         [u8; ZFS_MAX_DATASET_NAME_LEN],
}

// struct drr_begin
#[repr(C)]
#[derive(Derivative,Debug)]
#[derivative(Default)]
pub struct ReplayRecordBegin {
    magic:          u64,
    versioninfo:    u64,
    creation_time:  u64,
    typ:            c_int, // enum dmu_objset_type
    flags:          u32,
    toguid:         u64,
    fromguid:       u64,
    #[derivative(Default(value="[0; MAXNAMELEN]"))]
    toname:         [u8; MAXNAMELEN],
}

// zinject_record_t
#[repr(C)]
#[derive(Derivative,Debug)]
#[derivative(Default)]
pub struct InjectRecord {
    objset:     u64,
    object:     u64,
    start:      u64,
    end:        u64,
    guid:       u64,
    level:      u32,
    error:      u32,
    typ:        u64,
    freq:       u32,
    failfast:   u32,
    #[derivative(Default(value="[0; MAXNAMELEN]"))]
    func:       [u8; MAXNAMELEN],
    iotype:     u32,
    duration:   i32,
    timer:      u64,
    nlanes:     u64,
    cmd:        u32,
    pad:        u32,
}

// zfs_stat_t
#[repr(C)]
#[derive(Default,Debug)]
pub struct Stat {
    pub(crate) gen: u64,
    mode:           u64,
    links:          u64,
    ctime:          [u64; 2],
}

// zfs_cmd_t
//
// the pointer slots are held as plain u64, which is what the kernel sees on
// every platform anyway
#[repr(C)]
#[derive(Derivative,Debug)]
#[derivative(Default)]
pub struct Command {
    // nvlist-based
    #[derivative(Default(value="[0; MAXPATHLEN]"))]
    pub(crate) name:        [u8; MAXPATHLEN],
    nvlist_src:             u64, // really (char *)
    nvlist_src_size:        u64,
    nvlist_dst:             u64, // really (char *)
    nvlist_dst_size:        u64,
    nvlist_dst_filled:      u32, // boolean_t
    pad2:                   c_int,

    // legacy
    history:                u64, // really (char *)
    #[derivative(Default(value="[0; MAXPATHLEN*2]"))]
    value:                  [u8; MAXPATHLEN*2],
    #[derivative(Default(value="[0; MAXNAMELEN]"))]
    string:                 [u8; MAXNAMELEN],
    guid:                   u64,
    nvlist_conf:            u64, // really (char *)
    nvlist_conf_size:       u64,
    cookie:                 u64,
    objset_type:            u64,
    perm_action:            u64,
    history_len:            u64,
    history_offset:         u64,
    pub(crate) obj:         u64,
    iflags:                 u64, // internal to zfs(7fs)
    share:                  Share,
    objset_stats:           ObjsetStats,
    begin_record:           ReplayRecordBegin,
    inject_record:          InjectRecord,
    defer_destroy:          u32,
    flags:                  u32,
    action_handle:          u64,
    cleanup_fd:             c_int,
    simple:                 u8,
    #[derivative(Default(value="[0; 3]"))]
    pad:                    [u8; 3], // alignment
    sendobj:                u64,
    fromobj:                u64,
    createtxg:              u64,
    pub(crate) stat:        Stat,
    #[cfg(feature = "zoneid")]
    zoneid:                 u64,
}

// sizes as compiled into the kernel module on LP64 platforms
#[cfg(target_pointer_width = "64")]
const _: () = {
    use std::mem::size_of;
    assert!(size_of::<Share>() == 32);
    assert!(size_of::<ObjsetStats>() == 288);
    assert!(size_of::<ReplayRecordBegin>() == 304);
    assert!(size_of::<InjectRecord>() == 352);
    assert!(size_of::<Stat>() == 40);
    #[cfg(not(feature = "zoneid"))]
    assert!(size_of::<Command>() == 13736);
    #[cfg(feature = "zoneid")]
    assert!(size_of::<Command>() == 13744);
};

pub type ZFSIoctl = Ioctl<WriteRead, &'static Command>;

macro_rules! zfs_ioctl {
    ($name:ident, $id:expr) => {
        pub const $name: ZFSIoctl = unsafe { Ioctl::classic($id) };
    }
}

zfs_ioctl!(ZFS_IOC_OBJ_TO_STATS, 0x5a38);
