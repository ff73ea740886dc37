// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Copyright (c) 2023, Rob Norris <robn@despairlabs.com>

use std::fs::File;
use std::io::Result as IOResult;
use std::path::Path;
use nix::errno::Errno;
use crate::sys::{self, Command};

pub const DEFAULT_DEV: &str = "/dev/zfs";

// the thing we send commands to. /dev/zfs in real life, something canned in
// the tests
pub trait Device {
    fn obj_to_stats(&mut self, zc: &mut Command) -> IOResult<()>;
}

impl Device for File {
    fn obj_to_stats(&mut self, zc: &mut Command) -> IOResult<()> {
        sys::ZFS_IOC_OBJ_TO_STATS.ioctl(self, zc)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct Handle<D = File> {
    dev: D,
    cmd: Box<Command>,
}

impl Handle<File> {
    // open the control device node. you only need this if its not on /dev/zfs
    pub fn open_dev<P: AsRef<Path>>(path: P) -> IOResult<Handle<File>> {
        Ok(Handle::new(File::open(path)?))
    }

    // open the control device via /dev/zfs
    pub fn open() -> IOResult<Handle<File>> {
        Handle::open_dev(DEFAULT_DEV)
    }
}

impl<D: Device> Handle<D> {
    pub fn new(dev: D) -> Handle<D> {
        Handle {
            dev,
            cmd: Box::default(),
        }
    }

    pub fn device(&self) -> &D {
        &self.dev
    }

    // the command struct is set up once and then reused. OBJ_TO_STATS only
    // reads name and obj, so those are the only things we refresh; whatever
    // the kernel left in the rest from last time stays there

    // helper: copy the name in, truncating to fit, and clear whatever was
    // left over from a longer previous name. returns the stored length
    fn set_name(&mut self, name: &[u8]) -> usize {
        let len = name.len().min(self.cmd.name.len() - 1);
        self.cmd.name[..len].copy_from_slice(&name[..len]);
        self.cmd.name[len..].fill(0);
        len
    }

    // look up an object in a dataset and return its generation number
    pub fn obj_to_stats(&mut self, name: &[u8], obj: u64) -> Result<u64, Errno> {
        let len = self.set_name(name);
        if len < name.len() {
            log::debug!("name truncated to {} bytes", len);
        }
        self.cmd.obj = obj;

        match self.dev.obj_to_stats(&mut self.cmd) {
            Ok(()) => Ok(self.cmd.stat.gen),
            Err(e) => Err(e.raw_os_error().map_or(Errno::UnknownErrno, Errno::from_raw)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io;

    // stands in for /dev/zfs. answers every lookup with the same generation,
    // except for objects listed in fail, and remembers what it was asked
    #[derive(Debug, Default)]
    pub(crate) struct StubDevice {
        pub gen: u64,
        pub fail: Vec<(u64, Errno)>,
        pub calls: Vec<(Vec<u8>, u64)>,
    }

    impl StubDevice {
        pub fn new(gen: u64) -> StubDevice {
            StubDevice {
                gen,
                ..Default::default()
            }
        }
    }

    impl Device for StubDevice {
        fn obj_to_stats(&mut self, zc: &mut Command) -> IOResult<()> {
            let end = zc.name.iter().position(|&b| b == 0).unwrap_or(zc.name.len());
            self.calls.push((zc.name[..end].to_vec(), zc.obj));
            if let Some((_, e)) = self.fail.iter().find(|(obj, _)| *obj == zc.obj) {
                return Err(io::Error::from_raw_os_error(*e as i32));
            }
            zc.stat.gen = self.gen;
            Ok(())
        }
    }

    #[test]
    fn lookup() {
        let mut h = Handle::new(StubDevice::new(7));
        assert_eq!(h.obj_to_stats(b"tank/data", 42), Ok(7));
        assert_eq!(h.device().calls, vec![(b"tank/data".to_vec(), 42)]);
    }

    #[test]
    fn lookup_failure() {
        let mut dev = StubDevice::new(7);
        dev.fail.push((99, Errno::ENOENT));
        let mut h = Handle::new(dev);
        assert_eq!(h.obj_to_stats(b"tank/data", 99), Err(Errno::ENOENT));
        assert_eq!(h.obj_to_stats(b"tank/data", 100), Ok(7));
    }

    #[test]
    fn shorter_name_clears_previous() {
        let mut h = Handle::new(StubDevice::new(1));
        h.obj_to_stats(b"tank/a/much/longer/name", 2).unwrap();
        h.obj_to_stats(b"tank", 3).unwrap();
        assert_eq!(h.device().calls[1], (b"tank".to_vec(), 3));
        assert!(h.cmd.name[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn long_name_truncated() {
        let long = vec![b'x'; sys::MAXPATHLEN + 100];
        let mut h = Handle::new(StubDevice::new(5));
        assert_eq!(h.obj_to_stats(&long, 8), Ok(5));
        let (name, obj) = &h.device().calls[0];
        assert_eq!(name.len(), sys::MAXPATHLEN - 1);
        assert_eq!(*obj, 8);
        assert_eq!(h.cmd.name[sys::MAXPATHLEN - 1], 0);
    }

    #[test]
    fn missing_device() {
        let e = Handle::open_dev("/nonexistent/zfs").unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
    }
}
